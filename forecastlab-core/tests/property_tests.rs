//! Property tests for the alignment and feature invariants.
//!
//! Uses proptest to verify:
//! 1. Calendar completeness: one row per day of the anchor's span, no gaps
//! 2. No missing exogenous or calendar cells after filling
//! 3. Lag leakage freedom: `lag_k(t) == base(t - k)`, never a later value
//! 4. Target validity: every kept row has every target, equal to `anchor(t + H)`

use chrono::{Days, NaiveDate};
use proptest::prelude::*;
use forecastlab_core::data::{align, span_days};
use forecastlab_core::domain::{ColumnRole, DailySeries, SeriesColumn};
use forecastlab_core::features::{construct_targets, FeatureConfig, FeatureSynthesizer};

// ── Strategies (proptest) ────────────────────────────────────────────

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()
}

/// Sorted, distinct day offsets with values; at least one row.
fn arb_observations(max_day: u64) -> impl Strategy<Value = Vec<(u64, f64)>> {
    prop::collection::btree_map(0..max_day, -50.0..50.0_f64, 1..60)
        .prop_map(|m| m.into_iter().collect())
}

fn series(name: &str, column: &str, obs: &[(u64, f64)]) -> DailySeries {
    DailySeries::from_points(
        name,
        column,
        obs.iter().map(|&(d, v)| (base_date() + Days::new(d), v)),
    )
    .unwrap()
}

/// Sparse auxiliary series that may sit partly outside the anchor span.
fn aux(obs: &[(u64, f64)]) -> DailySeries {
    let (dates, values): (Vec<NaiveDate>, Vec<Option<f64>>) = obs
        .iter()
        .map(|&(d, v)| (base_date() + Days::new(d), if v > 40.0 { None } else { Some(v) }))
        .unzip();
    DailySeries::new("aux", dates, vec![SeriesColumn::new("storage", values)]).unwrap()
}

proptest! {
    // ── 1. Calendar completeness ─────────────────────────────────────

    #[test]
    fn aligned_axis_is_contiguous(anchor_obs in arb_observations(400)) {
        let anchor = series("hh", "y", &anchor_obs);
        let table = align(&anchor, "y", &[]).unwrap();
        let (first, last) = (anchor.first_date().unwrap(), anchor.last_date().unwrap());

        prop_assert_eq!(table.height(), span_days(first, last));
        let dates = table.frame().dates();
        prop_assert_eq!(dates[0], first);
        prop_assert_eq!(*dates.last().unwrap(), last);
        for pair in dates.windows(2) {
            prop_assert_eq!(pair[0] + Days::new(1), pair[1]);
        }
    }

    // ── 2. No post-fill missing values ───────────────────────────────

    #[test]
    fn exogenous_and_calendar_columns_fully_filled(
        anchor_obs in arb_observations(200),
        aux_obs in arb_observations(300),
    ) {
        let table = align(&series("hh", "y", &anchor_obs), "y", &[aux(&aux_obs)]).unwrap();
        let features = FeatureSynthesizer::default().synthesize(table).unwrap();
        for column in features.frame().columns() {
            if matches!(column.role, ColumnRole::Exogenous | ColumnRole::Calendar) {
                prop_assert!(
                    column.values.iter().all(Option::is_some),
                    "{} has missing cells", column.name
                );
            }
        }
    }

    // ── 3. Lag leakage freedom ───────────────────────────────────────

    #[test]
    fn lags_read_only_the_past(
        values in prop::collection::vec(-100.0..100.0_f64, 1..120),
        k in 1u32..30,
    ) {
        let obs: Vec<(u64, f64)> = values.iter().enumerate().map(|(i, v)| (i as u64, *v)).collect();
        let table = align(&series("hh", "y", &obs), "y", &[]).unwrap();
        let config = FeatureConfig { lags: vec![k], lag_columns: vec![], rolling: vec![] };
        let features = FeatureSynthesizer::new(config).synthesize(table).unwrap();

        let lag = &features.frame().column(&format!("y_lag{k}")).unwrap().values;
        let k = k as usize;
        for (t, value) in lag.iter().enumerate() {
            if t < k {
                prop_assert_eq!(*value, None);
            } else {
                prop_assert_eq!(*value, Some(values[t - k]));
            }
        }
    }

    // ── 4. Target validity ───────────────────────────────────────────

    #[test]
    fn kept_rows_have_true_future_targets(
        anchor_obs in arb_observations(150),
        horizons in prop::collection::btree_set(1u32..40, 1..3),
    ) {
        let anchor = series("hh", "y", &anchor_obs);
        let horizons: Vec<u32> = horizons.into_iter().collect();
        let table = align(&anchor, "y", &[]).unwrap();
        let features = FeatureSynthesizer::default().synthesize(table).unwrap();
        let trainable = construct_targets(features, &horizons).unwrap();

        let frame = trainable.frame();
        prop_assert!(frame.column("y").unwrap().values.iter().all(Option::is_some));
        for &h in &horizons {
            let target = &frame.column(&format!("target_t+{h}")).unwrap().values;
            for (row, date) in frame.dates().iter().enumerate() {
                let expected = anchor.value_at("y", *date + Days::new(u64::from(h)));
                prop_assert!(target[row].is_some());
                prop_assert_eq!(target[row], expected);
            }
        }
    }
}
