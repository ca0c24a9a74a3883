//! AGSI+ (GIE) aggregated gas storage client.
//!
//! The API pages its results; every page from 1 to `last_page` is fetched
//! and concatenated. Payload field names differ between tenants and API
//! revisions, so the date and fill level are located by trying the known
//! spellings in turn.

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::info;

use super::loader::parse_date;
use super::source::DataError;
use crate::domain::{DailySeries, SeriesColumn};

pub const DEFAULT_BASE_URL: &str = "https://agsi.gie.eu/api";
pub const API_KEY_ENV: &str = "AGSI_API_KEY";
pub const BASE_URL_ENV: &str = "AGSI_BASE_URL";
/// Output column: storage fullness in percent (0-100).
pub const LEVEL_COLUMN: &str = "level_pct";
const TIMEOUT: Duration = Duration::from_secs(90);

const DATE_FIELDS: [&str; 6] = ["gasDayStart", "gasDay", "date", "day", "period", "time"];
/// Some tenants only answer to the capitalised spelling.
const TYPE_SPELLINGS: [&str; 2] = ["aggregated", "Aggregated"];

type Item = Map<String, Value>;

/// What to fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct AgsiQuery {
    pub country: String,
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl AgsiQuery {
    pub fn new(country: impl Into<String>, from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            country: country.into(),
            from,
            to,
        }
    }

    fn params(&self, kind: &str, page: u32) -> Vec<(&'static str, String)> {
        vec![
            ("country", self.country.clone()),
            ("type", kind.to_string()),
            ("from", self.from.to_string()),
            ("to", self.to.to_string()),
            ("page", page.to_string()),
        ]
    }
}

#[derive(Debug, Default, Deserialize)]
struct AgsiPage {
    #[serde(default)]
    last_page: Option<Value>,
    #[serde(default)]
    data: Vec<Item>,
}

impl AgsiPage {
    /// `last_page` arrives as a number or a numeric string; absent means 1.
    fn last_page(&self) -> u32 {
        self.last_page
            .as_ref()
            .and_then(number)
            .map(|p| p.max(1.0) as u32)
            .unwrap_or(1)
    }
}

pub struct AgsiClient {
    client: reqwest::blocking::Client,
    api_key: String,
    base_url: String,
}

impl AgsiClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(TIMEOUT)
            .build()
            .map_err(|e| DataError::NetworkUnreachable(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Build a client from `AGSI_API_KEY`, honouring `AGSI_BASE_URL`.
    pub fn from_env() -> Result<Self, DataError> {
        let key = std::env::var(API_KEY_ENV).unwrap_or_default();
        let key = key.trim();
        if key.is_empty() {
            return Err(DataError::AuthenticationRequired(format!("{API_KEY_ENV} not set")));
        }
        let client = Self::new(key)?;
        Ok(match std::env::var(BASE_URL_ENV) {
            Ok(url) if !url.trim().is_empty() => client.with_base_url(url.trim()),
            _ => client,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Fetch every page of `query` into a series named `name` with a single
    /// `level_pct` column.
    pub fn fetch(&self, query: &AgsiQuery, name: &str) -> Result<DailySeries, DataError> {
        let mut items = Vec::new();
        for kind in TYPE_SPELLINGS {
            items = collect_pages(|page| self.get_page(query, kind, page))?;
            if !items.is_empty() {
                break;
            }
            info!(country = %query.country, kind, "AGSI returned no items");
        }
        if items.is_empty() {
            return Err(DataError::EmptyResponse {
                series: format!("agsi:{}", query.country),
            });
        }

        let series = parse_items(name, &items)?;
        info!(country = %query.country, rows = series.len(), "fetched AGSI storage");
        Ok(series)
    }

    fn get_page(&self, query: &AgsiQuery, kind: &str, page: u32) -> Result<AgsiPage, DataError> {
        let resp = self
            .client
            .get(&self.base_url)
            .header("x-key", &self.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(&query.params(kind, page))
            .send()
            .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(DataError::AuthenticationRequired(format!(
                "AGSI rejected the API key (HTTP {status})"
            )));
        }
        if !status.is_success() {
            return Err(DataError::NetworkUnreachable(format!(
                "HTTP {status} for {} page {page}",
                self.base_url
            )));
        }

        resp.json()
            .map_err(|e| DataError::ResponseFormatChanged(format!("failed to parse AGSI page {page}: {e}")))
    }
}

/// Fetch page 1, then pages 2..=last_page, concatenating their items.
fn collect_pages(
    mut get: impl FnMut(u32) -> Result<AgsiPage, DataError>,
) -> Result<Vec<Item>, DataError> {
    let first = get(1)?;
    let last_page = first.last_page();
    let mut items = first.data;
    for page in 2..=last_page {
        items.extend(get(page)?.data);
    }
    Ok(items)
}

// ─── Normalisation ───────────────────────────────────────────────────

/// Turn raw AGSI items into a sorted, de-duplicated `level_pct` series.
///
/// The level comes from `full` (scaled by 100 when every value is at most
/// 1.5, i.e. a fraction), else `level`, else `gasInStorage /
/// workingGasVolume * 100`. Rows without a date or a level are dropped.
fn parse_items(name: &str, items: &[Item]) -> Result<DailySeries, DataError> {
    let has = |field: &str| items.iter().any(|item| item.contains_key(field));

    let date_field = DATE_FIELDS.into_iter().find(|f| has(*f)).ok_or_else(|| {
        DataError::ResponseFormatChanged("no date-like field in AGSI payload".into())
    })?;

    let field = |item: &Item, key: &str| item.get(key).and_then(number);
    let levels: Vec<Option<f64>> = if has("full") {
        let full: Vec<Option<f64>> = items.iter().map(|item| field(item, "full")).collect();
        let max = full.iter().flatten().copied().fold(f64::NEG_INFINITY, f64::max);
        if max <= 1.5 {
            full.into_iter().map(|v| v.map(|x| x * 100.0)).collect()
        } else {
            full
        }
    } else if has("level") {
        items.iter().map(|item| field(item, "level")).collect()
    } else if has("gasInStorage") && has("workingGasVolume") {
        items
            .iter()
            .map(|item| {
                let stored = field(item, "gasInStorage")?;
                let capacity = field(item, "workingGasVolume")?;
                Some(stored / capacity * 100.0).filter(|x| x.is_finite())
            })
            .collect()
    } else {
        return Err(DataError::ResponseFormatChanged(
            "could not derive level_pct from AGSI payload".into(),
        ));
    };

    let mut points: Vec<(NaiveDate, f64)> = items
        .iter()
        .zip(levels)
        .filter_map(|(item, level)| {
            let date = item.get(date_field).and_then(Value::as_str).and_then(parse_date)?;
            Some((date, level?))
        })
        .collect();
    points.sort_by_key(|(date, _)| *date);
    points.dedup_by_key(|(date, _)| *date);

    let (dates, values): (Vec<NaiveDate>, Vec<Option<f64>>) =
        points.into_iter().map(|(d, v)| (d, Some(v))).unzip();
    Ok(DailySeries::new(name, dates, vec![SeriesColumn::new(LEVEL_COLUMN, values)])?)
}

/// AGSI mixes JSON numbers, numeric strings and `"-"` placeholders.
fn number(value: &Value) -> Option<f64> {
    let x = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    x.filter(|x| x.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn items(json: &str) -> Vec<Item> {
        serde_json::from_str(json).unwrap()
    }

    fn page(json: &str) -> AgsiPage {
        serde_json::from_str(json).unwrap()
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn follows_last_page() {
        let requested = RefCell::new(Vec::new());
        let all = collect_pages(|p| {
            requested.borrow_mut().push(p);
            Ok(page(&format!(
                r#"{{"last_page": "3", "data": [{{"gasDayStart": "2024-01-0{p}", "full": "50"}}]}}"#
            )))
        })
        .unwrap();
        assert_eq!(*requested.borrow(), vec![1, 2, 3]);
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn missing_last_page_means_one_page() {
        let all = collect_pages(|p| {
            assert_eq!(p, 1);
            Ok(page(r#"{"data": []}"#))
        })
        .unwrap();
        assert!(all.is_empty());
    }

    #[test]
    fn page_errors_propagate() {
        let err = collect_pages(|p| {
            if p == 2 {
                Err(DataError::NetworkUnreachable("reset".into()))
            } else {
                Ok(page(r#"{"last_page": 2, "data": []}"#))
            }
        })
        .unwrap_err();
        assert!(matches!(err, DataError::NetworkUnreachable(_)));
    }

    #[test]
    fn fractional_full_is_scaled_to_percent() {
        let s = parse_items(
            "eu",
            &items(
                r#"[
                {"gasDayStart": "2024-01-02", "full": "0.805"},
                {"gasDayStart": "2024-01-01", "full": 0.81},
                {"gasDayStart": "2024-01-03", "full": "-"}
            ]"#,
            ),
        )
        .unwrap();
        assert_eq!(s.dates(), &[d(1), d(2)]);
        let values: Vec<f64> = s.column(LEVEL_COLUMN).unwrap().values.iter().flatten().copied().collect();
        assert!((values[0] - 81.0).abs() < 1e-9);
        assert!((values[1] - 80.5).abs() < 1e-9);
    }

    #[test]
    fn percent_full_is_kept() {
        let s = parse_items("eu", &items(r#"[{"gasDay": "2024-01-05", "full": "72.4"}]"#)).unwrap();
        assert_eq!(s.column(LEVEL_COLUMN).unwrap().values, vec![Some(72.4)]);
    }

    #[test]
    fn level_then_storage_ratio_fallbacks() {
        let s = parse_items("eu", &items(r#"[{"date": "2024-01-05", "level": 64}]"#)).unwrap();
        assert_eq!(s.column(LEVEL_COLUMN).unwrap().values, vec![Some(64.0)]);

        let s = parse_items(
            "eu",
            &items(
                r#"[{"gasDayStart": "2024-01-05", "gasInStorage": "50", "workingGasVolume": "200"},
                    {"gasDayStart": "2024-01-06", "gasInStorage": "50", "workingGasVolume": "0"}]"#,
            ),
        )
        .unwrap();
        assert_eq!(s.dates(), &[d(5)]);
        assert_eq!(s.column(LEVEL_COLUMN).unwrap().values, vec![Some(25.0)]);
    }

    #[test]
    fn unrecognised_payload_is_a_format_change() {
        let err = parse_items("eu", &items(r#"[{"when": "2024-01-05", "full": 1}]"#)).unwrap_err();
        assert!(matches!(err, DataError::ResponseFormatChanged(_)));
        let err = parse_items("eu", &items(r#"[{"gasDayStart": "2024-01-05", "injection": 1}]"#)).unwrap_err();
        assert!(matches!(err, DataError::ResponseFormatChanged(_)));
    }

    #[test]
    fn query_params_carry_type_and_page() {
        let q = AgsiQuery::new("EU", NaiveDate::from_ymd_opt(2017, 1, 1).unwrap(), d(31));
        let params = q.params("Aggregated", 4);
        assert!(params.contains(&("type", "Aggregated".to_string())));
        assert!(params.contains(&("page", "4".to_string())));
        assert!(params.contains(&("from", "2017-01-01".to_string())));
        assert!(params.contains(&("to", "2024-01-31".to_string())));
    }
}
