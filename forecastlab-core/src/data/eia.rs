//! EIA Open Data (v2) client.
//!
//! Pulls one series from any v2 route and facet into a [`DailySeries`].
//! Routes and series identifiers change between datasets, so both are
//! supplied by the caller rather than hard-coded.

use chrono::NaiveDate;
use serde::Deserialize;
use std::time::Duration;
use tracing::info;

use super::loader::parse_date;
use super::source::DataError;
use crate::domain::{DailySeries, SeriesColumn};

pub const DEFAULT_BASE_URL: &str = "https://api.eia.gov/v2";
pub const API_KEY_ENV: &str = "EIA_API_KEY";
const TIMEOUT: Duration = Duration::from_secs(90);

/// What to fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct EiaQuery {
    /// Route path under the v2 root, e.g. `natural-gas/pri/fut/data`.
    pub route: String,
    /// Value of the `facets[series][]` filter, e.g. `RNGWHHD`.
    pub series: String,
    pub frequency: String,
    pub start: NaiveDate,
    pub end: Option<NaiveDate>,
}

impl EiaQuery {
    pub fn daily(route: impl Into<String>, series: impl Into<String>, start: NaiveDate) -> Self {
        Self {
            route: route.into(),
            series: series.into(),
            frequency: "daily".to_string(),
            start,
            end: None,
        }
    }

    fn params(&self, api_key: &str) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("frequency", self.frequency.clone()),
            ("data[0]", "value".to_string()),
            ("facets[series][]", self.series.clone()),
            ("start", self.start.to_string()),
            ("sort[0][column]", "period".to_string()),
            ("sort[0][direction]", "asc".to_string()),
            ("api_key", api_key.to_string()),
        ];
        if let Some(end) = self.end {
            params.push(("end", end.to_string()));
        }
        params
    }
}

#[derive(Debug, Deserialize)]
struct EiaEnvelope {
    response: Option<EiaResponse>,
}

#[derive(Debug, Deserialize)]
struct EiaResponse {
    #[serde(default)]
    data: Vec<EiaRow>,
}

#[derive(Debug, Deserialize)]
struct EiaRow {
    period: String,
    #[serde(default)]
    value: Option<EiaValue>,
}

/// EIA serves some values as JSON numbers and others as numeric strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EiaValue {
    Number(f64),
    Text(String),
}

impl EiaValue {
    fn as_f64(&self) -> Option<f64> {
        let value = match self {
            EiaValue::Number(x) => Some(*x),
            EiaValue::Text(s) => s.trim().parse::<f64>().ok(),
        };
        value.filter(|x| x.is_finite())
    }
}

pub struct EiaClient {
    client: reqwest::blocking::Client,
    api_key: String,
    base_url: String,
}

impl EiaClient {
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

    /// Build a client from `EIA_API_KEY`.
    pub fn from_env() -> Result<Self, DataError> {
        let key = std::env::var(API_KEY_ENV).unwrap_or_default();
        let key = key.trim();
        if key.is_empty() {
            return Err(DataError::AuthenticationRequired(format!("{API_KEY_ENV} not set")));
        }
        Self::new(key)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn url(&self, route: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            route.trim_start_matches('/')
        )
    }

    /// Fetch `query` into a single-column series named `column`.
    pub fn fetch(&self, query: &EiaQuery, column: &str) -> Result<DailySeries, DataError> {
        let url = self.url(&query.route);
        let resp = self
            .client
            .get(&url)
            .query(&query.params(&self.api_key))
            .send()
            .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(DataError::AuthenticationRequired(format!(
                "EIA rejected the API key (HTTP {status})"
            )));
        }
        if !status.is_success() {
            return Err(DataError::NetworkUnreachable(format!("HTTP {status} for {url}")));
        }

        let body: EiaEnvelope = resp.json().map_err(|e| {
            DataError::ResponseFormatChanged(format!("failed to parse response for {}: {e}", query.series))
        })?;
        let series = parse_response(&query.series, column, body)?;
        info!(series = %query.series, rows = series.len(), "fetched EIA series");
        Ok(series)
    }
}

/// Turn `response.data[]` into a sorted, de-duplicated series.
fn parse_response(series: &str, column: &str, body: EiaEnvelope) -> Result<DailySeries, DataError> {
    let rows = body
        .response
        .ok_or_else(|| DataError::ResponseFormatChanged("missing 'response' object".into()))?
        .data;
    if rows.is_empty() {
        return Err(DataError::EmptyResponse {
            series: series.to_string(),
        });
    }

    let mut points = Vec::with_capacity(rows.len());
    for row in rows {
        let date = parse_date(&row.period).ok_or_else(|| {
            DataError::ResponseFormatChanged(format!("unparseable period '{}'", row.period))
        })?;
        points.push((date, row.value.as_ref().and_then(EiaValue::as_f64)));
    }
    points.sort_by_key(|(date, _)| *date);
    points.dedup_by_key(|(date, _)| *date);

    let (dates, values): (Vec<NaiveDate>, Vec<Option<f64>>) = points.into_iter().unzip();
    Ok(DailySeries::new(series, dates, vec![SeriesColumn::new(column, values)])?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<DailySeries, DataError> {
        let body: EiaEnvelope = serde_json::from_str(json).unwrap();
        parse_response("RNGWHHD", "henry_hub", body)
    }

    #[test]
    fn numbers_and_numeric_strings() {
        let s = parse(
            r#"{"response":{"data":[
                {"period":"2024-01-03","value":"2.71","series":"RNGWHHD"},
                {"period":"2024-01-02","value":2.58},
                {"period":"2024-01-04","value":null},
                {"period":"2024-01-05","value":"NA"}
            ]}}"#,
        )
        .unwrap();
        let d = |day| NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
        assert_eq!(s.dates(), &[d(2), d(3), d(4), d(5)]);
        assert_eq!(
            s.column("henry_hub").unwrap().values,
            vec![Some(2.58), Some(2.71), None, None]
        );
    }

    #[test]
    fn empty_data_is_an_error() {
        let err = parse(r#"{"response":{"data":[]}}"#).unwrap_err();
        assert!(matches!(err, DataError::EmptyResponse { .. }));
    }

    #[test]
    fn missing_envelope_is_a_format_change() {
        let err = parse(r#"{"error":"bad route"}"#).unwrap_err();
        assert!(matches!(err, DataError::ResponseFormatChanged(_)));
    }

    #[test]
    fn query_params_include_optional_end() {
        let mut q = EiaQuery::daily("natural-gas/pri/fut/data", "RNGWHHD", NaiveDate::from_ymd_opt(2017, 1, 1).unwrap());
        assert!(!q.params("k").iter().any(|(k, _)| *k == "end"));
        q.end = NaiveDate::from_ymd_opt(2024, 12, 31);
        let params = q.params("k");
        assert!(params.contains(&("end", "2024-12-31".to_string())));
        assert!(params.contains(&("facets[series][]", "RNGWHHD".to_string())));
    }

    #[test]
    fn url_joins_cleanly() {
        let client = EiaClient::new("k").unwrap().with_base_url("http://localhost:9/v2/");
        assert_eq!(client.url("/natural-gas/data"), "http://localhost:9/v2/natural-gas/data");
    }
}
