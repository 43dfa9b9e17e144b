use crate::config::Settings;
use crate::domain::{Range, Series};
use crate::error::DashboardError;
use crate::source::{build_http_client, classify_status, classify_transport, DataSource};
use chrono::{NaiveDate, Utc};
use std::time::Duration;

const SOURCE_NAME: &str = "fred";
const DEFAULT_BASE_URL: &str = "https://fred.stlouisfed.org";
const CSV_PATH: &str = "/graph/fredgraph.csv";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub const FRED_PREFIX: &str = "fred:";

#[derive(Debug, Clone)]
pub struct FredCsvSource {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl FredCsvSource {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let base_url = settings
            .fred_base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let timeout = Duration::from_secs(DEFAULT_TIMEOUT_SECS).max(settings.fetch_timeout);
        Self::new(base_url, timeout)
    }

    pub fn new(base_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            http: build_http_client(timeout)?,
            base_url: base_url.into(),
            timeout,
        })
    }

    fn url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), CSV_PATH)
    }
}

#[async_trait::async_trait]
impl DataSource for FredCsvSource {
    fn source_name(&self) -> &'static str {
        SOURCE_NAME
    }

    async fn fetch(&self, symbol: &str, range: Range) -> Result<Series, DashboardError> {
        let series_id = symbol.strip_prefix(FRED_PREFIX).unwrap_or(symbol);

        let res = self
            .http
            .get(self.url())
            .query(&[("id", series_id)])
            .send()
            .await
            .map_err(|e| classify_transport(SOURCE_NAME, symbol, self.timeout, e))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .map_err(|e| classify_transport(SOURCE_NAME, symbol, self.timeout, e))?;
        if !status.is_success() {
            return Err(classify_status(SOURCE_NAME, symbol, status, &text));
        }

        let start = first_kept_date(range, Utc::now().date_naive());
        let series = parse_csv(symbol, series_id, &text, start)?;
        tracing::debug!(symbol, series_id, %range, points = series.len(), "fred csv fetched");
        Ok(series)
    }
}

/// The full-history floor is exclusive: observations strictly after it are kept.
pub(crate) fn first_kept_date(range: Range, today: NaiveDate) -> NaiveDate {
    let start = range.start_date(today);
    match range {
        Range::Max => start.succ_opt().unwrap_or(start),
        _ => start,
    }
}

/// Parses `date,<SERIES_ID>` rows. Missing observations (`.` or blank) are skipped,
/// as are rows dated before `start`.
pub fn parse_csv(
    symbol: &str,
    series_id: &str,
    body: &str,
    start: NaiveDate,
) -> Result<Series, DashboardError> {
    // Unknown ids come back as an HTML error page with a 200.
    if body.trim_start().starts_with('<') {
        return Err(DashboardError::InvalidSymbol {
            symbol: symbol.to_string(),
        });
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let headers = reader.headers().map_err(|e| {
        DashboardError::unavailable(SOURCE_NAME, format!("unreadable csv header: {e}"))
    })?;
    let column_matches = headers
        .get(1)
        .is_some_and(|h| h.eq_ignore_ascii_case(series_id));
    if !column_matches {
        return Err(DashboardError::InvalidSymbol {
            symbol: symbol.to_string(),
        });
    }

    let mut values = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| {
            DashboardError::unavailable(SOURCE_NAME, format!("malformed csv row: {e}"))
        })?;
        let (Some(date), Some(raw)) = (record.get(0), record.get(1)) else {
            continue;
        };
        let Ok(date) = NaiveDate::parse_from_str(date, "%Y-%m-%d") else {
            continue;
        };
        if date < start {
            continue;
        }
        let Ok(value) = raw.parse::<f64>() else {
            continue;
        };
        values.push((date.and_time(chrono::NaiveTime::MIN).and_utc(), value));
    }

    Ok(Series::from_values(symbol, values))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn parses_rows_and_skips_missing_values() {
        let body = "observation_date,DGS10\n\
                    2026-01-02,4.18\n\
                    2026-01-05,.\n\
                    2026-01-06,4.21\n";
        let series = parse_csv("^TNX", "DGS10", body, d(2000, 1, 1)).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.last().unwrap().value, 4.21);
        assert_eq!(series.symbol(), "^TNX");
    }

    #[test]
    fn accepts_legacy_date_header_and_filters_by_start() {
        let body = "DATE,UNRATE\n1999-12-01,4.0\n2000-01-01,4.0\n2026-08-01,4.3\n";
        let series = parse_csv("fred:UNRATE", "UNRATE", body, d(2000, 1, 1)).unwrap();
        assert_eq!(series.len(), 2);
    }

    #[test]
    fn full_history_drops_the_floor_row_but_windows_keep_their_start() {
        let today = d(2026, 8, 31);
        let body = "DATE,UNRATE\n2000-01-01,4.0\n2000-02-01,4.1\n2026-02-28,4.2\n2026-08-01,4.3\n";

        let max = parse_csv("fred:UNRATE", "UNRATE", body, first_kept_date(Range::Max, today)).unwrap();
        assert_eq!(max.len(), 3);
        assert_eq!(max.points()[0].value, 4.1);

        let six = parse_csv(
            "fred:UNRATE",
            "UNRATE",
            body,
            first_kept_date(Range::SixMonths, today),
        )
        .unwrap();
        assert_eq!(six.len(), 2);
        assert_eq!(six.points()[0].value, 4.2);
    }

    #[test]
    fn html_or_wrong_column_is_invalid_symbol() {
        let html = "<!DOCTYPE html><html><body>Series not found</body></html>";
        assert!(matches!(
            parse_csv("fred:NOPE", "NOPE", html, d(2000, 1, 1)),
            Err(DashboardError::InvalidSymbol { .. })
        ));

        let other = "observation_date,CPIAUCSL\n2026-01-01,320.1\n";
        assert!(matches!(
            parse_csv("fred:UNRATE", "UNRATE", other, d(2000, 1, 1)),
            Err(DashboardError::InvalidSymbol { .. })
        ));
    }
}
