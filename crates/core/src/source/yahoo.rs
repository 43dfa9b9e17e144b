use crate::config::Settings;
use crate::domain::{Range, Series};
use crate::error::DashboardError;
use crate::source::{build_http_client, classify_status, classify_transport, DataSource};
use chrono::DateTime;
use serde::Deserialize;
use std::time::Duration;

const SOURCE_NAME: &str = "yahoo";
const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";
const DEFAULT_INTERVAL: &str = "1d";
const DEFAULT_TIMEOUT_SECS: u64 = 20;

#[derive(Debug, Clone)]
pub struct YahooChartSource {
    http: reqwest::Client,
    base_url: String,
    interval: String,
    timeout: Duration,
}

impl YahooChartSource {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let base_url = settings
            .yahoo_base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let timeout = Duration::from_secs(DEFAULT_TIMEOUT_SECS).max(settings.fetch_timeout);
        Self::new(base_url, timeout)
    }

    pub fn new(base_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            http: build_http_client(timeout)?,
            base_url: base_url.into(),
            interval: DEFAULT_INTERVAL.to_string(),
            timeout,
        })
    }

    fn url(&self, symbol: &str) -> Result<reqwest::Url, DashboardError> {
        let mut url = reqwest::Url::parse(self.base_url.trim_end_matches('/'))
            .map_err(|e| DashboardError::unavailable(SOURCE_NAME, format!("bad base url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| DashboardError::unavailable(SOURCE_NAME, "base url cannot hold a path"))?
            .pop_if_empty()
            .extend(["v8", "finance", "chart", symbol]);
        Ok(url)
    }
}

#[async_trait::async_trait]
impl DataSource for YahooChartSource {
    fn source_name(&self) -> &'static str {
        SOURCE_NAME
    }

    async fn fetch(&self, symbol: &str, range: Range) -> Result<Series, DashboardError> {
        let url = self.url(symbol)?;
        let res = self
            .http
            .get(url)
            .query(&[("range", range.as_str()), ("interval", self.interval.as_str())])
            .send()
            .await
            .map_err(|e| classify_transport(SOURCE_NAME, symbol, self.timeout, e))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .map_err(|e| classify_transport(SOURCE_NAME, symbol, self.timeout, e))?;

        if !status.is_success() {
            // Yahoo answers unknown tickers with a structured body even on 4xx.
            if let Ok(ChartResponse { chart }) = serde_json::from_str::<ChartResponse>(&text) {
                if let Some(err) = chart.error {
                    return Err(chart_error(symbol, err));
                }
            }
            return Err(classify_status(SOURCE_NAME, symbol, status, &text));
        }

        let series = parse_chart(symbol, &text)?;
        tracing::debug!(symbol, %range, points = series.len(), "yahoo chart fetched");
        Ok(series)
    }
}

/// Decodes a chart payload into closes, skipping null bars.
pub fn parse_chart(symbol: &str, body: &str) -> Result<Series, DashboardError> {
    let parsed = serde_json::from_str::<ChartResponse>(body).map_err(|e| {
        DashboardError::unavailable(SOURCE_NAME, format!("unexpected chart payload: {e}"))
    })?;

    if let Some(err) = parsed.chart.error {
        return Err(chart_error(symbol, err));
    }

    let result = parsed
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| DashboardError::InvalidSymbol {
            symbol: symbol.to_string(),
        })?;

    let timestamps = result.timestamp.unwrap_or_default();
    let closes = result
        .indicators
        .quote
        .into_iter()
        .next()
        .map(|q| q.close)
        .unwrap_or_default();

    let values = timestamps
        .into_iter()
        .zip(closes)
        .filter_map(|(ts, close)| Some((DateTime::from_timestamp(ts, 0)?, close?)));

    Ok(Series::from_values(symbol, values))
}

fn chart_error(symbol: &str, err: ChartError) -> DashboardError {
    if err.code.eq_ignore_ascii_case("Not Found") {
        DashboardError::InvalidSymbol {
            symbol: symbol.to_string(),
        }
    } else if err.code.eq_ignore_ascii_case("Too Many Requests") {
        DashboardError::RateLimited {
            source_name: SOURCE_NAME,
        }
    } else {
        DashboardError::unavailable(
            SOURCE_NAME,
            format!("{}: {}", err.code, err.description.unwrap_or_default()),
        )
    }
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Option<Vec<i64>>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}
