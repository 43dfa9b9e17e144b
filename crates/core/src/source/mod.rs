use crate::domain::{Range, Series};
use crate::error::DashboardError;
use std::time::Duration;

pub mod fred;
pub mod routed;
pub mod yahoo;

#[cfg(test)]
pub(crate) mod fake;

pub use fred::FredCsvSource;
pub use routed::{Route, RoutedSource};
pub use yahoo::YahooChartSource;

/// Implementations do not retry.
#[async_trait::async_trait]
pub trait DataSource: Send + Sync {
    fn source_name(&self) -> &'static str;

    async fn fetch(&self, symbol: &str, range: Range) -> Result<Series, DashboardError>;
}

pub async fn fetch_with_timeout(
    source: &dyn DataSource,
    symbol: &str,
    range: Range,
    timeout: Duration,
) -> Result<Series, DashboardError> {
    match tokio::time::timeout(timeout, source.fetch(symbol, range)).await {
        Ok(res) => res,
        Err(_) => {
            tracing::warn!(
                source = source.source_name(),
                symbol,
                %range,
                ?timeout,
                "data source fetch timed out"
            );
            Err(DashboardError::Timeout {
                operation: format!("fetch {symbol} ({range})"),
                after: timeout,
            })
        }
    }
}

pub(crate) fn classify_status(
    source_name: &'static str,
    symbol: &str,
    status: reqwest::StatusCode,
    body: &str,
) -> DashboardError {
    match status.as_u16() {
        404 => DashboardError::InvalidSymbol {
            symbol: symbol.to_string(),
        },
        429 => DashboardError::RateLimited { source_name },
        _ => {
            let snippet: String = body.chars().take(200).collect();
            DashboardError::unavailable(source_name, format!("HTTP {status}: {snippet}"))
        }
    }
}

pub(crate) fn classify_transport(
    source_name: &'static str,
    symbol: &str,
    timeout: Duration,
    err: reqwest::Error,
) -> DashboardError {
    if err.is_timeout() {
        DashboardError::Timeout {
            operation: format!("{source_name} request for {symbol}"),
            after: timeout,
        }
    } else {
        DashboardError::unavailable(source_name, format!("request failed: {err}"))
    }
}

pub(crate) fn build_http_client(timeout: Duration) -> anyhow::Result<reqwest::Client> {
    use anyhow::Context;

    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("macro-radar/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build data source http client")
}
