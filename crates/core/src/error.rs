use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DashboardError {
    #[error("data source {source_name} unavailable: {detail}")]
    SourceUnavailable {
        source_name: &'static str,
        detail: String,
    },

    #[error("unknown symbol: {symbol}")]
    InvalidSymbol { symbol: String },

    #[error("rate limited by {source_name}")]
    RateLimited { source_name: &'static str },

    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    /// Only used between the cache and its callers' internals; `get_or_fetch` never returns it.
    #[error("no cache entry for {key}")]
    CacheMiss { key: String },

    #[error("report generation failed: {detail}")]
    ReportGenerationFailed { detail: String },
}

impl DashboardError {
    pub fn unavailable(source_name: &'static str, detail: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            source_name,
            detail: detail.into(),
        }
    }

    pub fn report_failed(detail: impl Into<String>) -> Self {
        Self::ReportGenerationFailed {
            detail: detail.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::SourceUnavailable { .. } => "source_unavailable",
            Self::InvalidSymbol { .. } => "invalid_symbol",
            Self::RateLimited { .. } => "rate_limited",
            Self::Timeout { .. } => "timeout",
            Self::CacheMiss { .. } => "cache_miss",
            Self::ReportGenerationFailed { .. } => "report_generation_failed",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::SourceUnavailable { .. } | Self::RateLimited { .. } | Self::Timeout { .. }
        )
    }
}

/// Serialized as `{"code": ..., "message": ...}` for API and CLI output.
impl Serialize for DashboardError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("DashboardError", 2)?;
        s.serialize_field("code", self.code())?;
        s.serialize_field("message", &self.to_string())?;
        s.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_names_the_operation() {
        let err = DashboardError::Timeout {
            operation: "fetch ^VIX".to_string(),
            after: Duration::from_secs(2),
        };
        assert_eq!(err.to_string(), "fetch ^VIX timed out after 2s");
        assert!(err.is_retryable());
    }

    #[test]
    fn invalid_symbol_is_not_retryable() {
        let err = DashboardError::InvalidSymbol {
            symbol: "NOPE".to_string(),
        };
        assert!(!err.is_retryable());
        assert_eq!(err.code(), "invalid_symbol");
    }

    #[test]
    fn serializes_code_and_message() {
        let err = DashboardError::RateLimited {
            source_name: "yahoo",
        };
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            serde_json::json!({"code": "rate_limited", "message": "rate limited by yahoo"})
        );
    }
}
