use crate::error::DashboardError;
use crate::llm::Provider;
use std::fmt;

#[derive(Debug, Clone)]
pub struct LlmDiagnosticsError {
    pub provider: Provider,
    pub stage: &'static str,
    pub detail: String,
    pub raw_output: Option<String>,
}

impl fmt::Display for LlmDiagnosticsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LLM error (provider={:?}, stage={}): {}",
            self.provider, self.stage, self.detail
        )
    }
}

impl std::error::Error for LlmDiagnosticsError {}

impl From<LlmDiagnosticsError> for DashboardError {
    fn from(err: LlmDiagnosticsError) -> Self {
        if let Some(raw) = err.raw_output.as_deref() {
            let snippet: String = raw.chars().take(300).collect();
            tracing::debug!(provider = ?err.provider, stage = err.stage, raw = %snippet, "llm raw output");
        }
        DashboardError::report_failed(err.to_string())
    }
}
