use crate::error::DashboardError;
use serde::{Deserialize, Serialize};

pub mod anthropic;
pub mod error;
pub mod text;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRequest {
    pub prompt: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Anthropic,
}

#[async_trait::async_trait]
pub trait TextGenerator: Send + Sync {
    fn provider(&self) -> Provider;

    async fn generate_text(&self, request: ReportRequest) -> Result<String, DashboardError>;
}
