use crate::config::Settings;
use crate::error::DashboardError;
use crate::llm::error::LlmDiagnosticsError;
use crate::llm::text::clean_report_text;
use crate::llm::{Provider, ReportRequest, TextGenerator};
use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-3-5-sonnet-latest";
const DEFAULT_MAX_TOKENS: u32 = 2048;
const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    timeout: Duration,
}

impl AnthropicClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let api_key = settings.require_anthropic_api_key()?.to_string();
        let base_url =
            std::env::var("ANTHROPIC_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model = std::env::var("ANTHROPIC_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let max_tokens = std::env::var("ANTHROPIC_MAX_TOKENS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_MAX_TOKENS);

        // The report trigger enforces its own deadline; this only bounds a single HTTP call.
        let timeout = Duration::from_secs(DEFAULT_TIMEOUT_SECS).max(settings.report_timeout);

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            http,
            api_key,
            base_url,
            model,
            max_tokens,
            timeout,
        })
    }

    fn system_prompt() -> &'static str {
        "You are a macroeconomic analyst writing a short market commentary. \
         Answer in plain prose or light Markdown. Do not invent data that is not in the report."
    }

    async fn create_message(
        &self,
        req: CreateMessageRequest,
    ) -> Result<CreateMessageResponse, DashboardError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.api_key).map_err(|e| {
                DashboardError::report_failed(format!("invalid api key header: {e}"))
            })?,
        );
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );

        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));
        let res = self
            .http
            .post(url)
            .headers(headers)
            .json(&req)
            .send()
            .await
            .map_err(|e| self.transport_error("request", e))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .map_err(|e| self.transport_error("read_body", e))?;

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(DashboardError::RateLimited {
                source_name: "anthropic",
            });
        }
        if !status.is_success() {
            return Err(LlmDiagnosticsError {
                provider: Provider::Anthropic,
                stage: "http",
                detail: format!("status={status}"),
                raw_output: Some(text),
            }
            .into());
        }

        serde_json::from_str::<CreateMessageResponse>(&text).map_err(|e| {
            LlmDiagnosticsError {
                provider: Provider::Anthropic,
                stage: "decode",
                detail: format!("unexpected response shape: {e}"),
                raw_output: Some(text),
            }
            .into()
        })
    }

    fn transport_error(&self, stage: &'static str, err: reqwest::Error) -> DashboardError {
        if err.is_timeout() {
            return DashboardError::Timeout {
                operation: "anthropic request".to_string(),
                after: self.timeout,
            };
        }
        LlmDiagnosticsError {
            provider: Provider::Anthropic,
            stage,
            detail: err.to_string(),
            raw_output: None,
        }
        .into()
    }

    fn response_text(res: &CreateMessageResponse) -> String {
        let mut out = String::new();
        for block in &res.content {
            match block {
                ContentBlock::Text { text } => {
                    if !out.is_empty() {
                        out.push('\n');
                    }
                    out.push_str(text);
                }
                ContentBlock::Unknown => {}
            }
        }
        out
    }
}

#[async_trait::async_trait]
impl TextGenerator for AnthropicClient {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    async fn generate_text(&self, request: ReportRequest) -> Result<String, DashboardError> {
        let make_req = |max_tokens: u32| CreateMessageRequest {
            model: self.model.clone(),
            max_tokens,
            system: Some(Self::system_prompt().to_string()),
            messages: vec![Message {
                role: "user",
                content: request.prompt.clone(),
            }],
        };

        let mut res = self.create_message(make_req(self.max_tokens)).await?;

        // If the model hit max_tokens, retry once with a higher ceiling.
        if matches!(res.stop_reason.as_deref(), Some("max_tokens")) {
            let bumped = self.max_tokens.saturating_mul(2).max(4096);
            tracing::warn!(
                from = self.max_tokens,
                to = bumped,
                "Anthropic stop_reason=max_tokens; retrying once with higher max_tokens"
            );
            res = self.create_message(make_req(bumped)).await?;
        }

        let text = clean_report_text(&Self::response_text(&res));
        if text.is_empty() {
            return Err(LlmDiagnosticsError {
                provider: Provider::Anthropic,
                stage: "empty_output",
                detail: format!("no text blocks (stop_reason={:?})", res.stop_reason),
                raw_output: None,
            }
            .into());
        }
        Ok(text)
    }
}

#[derive(Debug, Clone, Serialize)]
struct CreateMessageRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message>,
}

#[derive(Debug, Clone, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct CreateMessageResponse {
    content: Vec<ContentBlock>,

    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },

    // thinking, redacted_thinking, tool_use, ...
    #[serde(other)]
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn joins_text_blocks_and_ignores_others() {
        let res: CreateMessageResponse = serde_json::from_value(json!({
            "content": [
                {"type": "thinking", "thinking": "hmm", "signature": "x"},
                {"type": "text", "text": "Markets are calm."},
                {"type": "tool_use", "id": "t1", "name": "noop", "input": {}},
                {"type": "text", "text": "Yields are flat."}
            ],
            "stop_reason": "end_turn"
        }))
        .unwrap();

        assert_eq!(
            AnthropicClient::response_text(&res),
            "Markets are calm.\nYields are flat."
        );
        assert_eq!(res.stop_reason.as_deref(), Some("end_turn"));
    }

    #[test]
    fn request_omits_missing_system() {
        let req = CreateMessageRequest {
            model: "m".to_string(),
            max_tokens: 16,
            system: None,
            messages: vec![Message {
                role: "user",
                content: "hi".to_string(),
            }],
        };
        let v = serde_json::to_value(&req).unwrap();
        assert!(v.get("system").is_none());
        assert_eq!(v["messages"][0]["role"], "user");
    }
}
