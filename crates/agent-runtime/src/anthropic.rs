//! Anthropic Transport
//!
//! Implementation of `ModelTransport` for the Anthropic Messages API.

use std::time::Duration;

use agent_core::{
    error::{AgentError, Result},
    message::{Message, Role},
    transport::{ModelRequest, ModelResponse, ModelTransport},
};
use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::{Value, json};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic transport configuration
#[derive(Clone, Debug)]
pub struct AnthropicConfig {
    /// API key sent as `x-api-key`
    pub api_key: String,

    /// API base URL (without `/v1`)
    pub base_url: String,

    /// Default model identifier
    pub model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl AnthropicConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.anthropic.com".into(),
            model: "claude-3-7-sonnet-20250219".into(),
            timeout_secs: 120,
        }
    }

    /// Read `ANTHROPIC_*` environment variables
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| AgentError::Config("Anthropic API key is required".into()))?;

        let mut config = Self::new(api_key);

        if let Ok(model) = std::env::var("ANTHROPIC_MODEL") {
            if !model.trim().is_empty() {
                config.model = model;
            }
        }
        if let Ok(base_url) = std::env::var("ANTHROPIC_BASE_URL") {
            config.base_url = base_url;
        }
        if let Some(timeout) = std::env::var("ANTHROPIC_TIMEOUT_SECS")
            .ok()
            .and_then(|t| t.parse().ok())
        {
            config.timeout_secs = timeout;
        }

        Ok(config)
    }
}

/// Anthropic Messages API transport
pub struct AnthropicTransport {
    client: reqwest::Client,
    config: AnthropicConfig,
}

impl AnthropicTransport {
    /// Create from configuration
    pub fn from_config(config: AnthropicConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AgentError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_config(AnthropicConfig::from_env()?)
    }

    /// Model configured for this transport
    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'))
    }

    fn build_headers(&self, betas: &[String]) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.config.api_key)
                .map_err(|e| AgentError::Config(format!("Invalid API key: {e}")))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if !betas.is_empty() {
            headers.insert(
                "anthropic-beta",
                HeaderValue::from_str(&betas.join(","))
                    .map_err(|e| AgentError::Config(format!("Invalid beta flag: {e}")))?,
            );
        }

        Ok(headers)
    }
}

/// Build the Messages API request body.
///
/// System-role messages are lifted into the top-level `system` field; the
/// API does not accept them inside `messages`.
pub fn build_request_body(request: &ModelRequest<'_>) -> Result<Value> {
    let options = request.options;

    let (system, messages): (Vec<&Message>, Vec<&Message>) = request
        .messages
        .iter()
        .partition(|m| m.role == Role::System);

    let mut body = json!({
        "model": options.model,
        "max_tokens": options.max_tokens,
        "temperature": options.temperature,
        "messages": serde_json::to_value(&messages)?,
    });

    if !system.is_empty() {
        let text = system.iter().map(|m| m.text()).collect::<Vec<_>>().join("\n\n");
        body["system"] = Value::String(text);
    }

    if !request.tools.is_empty() {
        body["tools"] = serde_json::to_value(request.tools)?;
    }

    if options.thinking.is_enabled() {
        body["thinking"] = serde_json::to_value(options.thinking)?;
    }

    Ok(body)
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}

/// Map a non-success HTTP response to an agent error
pub(crate) fn map_error(status: reqwest::StatusCode, body: &str) -> AgentError {
    let detail = serde_json::from_str::<ApiErrorEnvelope>(body).map_or_else(
        |_| body.to_string(),
        |envelope| format!("{}: {}", envelope.error.error_type, envelope.error.message),
    );

    match status.as_u16() {
        401 | 403 => AgentError::Auth(detail),
        429 => AgentError::RateLimited(detail),
        500..=599 => AgentError::ProviderUnavailable(format!("HTTP {status}: {detail}")),
        _ => AgentError::Provider(format!("HTTP {status}: {detail}")),
    }
}

#[async_trait]
impl ModelTransport for AnthropicTransport {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn send(&self, request: ModelRequest<'_>) -> Result<ModelResponse> {
        let body = build_request_body(&request)?;
        let headers = self.build_headers(&request.options.betas)?;

        tracing::debug!(
            model = %request.options.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending Messages API request"
        );

        let response = self
            .client
            .post(self.endpoint())
            .headers(headers)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    AgentError::ProviderUnavailable(e.to_string())
                } else {
                    AgentError::Provider(e.to_string())
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AgentError::Provider(e.to_string()))?;

        if !status.is_success() {
            tracing::warn!(%status, "Messages API returned an error");
            return Err(map_error(status, &text));
        }

        let parsed: ModelResponse = serde_json::from_str(&text)?;
        tracing::debug!(
            id = %parsed.id,
            stop_reason = ?parsed.stop_reason,
            blocks = parsed.content.len(),
            "Received Messages API response"
        );

        Ok(parsed)
    }
}
