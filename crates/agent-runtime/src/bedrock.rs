//! Bedrock Transport
//!
//! Claude models on Amazon Bedrock through `InvokeModel`. The request body
//! is the Messages API body with `anthropic_version` in place of `model`,
//! and every request is signed with AWS Signature Version 4.

use std::fmt::Write as _;
use std::time::Duration;

use agent_core::{
    error::{AgentError, Result},
    transport::{ModelRequest, ModelResponse, ModelTransport},
};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};

use crate::anthropic::{build_request_body, map_error};

const BEDROCK_VERSION: &str = "bedrock-2023-05-31";
const SERVICE: &str = "bedrock";
const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Bedrock transport configuration
#[derive(Clone, Debug)]
pub struct BedrockConfig {
    /// AWS region, e.g. `us-east-1`
    pub region: String,

    pub access_key_id: String,
    pub secret_access_key: String,

    /// Temporary-credential session token
    pub session_token: Option<String>,

    /// Override for the regional `bedrock-runtime` endpoint
    pub endpoint: Option<String>,

    /// Default Bedrock model id
    pub model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl BedrockConfig {
    pub fn new(
        region: impl Into<String>,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        Self {
            region: region.into(),
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
            endpoint: None,
            model: "anthropic.claude-3-7-sonnet-20250219-v1:0".into(),
            timeout_secs: 120,
        }
    }

    /// Read the standard `AWS_*` environment variables
    ///
    /// The region falls back to `AWS_DEFAULT_REGION`, then `us-east-1`.
    /// `ANTHROPIC_MODEL` overrides the model id.
    pub fn from_env() -> Result<Self> {
        let var = |name: &str| {
            std::env::var(name)
                .ok()
                .filter(|value| !value.trim().is_empty())
        };

        let region = var("AWS_REGION")
            .or_else(|| var("AWS_DEFAULT_REGION"))
            .unwrap_or_else(|| "us-east-1".into());
        let access_key_id = var("AWS_ACCESS_KEY_ID")
            .ok_or_else(|| AgentError::Config("AWS_ACCESS_KEY_ID is required".into()))?;
        let secret_access_key = var("AWS_SECRET_ACCESS_KEY")
            .ok_or_else(|| AgentError::Config("AWS_SECRET_ACCESS_KEY is required".into()))?;

        let mut config = Self::new(region, access_key_id, secret_access_key);
        config.session_token = var("AWS_SESSION_TOKEN");
        config.endpoint = var("AWS_ENDPOINT_URL_BEDROCK_RUNTIME");

        if let Some(model) = var("ANTHROPIC_MODEL") {
            config.model = model;
        }
        if let Some(timeout) = var("ANTHROPIC_TIMEOUT_SECS").and_then(|t| t.parse().ok()) {
            config.timeout_secs = timeout;
        }

        Ok(config)
    }

    fn endpoint(&self) -> String {
        self.endpoint.as_deref().map_or_else(
            || format!("https://bedrock-runtime.{}.amazonaws.com", self.region),
            |url| url.trim_end_matches('/').to_string(),
        )
    }
}

/// Build the `InvokeModel` body for an Anthropic model
pub fn build_bedrock_body(request: &ModelRequest<'_>) -> Result<Value> {
    let mut body = build_request_body(request)?;

    if let Some(map) = body.as_object_mut() {
        map.remove("model");
        map.insert("anthropic_version".into(), json!(BEDROCK_VERSION));
        if !request.options.betas.is_empty() {
            map.insert("anthropic_beta".into(), json!(request.options.betas));
        }
    }

    Ok(body)
}

/// Amazon Bedrock `InvokeModel` transport
pub struct BedrockTransport {
    client: reqwest::Client,
    config: BedrockConfig,
}

impl BedrockTransport {
    /// Create from configuration
    pub fn from_config(config: BedrockConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AgentError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_config(BedrockConfig::from_env()?)
    }

    /// Model configured for this transport
    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn signed_headers(
        &self,
        host: &str,
        canonical_uri: &str,
        payload: &[u8],
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<HeaderMap> {
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();

        let mut signed = vec![
            ("content-type", "application/json".to_string()),
            ("host", host.to_string()),
            ("x-amz-date", amz_date.clone()),
        ];
        if let Some(token) = &self.config.session_token {
            signed.push(("x-amz-security-token", token.clone()));
        }

        let (canonical, signed_names) = canonical_request(
            "POST",
            canonical_uri,
            "",
            &signed,
            &hex::encode(Sha256::digest(payload)),
        );
        let scope = format!("{date}/{}/{SERVICE}/aws4_request", self.config.region);
        let to_sign = string_to_sign(&amz_date, &scope, &canonical);
        let signature = signature(
            &self.config.secret_access_key,
            &date,
            &self.config.region,
            SERVICE,
            &to_sign,
        )?;

        let authorization = format!(
            "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_names}, Signature={signature}",
            self.config.access_key_id
        );

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        // reqwest derives `host` from the URL
        for (name, value) in signed {
            if name != "host" && name != "content-type" {
                headers.insert(name, header_value(&value)?);
            }
        }
        headers.insert("authorization", header_value(&authorization)?);

        Ok(headers)
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| AgentError::Config(format!("Invalid header value: {e}")))
}

/// Percent-encode everything outside the unreserved set
fn uri_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b'~') {
            out.push(char::from(byte));
        } else {
            let _ = write!(out, "%{byte:02X}");
        }
    }
    out
}

/// Canonical request and its signed-header list
fn canonical_request(
    method: &str,
    canonical_uri: &str,
    query: &str,
    headers: &[(&str, String)],
    payload_hash: &str,
) -> (String, String) {
    let mut sorted: Vec<_> = headers.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let canonical_headers: String = sorted
        .iter()
        .map(|(name, value)| format!("{name}:{}\n", value.trim()))
        .collect();
    let signed_names = sorted
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(";");

    let canonical = format!(
        "{method}\n{canonical_uri}\n{query}\n{canonical_headers}\n{signed_names}\n{payload_hash}"
    );
    (canonical, signed_names)
}

fn string_to_sign(amz_date: &str, scope: &str, canonical_request: &str) -> String {
    format!(
        "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
        hex::encode(Sha256::digest(canonical_request.as_bytes()))
    )
}

fn hmac_sha256(key: &[u8], data: &str) -> Result<Vec<u8>> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key)
        .map_err(|e| AgentError::Config(format!("Invalid signing key: {e}")))?;
    mac.update(data.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

/// SigV4 signature over `string_to_sign`
fn signature(
    secret: &str,
    date: &str,
    region: &str,
    service: &str,
    string_to_sign: &str,
) -> Result<String> {
    let k_date = hmac_sha256(format!("AWS4{secret}").as_bytes(), date)?;
    let k_region = hmac_sha256(&k_date, region)?;
    let k_service = hmac_sha256(&k_region, service)?;
    let k_signing = hmac_sha256(&k_service, "aws4_request")?;
    Ok(hex::encode(hmac_sha256(&k_signing, string_to_sign)?))
}

#[async_trait]
impl ModelTransport for BedrockTransport {
    fn name(&self) -> &str {
        "bedrock"
    }

    async fn send(&self, request: ModelRequest<'_>) -> Result<ModelResponse> {
        let payload = serde_json::to_vec(&build_bedrock_body(&request)?)?;

        let model = &request.options.model;
        let path = format!("/model/{}/invoke", uri_encode(model));
        // Bedrock signs the path encoded a second time.
        let canonical_uri = format!("/model/{}/invoke", uri_encode(&uri_encode(model)));

        let url = reqwest::Url::parse(&format!("{}{path}", self.config.endpoint()))
            .map_err(|e| AgentError::Config(format!("Invalid Bedrock endpoint: {e}")))?;
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(AgentError::Config("Bedrock endpoint has no host".into()));
            }
        };

        let headers = self.signed_headers(&host, &canonical_uri, &payload, chrono::Utc::now())?;

        tracing::debug!(
            model = %model,
            region = %self.config.region,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending InvokeModel request"
        );

        let response = self
            .client
            .post(url)
            .headers(headers)
            .body(payload)
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
            tracing::warn!(%status, "InvokeModel returned an error");
            return Err(map_error(status, &text));
        }

        let parsed: ModelResponse = serde_json::from_str(&text)?;
        tracing::debug!(
            id = %parsed.id,
            stop_reason = ?parsed.stop_reason,
            blocks = parsed.content.len(),
            "Received InvokeModel response"
        );

        Ok(parsed)
    }
}
