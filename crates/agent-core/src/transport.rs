//! Model Transport
//!
//! The boundary between the agent loop and an LLM endpoint. A transport
//! receives the full conversation, the tool catalogue and the generation
//! parameters, and returns one structured response. Swapping providers means
//! swapping the transport; the loop never changes.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_core::transport::{ModelRequest, ModelTransport};
//!
//! let response = transport.send(request).await?;
//! if let Some(call) = response.first_tool_use() {
//!     // dispatch the tool
//! }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::message::{ContentBlock, Message};
use crate::tool::ToolSchema;

/// Extended thinking mode
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ThinkingConfig {
    #[default]
    Disabled,
    Enabled { budget_tokens: u32 },
}

impl ThinkingConfig {
    pub const fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled { .. })
    }
}

/// Configuration for model generation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Model identifier
    pub model: String,

    /// Temperature for sampling
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Extended thinking mode
    #[serde(default)]
    pub thinking: ThinkingConfig,

    /// Provider feature flags (beta headers)
    #[serde(default)]
    pub betas: Vec<String>,
}

const fn default_temperature() -> f32 {
    0.5
}

const fn default_max_tokens() -> u32 {
    4096
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            model: "claude-3-7-sonnet-20250219".into(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            thinking: ThinkingConfig::Disabled,
            betas: Vec::new(),
        }
    }
}

/// One call's worth of input for a transport
#[derive(Clone, Copy, Debug)]
pub struct ModelRequest<'a> {
    pub messages: &'a [Message],
    pub tools: &'a [ToolSchema],
    pub options: &'a GenerationOptions,
}

/// Why the model stopped generating
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
    #[serde(other)]
    Other,
}

/// Token usage statistics
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// A tool invocation extracted from a response
#[derive(Clone, Debug, PartialEq)]
pub struct ToolUse {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

/// Structured model response
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelResponse {
    /// Provider-assigned response id
    #[serde(default)]
    pub id: String,

    /// Model that produced the response
    #[serde(default)]
    pub model: String,

    /// Why generation stopped
    pub stop_reason: StopReason,

    /// Ordered content blocks
    pub content: Vec<ContentBlock>,

    /// Token usage (if reported)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

impl ModelResponse {
    /// Response made of a single text block
    pub fn text_only(stop_reason: StopReason, text: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            model: String::new(),
            stop_reason,
            content: vec![ContentBlock::text(text)],
            usage: None,
        }
    }

    /// First tool-use block, if any. Later blocks are ignored by the loop.
    pub fn first_tool_use(&self) -> Option<ToolUse> {
        self.content.iter().find_map(|block| match block {
            ContentBlock::ToolUse { id, name, input } => Some(ToolUse {
                id: id.clone(),
                name: name.clone(),
                input: input.clone(),
            }),
            _ => None,
        })
    }

    /// Whether the model asked for a tool
    pub fn requests_tool(&self) -> bool {
        self.stop_reason == StopReason::ToolUse
    }

    /// Text blocks, in order
    pub fn text_blocks(&self) -> impl Iterator<Item = &str> {
        self.content.iter().filter_map(ContentBlock::as_text)
    }

    /// Text blocks joined by newlines
    pub fn text(&self) -> String {
        self.text_blocks().collect::<Vec<_>>().join("\n")
    }

    /// Thinking blocks, in order
    pub fn thinking(&self) -> impl Iterator<Item = &str> {
        self.content.iter().filter_map(|block| match block {
            ContentBlock::Thinking { thinking, .. } => Some(thinking.as_str()),
            _ => None,
        })
    }
}

/// Strategy trait for model transports
///
/// Implement this trait to talk to a new LLM backend.
/// The agent loop works exclusively through this interface.
#[async_trait]
pub trait ModelTransport: Send + Sync {
    /// Short transport name for logs
    fn name(&self) -> &str;

    /// Send one request and wait for the complete response
    async fn send(&self, request: ModelRequest<'_>) -> Result<ModelResponse>;
}
