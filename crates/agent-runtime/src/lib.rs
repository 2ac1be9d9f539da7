//! # agent-runtime
//!
//! Model transports for the agent loop.
//!
//! ## Transports
//!
//! - **Anthropic** (default): Claude models over the Messages API
//! - **Bedrock** (`bedrock` feature): the same models through Amazon Bedrock
//!   `InvokeModel`, SigV4-signed
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_runtime::AnthropicTransport;
//!
//! let transport = AnthropicTransport::from_env()?;
//! let agent = Agent::builder()
//!     .model(transport.model())
//!     .transport(Arc::new(transport))
//!     .build()?;
//! ```

#[cfg(feature = "anthropic")]
pub mod anthropic;

#[cfg(feature = "bedrock")]
pub mod bedrock;

#[cfg(feature = "anthropic")]
pub use anthropic::{AnthropicConfig, AnthropicTransport};

#[cfg(feature = "bedrock")]
pub use bedrock::{BedrockConfig, BedrockTransport};

// Re-export core types for convenience
pub use agent_core::{
    Agent, AgentError, Message, ModelResponse, ModelTransport, Result, Role, Tool, ToolRegistry,
};
