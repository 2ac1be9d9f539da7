//! # agent-core
//!
//! Tool-use orchestration loop with a provider-agnostic model transport,
//! a per-agent tool registry and hierarchical team delegation.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                           Agent                              │
//! │  ┌─────────────┐  ┌─────────────┐  ┌──────────────────────┐  │
//! │  │  Reasoning  │  │    Tool     │  │   ModelTransport     │  │
//! │  │    Loop     │──│   Registry  │──│   (Strategy)         │  │
//! │  └──────┬──────┘  └─────────────┘  └──────────────────────┘  │
//! │         │                                                    │
//! │  ┌──────┴──────┐                                             │
//! │  │ DelegateTool│──► team[idx].invoke(task)                   │
//! │  └─────────────┘                                             │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `ModelTransport` trait lets the loop run against Anthropic, a test
//! double, or any other backend without changing orchestration logic.

pub mod error;
pub mod message;
pub mod output;
pub mod reasoning;
pub mod team;
pub mod tool;
pub mod transport;

pub use error::{AgentError, Result};
pub use message::{ContentBlock, Conversation, ConversationBuilder, Message, MessageContent, Role};
pub use output::OutputFormat;
pub use reasoning::{Agent, AgentBuilder, AgentConfig};
pub use team::{DELEGATE_TOOL_NAME, DelegateTool, Team};
pub use tool::{
    FunctionTool, InputSchema, ParameterSchema, SharedToolRegistry, Tool, ToolInput, ToolOutput,
    ToolRegistry, ToolSchema,
};
pub use transport::{
    GenerationOptions, ModelRequest, ModelResponse, ModelTransport, StopReason, ThinkingConfig,
    TokenUsage,
};
