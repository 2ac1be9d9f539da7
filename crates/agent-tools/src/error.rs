//! Error Types for Tools

use agent_core::AgentError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ToolsError>;

#[derive(Error, Debug)]
pub enum ToolsError {
    #[error("Location '{0}' not found")]
    LocationNotFound(String),

    #[error("Unexpected API response: {0}")]
    UnexpectedResponse(String),

    #[error("API error: HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<ToolsError> for AgentError {
    fn from(err: ToolsError) -> Self {
        match err {
            ToolsError::Config(msg) => Self::Config(msg),
            other => Self::ToolExecution(other.to_string()),
        }
    }
}
