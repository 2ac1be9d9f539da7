//! Output Formats
//!
//! Caller-specified shape for an agent's final answer, and the prompt used to
//! coerce a free-form response into it.

use schemars::JsonSchema;
use serde::Serialize;

use crate::error::Result;

/// Target shape of an agent's final answer
#[derive(Clone, Debug, PartialEq)]
pub enum OutputFormat {
    /// Literal example of the expected output
    Example(String),

    /// JSON Schema describing the expected output
    Schema(serde_json::Value),
}

impl OutputFormat {
    /// Schema derived from a Rust type
    pub fn schema_of<T: JsonSchema>() -> Result<Self> {
        let schema = schemars::schema_for!(T);
        Ok(Self::Schema(serde_json::to_value(schema)?))
    }

    /// Example rendered from a sample value
    pub fn example<T: Serialize>(sample: &T) -> Result<Self> {
        Ok(Self::Example(serde_json::to_string(sample)?))
    }

    /// Text embedded in prompts
    pub fn render(&self) -> String {
        match self {
            Self::Example(example) => example.clone(),
            Self::Schema(schema) => schema.to_string(),
        }
    }

    /// Prompt asking the model to refit `response` into this format
    pub fn coercion_prompt(&self, response: &str) -> String {
        format!(
            "Fit the following response into the following output schema:\n\
             {response}\n\n\
             User Request Output Schema:\n\
             {}",
            self.render()
        )
    }
}

impl From<&str> for OutputFormat {
    fn from(example: &str) -> Self {
        Self::Example(example.to_string())
    }
}

impl From<String> for OutputFormat {
    fn from(example: String) -> Self {
        Self::Example(example)
    }
}
