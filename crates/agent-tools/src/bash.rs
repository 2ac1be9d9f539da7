//! Bash Tool
//!
//! Runs a shell command and returns its standard output.

use agent_core::{
    InputSchema, ParameterSchema, Result, Tool, ToolInput, ToolOutput, ToolSchema,
};
use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;

/// Tool for executing shell commands via `sh -c`
///
/// A non-zero exit is not a tool failure: the model receives
/// `Error: <stderr>` as the result text and can react to it.
#[derive(Clone, Debug)]
pub struct BashTool {
    shell: String,
}

impl Default for BashTool {
    fn default() -> Self {
        Self::new()
    }
}

impl BashTool {
    pub fn new() -> Self {
        Self { shell: "sh".into() }
    }

    /// Use a different shell binary (must accept `-c`)
    pub fn with_shell(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

#[async_trait]
impl Tool for BashTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "bash".into(),
            description: "Execute a bash command and return its output".into(),
            input_schema: InputSchema::new().param(
                ParameterSchema::string("command", "The bash command to execute").required(),
            ),
        }
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        let command = input
            .get("command")
            .and_then(Value::as_str)
            .unwrap_or_default();

        tracing::debug!(shell = %self.shell, command, "Running shell command");
        let output = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .output()
            .await?;

        if output.status.success() {
            Ok(ToolOutput::text(String::from_utf8_lossy(&output.stdout)))
        } else {
            Ok(ToolOutput::text(format!(
                "Error: {}",
                String::from_utf8_lossy(&output.stderr)
            )))
        }
    }
}
