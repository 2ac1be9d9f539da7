//! DateTime Tool

use agent_core::{
    InputSchema, ParameterSchema, Result, Tool, ToolInput, ToolOutput, ToolSchema,
};
use async_trait::async_trait;
use serde_json::{Value, json};

/// Returns the current time in UTC
pub struct DateTimeTool;

#[async_trait]
impl Tool for DateTimeTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "datetime".into(),
            description: "Get the current date and time".into(),
            input_schema: InputSchema::new().param(
                ParameterSchema::string("format", "Output format: 'iso', 'human', or 'unix'")
                    .with_default(json!("human"))
                    .with_enum(vec![json!("iso"), json!("human"), json!("unix")]),
            ),
        }
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        let now = chrono::Utc::now();

        let output = match input.get("format").and_then(Value::as_str) {
            Some("iso") => ToolOutput::text(now.to_rfc3339()),
            Some("unix") => ToolOutput::from(now.timestamp()),
            _ => ToolOutput::text(now.format("%A, %B %d, %Y at %H:%M:%S UTC").to_string()),
        };

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unix_format_is_scalar() {
        let input = json!({"format": "unix"}).as_object().cloned().unwrap();
        let output = DateTimeTool.execute(&input).await.unwrap();

        match output {
            ToolOutput::Scalar(Value::Number(n)) => assert!(n.as_i64().unwrap() > 1_600_000_000),
            other => panic!("expected scalar, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_iso_format_parses() {
        let input = json!({"format": "iso"}).as_object().cloned().unwrap();
        let output = DateTimeTool.execute(&input).await.unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(&output.to_content()).is_ok());
    }

    #[test]
    fn test_rejects_unknown_format() {
        let input = json!({"format": "roman"}).as_object().cloned().unwrap();
        assert!(DateTimeTool.validate(&input).is_err());
    }
}
