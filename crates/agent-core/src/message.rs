//! Conversation Messages
//!
//! Message format exchanged with the model transport, plus the builder that
//! assembles the opening conversation of an agent invocation.

use serde::{Deserialize, Serialize};

use crate::output::OutputFormat;

/// Role of a message sender
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompt/instructions
    System,
    /// User input (and tool results)
    User,
    /// Assistant (model) response
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// A structured piece of message content
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text
    Text { text: String },

    /// Tool invocation requested by the model
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },

    /// Result of a tool invocation, keyed by the request id
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },

    /// Extended thinking emitted by the model
    Thinking {
        thinking: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },

    /// Thinking the provider chose to redact
    RedactedThinking { data: String },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// Message content: plain text or a list of blocks
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl MessageContent {
    /// Concatenated text of the content, ignoring non-text blocks
    pub fn text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Blocks(blocks) => blocks
                .iter()
                .filter_map(ContentBlock::as_text)
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// A single message in a conversation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message role
    pub role: Role,

    /// Text or structured content
    pub content: MessageContent,
}

impl Message {
    /// Create a new text message
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: MessageContent::Text(content.into()),
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Assistant message carrying a full model response's blocks
    pub const fn assistant_blocks(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Blocks(blocks),
        }
    }

    /// User message carrying a single tool result
    pub fn tool_result(
        tool_use_id: impl Into<String>,
        content: impl Into<String>,
        is_error: bool,
    ) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Blocks(vec![ContentBlock::ToolResult {
                tool_use_id: tool_use_id.into(),
                content: content.into(),
                is_error,
            }]),
        }
    }

    /// Text content of the message
    pub fn text(&self) -> String {
        self.content.text()
    }
}

/// Ordered, append-only message history of one invocation
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a message
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Get all messages
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Get the last message
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Number of messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Assembles the opening messages of an invocation.
///
/// Order is fixed: system prompt, instructions, output format, prompt.
/// Each optional section is wrapped in its own tag and sent as a user
/// message.
#[derive(Debug, Default)]
pub struct ConversationBuilder<'a> {
    system_prompt: Option<&'a str>,
    instructions: Option<&'a str>,
    output_format: Option<&'a OutputFormat>,
}

impl<'a> ConversationBuilder<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn system_prompt(mut self, prompt: Option<&'a str>) -> Self {
        self.system_prompt = prompt;
        self
    }

    pub const fn instructions(mut self, instructions: Option<&'a str>) -> Self {
        self.instructions = instructions;
        self
    }

    pub const fn output_format(mut self, format: Option<&'a OutputFormat>) -> Self {
        self.output_format = format;
        self
    }

    /// Finish the conversation with the user prompt
    pub fn build(self, prompt: &str) -> Conversation {
        let mut conversation = Conversation::new();

        if let Some(system) = self.system_prompt {
            conversation.push(Message::user(format!("<system>{system}</system>")));
        }

        if let Some(instructions) = self.instructions {
            conversation.push(Message::user(format!(
                "<instructions>{instructions}</instructions>"
            )));
        }

        if let Some(format) = self.output_format {
            conversation.push(Message::user(format!(
                "<output_format>{}</output_format>",
                format.render()
            )));
        }

        conversation.push(Message::user(prompt));
        conversation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_creation() {
        let msg = Message::user("Hello");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.text(), "Hello");
    }

    #[test]
    fn test_builder_orders_sections() {
        let format = OutputFormat::Example(r#"{"answer": "..."}"#.into());
        let conv = ConversationBuilder::new()
            .system_prompt(Some("You are helpful."))
            .instructions(Some("Be brief."))
            .output_format(Some(&format))
            .build("What time is it?");

        let texts: Vec<String> = conv.messages().iter().map(Message::text).collect();
        assert_eq!(
            texts,
            vec![
                "<system>You are helpful.</system>".to_string(),
                "<instructions>Be brief.</instructions>".to_string(),
                r#"<output_format>{"answer": "..."}</output_format>"#.to_string(),
                "What time is it?".to_string(),
            ]
        );
        assert!(conv.messages().iter().all(|m| m.role == Role::User));
    }

    #[test]
    fn test_builder_skips_absent_sections() {
        let conv = ConversationBuilder::new()
            .instructions(Some("Only this."))
            .build("Hi");

        assert_eq!(conv.len(), 2);
        assert_eq!(conv.last().unwrap().text(), "Hi");
    }

    #[test]
    fn test_tool_result_wire_shape() {
        let msg = Message::tool_result("toolu_1", r#"{"error":"boom"}"#, true);
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["role"], "user");
        assert_eq!(json["content"][0]["type"], "tool_result");
        assert_eq!(json["content"][0]["tool_use_id"], "toolu_1");
        assert_eq!(json["content"][0]["is_error"], true);
    }

    #[test]
    fn test_text_content_serializes_as_string() {
        let json = serde_json::to_value(Message::assistant("done")).unwrap();
        assert_eq!(json["content"], "done");
    }
}
