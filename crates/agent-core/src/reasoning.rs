//! Agent Loop
//!
//! Drives bounded rounds of "model proposes a tool call, host executes it,
//! host feeds the result back" until the model answers without a tool or the
//! iteration budget runs out.
//!
//! ```text
//! BUILDING ──► AWAITING_MODEL ──tool_use──► TOOL_DISPATCH ──┐
//!                   ▲   │                                   │
//!                   │   └──other──► FINALIZING ──► DONE     │
//!                   └───────────────────────────────────────┘
//! ```
//!
//! Exactly one model call happens per iteration. When the budget is spent
//! while the model is still asking for tools, the last response is returned
//! as-is and output coercion is skipped.

use std::sync::Arc;

use tracing::Instrument;

use crate::error::{AgentError, Result};
use crate::message::{ConversationBuilder, Message};
use crate::output::OutputFormat;
use crate::team::{DELEGATE_TOOL_NAME, DelegateTool, Team};
use crate::tool::{SharedToolRegistry, Tool, ToolInput, ToolOutput, ToolSchema};
use crate::transport::{
    GenerationOptions, ModelRequest, ModelResponse, ModelTransport, ThinkingConfig, ToolUse,
};

/// Model families that accept extended thinking
const THINKING_MODELS: &[&str] = &[
    "claude-3-7",
    "claude-3-5-sonnet",
    "claude-sonnet-4",
    "claude-opus-4",
];

const THINKING_BUDGET_TOKENS: u32 = 1024;
const THINKING_TEMPERATURE: f32 = 1.0;
const DEFAULT_TEMPERATURE: f32 = 0.5;

/// Log at INFO for verbose agents, DEBUG otherwise
macro_rules! step {
    ($verbose:expr, $($arg:tt)+) => {
        if $verbose {
            tracing::info!($($arg)+);
        } else {
            tracing::debug!($($arg)+);
        }
    };
}

/// Agent configuration
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// Agent name (generated if not set)
    pub name: String,

    /// Persona sent as the first message
    pub system_prompt: Option<String>,

    /// Task instructions sent after the system prompt
    pub instructions: Option<String>,

    /// Shape the final answer is coerced into
    pub output_format: Option<OutputFormat>,

    /// Promote per-iteration logs to INFO
    pub verbose: bool,

    /// Maximum model calls per invocation
    pub max_iterations: usize,

    /// Generation options
    pub generation: GenerationOptions,
}

/// The orchestration unit: transport, tools and an optional team
///
/// The delegation tool belongs to the agent, not to its registry, so agents
/// sharing a registry still delegate only to their own team.
pub struct Agent {
    transport: Arc<dyn ModelTransport>,
    tools: SharedToolRegistry,
    team: Arc<Team>,
    delegate: DelegateTool,
    config: AgentConfig,
}

impl Agent {
    pub fn builder() -> AgentBuilder {
        AgentBuilder::new()
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Get configuration
    pub const fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Get the tool registry
    pub const fn tools(&self) -> &SharedToolRegistry {
        &self.tools
    }

    /// Current team members
    pub fn team(&self) -> Vec<Arc<Self>> {
        self.team.members()
    }

    /// Add a tool after construction
    pub fn register_tool<T: Tool + 'static>(&self, tool: T) {
        self.tools.register(tool);
    }

    /// Add a team member after construction
    pub fn add_team_member(&self, member: Arc<Self>) {
        self.team.push(member);
    }

    /// Tool descriptors sent to the model: the registry's tools, plus
    /// `delegate_task` while the team is non-empty
    pub fn tool_catalogue(&self) -> Vec<ToolSchema> {
        let mut catalogue = self.tools.get_all_tools();
        if !self.team.is_empty() {
            catalogue.retain(|schema| schema.name != DELEGATE_TOOL_NAME);
            catalogue.push(self.delegate.schema());
        }
        catalogue
    }

    /// Look up, validate and execute a tool by name
    ///
    /// `delegate_task` routes to this agent's own team whenever it has one.
    pub async fn execute_tool(&self, name: &str, input: &ToolInput) -> Result<ToolOutput> {
        if name == DELEGATE_TOOL_NAME && !self.team.is_empty() {
            self.delegate.validate(input)?;
            return self.delegate.execute(input).await;
        }
        self.tools.execute_tool(name, input).await
    }

    /// Run the loop on a fresh conversation built from `prompt`
    pub async fn invoke(&self, prompt: &str) -> Result<ModelResponse> {
        let span = tracing::info_span!("agent", name = %self.config.name);
        self.run(prompt).instrument(span).await
    }

    async fn run(&self, prompt: &str) -> Result<ModelResponse> {
        let verbose = self.config.verbose;
        let max_iterations = self.config.max_iterations;

        let mut conversation = ConversationBuilder::new()
            .system_prompt(self.config.system_prompt.as_deref())
            .instructions(self.config.instructions.as_deref())
            .output_format(self.config.output_format.as_ref())
            .build(prompt);

        let mut last_response = None;

        for iteration in 1..=max_iterations {
            let tools = self.tool_catalogue();
            step!(
                verbose,
                iteration,
                max_iterations,
                messages = conversation.len(),
                tools = tools.len(),
                "Calling model"
            );

            let response = self
                .transport
                .send(ModelRequest {
                    messages: conversation.messages(),
                    tools: &tools,
                    options: &self.config.generation,
                })
                .await?;

            for thinking in response.thinking() {
                step!(verbose, iteration, thinking, "Model thinking");
            }

            if !response.requests_tool() {
                step!(verbose, iteration, stop_reason = ?response.stop_reason, "Final response");
                return self.finalize(response).await;
            }

            let Some(call) = response.first_tool_use() else {
                tracing::warn!(iteration, "Tool use requested but no tool_use block found");
                return Ok(response);
            };

            conversation.push(Message::assistant_blocks(response.content.clone()));

            let (content, is_error) = match self.dispatch(&call, iteration).await {
                Ok(output) => (output.to_content(), false),
                Err(e) => {
                    let payload =
                        ToolOutput::error(format!("Error executing tool {}: {e}", call.name));
                    (payload.to_content(), true)
                }
            };
            conversation.push(Message::tool_result(call.id, content, is_error));

            last_response = Some(response);
        }

        step!(verbose, max_iterations, "Reached maximum iterations, using last response");
        last_response.ok_or_else(|| AgentError::Config("max_iterations must be at least 1".into()))
    }

    /// Execute one tool call, logging the outcome
    async fn dispatch(&self, call: &ToolUse, iteration: usize) -> Result<ToolOutput> {
        let verbose = self.config.verbose;
        step!(verbose, iteration, tool = %call.name, input = %call.input, "Tool use requested");

        let result = match call.input.as_object() {
            Some(input) => self.execute_tool(&call.name, input).await,
            None if call.input.is_null() => self.execute_tool(&call.name, &ToolInput::new()).await,
            None => Err(AgentError::ToolValidation(format!(
                "tool input must be an object, got {}",
                call.input
            ))),
        };

        match &result {
            Ok(output) => {
                step!(verbose, iteration, tool = %call.name, result = %output.to_content(), "Tool result");
            }
            Err(e) => {
                tracing::warn!(iteration, tool = %call.name, error = %e, "Tool execution failed");
            }
        }
        result
    }

    async fn finalize(&self, response: ModelResponse) -> Result<ModelResponse> {
        match &self.config.output_format {
            Some(format) => self.coerce_output(format, &response).await,
            None => Ok(response),
        }
    }

    /// One extra, tool-less call that refits `response` into `format`
    async fn coerce_output(
        &self,
        format: &OutputFormat,
        response: &ModelResponse,
    ) -> Result<ModelResponse> {
        step!(self.config.verbose, "Coercing final response into output format");
        let raw = serde_json::to_string(response)?;
        self.standalone_call(&format.coercion_prompt(&raw)).await
    }

    /// Single model call outside the loop: no tools, no thinking
    pub async fn standalone_call(&self, prompt: &str) -> Result<ModelResponse> {
        let options = GenerationOptions {
            thinking: ThinkingConfig::Disabled,
            betas: Vec::new(),
            ..self.config.generation.clone()
        };
        let messages = [Message::user(prompt)];

        self.transport
            .send(ModelRequest {
                messages: &messages,
                tools: &[],
                options: &options,
            })
            .await
    }
}

/// Builder for Agent configuration
pub struct AgentBuilder {
    transport: Option<Arc<dyn ModelTransport>>,
    registry: Option<SharedToolRegistry>,
    tools: Vec<Arc<dyn Tool>>,
    team: Vec<Arc<Agent>>,
    name: Option<String>,
    system_prompt: Option<String>,
    instructions: Option<String>,
    output_format: Option<OutputFormat>,
    verbose: bool,
    max_iterations: usize,
    model: String,
    max_tokens: u32,
    temperature: Option<f32>,
    thinking: bool,
    betas: Vec<String>,
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentBuilder {
    pub fn new() -> Self {
        let generation = GenerationOptions::default();
        Self {
            transport: None,
            registry: None,
            tools: Vec::new(),
            team: Vec::new(),
            name: None,
            system_prompt: None,
            instructions: None,
            output_format: None,
            verbose: false,
            max_iterations: 10,
            model: generation.model,
            max_tokens: generation.max_tokens,
            temperature: None,
            thinking: false,
            betas: Vec::new(),
        }
    }

    pub fn transport(mut self, transport: Arc<dyn ModelTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Use an explicitly shared registry instead of a private one
    pub fn registry(mut self, registry: SharedToolRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn tool<T: Tool + 'static>(mut self, tool: T) -> Self {
        self.tools.push(Arc::new(tool));
        self
    }

    pub fn tools(mut self, tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Self {
        self.tools.extend(tools);
        self
    }

    pub fn team_member(mut self, member: Arc<Agent>) -> Self {
        self.team.push(member);
        self
    }

    pub fn team(mut self, members: impl IntoIterator<Item = Arc<Agent>>) -> Self {
        self.team.extend(members);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn output_format(mut self, format: impl Into<OutputFormat>) -> Self {
        self.output_format = Some(format.into());
        self
    }

    pub const fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub const fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub const fn temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub const fn thinking(mut self, enabled: bool) -> Self {
        self.thinking = enabled;
        self
    }

    pub fn beta(mut self, flag: impl Into<String>) -> Self {
        self.betas.push(flag.into());
        self
    }

    pub const fn max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    fn resolve_sampling(&self) -> Result<(f32, ThinkingConfig)> {
        if !self.thinking {
            return Ok((
                self.temperature.unwrap_or(DEFAULT_TEMPERATURE),
                ThinkingConfig::Disabled,
            ));
        }

        if !THINKING_MODELS.iter().any(|family| self.model.contains(family)) {
            return Err(AgentError::Config(format!(
                "Thinking is not supported for this model: {}",
                self.model
            )));
        }

        let temperature = self.temperature.unwrap_or(THINKING_TEMPERATURE);
        if (temperature - THINKING_TEMPERATURE).abs() > f32::EPSILON {
            return Err(AgentError::Config(
                "Temperature may only be set to 1 when thinking is enabled.".into(),
            ));
        }

        if self.max_tokens <= THINKING_BUDGET_TOKENS {
            return Err(AgentError::Config(format!(
                "max_tokens must exceed the thinking budget of {THINKING_BUDGET_TOKENS} tokens, got {}",
                self.max_tokens
            )));
        }

        Ok((
            temperature,
            ThinkingConfig::Enabled {
                budget_tokens: THINKING_BUDGET_TOKENS,
            },
        ))
    }

    pub fn build(self) -> Result<Agent> {
        if self.max_iterations == 0 {
            return Err(AgentError::Config("max_iterations must be at least 1".into()));
        }

        let (temperature, thinking) = self.resolve_sampling()?;

        let transport = self
            .transport
            .ok_or_else(|| AgentError::Config("Transport is required".into()))?;

        let registry = self.registry.unwrap_or_default();
        for tool in self.tools {
            registry.register_arc(tool);
        }

        let team = Arc::new(Team::new(self.team));
        let delegate = DelegateTool::new(&team);

        let name = self.name.unwrap_or_else(|| {
            let id = uuid::Uuid::new_v4().simple().to_string();
            format!("agent-{}", &id[..8])
        });

        let config = AgentConfig {
            name,
            system_prompt: self.system_prompt,
            instructions: self.instructions,
            output_format: self.output_format,
            verbose: self.verbose,
            max_iterations: self.max_iterations,
            generation: GenerationOptions {
                model: self.model,
                temperature,
                max_tokens: self.max_tokens,
                thinking,
                betas: self.betas,
            },
        };

        tracing::debug!(
            agent = %config.name,
            tools = registry.len(),
            team = team.len(),
            "Agent built"
        );

        Ok(Agent {
            transport,
            tools: registry,
            team,
            delegate,
            config,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::{Value, json};

    use super::*;
    use crate::message::{ContentBlock, MessageContent, Role};
    use crate::tool::{FunctionTool, InputSchema, ParameterSchema, ToolSchema};
    use crate::transport::StopReason;

    /// A request as seen by the scripted transport
    #[derive(Clone, Debug)]
    struct Recorded {
        messages: Vec<Message>,
        tools: Vec<ToolSchema>,
        options: GenerationOptions,
    }

    /// Transport that replays canned responses and records every request
    #[derive(Default)]
    struct ScriptedTransport {
        responses: Mutex<VecDeque<ModelResponse>>,
        requests: Mutex<Vec<Recorded>>,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<ModelResponse>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::default(),
            })
        }

        fn requests(&self) -> Vec<Recorded> {
            self.requests.lock().unwrap().clone()
        }

        fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ModelTransport for ScriptedTransport {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn send(&self, request: ModelRequest<'_>) -> Result<ModelResponse> {
            self.requests.lock().unwrap().push(Recorded {
                messages: request.messages.to_vec(),
                tools: request.tools.to_vec(),
                options: request.options.clone(),
            });
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| AgentError::Provider("script exhausted".into()))
        }
    }

    fn tool_use(id: &str, name: &str, input: Value) -> ModelResponse {
        ModelResponse {
            id: format!("msg_{id}"),
            model: "test-model".into(),
            stop_reason: StopReason::ToolUse,
            content: vec![
                ContentBlock::text("Using a tool."),
                ContentBlock::ToolUse {
                    id: id.into(),
                    name: name.into(),
                    input,
                },
            ],
            usage: None,
        }
    }

    fn final_text(text: &str) -> ModelResponse {
        ModelResponse::text_only(StopReason::EndTurn, text)
    }

    fn weather_tool() -> FunctionTool {
        FunctionTool::sync(
            "get_weather",
            "Get the current weather in a given location",
            InputSchema::new().param(ParameterSchema::string("location", "City").required()),
            |input| {
                let location = input.get("location").and_then(Value::as_str).unwrap_or_default();
                ToolOutput::json(&json!({"weather": "sunny", "location": location}))
            },
        )
    }

    fn failing_tool() -> FunctionTool {
        FunctionTool::sync("explode", "Always fails", InputSchema::new(), |_| {
            Err(AgentError::ToolExecution("kaboom".into()))
        })
    }

    fn tool_result_of(message: &Message) -> (String, String, bool) {
        match &message.content {
            MessageContent::Blocks(blocks) => match &blocks[0] {
                ContentBlock::ToolResult {
                    tool_use_id,
                    content,
                    is_error,
                } => (tool_use_id.clone(), content.clone(), *is_error),
                other => panic!("expected tool result, got {other:?}"),
            },
            MessageContent::Text(text) => panic!("expected blocks, got {text}"),
        }
    }

    fn agent(transport: Arc<ScriptedTransport>) -> AgentBuilder {
        Agent::builder().name("tester").transport(transport)
    }

    #[tokio::test]
    async fn test_direct_answer_makes_one_call() {
        let transport = ScriptedTransport::new(vec![final_text("Hello!")]);
        let agent = agent(transport.clone()).tool(weather_tool()).build().unwrap();

        let response = agent.invoke("Hi").await.unwrap();

        assert_eq!(response.text(), "Hello!");
        assert_eq!(transport.calls(), 1);
        let request = &transport.requests()[0];
        assert_eq!(request.messages, vec![Message::user("Hi")]);
        assert_eq!(request.tools.len(), 1);
    }

    #[tokio::test]
    async fn test_tool_round_trip() {
        let transport = ScriptedTransport::new(vec![
            tool_use("toolu_1", "get_weather", json!({"location": "Paris"})),
            final_text("It is sunny in Paris."),
        ]);
        let agent = agent(transport.clone()).tool(weather_tool()).build().unwrap();

        let response = agent.invoke("Weather in Paris?").await.unwrap();
        assert_eq!(response.text(), "It is sunny in Paris.");

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);

        let second = &requests[1].messages;
        assert_eq!(second.len(), 3);
        assert_eq!(second[1].role, Role::Assistant);
        assert!(matches!(&second[1].content, MessageContent::Blocks(b) if b.len() == 2));
        let (id, content, is_error) = tool_result_of(&second[2]);
        assert_eq!(id, "toolu_1");
        assert!(!is_error);
        let payload: Value = serde_json::from_str(&content).unwrap();
        assert_eq!(payload["location"], "Paris");
    }

    #[tokio::test]
    async fn test_at_most_max_iterations_calls() {
        let responses = (0..10)
            .map(|i| tool_use(&format!("t{i}"), "get_weather", json!({"location": "Oslo"})))
            .collect();
        let transport = ScriptedTransport::new(responses);
        let agent = agent(transport.clone())
            .tool(weather_tool())
            .max_iterations(3)
            .build()
            .unwrap();

        let response = agent.invoke("Loop forever").await.unwrap();

        assert_eq!(transport.calls(), 3);
        assert_eq!(response.stop_reason, StopReason::ToolUse);
        assert_eq!(response.id, "msg_t2");
    }

    #[tokio::test]
    async fn test_budget_of_one_returns_raw_tool_use_without_coercion() {
        let raw = tool_use("toolu_1", "get_weather", json!({"location": "Rome"}));
        let transport = ScriptedTransport::new(vec![raw.clone(), final_text("coerced")]);
        let agent = agent(transport.clone())
            .tool(weather_tool())
            .output_format("{\"answer\": \"...\"}")
            .max_iterations(1)
            .build()
            .unwrap();

        let response = agent.invoke("Weather in Rome?").await.unwrap();

        assert_eq!(response, raw);
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_captured_as_error_result() {
        let transport = ScriptedTransport::new(vec![
            tool_use("toolu_1", "does_not_exist", json!({})),
            final_text("Sorry, I could not do that."),
        ]);
        let agent = agent(transport.clone()).build().unwrap();

        let response = agent.invoke("Do the impossible").await.unwrap();
        assert_eq!(response.text(), "Sorry, I could not do that.");

        let requests = transport.requests();
        let (_, content, is_error) = tool_result_of(&requests[1].messages[2]);
        assert!(is_error);
        let payload: Value = serde_json::from_str(&content).unwrap();
        assert!(
            payload["error"]
                .as_str()
                .unwrap()
                .contains("does_not_exist not found")
        );
    }

    #[tokio::test]
    async fn test_failing_tool_does_not_crash_loop() {
        let transport = ScriptedTransport::new(vec![
            tool_use("toolu_1", "explode", json!({})),
            tool_use("toolu_2", "explode", json!({})),
            final_text("The tool keeps failing."),
        ]);
        let agent = agent(transport.clone())
            .tool(failing_tool())
            .max_iterations(5)
            .build()
            .unwrap();

        let response = agent.invoke("Try it").await.unwrap();
        assert_eq!(response.text(), "The tool keeps failing.");
        assert_eq!(transport.calls(), 3);

        let requests = transport.requests();
        let (id, content, _) = tool_result_of(&requests[1].messages[2]);
        assert_eq!(id, "toolu_1");
        let payload: Value = serde_json::from_str(&content).unwrap();
        assert_eq!(payload["error"], "Error executing tool explode: Tool execution error: kaboom");
    }

    #[tokio::test]
    async fn test_tool_use_without_block_exits_early() {
        let anomaly = ModelResponse::text_only(StopReason::ToolUse, "I wanted a tool");
        let transport = ScriptedTransport::new(vec![anomaly.clone(), final_text("unused")]);
        let agent = agent(transport.clone())
            .output_format("{}")
            .build()
            .unwrap();

        let response = agent.invoke("Anything").await.unwrap();

        assert_eq!(response, anomaly);
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_output_coercion_is_one_extra_toolless_call() {
        let transport = ScriptedTransport::new(vec![
            tool_use("toolu_1", "get_weather", json!({"location": "Lima"})),
            final_text("Sunny in Lima."),
            final_text(r#"{"answer": "Sunny in Lima."}"#),
        ]);
        let agent = agent(transport.clone())
            .tool(weather_tool())
            .output_format(r#"{"answer": "..."}"#)
            .max_iterations(2)
            .build()
            .unwrap();

        let response = agent.invoke("Weather in Lima?").await.unwrap();
        assert_eq!(response.text(), r#"{"answer": "Sunny in Lima."}"#);

        let requests = transport.requests();
        assert_eq!(requests.len(), 3);

        let coercion = &requests[2];
        assert!(coercion.tools.is_empty());
        assert_eq!(coercion.messages.len(), 1);
        let prompt = coercion.messages[0].text();
        assert!(prompt.contains("Sunny in Lima."));
        assert!(prompt.contains(r#"{"answer": "..."}"#));
        assert_eq!(coercion.options.thinking, ThinkingConfig::Disabled);
    }

    #[tokio::test]
    async fn test_only_first_tool_use_is_dispatched() {
        let mut response = tool_use("toolu_1", "get_weather", json!({"location": "Kyiv"}));
        response.content.push(ContentBlock::ToolUse {
            id: "toolu_2".into(),
            name: "explode".into(),
            input: json!({}),
        });
        let transport = ScriptedTransport::new(vec![response, final_text("done")]);
        let agent = agent(transport.clone())
            .tool(weather_tool())
            .tool(failing_tool())
            .build()
            .unwrap();

        agent.invoke("Go").await.unwrap();

        let second = &transport.requests()[1].messages;
        assert_eq!(second.len(), 3);
        let (id, _, is_error) = tool_result_of(&second[2]);
        assert_eq!(id, "toolu_1");
        assert!(!is_error);
    }

    #[tokio::test]
    async fn test_conversation_grows_append_only() {
        let transport = ScriptedTransport::new(vec![
            tool_use("a", "get_weather", json!({"location": "A"})),
            tool_use("b", "get_weather", json!({"location": "B"})),
            final_text("done"),
        ]);
        let agent = agent(transport.clone())
            .system_prompt("You are a weather expert.")
            .instructions("Use the weather tool.")
            .tool(weather_tool())
            .build()
            .unwrap();

        agent.invoke("Compare A and B").await.unwrap();

        let requests = transport.requests();
        let lens: Vec<usize> = requests.iter().map(|r| r.messages.len()).collect();
        assert_eq!(lens, vec![3, 5, 7]);
        for pair in requests.windows(2) {
            assert_eq!(pair[1].messages[..pair[0].messages.len()], pair[0].messages[..]);
        }
        assert_eq!(requests[0].messages[0].text(), "<system>You are a weather expert.</system>");
    }

    #[tokio::test]
    async fn test_transport_failure_propagates() {
        let transport = ScriptedTransport::new(vec![]);
        let agent = agent(transport).build().unwrap();

        let err = agent.invoke("Hi").await.unwrap_err();
        assert!(matches!(err, AgentError::Provider(_)));
    }

    #[tokio::test]
    async fn test_delegation_uses_fresh_conversation() {
        let member_a = ScriptedTransport::new(vec![final_text("A did X")]);
        let member_b = ScriptedTransport::new(vec![]);
        let a = Arc::new(
            Agent::builder()
                .name("Research Expert")
                .system_prompt("You are a research expert. You search the web.")
                .transport(member_a.clone())
                .build()
                .unwrap(),
        );
        let b = Arc::new(
            Agent::builder()
                .name("Weather Expert")
                .transport(member_b.clone())
                .build()
                .unwrap(),
        );

        let manager_transport = ScriptedTransport::new(vec![
            tool_use(
                "toolu_1",
                DELEGATE_TOOL_NAME,
                json!({"task": "X", "agent_idx": 0}),
            ),
            final_text("The team says: A did X"),
        ]);
        let manager = agent(manager_transport.clone())
            .system_prompt("You are a manager.")
            .team([a, b])
            .build()
            .unwrap();

        let response = manager.invoke("Please do X").await.unwrap();
        assert_eq!(response.text(), "The team says: A did X");

        let a_requests = member_a.requests();
        assert_eq!(a_requests.len(), 1);
        assert_eq!(
            a_requests[0].messages,
            vec![
                Message::user("<system>You are a research expert. You search the web.</system>"),
                Message::user("X"),
            ]
        );
        assert_eq!(member_b.calls(), 0);

        let manager_requests = manager_transport.requests();
        let catalogue = &manager_requests[0].tools;
        assert_eq!(catalogue.len(), 1);
        let schema = catalogue[0].as_dict();
        let idx_description = schema["input_schema"]["properties"]["agent_idx"]["description"]
            .as_str()
            .unwrap()
            .to_string();
        assert!(idx_description.contains("0: Research Expert - You are a research expert."));
        assert!(idx_description.contains("1: Weather Expert - No description available"));
        assert_eq!(
            schema["input_schema"]["properties"]["agent_idx"]["enum"],
            json!([0, 1])
        );

        let (_, content, is_error) = tool_result_of(&manager_requests[1].messages[3]);
        assert!(!is_error);
        assert!(content.contains("A did X"));
    }

    #[tokio::test]
    async fn test_delegation_out_of_range_never_invokes_member() {
        let member = ScriptedTransport::new(vec![final_text("should not run")]);
        let a = Arc::new(agent(member.clone()).build().unwrap());

        let manager_transport = ScriptedTransport::new(vec![
            tool_use("toolu_1", DELEGATE_TOOL_NAME, json!({"task": "X", "agent_idx": 5})),
            final_text("Could not delegate."),
        ]);
        let manager = agent(manager_transport.clone()).team_member(a).build().unwrap();

        let direct = manager
            .execute_tool(
                DELEGATE_TOOL_NAME,
                json!({"task": "X", "agent_idx": 1}).as_object().unwrap(),
            )
            .await;
        assert!(matches!(direct, Err(AgentError::InvalidArgument(_))));

        let response = manager.invoke("Delegate badly").await.unwrap();
        assert_eq!(response.text(), "Could not delegate.");
        assert_eq!(member.calls(), 0);

        let (_, content, is_error) = tool_result_of(&manager_transport.requests()[1].messages[2]);
        assert!(is_error);
        assert!(content.contains("out of range"));
    }

    #[tokio::test]
    async fn test_team_member_added_after_build() {
        let member = ScriptedTransport::new(vec![]);
        let manager_transport = ScriptedTransport::new(vec![]);
        let manager = agent(manager_transport).build().unwrap();
        assert!(manager.tool_catalogue().is_empty());

        manager.add_team_member(Arc::new(agent(member).name("helper").build().unwrap()));

        let catalogue = manager.tool_catalogue();
        assert_eq!(catalogue.len(), 1);
        assert_eq!(catalogue[0].name, DELEGATE_TOOL_NAME);
        assert_eq!(manager.team().len(), 1);
        assert!(!manager.tools().has_tool(DELEGATE_TOOL_NAME));
    }

    #[test]
    fn test_thinking_configuration() {
        let transport = ScriptedTransport::new(vec![]);

        let agent = agent(transport.clone())
            .model("claude-3-7-sonnet-20250219")
            .thinking(true)
            .build()
            .unwrap();
        let generation = &agent.config().generation;
        assert!((generation.temperature - 1.0).abs() < f32::EPSILON);
        assert_eq!(
            generation.thinking,
            ThinkingConfig::Enabled { budget_tokens: 1024 }
        );

        let unsupported = Agent::builder()
            .transport(transport.clone())
            .model("claude-3-haiku-20240307")
            .thinking(true)
            .build();
        assert!(matches!(unsupported, Err(AgentError::Config(_))));

        let small_budget = Agent::builder()
            .transport(transport.clone())
            .model("claude-3-7-sonnet-20250219")
            .thinking(true)
            .max_tokens(1000)
            .build();
        assert!(matches!(small_budget, Err(AgentError::Config(msg)) if msg.contains("max_tokens")));

        let bad_temperature = Agent::builder()
            .transport(transport.clone())
            .model("claude-3-7-sonnet-20250219")
            .thinking(true)
            .temperature(0.2)
            .build();
        assert!(matches!(bad_temperature, Err(AgentError::Config(_))));

        let plain = Agent::builder().transport(transport).build().unwrap();
        assert!((plain.config().generation.temperature - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_build_validation() {
        assert!(matches!(
            Agent::builder().build(),
            Err(AgentError::Config(_))
        ));

        let transport = ScriptedTransport::new(vec![]);
        assert!(matches!(
            Agent::builder().transport(transport.clone()).max_iterations(0).build(),
            Err(AgentError::Config(_))
        ));

        let unnamed = Agent::builder().transport(transport).build().unwrap();
        assert!(unnamed.name().starts_with("agent-"));
        assert_eq!(unnamed.name().len(), "agent-".len() + 8);
    }

    #[tokio::test]
    async fn test_shared_registry_between_agents() {
        let shared = SharedToolRegistry::default();
        let first = agent(ScriptedTransport::new(vec![]))
            .registry(shared.clone())
            .tool(weather_tool())
            .build()
            .unwrap();
        let second = agent(ScriptedTransport::new(vec![]))
            .registry(shared)
            .build()
            .unwrap();

        assert!(first.tools().has_tool("get_weather"));
        assert!(second.tools().has_tool("get_weather"));
    }

    #[tokio::test]
    async fn test_shared_registry_keeps_delegation_per_agent() {
        let own = ScriptedTransport::new(vec![final_text("own member answered")]);
        let foreign = ScriptedTransport::new(vec![final_text("foreign member answered")]);
        let own_member = Arc::new(agent(own.clone()).name("Own").build().unwrap());
        let foreign_member = Arc::new(agent(foreign.clone()).name("Foreign").build().unwrap());

        let shared = SharedToolRegistry::default();
        let a_transport = ScriptedTransport::new(vec![
            tool_use("toolu_1", DELEGATE_TOOL_NAME, json!({"task": "X", "agent_idx": 0})),
            final_text("done"),
        ]);
        let a = agent(a_transport.clone())
            .registry(shared.clone())
            .team_member(own_member)
            .build()
            .unwrap();
        let b = agent(ScriptedTransport::new(vec![]))
            .registry(shared.clone())
            .team_member(foreign_member)
            .build()
            .unwrap();

        a.invoke("Delegate X").await.unwrap();

        assert_eq!(own.calls(), 1);
        assert_eq!(foreign.calls(), 0);
        assert!(shared.is_empty());

        let describe = |agent: &Agent| {
            agent.tool_catalogue()[0].as_dict()["input_schema"]["properties"]["agent_idx"]
                ["description"]
                .as_str()
                .unwrap()
                .to_string()
        };
        assert!(describe(&a).contains("0: Own"));
        assert!(describe(&b).contains("0: Foreign"));

        let (_, content, is_error) = tool_result_of(&a_transport.requests()[1].messages[2]);
        assert!(!is_error);
        assert!(content.contains("own member answered"));
    }

    #[tokio::test]
    async fn test_error_shaped_success_is_not_flagged() {
        let lookalike = FunctionTool::sync("lookup", "Returns an error field", InputSchema::new(), |_| {
            ToolOutput::json(&json!({"error": "none", "status": "ok"}))
        });
        let transport = ScriptedTransport::new(vec![
            tool_use("toolu_1", "lookup", json!({})),
            final_text("done"),
        ]);
        let agent = agent(transport.clone()).tool(lookalike).build().unwrap();

        agent.invoke("Look it up").await.unwrap();

        let (_, content, is_error) = tool_result_of(&transport.requests()[1].messages[2]);
        assert!(!is_error);
        assert!(content.contains("\"status\":\"ok\""));
    }
}
