//! agent CLI
//!
//! Runs a manager agent that delegates to a research expert (web search)
//! and a weather expert, then prints the final answer.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use schemars::JsonSchema;
use serde::Deserialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_core::{Agent, ModelTransport, OutputFormat};
use agent_runtime::{AnthropicConfig, AnthropicTransport, BedrockConfig, BedrockTransport};
use agent_tools::{BashTool, OpenMeteoClient, TavilySearchTool, WeatherTool};

const DEFAULT_PROMPT: &str = "What is the weather in San Francisco today?";

#[derive(Parser)]
#[command(name = "agent")]
#[command(about = "Ask a manager agent backed by a team of experts")]
#[command(version)]
struct Cli {
    /// Question for the manager agent
    prompt: Option<String>,

    /// Model identifier (overrides ANTHROPIC_MODEL)
    #[arg(long, env = "ANTHROPIC_MODEL")]
    model: Option<String>,

    /// Call Claude through Amazon Bedrock (AWS_REGION, default us-east-1)
    #[arg(long)]
    bedrock: bool,

    /// Query Open-Meteo instead of the static forecast
    #[arg(long)]
    live_weather: bool,

    /// Enable extended thinking on the manager
    #[arg(long)]
    thinking: bool,

    /// Iteration budget per agent
    #[arg(long, default_value_t = 10)]
    max_iterations: usize,

    /// Coerce the final answer into `{answer, reasoning}`
    #[arg(long)]
    structured: bool,

    /// Log every step at info level
    #[arg(long, short)]
    verbose: bool,
}

/// Shape used with `--structured`
#[derive(Debug, Deserialize, JsonSchema)]
#[allow(dead_code)]
struct Answer {
    answer: String,
    reasoning: String,
}

fn build_manager(cli: &Cli, transport: &Arc<dyn ModelTransport>, model: &str) -> anyhow::Result<Agent> {
    let research = {
        let mut builder = Agent::builder()
            .transport(Arc::clone(transport))
            .model(model)
            .name("Research Expert")
            .system_prompt(
                "You are a research expert. You can use the web tool to get the information for a given topic.",
            )
            .instructions("Use the web tool to get the information for the given topic.")
            .max_iterations(cli.max_iterations)
            .verbose(cli.verbose);

        match TavilySearchTool::from_env() {
            Ok(search) => builder = builder.tool(search),
            Err(e) => tracing::warn!(error = %e, "Research expert runs without web search"),
        }
        Arc::new(builder.build()?)
    };

    let weather_tool = if cli.live_weather {
        WeatherTool::new(OpenMeteoClient::new())
    } else {
        WeatherTool::fixed()
    };

    let weather = Arc::new(
        Agent::builder()
            .transport(Arc::clone(transport))
            .model(model)
            .name("Weather Expert")
            .system_prompt(
                "You are a weather expert. You can use the weather tool to get the weather information for a given location.",
            )
            .instructions(
                "Use the weather tool to get the weather information for the given location.",
            )
            .tool(weather_tool)
            .max_iterations(cli.max_iterations)
            .verbose(cli.verbose)
            .build()?,
    );

    let mut manager = Agent::builder()
        .transport(Arc::clone(transport))
        .model(model)
        .name("Manager Agent")
        .system_prompt(
            "You are a manager. You can delegate tasks to the team members. \
             Research Expert is good at research, Weather Expert is good at weather.",
        )
        .instructions(
            "Delegate the task to the appropriate team member based on the user's question.",
        )
        .tool(BashTool::new())
        .team([research, weather])
        .thinking(cli.thinking)
        .max_iterations(cli.max_iterations)
        .verbose(cli.verbose);

    if cli.structured {
        manager = manager.output_format(OutputFormat::schema_of::<Answer>()?);
    }

    Ok(manager.build()?)
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let (transport, default_model): (Arc<dyn ModelTransport>, String) = if cli.bedrock {
        let config = BedrockConfig::from_env()?;
        let model = config.model.clone();
        let transport: Arc<dyn ModelTransport> = Arc::new(BedrockTransport::from_config(config)?);
        (transport, model)
    } else {
        let config = AnthropicConfig::from_env()?;
        let model = config.model.clone();
        let transport: Arc<dyn ModelTransport> = Arc::new(AnthropicTransport::from_config(config)?);
        (transport, model)
    };
    let model = cli.model.clone().unwrap_or(default_model);

    let manager = build_manager(&cli, &transport, &model)?;
    let prompt = cli.prompt.as_deref().unwrap_or(DEFAULT_PROMPT);

    tracing::info!(agent = %manager.name(), transport = transport.name(), prompt, "Processing request");
    let response = manager.invoke(prompt).await?;

    for text in response.text_blocks() {
        println!("{text}");
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,reqwest=warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let message = e
                .downcast_ref::<agent_core::AgentError>()
                .map_or_else(|| e.to_string(), agent_core::AgentError::user_message);
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}
