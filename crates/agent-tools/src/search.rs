//! Tavily Web Search
//!
//! Two modes: `detailed` returns ranked sources (markdown or JSON),
//! `context` returns raw page content for the model to read directly.
//! Both stay within a character budget.

use std::fmt::Write as _;

use agent_core::{
    AgentError, InputSchema, ParameterSchema, Result as AgentResult, Tool, ToolInput, ToolOutput,
    ToolSchema,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{Result, ToolsError};

const TAVILY_URL: &str = "https://api.tavily.com";

/// Shape of the search result
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SearchMode {
    /// Structured sources with an optional answer summary
    #[default]
    Detailed,
    /// Raw search context
    Context,
}

/// Rendering of detailed results
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ResultFormat {
    #[default]
    Markdown,
    Json,
}

/// Tavily client configuration
#[derive(Clone, Debug)]
pub struct TavilyConfig {
    pub api_key: String,
    pub base_url: String,
    pub mode: SearchMode,
    pub format: ResultFormat,
    /// Character budget for the returned results
    pub max_tokens: usize,
    pub include_answer: bool,
    /// `basic` or `advanced`
    pub search_depth: String,
    pub max_results: u32,
}

impl TavilyConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: TAVILY_URL.into(),
            mode: SearchMode::default(),
            format: ResultFormat::default(),
            max_tokens: 6000,
            include_answer: true,
            search_depth: "advanced".into(),
            max_results: 5,
        }
    }

    /// Read `TAVILY_API_KEY`
    pub fn from_env() -> Result<Self> {
        std::env::var("TAVILY_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .map(Self::new)
            .ok_or_else(|| ToolsError::Config("TAVILY_API_KEY not provided".into()))
    }

    pub fn with_mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_format(mut self, format: ResultFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    search_depth: &'a str,
    include_answer: bool,
    max_results: u32,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    results: Vec<RawResult>,
}

#[derive(Debug, Deserialize)]
struct RawResult {
    title: String,
    url: String,
    content: String,
    #[serde(default)]
    score: f64,
}

/// One trimmed search hit
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub content: String,
    pub score: f64,
}

#[derive(Debug, Serialize)]
struct DetailedResults<'a> {
    query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    answer: Option<String>,
    results: Vec<SearchHit>,
}

/// Web search through the Tavily API
pub struct TavilySearchTool {
    client: reqwest::Client,
    config: TavilyConfig,
}

impl TavilySearchTool {
    pub fn new(config: TavilyConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self::new(TavilyConfig::from_env()?))
    }

    async fn search(&self, query: &str, max_results: u32) -> Result<SearchResponse> {
        let url = format!("{}/search", self.config.base_url.trim_end_matches('/'));
        let body = SearchRequest {
            query,
            search_depth: &self.config.search_depth,
            include_answer: self.config.include_answer,
            max_results,
        };

        tracing::debug!(query, max_results, "Tavily search");
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ToolsError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }

    /// Structured results, rendered per the configured format
    pub async fn search_detailed(&self, query: &str, max_results: Option<u32>) -> Result<String> {
        let response = self
            .search(query, max_results.unwrap_or(self.config.max_results))
            .await?;

        let results = DetailedResults {
            query,
            answer: response.answer.filter(|_| self.config.include_answer),
            results: within_budget(response.results, self.config.max_tokens)?,
        };

        match self.config.format {
            ResultFormat::Json => Ok(serde_json::to_string(&results)?),
            ResultFormat::Markdown => Ok(to_markdown(&results)),
        }
    }

    /// Raw page content as a JSON list of `{url, content}`
    pub async fn search_context(&self, query: &str) -> Result<String> {
        let response = self.search(query, self.config.max_results).await?;

        let mut used = 0;
        let mut context = Vec::new();
        for hit in response.results {
            let entry = json!({"url": hit.url, "content": hit.content});
            let size = entry.to_string().len();
            if used + size > self.config.max_tokens {
                break;
            }
            used += size;
            context.push(entry);
        }

        Ok(serde_json::to_string(&context)?)
    }
}

/// Keep leading results while their serialized size fits `budget`
fn within_budget(results: Vec<RawResult>, budget: usize) -> Result<Vec<SearchHit>> {
    let mut used = 0;
    let mut kept = Vec::new();

    for raw in results {
        let hit = SearchHit {
            title: raw.title,
            url: raw.url,
            content: raw.content,
            score: raw.score,
        };
        let size = serde_json::to_string(&hit)?.len();
        if used + size > budget {
            break;
        }
        used += size;
        kept.push(hit);
    }

    Ok(kept)
}

fn to_markdown(results: &DetailedResults<'_>) -> String {
    let mut out = format!("# Search Results: {}\n\n", results.query);

    if let Some(answer) = &results.answer {
        let _ = write!(out, "## Summary\n{answer}\n\n");
    }

    if results.results.is_empty() {
        out.push_str("No results found.");
        return out;
    }

    out.push_str("## Sources\n\n");
    for (idx, hit) in results.results.iter().enumerate() {
        let _ = write!(
            out,
            "### {}. [{}]({})\n{}\n\n",
            idx + 1,
            hit.title,
            hit.url,
            hit.content
        );
    }
    out
}

#[async_trait]
impl Tool for TavilySearchTool {
    fn schema(&self) -> ToolSchema {
        let query = ParameterSchema::string("query", "The search query to look up on the web")
            .required();

        match self.config.mode {
            SearchMode::Detailed => ToolSchema {
                name: "tavily_search".into(),
                description: "Search the web for information and return structured results"
                    .into(),
                input_schema: InputSchema::new().param(query).param(ParameterSchema::integer(
                    "max_results",
                    "Maximum number of results to return (optional)",
                )),
            },
            SearchMode::Context => ToolSchema {
                name: "tavily_search".into(),
                description: "Search the web for information and return raw context".into(),
                input_schema: InputSchema::new().param(query),
            },
        }
    }

    async fn execute(&self, input: &ToolInput) -> AgentResult<ToolOutput> {
        let query = input
            .get("query")
            .and_then(Value::as_str)
            .ok_or_else(|| AgentError::ToolValidation("query must be a string".into()))?;

        let text = match self.config.mode {
            SearchMode::Detailed => {
                let max_results = input
                    .get("max_results")
                    .and_then(Value::as_u64)
                    .and_then(|n| u32::try_from(n).ok())
                    .filter(|n| *n > 0);
                self.search_detailed(query, max_results).await?
            }
            SearchMode::Context => self.search_context(query).await?,
        };

        Ok(ToolOutput::text(text))
    }
}
