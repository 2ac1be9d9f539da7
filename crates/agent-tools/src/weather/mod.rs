//! Weather Lookup
//!
//! The `get_weather` tool and the sources behind it.

mod fixed;
mod open_meteo;

pub use fixed::StaticWeather;
pub use open_meteo::OpenMeteoClient;

use agent_core::{
    InputSchema, ParameterSchema, Result as AgentResult, Tool, ToolInput, ToolOutput, ToolSchema,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::Result;

/// Temperature unit
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    #[default]
    Celsius,
    Fahrenheit,
}

impl Unit {
    fn parse(value: Option<&Value>) -> Self {
        match value.and_then(Value::as_str) {
            Some("fahrenheit") => Self::Fahrenheit,
            _ => Self::Celsius,
        }
    }

    /// Convert a Celsius reading, rounded to two decimals
    pub fn from_celsius(self, celsius: f64) -> f64 {
        let value = match self {
            Self::Celsius => celsius,
            Self::Fahrenheit => celsius.mul_add(9.0 / 5.0, 32.0),
        };
        (value * 100.0).round() / 100.0
    }
}

/// Current conditions for a location
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub weather: String,
    pub temperature: f64,
    pub location: String,
    pub unit: Unit,
}

/// Weather source trait (Strategy pattern)
///
/// Implement this for each provider.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    /// Current conditions at `location`
    async fn current(&self, location: &str, unit: Unit) -> Result<WeatherReport>;

    /// Source name
    fn name(&self) -> &str;
}

/// Tool for current weather conditions
pub struct WeatherTool {
    source: Box<dyn WeatherSource>,
}

impl WeatherTool {
    pub fn new(source: impl WeatherSource + 'static) -> Self {
        Self {
            source: Box::new(source),
        }
    }

    /// Tool backed by [`StaticWeather`]
    pub fn fixed() -> Self {
        Self::new(StaticWeather)
    }
}

#[async_trait]
impl Tool for WeatherTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "get_weather".into(),
            description: "Get the current weather in a given location".into(),
            input_schema: InputSchema::new()
                .param(
                    ParameterSchema::string(
                        "location",
                        "The city and state, e.g. San Francisco, CA",
                    )
                    .required(),
                )
                .param(
                    ParameterSchema::string(
                        "unit",
                        "The unit of temperature, either 'celsius' or 'fahrenheit'",
                    )
                    .with_default(json!("celsius"))
                    .with_enum(vec![json!("celsius"), json!("fahrenheit")]),
                ),
        }
    }

    async fn execute(&self, input: &ToolInput) -> AgentResult<ToolOutput> {
        let location = input
            .get("location")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let unit = Unit::parse(input.get("unit"));

        tracing::debug!(source = self.source.name(), location, ?unit, "Weather lookup");
        match self.source.current(location, unit).await {
            Ok(report) => ToolOutput::json(&report),
            Err(e) => {
                tracing::warn!(source = self.source.name(), error = %e, "Weather lookup failed");
                Ok(ToolOutput::error(e.to_string()))
            }
        }
    }
}
