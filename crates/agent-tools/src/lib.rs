//! # agent-tools
//!
//! Ready-made tools for agents built on `agent-core`.
//!
//! | tool | name | backend |
//! |------|------|---------|
//! | [`BashTool`] | `bash` | `sh -c` via tokio |
//! | [`WeatherTool`] | `get_weather` | static, or Nominatim + Open-Meteo |
//! | [`TavilySearchTool`] | `tavily_search` | Tavily Search API |
//! | [`DateTimeTool`] | `datetime` | system clock |

pub mod bash;
pub mod datetime;
pub mod error;
pub mod search;
pub mod weather;

pub use bash::BashTool;
pub use datetime::DateTimeTool;
pub use error::{Result, ToolsError};
pub use search::{ResultFormat, SearchMode, TavilyConfig, TavilySearchTool};
pub use weather::{OpenMeteoClient, StaticWeather, Unit, WeatherReport, WeatherSource, WeatherTool};
