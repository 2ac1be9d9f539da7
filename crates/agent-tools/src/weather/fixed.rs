//! Static Weather Source
//!
//! For testing and demo purposes. Always sunny.

use async_trait::async_trait;

use super::{Unit, WeatherReport, WeatherSource};
use crate::error::Result;

/// Weather source with a fixed forecast
#[derive(Clone, Copy, Debug, Default)]
pub struct StaticWeather;

#[async_trait]
impl WeatherSource for StaticWeather {
    async fn current(&self, location: &str, unit: Unit) -> Result<WeatherReport> {
        let temperature = match unit {
            Unit::Celsius => 22.0,
            Unit::Fahrenheit => 72.0,
        };

        Ok(WeatherReport {
            weather: "sunny".into(),
            temperature,
            location: location.to_string(),
            unit,
        })
    }

    fn name(&self) -> &str {
        "static"
    }
}
