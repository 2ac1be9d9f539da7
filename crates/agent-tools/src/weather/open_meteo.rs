//! Open-Meteo Weather Source
//!
//! Geocodes the location through Nominatim, then reads `current_weather`
//! from Open-Meteo. Neither service needs an API key.

use async_trait::async_trait;
use serde::Deserialize;

use super::{Unit, WeatherReport, WeatherSource};
use crate::error::{Result, ToolsError};

const GEO_URL: &str = "https://nominatim.openstreetmap.org/search";
const WEATHER_URL: &str = "https://api.open-meteo.com/v1/forecast";

// Nominatim rejects requests without one.
const USER_AGENT: &str = "agent-tools/0.1 (weather lookup)";

#[derive(Debug, Deserialize)]
struct Place {
    lat: String,
    lon: String,
}

#[derive(Debug, Deserialize)]
struct Forecast {
    current_weather: CurrentWeather,
}

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    temperature: f64,
    #[serde(default)]
    weathercode: Option<u16>,
}

/// Live weather from Open-Meteo
#[derive(Clone, Debug)]
pub struct OpenMeteoClient {
    client: reqwest::Client,
    geo_url: String,
    weather_url: String,
}

impl Default for OpenMeteoClient {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenMeteoClient {
    pub fn new() -> Self {
        Self::with_endpoints(GEO_URL, WEATHER_URL)
    }

    /// Point at alternative geocoding and forecast endpoints
    pub fn with_endpoints(geo_url: impl Into<String>, weather_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            geo_url: geo_url.into(),
            weather_url: weather_url.into(),
        }
    }

    async fn coordinates(&self, location: &str) -> Result<(f64, f64)> {
        let response = self
            .client
            .get(&self.geo_url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .query(&[("q", location), ("format", "json"), ("limit", "1")])
            .send()
            .await?;
        let places: Vec<Place> = check(response).await?.json().await?;

        let place = places
            .into_iter()
            .next()
            .ok_or_else(|| ToolsError::LocationNotFound(location.to_string()))?;

        let parse = |raw: &str| {
            raw.parse::<f64>()
                .map_err(|_| ToolsError::UnexpectedResponse(format!("bad coordinate '{raw}'")))
        };
        Ok((parse(&place.lat)?, parse(&place.lon)?))
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ToolsError::Api {
        status: status.as_u16(),
        body,
    })
}

/// Short description for a WMO weather code
fn describe(code: u16) -> &'static str {
    match code {
        0 => "clear",
        1 | 2 => "partly cloudy",
        3 => "overcast",
        45 | 48 => "fog",
        51..=57 => "drizzle",
        61..=67 | 80..=82 => "rain",
        71..=77 | 85 | 86 => "snow",
        95..=99 => "thunderstorm",
        _ => "unknown",
    }
}

#[async_trait]
impl WeatherSource for OpenMeteoClient {
    async fn current(&self, location: &str, unit: Unit) -> Result<WeatherReport> {
        let (latitude, longitude) = self.coordinates(location).await?;

        let response = self
            .client
            .get(&self.weather_url)
            .query(&[
                ("latitude", latitude.to_string()),
                ("longitude", longitude.to_string()),
                ("current_weather", "true".to_string()),
                ("timezone", "auto".to_string()),
            ])
            .send()
            .await?;
        let forecast: Forecast = check(response).await?.json().await?;
        let current = forecast.current_weather;

        Ok(WeatherReport {
            weather: current.weathercode.map_or("unknown", describe).to_string(),
            temperature: unit.from_celsius(current.temperature),
            location: location.to_string(),
            unit,
        })
    }

    fn name(&self) -> &str {
        "open-meteo"
    }
}
