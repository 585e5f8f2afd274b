//! Upstream weather provider: OpenWeatherMap "current weather" API.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::instrument;

use crate::location::LocationKey;
use crate::types::ProviderError;

pub const OPENWEATHERMAP_URL: &str = "https://api.openweathermap.org/data/2.5/weather";
const REQUEST_TIMEOUT_SECS: u64 = 10;
const USER_AGENT: &str = "Wayfare/0.1.0";

/// Unit system requested from the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    /// Kelvin, m/s
    Standard,
    /// Celsius, m/s
    #[default]
    Metric,
    /// Fahrenheit, mph
    Imperial,
}

impl Units {
    pub fn as_query(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Metric => "metric",
            Self::Imperial => "imperial",
        }
    }

    fn temperature(&self, value: f64) -> Temperature {
        match self {
            Self::Standard => Temperature::Kelvin(value),
            Self::Metric => Temperature::Celsius(value),
            Self::Imperial => Temperature::Fahrenheit(value),
        }
    }

    fn wind_speed(&self, value: f64) -> WindSpeed {
        match self {
            Self::Standard | Self::Metric => WindSpeed::MetersPerSecond(value),
            Self::Imperial => WindSpeed::MilesPerHour(value),
        }
    }
}

/// Temperature in whatever unit the provider reported
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Temperature {
    Kelvin(f64),
    Celsius(f64),
    Fahrenheit(f64),
}

impl Temperature {
    pub fn to_celsius(self) -> f64 {
        match self {
            Self::Kelvin(k) => k - 273.15,
            Self::Celsius(c) => c,
            Self::Fahrenheit(f) => (f - 32.0) * 5.0 / 9.0,
        }
    }
}

/// Wind speed in whatever unit the provider reported
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WindSpeed {
    MetersPerSecond(f64),
    MilesPerHour(f64),
}

impl WindSpeed {
    pub fn to_kph(self) -> f64 {
        match self {
            Self::MetersPerSecond(ms) => ms * 3.6,
            Self::MilesPerHour(mph) => mph * 1.609_344,
        }
    }
}

/// A provider observation before unit normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Provider's canonical name for the location
    pub name: String,
    pub temperature: Temperature,
    pub condition: String,
    pub humidity_percent: u8,
    pub wind_speed: WindSpeed,
}

/// A source of current weather observations.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn current(&self, location: &LocationKey) -> Result<Observation, ProviderError>;
}

/// Connection settings for [`OpenWeatherMapProvider`]
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    /// `None` means every request is treated as an auth failure
    pub api_key: Option<String>,
    pub base_url: String,
    pub units: Units,
    pub timeout: Duration,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: OPENWEATHERMAP_URL.to_string(),
            units: Units::default(),
            timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OwmResponse {
    name: String,
    main: OwmMain,
    weather: Vec<OwmCondition>,
    #[serde(default)]
    wind: Option<OwmWind>,
}

#[derive(Debug, Deserialize)]
struct OwmMain {
    temp: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct OwmCondition {
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwmWind {
    #[serde(default)]
    speed: Option<f64>,
}

/// OpenWeatherMap-backed provider
#[derive(Debug, Clone)]
pub struct OpenWeatherMapProvider {
    client: Client,
    settings: ProviderSettings,
}

impl OpenWeatherMapProvider {
    pub fn new(settings: ProviderSettings) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self { client, settings })
    }

    fn parse(&self, body: &str, location: &LocationKey) -> Result<Observation, ProviderError> {
        let response: OwmResponse = serde_json::from_str(body)
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let condition = response
            .weather
            .first()
            .map(|w| title_case(&w.description))
            .ok_or_else(|| ProviderError::InvalidResponse("empty weather array".to_string()))?;

        if !(0.0..=100.0).contains(&response.main.humidity) {
            return Err(ProviderError::InvalidResponse(format!(
                "humidity out of range: {}",
                response.main.humidity
            )));
        }

        let wind = response.wind.and_then(|w| w.speed).unwrap_or(0.0);
        if wind < 0.0 || !wind.is_finite() {
            return Err(ProviderError::InvalidResponse(format!("invalid wind speed: {}", wind)));
        }

        let name = if response.name.trim().is_empty() {
            location.display().to_string()
        } else {
            response.name
        };

        Ok(Observation {
            name,
            temperature: self.settings.units.temperature(response.main.temp),
            condition,
            humidity_percent: response.main.humidity.round() as u8,
            wind_speed: self.settings.units.wind_speed(wind),
        })
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherMapProvider {
    #[instrument(skip_all, fields(location = %location), level = "info")]
    async fn current(&self, location: &LocationKey) -> Result<Observation, ProviderError> {
        let Some(api_key) = self.settings.api_key.as_deref().filter(|k| !k.trim().is_empty())
        else {
            tracing::debug!("No weather API key configured");
            return Err(ProviderError::Unauthorized);
        };

        let response = self
            .client
            .get(&self.settings.base_url)
            .query(&[
                ("q", location.display()),
                ("appid", api_key),
                ("units", self.settings.units.as_query()),
            ])
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!("Weather provider returned status {}", status);
            return Err(classify_status(status));
        }

        let body = response.text().await.map_err(classify_transport_error)?;
        let observation = self.parse(&body, location)?;
        tracing::info!("Fetched weather for {} from provider", observation.name);
        Ok(observation)
    }
}

fn classify_status(status: StatusCode) -> ProviderError {
    match status {
        StatusCode::NOT_FOUND => ProviderError::NotFound,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Unauthorized,
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => ProviderError::Timeout,
        _ => ProviderError::Unavailable {
            status: status.as_u16(),
        },
    }
}

fn classify_transport_error(error: reqwest::Error) -> ProviderError {
    if error.is_timeout() {
        ProviderError::Timeout
    } else {
        ProviderError::Network(error)
    }
}

/// "light rain" -> "Light Rain"
fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
