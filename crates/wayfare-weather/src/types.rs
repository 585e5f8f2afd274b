use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A single weather observation, already normalized to metric units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReading {
    /// Display name of the location (provider's canonical name for upstream readings)
    pub location: String,
    pub temperature_celsius: f64,
    /// Short description, e.g. "Light Rain"
    pub condition: String,
    /// 0-100
    pub humidity_percent: u8,
    /// Never negative
    pub wind_speed_kph: f64,
    pub observed_at: DateTime<Utc>,
}

/// A persisted reading keyed by normalized location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Normalized cache key
    pub location: String,
    pub reading: WeatherReading,
    pub cached_at: DateTime<Utc>,
}

/// Where a resolved reading came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingSource {
    /// Fresh cache entry, no upstream call made
    Cache,
    /// Fetched from the provider and written to the cache
    Upstream,
    /// Synthetic placeholder; the provider rejected or lacked credentials
    Fallback,
}

/// Cache store errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Failed to create cache directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("Corrupt cache row for '{location}': {reason}")]
    CorruptRow { location: String, reason: String },
    #[error("Refusing to cache reading for '{location}': {reason}")]
    InvalidReading { location: String, reason: String },
}

/// Upstream provider errors, classified by the provider implementation.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Location not found")]
    NotFound,
    #[error("Provider rejected credentials")]
    Unauthorized,
    #[error("Provider request timed out")]
    Timeout,
    #[error("Provider unavailable (status {status})")]
    Unavailable { status: u16 },
    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Errors surfaced by the weather resolver.
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("Location cannot be empty")]
    EmptyLocation,
    #[error("Location not found: {0}")]
    LocationNotFound(String),
    #[error("Weather provider timed out after {0:?}")]
    ProviderTimeout(Duration),
    #[error("Weather provider authentication failed")]
    Unauthorized,
    #[error("Invalid weather provider response: {0}")]
    InvalidResponse(String),
    #[error("Weather provider unavailable: {0}")]
    Unavailable(String),
    #[error("Cache error: {0}")]
    Storage(#[from] StorageError),
}

impl WeatherError {
    pub fn user_message(&self) -> &'static str {
        match self {
            WeatherError::EmptyLocation => "Please enter a location.",
            WeatherError::LocationNotFound(_) => "Location not found. Check and try again.",
            WeatherError::ProviderTimeout(_) => "The weather service timed out. Please try again.",
            WeatherError::Unauthorized => "Weather API key is invalid. Check settings.",
            WeatherError::InvalidResponse(_) => "Weather service returned unexpected data.",
            WeatherError::Unavailable(_) => {
                "Weather service unavailable. Please try again later."
            }
            WeatherError::Storage(_) => "Local weather cache error. Try restarting the app.",
        }
    }

    /// Whether the caller may reasonably retry the same lookup.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WeatherError::ProviderTimeout(_) | WeatherError::Unavailable(_))
    }
}
