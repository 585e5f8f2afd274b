//! Centralized error types for the Wayfare application.
//!
//! Domain errors from `wayfare-weather` are wrapped rather than re-declared.
//! Every variant maps to a short user-facing message.

use thiserror::Error;
use wayfare_weather::WeatherError;

/// Top-level application error type.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Weather error: {0}")]
    Weather(#[from] WeatherError),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Returns a user-friendly message suitable for display.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Config(e) => e.user_message(),
            AppError::Weather(e) => e.user_message(),
            AppError::Other(_) => "An unexpected error occurred. Please try again.",
        }
    }
}

impl From<wayfare_weather::StorageError> for AppError {
    fn from(e: wayfare_weather::StorageError) -> Self {
        AppError::Weather(WeatherError::Storage(e))
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not determine the user configuration directory")]
    NoConfigDir,

    #[error("Failed to read configuration: {0}")]
    Read(String),

    #[error("Configuration parse error: {0}")]
    Parse(String),

    #[error("Failed to write configuration: {0}")]
    Write(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::NoConfigDir => "Could not find a place to store settings.",
            ConfigError::Read(_) => "Configuration could not be read. Check file permissions.",
            ConfigError::Parse(_) => "Configuration file is malformed. Check your settings.",
            ConfigError::Write(_) => "Failed to save settings. Please try again.",
            ConfigError::Invalid(_) => "Invalid configuration. Check your settings.",
        }
    }
}

impl From<config::ConfigError> for ConfigError {
    fn from(e: config::ConfigError) -> Self {
        match e {
            config::ConfigError::Foreign(inner) => ConfigError::Read(inner.to_string()),
            other => ConfigError::Parse(other.to_string()),
        }
    }
}
