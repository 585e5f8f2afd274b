use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;
use wayfare_weather::{ProviderSettings, Units};

use crate::error::ConfigError;

const APP_DIR: &str = "wayfare";
const ENV_PREFIX: &str = "WAYFARE";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Weather cache storage
    pub database: DatabaseConfig,

    /// Upstream weather provider
    pub weather: WeatherConfig,

    /// Logging
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file holding the weather cache
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR)
                .join("travel_app.db"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    /// OpenWeatherMap API key. Without one, lookups return mock readings.
    pub api_key: Option<String>,

    pub base_url: String,

    /// Unit system requested from the provider
    pub units: Units,

    /// Provider request timeout in seconds
    pub timeout_secs: u64,

    /// Serve placeholder readings when the provider rejects credentials
    pub mock_fallback: bool,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: wayfare_weather::provider::OPENWEATHERMAP_URL.to_string(),
            units: Units::Metric,
            timeout_secs: 10,
            mock_fallback: true,
        }
    }
}

impl WeatherConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn provider_settings(&self) -> ProviderSettings {
        ProviderSettings {
            api_key: self.api_key.clone(),
            base_url: self.base_url.clone(),
            units: self.units,
            timeout: self.timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `tracing` filter directive; `RUST_LOG` takes precedence
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

/// Accepts `sqlite:///relative.db`, `sqlite:////abs/path.db`, or a bare path.
fn database_path_from_url(url: &str) -> Option<PathBuf> {
    let path = url
        .strip_prefix("sqlite:///")
        .or_else(|| url.strip_prefix("sqlite://"))
        .unwrap_or(url);

    if path.is_empty() || path == ":memory:" {
        None
    } else {
        Some(PathBuf::from(path))
    }
}

impl Config {
    /// Load configuration from the default location, creating it if missing.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from `path`, layered with `WAYFARE__*` environment
    /// overrides and the legacy `WEATHER_API_KEY` / `DATABASE_URL` variables.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("Creating default config at {}", path.display());
            Self::default().save_to(path)?;
        }

        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut config: Config = settings.try_deserialize()?;
        config.apply_env_fallbacks(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Fill unset values from the legacy `WEATHER_API_KEY` and `DATABASE_URL` variables.
    fn apply_env_fallbacks(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.weather.api_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
            self.weather.api_key = lookup("WEATHER_API_KEY").filter(|k| !k.trim().is_empty());
        }

        if let Some(path) = lookup("DATABASE_URL").as_deref().and_then(database_path_from_url) {
            self.database.path = path;
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(&self.weather.base_url, "weather.base_url", &mut result);

        if self.weather.timeout_secs == 0 {
            result.add_error("weather.timeout_secs", "Timeout must be greater than 0");
        } else if self.weather.timeout_secs > 60 {
            result.add_warning(
                "weather.timeout_secs",
                "Provider timeout is unusually long (>60 seconds)",
            );
        }

        if self.weather.api_key.is_none() {
            let message = if self.weather.mock_fallback {
                "No API key configured - weather lookups will return mock readings"
            } else {
                "No API key configured and mock fallback disabled - lookups will fail"
            };
            result.add_warning("weather.api_key", message);
        }

        if self.database.path.as_os_str().is_empty() {
            result.add_error("database.path", "Database path cannot be empty");
        } else if self.database.path.is_dir() {
            result.add_error(
                "database.path",
                format!("Path is a directory: {}", self.database.path.display()),
            );
        }

        if tracing_subscriber::EnvFilter::try_new(&self.log.filter).is_err() {
            result.add_error("log.filter", format!("Invalid filter: {}", self.log.filter));
        }

        result
    }

    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write(e.to_string()))?;
        }

        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Write(e.to_string()))?;

        std::fs::write(path, contents).map_err(|e| ConfigError::Write(e.to_string()))
    }

    /// Path to the default configuration file
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?.join(APP_DIR);
        Ok(config_dir.join("config.toml"))
    }
}
