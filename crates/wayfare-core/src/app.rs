use std::sync::Arc;

use wayfare_weather::{
    Clock, OpenWeatherMapProvider, SystemClock, WeatherCache, WeatherError, WeatherResolver,
};

use crate::config::Config;
use crate::error::AppError;

/// Application state: configuration and the weather resolver built from it.
pub struct App {
    config: Arc<Config>,
    resolver: WeatherResolver,
}

impl App {
    pub fn new(config: Config) -> Result<Self, AppError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Build the application with an explicit clock for cache freshness.
    pub fn with_clock(config: Config, clock: Arc<dyn Clock>) -> Result<Self, AppError> {
        tracing::info!("Opening weather cache at {}", config.database.path.display());
        let cache = Arc::new(WeatherCache::open(&config.database.path, clock)?);

        let provider = OpenWeatherMapProvider::new(config.weather.provider_settings())
            .map_err(|e| AppError::Weather(WeatherError::Unavailable(e.to_string())))?;

        if config.weather.api_key.is_none() {
            tracing::warn!("No weather API key configured; readings will be mocked");
        }

        let resolver = WeatherResolver::new(cache, Arc::new(provider))
            .with_timeout(config.weather.timeout())
            .with_mock_fallback(config.weather.mock_fallback);

        Ok(Self {
            config: Arc::new(config),
            resolver,
        })
    }

    /// Sweep expired cache rows before exit. Failures are logged, not returned.
    pub fn shutdown(&self) {
        tracing::info!("Shutting down application");

        match self.resolver.sweep_expired() {
            Ok(removed) => tracing::debug!("Removed {} expired weather entries", removed),
            Err(e) => tracing::error!("Error sweeping weather cache: {}", e),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn resolver(&self) -> &WeatherResolver {
        &self.resolver
    }
}
