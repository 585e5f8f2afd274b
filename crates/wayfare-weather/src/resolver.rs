//! Cache-first weather resolution.
//!
//! `resolve` serves a fresh cache entry when there is one, otherwise asks the
//! provider and stores the result. Auth/configuration failures degrade to a
//! mock reading that is never cached, so the next lookup tries the provider
//! again. There is no retry and no de-duplication of concurrent lookups.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::instrument;

use crate::cache::WeatherCache;
use crate::location::LocationKey;
use crate::mock::mock_reading;
use crate::provider::{Observation, WeatherProvider};
use crate::types::{ProviderError, ReadingSource, WeatherError, WeatherReading};

/// Upper bound on a single provider call
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

/// A resolved reading plus where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub reading: WeatherReading,
    pub source: ReadingSource,
}

/// Resolves current weather for caller-supplied location strings.
pub struct WeatherResolver {
    cache: Arc<WeatherCache>,
    provider: Arc<dyn WeatherProvider>,
    timeout: Duration,
    mock_fallback: bool,
}

impl WeatherResolver {
    pub fn new(cache: Arc<WeatherCache>, provider: Arc<dyn WeatherProvider>) -> Self {
        Self {
            cache,
            provider,
            timeout: DEFAULT_PROVIDER_TIMEOUT,
            mock_fallback: true,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// When disabled, provider auth failures surface as
    /// [`WeatherError::Unauthorized`] instead of a placeholder reading.
    pub fn with_mock_fallback(mut self, enabled: bool) -> Self {
        self.mock_fallback = enabled;
        self
    }

    /// Current weather for `location`.
    ///
    /// # Errors
    /// `EmptyLocation` for blank input, `LocationNotFound` and
    /// `ProviderTimeout` from the provider, `Storage` for cache faults.
    pub async fn resolve(&self, location: &str) -> Result<WeatherReading, WeatherError> {
        Ok(self.resolve_with_source(location).await?.reading)
    }

    /// Like [`resolve`](Self::resolve), also reporting whether the reading
    /// came from the cache, the provider, or the mock fallback.
    #[instrument(skip(self), level = "info")]
    pub async fn resolve_with_source(&self, location: &str) -> Result<Resolution, WeatherError> {
        let key = LocationKey::new(location).ok_or(WeatherError::EmptyLocation)?;

        if let Some(entry) = self.cache.get(&key)? {
            tracing::debug!("Weather cache hit: {}", key.as_str());
            return Ok(Resolution {
                reading: entry.reading,
                source: ReadingSource::Cache,
            });
        }
        tracing::debug!("Weather cache miss: {}", key.as_str());

        let outcome = match tokio::time::timeout(self.timeout, self.provider.current(&key)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout),
        };

        match outcome {
            Ok(observation) => {
                let now = self.cache.now();
                let reading = to_reading(observation, now);
                let entry = self.cache.put(&key, reading, now)?;
                Ok(Resolution {
                    reading: entry.reading,
                    source: ReadingSource::Upstream,
                })
            }
            Err(ProviderError::Unauthorized) if self.mock_fallback => {
                tracing::warn!(
                    "Weather provider rejected credentials; using mock reading for {}",
                    key.display()
                );
                Ok(Resolution {
                    reading: mock_reading(&key, self.cache.now()),
                    source: ReadingSource::Fallback,
                })
            }
            Err(e) => Err(self.classify(&key, e)),
        }
    }

    fn classify(&self, key: &LocationKey, error: ProviderError) -> WeatherError {
        match error {
            ProviderError::NotFound => WeatherError::LocationNotFound(key.display().to_string()),
            ProviderError::Timeout => {
                tracing::warn!("Weather provider timed out for {}", key.display());
                WeatherError::ProviderTimeout(self.timeout)
            }
            ProviderError::Unauthorized => WeatherError::Unauthorized,
            ProviderError::InvalidResponse(msg) => WeatherError::InvalidResponse(msg),
            ProviderError::Unavailable { status } => {
                WeatherError::Unavailable(format!("provider returned status {}", status))
            }
            ProviderError::Network(e) => WeatherError::Unavailable(e.to_string()),
        }
    }

    /// Drop the cached reading for `location`. Returns whether one existed.
    pub fn clear_location(&self, location: &str) -> Result<bool, WeatherError> {
        let key = LocationKey::new(location).ok_or(WeatherError::EmptyLocation)?;
        Ok(self.cache.delete(&key)?)
    }

    /// Remove every expired cache entry. Returns how many were removed.
    pub fn sweep_expired(&self) -> Result<usize, WeatherError> {
        Ok(self.cache.sweep_expired()?)
    }

    /// Keys of every location with a fresh cached reading.
    pub fn cached_locations(&self) -> Result<Vec<String>, WeatherError> {
        Ok(self.cache.list_locations()?)
    }

    pub fn has_cached(&self, location: &str) -> Result<bool, WeatherError> {
        let key = LocationKey::new(location).ok_or(WeatherError::EmptyLocation)?;
        Ok(self.cache.contains(&key)?)
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Normalize a provider observation to Celsius and km/h.
fn to_reading(observation: Observation, observed_at: DateTime<Utc>) -> WeatherReading {
    WeatherReading {
        location: observation.name,
        temperature_celsius: round1(observation.temperature.to_celsius()),
        condition: observation.condition,
        humidity_percent: observation.humidity_percent.min(100),
        wind_speed_kph: round1(observation.wind_speed.to_kph().max(0.0)),
        observed_at,
    }
}
