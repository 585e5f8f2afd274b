//! Weather lookups for Wayfare
//!
//! Resolves current weather for a trip destination cache-first: a SQLite-backed
//! store with a fixed freshness window sits in front of an OpenWeatherMap
//! provider, and a deterministic mock reading stands in when no usable API
//! credential is configured.

pub mod cache;
pub mod clock;
pub mod location;
pub mod mock;
pub mod provider;
pub mod resolver;
pub mod types;

pub use cache::{WeatherCache, FRESHNESS_WINDOW};
pub use clock::{Clock, ManualClock, SystemClock};
pub use location::LocationKey;
pub use provider::{OpenWeatherMapProvider, ProviderSettings, Units, WeatherProvider};
pub use resolver::{Resolution, WeatherResolver, DEFAULT_PROVIDER_TIMEOUT};
pub use types::*;
