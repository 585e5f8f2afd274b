//! Placeholder readings for when the provider cannot be used.
//!
//! Values are derived from the normalized key, so the same location always
//! gets the same placeholder.

use chrono::{DateTime, Utc};

use crate::location::LocationKey;
use crate::types::WeatherReading;

const MOCK_CONDITIONS: [&str; 4] = ["Sunny", "Partly Cloudy", "Cloudy", "Rainy"];

/// 64-bit FNV-1a; stable across runs and Rust versions, unlike `DefaultHasher`.
fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    bytes
        .iter()
        .fold(OFFSET_BASIS, |hash, b| (hash ^ u64::from(*b)).wrapping_mul(PRIME))
}

/// Build a deterministic placeholder reading for `location`.
pub fn mock_reading(location: &LocationKey, observed_at: DateTime<Utc>) -> WeatherReading {
    let h = fnv1a(location.as_str().as_bytes()) % 100;

    WeatherReading {
        location: location.display().to_string(),
        temperature_celsius: (15 + h % 25) as f64,
        condition: MOCK_CONDITIONS[(h % 4) as usize].to_string(),
        humidity_percent: (40 + h % 50) as u8,
        wind_speed_kph: (5 + h % 20) as f64,
        observed_at,
    }
}
