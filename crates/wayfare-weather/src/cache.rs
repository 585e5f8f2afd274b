//! SQLite-backed weather cache.
//!
//! One row per normalized location. Entries older than [`FRESHNESS_WINDOW`]
//! are treated as absent: [`WeatherCache::get`] lazily deletes them and
//! [`WeatherCache::sweep_expired`] removes them in bulk.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::location::LocationKey;
use crate::types::{CacheEntry, StorageError, WeatherReading};

/// How long a cached reading stays fresh. An entry exactly this old is stale.
pub const FRESHNESS_WINDOW: Duration = Duration::from_secs(30 * 60);

const SELECT_COLUMNS: &str = "location, reading_location, temperature_celsius, condition, \
     humidity_percent, wind_speed_kph, observed_at, cached_at";

/// Persistent store for the most recent reading per location.
///
/// Construct once and share by `Arc`. Every operation holds the connection
/// lock for its full duration, so a read-then-delete on one key cannot
/// interleave with a write to the same key.
pub struct WeatherCache {
    conn: Mutex<Connection>,
    clock: Arc<dyn Clock>,
}

/// Field checks shared by the write path and the read path.
fn reading_defect(
    humidity_percent: i64,
    temperature_celsius: f64,
    wind_speed_kph: f64,
) -> Option<&'static str> {
    if !(0..=100).contains(&humidity_percent) {
        Some("humidity out of range")
    } else if !temperature_celsius.is_finite() {
        Some("temperature is not finite")
    } else if !wind_speed_kph.is_finite() || wind_speed_kph < 0.0 {
        Some("wind speed out of range")
    } else {
        None
    }
}

/// Raw column values, validated into a [`CacheEntry`] outside the row callback.
struct CacheRow {
    location: String,
    reading_location: String,
    temperature_celsius: f64,
    condition: String,
    humidity_percent: i64,
    wind_speed_kph: f64,
    observed_at_ms: i64,
    cached_at_ms: i64,
}

impl CacheRow {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            location: row.get(0)?,
            reading_location: row.get(1)?,
            temperature_celsius: row.get(2)?,
            condition: row.get(3)?,
            humidity_percent: row.get(4)?,
            wind_speed_kph: row.get(5)?,
            observed_at_ms: row.get(6)?,
            cached_at_ms: row.get(7)?,
        })
    }

    fn into_entry(self) -> Result<CacheEntry, StorageError> {
        let corrupt = |reason: &str| StorageError::CorruptRow {
            location: self.location.clone(),
            reason: reason.to_string(),
        };

        if let Some(reason) =
            reading_defect(self.humidity_percent, self.temperature_celsius, self.wind_speed_kph)
        {
            return Err(corrupt(reason));
        }
        let humidity_percent =
            u8::try_from(self.humidity_percent).map_err(|_| corrupt("humidity out of range"))?;
        let observed_at = DateTime::from_timestamp_millis(self.observed_at_ms)
            .ok_or_else(|| corrupt("invalid observed_at"))?;
        let cached_at = DateTime::from_timestamp_millis(self.cached_at_ms)
            .ok_or_else(|| corrupt("invalid cached_at"))?;

        Ok(CacheEntry {
            location: self.location,
            reading: WeatherReading {
                location: self.reading_location,
                temperature_celsius: self.temperature_celsius,
                condition: self.condition,
                humidity_percent,
                wind_speed_kph: self.wind_speed_kph,
                observed_at,
            },
            cached_at,
        })
    }
}

impl WeatherCache {
    /// Open (or create) the cache database at the given path.
    pub fn open<P: AsRef<Path>>(path: P, clock: Arc<dyn Clock>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        tracing::debug!("Opened weather cache at {}", path.display());
        Self::with_connection(conn, clock)
    }

    /// Create an in-memory cache.
    pub fn in_memory(clock: Arc<dyn Clock>) -> Result<Self, StorageError> {
        Self::with_connection(Connection::open_in_memory()?, clock)
    }

    fn with_connection(conn: Connection, clock: Arc<dyn Clock>) -> Result<Self, StorageError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS weather_cache (
                location TEXT PRIMARY KEY,
                reading_location TEXT NOT NULL,
                temperature_celsius REAL NOT NULL,
                condition TEXT NOT NULL,
                humidity_percent INTEGER NOT NULL,
                wind_speed_kph REAL NOT NULL,
                observed_at INTEGER NOT NULL,
                cached_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_weather_cache_cached_at ON weather_cache(cached_at);
            "#,
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
            clock,
        })
    }

    /// Current time according to the cache's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Whether an entry written at `cached_at` is still fresh at `now`.
    pub fn is_fresh(cached_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        cached_at.timestamp_millis() > Self::stale_cutoff_ms(now)
    }

    /// Rows with `cached_at <= cutoff` are stale.
    fn stale_cutoff_ms(now: DateTime<Utc>) -> i64 {
        now.timestamp_millis() - FRESHNESS_WINDOW.as_millis() as i64
    }

    fn select(conn: &Connection, key: &str) -> Result<Option<CacheEntry>, StorageError> {
        let sql = format!("SELECT {} FROM weather_cache WHERE location = ?1", SELECT_COLUMNS);
        let row = conn
            .query_row(&sql, params![key], CacheRow::from_row)
            .optional()?;
        row.map(CacheRow::into_entry).transpose()
    }

    fn delete_if_stale(conn: &Connection, key: &str, cutoff_ms: i64) -> Result<bool, StorageError> {
        let removed = conn.execute(
            "DELETE FROM weather_cache WHERE location = ?1 AND cached_at <= ?2",
            params![key, cutoff_ms],
        )?;
        Ok(removed > 0)
    }

    /// Read an entry regardless of freshness. Never writes.
    pub fn peek(&self, key: &LocationKey) -> Result<Option<CacheEntry>, StorageError> {
        let conn = self.conn.lock();
        Self::select(&conn, key.as_str())
    }

    /// Delete the entry for `key` only if it is stale right now.
    ///
    /// Returns whether a row was removed. A row refreshed since it was last
    /// read is left alone.
    pub fn evict_if_stale(&self, key: &LocationKey) -> Result<bool, StorageError> {
        let conn = self.conn.lock();
        let removed = Self::delete_if_stale(&conn, key.as_str(), Self::stale_cutoff_ms(self.now()))?;
        if removed {
            tracing::debug!("Evicted stale weather cache entry: {}", key.as_str());
        }
        Ok(removed)
    }

    /// Look up a fresh entry.
    ///
    /// A stale entry is deleted as a side effect and reported as absent.
    pub fn get(&self, key: &LocationKey) -> Result<Option<CacheEntry>, StorageError> {
        let conn = self.conn.lock();
        let now = self.now();

        let Some(entry) = Self::select(&conn, key.as_str())? else {
            return Ok(None);
        };

        if Self::is_fresh(entry.cached_at, now) {
            return Ok(Some(entry));
        }

        Self::delete_if_stale(&conn, key.as_str(), Self::stale_cutoff_ms(now))?;
        tracing::debug!("Weather cache entry expired: {}", key.as_str());
        Ok(None)
    }

    /// Insert or fully overwrite the entry for `key`.
    ///
    /// Timestamps are stored at millisecond precision; the returned entry
    /// reflects exactly what a later `get` will read back. A reading with
    /// out-of-range fields is rejected before anything is written.
    pub fn put(
        &self,
        key: &LocationKey,
        reading: WeatherReading,
        cached_at: DateTime<Utc>,
    ) -> Result<CacheEntry, StorageError> {
        if let Some(reason) = reading_defect(
            i64::from(reading.humidity_percent),
            reading.temperature_celsius,
            reading.wind_speed_kph,
        ) {
            return Err(StorageError::InvalidReading {
                location: key.as_str().to_string(),
                reason: reason.to_string(),
            });
        }

        let observed_at_ms = reading.observed_at.timestamp_millis();
        let cached_at_ms = cached_at.timestamp_millis();

        let conn = self.conn.lock();
        conn.execute(
            r#"
            INSERT INTO weather_cache
            (location, reading_location, temperature_celsius, condition, humidity_percent, wind_speed_kph, observed_at, cached_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(location) DO UPDATE SET
                reading_location = excluded.reading_location,
                temperature_celsius = excluded.temperature_celsius,
                condition = excluded.condition,
                humidity_percent = excluded.humidity_percent,
                wind_speed_kph = excluded.wind_speed_kph,
                observed_at = excluded.observed_at,
                cached_at = excluded.cached_at
            "#,
            params![
                key.as_str(),
                reading.location,
                reading.temperature_celsius,
                reading.condition,
                reading.humidity_percent,
                reading.wind_speed_kph,
                observed_at_ms,
                cached_at_ms,
            ],
        )?;
        tracing::debug!("Stored weather cache entry: {}", key.as_str());

        let entry = CacheRow {
            location: key.as_str().to_string(),
            reading_location: reading.location,
            temperature_celsius: reading.temperature_celsius,
            condition: reading.condition,
            humidity_percent: i64::from(reading.humidity_percent),
            wind_speed_kph: reading.wind_speed_kph,
            observed_at_ms,
            cached_at_ms,
        };
        entry.into_entry()
    }

    /// Remove the entry for `key`. Returns whether a row was removed.
    pub fn delete(&self, key: &LocationKey) -> Result<bool, StorageError> {
        let conn = self.conn.lock();
        let removed = conn.execute(
            "DELETE FROM weather_cache WHERE location = ?1",
            params![key.as_str()],
        )?;
        if removed > 0 {
            tracing::debug!("Deleted weather cache entry: {}", key.as_str());
        }
        Ok(removed > 0)
    }

    /// Delete every stale entry. Returns the number removed.
    pub fn sweep_expired(&self) -> Result<usize, StorageError> {
        let conn = self.conn.lock();
        let removed = conn.execute(
            "DELETE FROM weather_cache WHERE cached_at <= ?1",
            params![Self::stale_cutoff_ms(self.now())],
        )?;
        tracing::info!("Swept {} expired weather cache entries", removed);
        Ok(removed)
    }

    /// Keys of all entries that `get` would currently return, sorted.
    pub fn list_locations(&self) -> Result<Vec<String>, StorageError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT location FROM weather_cache WHERE cached_at > ?1 ORDER BY location",
        )?;
        let rows = stmt.query_map(params![Self::stale_cutoff_ms(self.now())], |row| row.get(0))?;
        Ok(rows.collect::<Result<Vec<String>, _>>()?)
    }

    /// Whether a fresh entry exists. Evicts a stale one like `get`.
    pub fn contains(&self, key: &LocationKey) -> Result<bool, StorageError> {
        Ok(self.get(key)?.is_some())
    }

    /// Number of rows, fresh or not.
    pub fn row_count(&self) -> Result<usize, StorageError> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM weather_cache", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{Duration as ChronoDuration, TimeZone};

    fn start_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap()
    }

    fn create_test_cache() -> (Arc<ManualClock>, WeatherCache) {
        let clock = Arc::new(ManualClock::new(start_time()));
        let cache = WeatherCache::in_memory(clock.clone()).expect("Failed to create in-memory cache");
        (clock, cache)
    }

    fn key(raw: &str) -> LocationKey {
        LocationKey::new(raw).unwrap()
    }

    fn reading(location: &str, temperature_celsius: f64, condition: &str) -> WeatherReading {
        WeatherReading {
            location: location.to_string(),
            temperature_celsius,
            condition: condition.to_string(),
            humidity_percent: 70,
            wind_speed_kph: 10.0,
            observed_at: start_time(),
        }
    }

    #[test]
    fn test_put_and_get() {
        let (_clock, cache) = create_test_cache();
        let berlin = key("Berlin");

        let stored = cache.put(&berlin, reading("Berlin", 18.0, "Cloudy"), start_time()).unwrap();
        assert_eq!(stored.location, "berlin");
        assert_eq!(stored.cached_at, start_time());

        let fetched = cache.get(&berlin).unwrap().unwrap();
        assert_eq!(fetched, stored);
    }

    #[test]
    fn test_get_missing() {
        let (_clock, cache) = create_test_cache();
        assert!(cache.get(&key("Atlantis")).unwrap().is_none());
    }

    #[test]
    fn test_freshness_boundary() {
        let (clock, cache) = create_test_cache();
        let paris = key("Paris");
        cache.put(&paris, reading("Paris", 21.0, "Clear"), start_time()).unwrap();

        clock.set(start_time() + ChronoDuration::minutes(29) + ChronoDuration::seconds(59));
        assert!(cache.get(&paris).unwrap().is_some());

        clock.set(start_time() + ChronoDuration::minutes(30));
        assert!(cache.get(&paris).unwrap().is_none());
        assert_eq!(cache.row_count().unwrap(), 0, "stale row should be deleted by get");
    }

    #[test]
    fn test_is_fresh_is_strict() {
        let t = start_time();
        assert!(WeatherCache::is_fresh(t, t + ChronoDuration::milliseconds(1_799_999)));
        assert!(!WeatherCache::is_fresh(t, t + ChronoDuration::minutes(30)));
    }

    #[test]
    fn test_put_overwrites_existing_entry() {
        let (clock, cache) = create_test_cache();
        let rome = key("Rome");

        cache.put(&rome, reading("Rome", 25.0, "Sunny"), start_time()).unwrap();
        clock.advance(ChronoDuration::minutes(5));
        let later = clock.now();
        cache.put(&key(" ROME "), reading("Roma", 27.5, "Hazy"), later).unwrap();

        assert_eq!(cache.row_count().unwrap(), 1);
        let entry = cache.get(&rome).unwrap().unwrap();
        assert_eq!(entry.reading.location, "Roma");
        assert_eq!(entry.reading.temperature_celsius, 27.5);
        assert_eq!(entry.reading.condition, "Hazy");
        assert_eq!(entry.cached_at, later);
    }

    #[test]
    fn test_peek_does_not_evict() {
        let (clock, cache) = create_test_cache();
        let oslo = key("Oslo");
        cache.put(&oslo, reading("Oslo", 3.0, "Snow"), start_time()).unwrap();

        clock.advance(ChronoDuration::hours(1));
        assert!(cache.peek(&oslo).unwrap().is_some());
        assert_eq!(cache.row_count().unwrap(), 1);

        assert!(cache.evict_if_stale(&oslo).unwrap());
        assert!(cache.peek(&oslo).unwrap().is_none());
    }

    #[test]
    fn test_evict_if_stale_keeps_refreshed_row() {
        let (clock, cache) = create_test_cache();
        let lima = key("Lima");
        cache.put(&lima, reading("Lima", 19.0, "Mist"), start_time()).unwrap();

        clock.advance(ChronoDuration::minutes(45));
        cache.put(&lima, reading("Lima", 20.0, "Mist"), clock.now()).unwrap();

        assert!(!cache.evict_if_stale(&lima).unwrap());
        assert_eq!(cache.get(&lima).unwrap().unwrap().reading.temperature_celsius, 20.0);
    }

    #[test]
    fn test_delete() {
        let (_clock, cache) = create_test_cache();
        let cairo = key("Cairo");
        cache.put(&cairo, reading("Cairo", 33.0, "Sunny"), start_time()).unwrap();

        assert!(cache.delete(&cairo).unwrap());
        assert!(!cache.delete(&cairo).unwrap());
        assert!(cache.get(&cairo).unwrap().is_none());
    }

    #[test]
    fn test_sweep_expired() {
        let (clock, cache) = create_test_cache();
        let now = start_time() + ChronoDuration::hours(2);

        cache.put(&key("Old One"), reading("Old One", 1.0, "Clear"), now - ChronoDuration::minutes(90)).unwrap();
        cache.put(&key("Old Two"), reading("Old Two", 2.0, "Clear"), now - ChronoDuration::minutes(31)).unwrap();
        cache.put(&key("Boundary"), reading("Boundary", 3.0, "Clear"), now - ChronoDuration::minutes(30)).unwrap();
        cache.put(&key("Fresh One"), reading("Fresh One", 4.0, "Clear"), now - ChronoDuration::minutes(29)).unwrap();
        cache.put(&key("Fresh Two"), reading("Fresh Two", 5.0, "Clear"), now).unwrap();

        clock.set(now);
        assert_eq!(cache.sweep_expired().unwrap(), 3);
        assert_eq!(cache.list_locations().unwrap(), vec!["fresh one", "fresh two"]);
        assert_eq!(cache.sweep_expired().unwrap(), 0);
        assert_eq!(cache.row_count().unwrap(), 2);
    }

    #[test]
    fn test_list_locations_skips_stale_entries() {
        let (clock, cache) = create_test_cache();
        cache.put(&key("Tokyo"), reading("Tokyo", 16.0, "Rain"), start_time()).unwrap();
        clock.advance(ChronoDuration::minutes(20));
        cache.put(&key("Seoul"), reading("Seoul", 14.0, "Clear"), clock.now()).unwrap();

        clock.advance(ChronoDuration::minutes(15));
        assert_eq!(cache.list_locations().unwrap(), vec!["seoul"]);
        // listing never deletes
        assert_eq!(cache.row_count().unwrap(), 2);
    }

    #[test]
    fn test_contains() {
        let (clock, cache) = create_test_cache();
        let quito = key("Quito");
        assert!(!cache.contains(&quito).unwrap());

        cache.put(&quito, reading("Quito", 13.0, "Drizzle"), start_time()).unwrap();
        assert!(cache.contains(&quito).unwrap());

        clock.advance(ChronoDuration::minutes(31));
        assert!(!cache.contains(&quito).unwrap());
        assert_eq!(cache.row_count().unwrap(), 0);
    }

    #[test]
    fn test_berlin_end_to_end() {
        let (clock, cache) = create_test_cache();
        let berlin = key("Berlin");
        let stored = cache.put(&berlin, reading("Berlin", 18.0, "cloudy"), clock.now()).unwrap();

        clock.set(start_time() + ChronoDuration::minutes(10));
        let entry = cache.get(&berlin).unwrap().unwrap();
        assert_eq!(entry.reading, stored.reading);
        assert_eq!(entry.reading.humidity_percent, 70);
        assert_eq!(entry.reading.wind_speed_kph, 10.0);

        clock.set(start_time() + ChronoDuration::minutes(31));
        assert!(cache.get(&berlin).unwrap().is_none());
    }

    #[test]
    fn test_rejected_put_writes_nothing() {
        let (_clock, cache) = create_test_cache();
        let berlin = key("Berlin");
        let mut bad = reading("Berlin", 18.0, "Cloudy");
        bad.humidity_percent = 150;
        bad.wind_speed_kph = -3.0;

        let result = cache.put(&berlin, bad, start_time());
        assert!(matches!(result, Err(StorageError::InvalidReading { .. })));
        assert_eq!(cache.row_count().unwrap(), 0);
        assert!(cache.get(&berlin).unwrap().is_none());
    }

    #[test]
    fn test_rejected_put_keeps_previous_entry() {
        let (_clock, cache) = create_test_cache();
        let madrid = key("Madrid");
        cache.put(&madrid, reading("Madrid", 30.0, "Sunny"), start_time()).unwrap();

        let mut bad = reading("Madrid", 31.0, "Sunny");
        bad.wind_speed_kph = f64::INFINITY;
        assert!(cache.put(&madrid, bad, start_time()).is_err());

        let entry = cache.get(&madrid).unwrap().unwrap();
        assert_eq!(entry.reading.temperature_celsius, 30.0);
    }

    #[test]
    fn test_corrupt_row_is_reported_on_read() {
        let (_clock, cache) = create_test_cache();
        cache
            .conn
            .lock()
            .execute(
                "INSERT INTO weather_cache VALUES ('oslo', 'Oslo', 2.0, 'Snow', 140, 5.0, ?1, ?1)",
                params![start_time().timestamp_millis()],
            )
            .unwrap();

        match cache.get(&key("Oslo")) {
            Err(StorageError::CorruptRow { location, reason }) => {
                assert_eq!(location, "oslo");
                assert_eq!(reason, "humidity out of range");
            }
            other => panic!("expected CorruptRow, got {:?}", other),
        }
    }

    #[test]
    fn test_open_persists_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("weather.db");
        let clock = Arc::new(ManualClock::new(start_time()));

        {
            let cache = WeatherCache::open(&path, clock.clone()).unwrap();
            cache.put(&key("Lisbon"), reading("Lisbon", 22.0, "Clear"), start_time()).unwrap();
        }

        let reopened = WeatherCache::open(&path, clock).unwrap();
        let entry = reopened.get(&key("lisbon")).unwrap().unwrap();
        assert_eq!(entry.reading.location, "Lisbon");
    }
}
