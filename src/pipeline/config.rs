//! Pipeline configuration from environment variables

use super::locations::LocationTable;
use std::env;
use std::time::Duration;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid TRACKED_LOCATIONS entry '{0}' (expected id:Name)")]
    InvalidLocation(String),

    #[error("TRACKED_LOCATIONS must name at least one market")]
    NoLocations,

    #[error("FLUSH_INTERVAL_MS must be greater than zero")]
    ZeroInterval,

    #[error("INGEST_CHANNEL_BUFFER must be greater than zero")]
    ZeroBuffer,
}

/// Configuration for pipeline runtime
///
/// Loaded from environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Path to SQLite database file
    pub db_path: String,

    /// Directory holding the .sql schema files
    pub schema_dir: String,

    /// NATS server URL
    pub nats_url: String,

    /// Subject carrying market order payloads
    pub nats_subject: String,

    /// Flush window length
    pub flush_interval: Duration,

    /// Channel buffer between the source pump and ingestion (payloads)
    pub channel_buffer: usize,

    /// Item name dump (JSON)
    pub catalog_path: String,

    /// Tracked markets (allow-list and display names)
    pub locations: LocationTable,
}

impl PipelineConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `MARKETFLUSH_DB_PATH` (default: marketflush.db)
    /// - `MARKETFLUSH_SCHEMA_DIR` (default: sql)
    /// - `NATS_URL` (default: nats://localhost:4222)
    /// - `NATS_SUBJECT` (default: marketorders.deduped)
    /// - `FLUSH_INTERVAL_MS` (default: 1000)
    /// - `INGEST_CHANNEL_BUFFER` (default: 10000)
    /// - `ITEM_CATALOG_PATH` (default: items.json)
    /// - `TRACKED_LOCATIONS` (default: royal cities, Caerleon, Brecilien, Black Market)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as `from_env` with an injectable variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let flush_interval_ms = parse_or(&lookup, "FLUSH_INTERVAL_MS", 1_000u64);
        if flush_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval);
        }

        let channel_buffer = parse_or(&lookup, "INGEST_CHANNEL_BUFFER", 10_000usize);
        if channel_buffer == 0 {
            return Err(ConfigError::ZeroBuffer);
        }

        let locations = match lookup("TRACKED_LOCATIONS") {
            Some(raw) => parse_locations(&raw)?,
            None => LocationTable::default_markets(),
        };

        Ok(Self {
            db_path: lookup("MARKETFLUSH_DB_PATH").unwrap_or_else(|| "marketflush.db".to_string()),
            schema_dir: lookup("MARKETFLUSH_SCHEMA_DIR").unwrap_or_else(|| "sql".to_string()),
            nats_url: lookup("NATS_URL").unwrap_or_else(|| "nats://localhost:4222".to_string()),
            nats_subject: lookup("NATS_SUBJECT").unwrap_or_else(|| "marketorders.deduped".to_string()),
            flush_interval: Duration::from_millis(flush_interval_ms),
            channel_buffer,
            catalog_path: lookup("ITEM_CATALOG_PATH").unwrap_or_else(|| "items.json".to_string()),
            locations,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + std::fmt::Display,
{
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            log::warn!("Invalid {} '{}', defaulting to {}", key, raw, default);
            default
        }),
    }
}

/// Parse `"3005:Caerleon,7:Thetford"` into a location table
fn parse_locations(raw: &str) -> Result<LocationTable, ConfigError> {
    let mut entries = Vec::new();

    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (id, name) = entry
            .split_once(':')
            .map(|(id, name)| (id.trim(), name.trim()))
            .filter(|(id, name)| !id.is_empty() && !name.is_empty())
            .ok_or_else(|| ConfigError::InvalidLocation(entry.to_string()))?;
        entries.push((id.to_string(), name.to_string()));
    }

    if entries.is_empty() {
        return Err(ConfigError::NoLocations);
    }
    Ok(LocationTable::new(entries))
}
