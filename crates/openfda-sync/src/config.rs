//! Connector configuration
//!
//! The connector is configured from a flat string key-value map (a JSON
//! file in the same shape the host passes at sync start) with environment
//! variables as an alternative source. Only `api_key` is required;
//! everything else has defaults.

use openfda_common::{Result, SyncError};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

// ============================================================================
// Connector Defaults
// ============================================================================

/// openFDA food-enforcement endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.fda.gov/food/enforcement.json";

/// Hard page-size ceiling imposed by the openFDA API
pub const API_MAX_LIMIT: u32 = 1000;

/// Default per-run record cap
pub const DEFAULT_MAX_RECORDS: u64 = 10_000;

/// Default pause between pages (the API allows 240 requests per minute)
pub const DEFAULT_THROTTLE_MS: u64 = 250;

/// Default HTTP request timeout
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Sync mode: fetch everything, or only records at or after the cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    /// Filter by the persisted cursor when one exists
    #[default]
    Incremental,
    /// Ignore any persisted cursor and fetch from the beginning
    Full,
}

impl std::str::FromStr for SyncMode {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "incremental" => Ok(SyncMode::Incremental),
            "full" => Ok(SyncMode::Full),
            other => Err(SyncError::config(format!(
                "invalid sync_mode '{other}', expected 'incremental' or 'full'"
            ))),
        }
    }
}

/// Connector configuration
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    /// openFDA API key (required)
    pub api_key: String,

    /// Page size, clamped to [`API_MAX_LIMIT`]
    pub limit: u32,

    /// Per-run record cap
    pub max_records: u64,

    /// Incremental or full sync
    pub sync_mode: SyncMode,

    /// Endpoint URL (overridable for testing)
    pub base_url: String,

    /// Total fetch attempts per page, including the first
    pub max_attempts: u32,

    /// Pause inserted after each successful page checkpoint
    pub throttle: Duration,
}

impl ConnectorConfig {
    /// Build a configuration with defaults around the given API key
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let config = Self {
            api_key: api_key.into(),
            limit: API_MAX_LIMIT,
            max_records: DEFAULT_MAX_RECORDS,
            sync_mode: SyncMode::default(),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_attempts: 3,
            throttle: Duration::from_millis(DEFAULT_THROTTLE_MS),
        };
        config.validate()
    }

    /// Build from a flat key-value map
    ///
    /// Recognized keys: `api_key` (required), `limit`, `max_records`,
    /// `sync_mode`, `base_url`, `max_attempts`, `throttle_ms`. Unknown
    /// keys are ignored so hosts can pass extra settings through.
    pub fn from_map(map: &BTreeMap<String, String>) -> Result<Self> {
        let api_key = map.get("api_key").cloned().unwrap_or_default();
        let mut config = Self {
            api_key,
            limit: parse_or(map, "limit", API_MAX_LIMIT)?,
            max_records: parse_or(map, "max_records", DEFAULT_MAX_RECORDS)?,
            sync_mode: match map.get("sync_mode") {
                Some(mode) => mode.parse()?,
                None => SyncMode::default(),
            },
            base_url: map
                .get("base_url")
                .cloned()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            max_attempts: parse_or(map, "max_attempts", 3)?,
            throttle: Duration::from_millis(parse_or(map, "throttle_ms", DEFAULT_THROTTLE_MS)?),
        };
        config.limit = config.limit.min(API_MAX_LIMIT);
        config.validate()
    }

    /// Load from a JSON configuration file
    ///
    /// The file is a flat JSON object; scalar values are accepted and
    /// stringified, matching the shape hosts hand to the connector.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let parsed: Value = serde_json::from_str(&raw)?;
        let object = parsed.as_object().ok_or_else(|| {
            SyncError::config(format!(
                "configuration file {} is not a JSON object",
                path.as_ref().display()
            ))
        })?;

        let mut map = BTreeMap::new();
        for (key, value) in object {
            let text = match value {
                Value::String(s) => s.clone(),
                Value::Bool(b) => b.to_string(),
                Value::Number(n) => n.to_string(),
                Value::Null => continue,
                other => {
                    return Err(SyncError::config(format!(
                        "configuration key '{key}' has unsupported value {other}"
                    )))
                },
            };
            map.insert(key.clone(), text);
        }
        Self::from_map(&map)
    }

    /// Load from environment variables
    ///
    /// - `OPENFDA_API_KEY` (required)
    /// - `OPENFDA_LIMIT`, `OPENFDA_MAX_RECORDS`, `OPENFDA_SYNC_MODE`,
    ///   `OPENFDA_BASE_URL`, `OPENFDA_MAX_ATTEMPTS`, `OPENFDA_THROTTLE_MS`
    pub fn from_env() -> Result<Self> {
        let mut map = BTreeMap::new();
        let vars = [
            ("OPENFDA_API_KEY", "api_key"),
            ("OPENFDA_LIMIT", "limit"),
            ("OPENFDA_MAX_RECORDS", "max_records"),
            ("OPENFDA_SYNC_MODE", "sync_mode"),
            ("OPENFDA_BASE_URL", "base_url"),
            ("OPENFDA_MAX_ATTEMPTS", "max_attempts"),
            ("OPENFDA_THROTTLE_MS", "throttle_ms"),
        ];
        for (var, key) in vars {
            if let Ok(value) = std::env::var(var) {
                map.insert(key.to_string(), value);
            }
        }
        Self::from_map(&map)
    }

    /// Validate required settings; runs before any network activity
    fn validate(self) -> Result<Self> {
        if self.api_key.trim().is_empty() {
            return Err(SyncError::config(
                "missing required configuration value: api_key",
            ));
        }
        if self.limit == 0 {
            return Err(SyncError::config("limit must be greater than zero"));
        }
        if self.max_attempts == 0 {
            return Err(SyncError::config("max_attempts must be greater than zero"));
        }
        Ok(self)
    }
}

fn parse_or<T>(map: &BTreeMap<String, String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
{
    match map.get(key) {
        Some(raw) => raw
            .parse()
            .map_err(|_| SyncError::config(format!("invalid value for {key}: '{raw}'"))),
        None => Ok(default),
    }
}
