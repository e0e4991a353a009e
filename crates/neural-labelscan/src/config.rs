//! Configuration for the label scan store.
//!
//! Values come from three layers:
//! - Default values (embedded in binary)
//! - Configuration files (TOML format)
//! - Environment variable overrides (prefix: `NGDB__`)
//!
//! # Environment Variables
//!
//! - `NGDB__STORAGE__STORE_DIR=/var/lib/neuralgraph`
//! - `NGDB__LABEL_SCAN__REBUILD_BATCH_SIZE=50000`
//! - `NGDB__LABEL_SCAN__REBUILD_ON_CORRUPTION=true`
//! - `NGDB__LOGGING__LEVEL=debug`
//!
//! Extension factories do not read [`LabelScanConfig`] directly. They go
//! through [`ConfigLookup`], the key/value view the host hands out, and
//! parse the keys they need with [`LabelScanSettings::from_lookup`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Key of the database root directory.
pub const STORE_DIR: &str = "storage.store_dir";
/// Key of the number of nodes written between rebuild commits.
pub const REBUILD_BATCH_SIZE: &str = "label_scan.rebuild_batch_size";
/// Key of the tantivy writer memory budget.
pub const WRITER_HEAP_BYTES: &str = "label_scan.writer_heap_bytes";
/// Key of the delete-and-rebuild fallback for corrupt indexes.
pub const REBUILD_ON_CORRUPTION: &str = "label_scan.rebuild_on_corruption";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Missing configuration value '{0}'")]
    Missing(&'static str),

    #[error("Invalid value '{value}' for '{key}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Key/value view of the host configuration.
pub trait ConfigLookup: Send + Sync {
    /// Returns the raw value for `key`, if set.
    fn get(&self, key: &str) -> Option<String>;
}

impl ConfigLookup for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelScanConfig {
    /// Storage configuration
    pub storage: StorageConfig,
    /// Label scan store tuning
    pub label_scan: LabelScanSettings,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl LabelScanConfig {
    /// Loads configuration from an optional file path with environment variable overrides.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (NGDB__*)
    /// 2. Configuration file (if provided)
    /// 3. Built-in defaults
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(file_path) = path {
            if Path::new(file_path).exists() {
                let contents = std::fs::read_to_string(file_path)?;
                config = toml::from_str(&contents)?;
            }
        }

        config.apply_env_overrides();

        Ok(config)
    }

    /// Applies environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("NGDB__STORAGE__STORE_DIR") {
            self.storage.store_dir = val;
        }

        if let Ok(val) = std::env::var("NGDB__LABEL_SCAN__REBUILD_BATCH_SIZE") {
            if let Ok(v) = val.parse() {
                self.label_scan.rebuild_batch_size = v;
            }
        }
        if let Ok(val) = std::env::var("NGDB__LABEL_SCAN__WRITER_HEAP_BYTES") {
            if let Ok(v) = val.parse() {
                self.label_scan.writer_heap_bytes = v;
            }
        }
        if let Ok(val) = std::env::var("NGDB__LABEL_SCAN__REBUILD_ON_CORRUPTION") {
            self.label_scan.rebuild_on_corruption = val.to_lowercase() == "true" || val == "1";
        }

        if let Ok(val) = std::env::var("NGDB__LOGGING__LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("NGDB__LOGGING__JSON") {
            self.logging.json = val.to_lowercase() == "true" || val == "1";
        }
    }

    /// Serializes the configuration to TOML format.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl ConfigLookup for LabelScanConfig {
    fn get(&self, key: &str) -> Option<String> {
        match key {
            STORE_DIR => Some(self.storage.store_dir.clone()),
            REBUILD_BATCH_SIZE => Some(self.label_scan.rebuild_batch_size.to_string()),
            WRITER_HEAP_BYTES => Some(self.label_scan.writer_heap_bytes.to_string()),
            REBUILD_ON_CORRUPTION => Some(self.label_scan.rebuild_on_corruption.to_string()),
            "logging.level" => Some(self.logging.level.clone()),
            "logging.json" => Some(self.logging.json.to_string()),
            _ => None,
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database root directory; indexes live under `<store_dir>/schema`
    pub store_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            store_dir: "data".to_string(),
        }
    }
}

impl StorageConfig {
    /// Resolves the database root directory from a lookup.
    pub fn store_dir(lookup: &dyn ConfigLookup) -> Result<PathBuf, ConfigError> {
        match lookup.get(STORE_DIR) {
            Some(dir) if !dir.trim().is_empty() => Ok(PathBuf::from(dir)),
            Some(dir) => Err(ConfigError::Invalid {
                key: STORE_DIR,
                value: dir,
                reason: "must not be empty".into(),
            }),
            None => Err(ConfigError::Missing(STORE_DIR)),
        }
    }
}

/// Label scan store tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelScanSettings {
    /// Nodes written between commits during a full rebuild
    pub rebuild_batch_size: usize,
    /// Memory budget of the tantivy index writer
    pub writer_heap_bytes: usize,
    /// Delete and rebuild a corrupt index at startup instead of failing
    pub rebuild_on_corruption: bool,
}

impl Default for LabelScanSettings {
    fn default() -> Self {
        Self {
            rebuild_batch_size: 10_000,
            writer_heap_bytes: 50_000_000,
            rebuild_on_corruption: false,
        }
    }
}

impl LabelScanSettings {
    /// Reads the settings from a lookup, falling back to defaults for unset keys.
    pub fn from_lookup(lookup: &dyn ConfigLookup) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let settings = Self {
            rebuild_batch_size: parse_or(lookup, REBUILD_BATCH_SIZE, defaults.rebuild_batch_size)?,
            writer_heap_bytes: parse_or(lookup, WRITER_HEAP_BYTES, defaults.writer_heap_bytes)?,
            rebuild_on_corruption: parse_or(
                lookup,
                REBUILD_ON_CORRUPTION,
                defaults.rebuild_on_corruption,
            )?,
        };

        if settings.rebuild_batch_size == 0 {
            return Err(ConfigError::Invalid {
                key: REBUILD_BATCH_SIZE,
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }

        Ok(settings)
    }
}

fn parse_or<T>(lookup: &dyn ConfigLookup, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup.get(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Use JSON format for log output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
