//! Application configuration
//!
//! Layers, lowest precedence first:
//!
//! 1. built-in defaults
//! 2. optional TOML file (`--config`)
//! 3. environment, `ORDERCACHE__SECTION__KEY` (e.g. `ORDERCACHE__SERVER__PORT=9000`)
//!
//! Command-line flags are applied on top by the binary.

use crate::cache::DEFAULT_SHARD_COUNT;
use crate::error::{Error, Result};
use crate::server::ServerConfig;
use crate::storage::ItemPolicy;
use crate::warmup::DEFAULT_WARMUP_WINDOW;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable prefix
pub const ENV_PREFIX: &str = "ORDERCACHE";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub warmup: WarmupConfig,
    pub storage: StorageConfig,
    pub ingest: IngestConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Number of shards, a power of two
    pub shard_count: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            shard_count: DEFAULT_SHARD_COUNT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarmupConfig {
    pub enabled: bool,
    /// How many of the most recent orders to load
    pub window: usize,
}

impl Default for WarmupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window: DEFAULT_WARMUP_WINDOW,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    File,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Data directory for the file backend
    pub path: Option<PathBuf>,
    pub item_policy: ItemPolicy,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// File with one order per line, `-` for stdin. Ingestion is off when unset.
    pub input: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Directory for daily rolling log files
    pub dir: Option<PathBuf>,
    pub json: bool,
    pub no_color: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: None,
            json: false,
            no_color: false,
        }
    }
}

impl AppConfig {
    /// Load defaults, then `path` if given, then the environment
    ///
    /// The result is not validated; callers apply their own overrides first
    /// and then call [`AppConfig::validate`].
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    pub(crate) fn load_with_prefix(path: Option<&Path>, prefix: &str) -> Result<Self> {
        let defaults = Config::try_from(&AppConfig::default()).map_err(config_error)?;
        let mut builder = Config::builder().add_source(defaults);

        if let Some(path) = path {
            builder = builder.add_source(
                File::from(path)
                    .format(FileFormat::Toml)
                    .required(true),
            );
        }

        builder = builder.add_source(
            Environment::with_prefix(prefix)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(config_error)?;
        Ok(config)
    }

    /// Reject settings the service cannot run with
    pub fn validate(&self) -> Result<()> {
        let shards = self.cache.shard_count;
        if shards == 0 || !shards.is_power_of_two() {
            return Err(Error::Config(format!(
                "cache.shard_count must be a power of two, got {}",
                shards
            )));
        }
        if self.warmup.window == 0 {
            return Err(Error::Config("warmup.window must be at least 1".to_string()));
        }
        if self.storage.backend == StorageBackend::File && self.storage.path.is_none() {
            return Err(Error::Config(
                "storage.path is required for the file backend".to_string(),
            ));
        }
        if self.server.timeout_secs == 0 {
            return Err(Error::Config("server.timeout_secs must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Effective configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }
}

fn config_error(e: config::ConfigError) -> Error {
    Error::Config(e.to_string())
}
