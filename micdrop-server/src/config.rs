//! Configuration loading
//!
//! Every tunable resolves in priority order:
//! 1. Command-line argument (clap also folds in `MICDROP_*` env vars)
//! 2. TOML config file
//! 3. Compiled default

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::info;

use micdrop_common::{Error, Result};

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 5750;

/// Default bind address.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default party expiry window: 24 hours of inactivity.
pub const DEFAULT_PARTY_TTL_SECONDS: u64 = 86_400;

/// Default per-party SSE broadcast channel capacity.
pub const DEFAULT_BROADCAST_CAPACITY: usize = 64;

/// Settings read from the optional TOML config file.
///
/// Every field is optional; anything absent falls through to the
/// compiled default.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub host: Option<String>,

    #[serde(default)]
    pub port: Option<u16>,

    /// Path to the SQLite database file (relative or absolute)
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    #[serde(default)]
    pub party_ttl_seconds: Option<u64>,

    /// Base URL of the catalog backend (search + track matching)
    #[serde(default)]
    pub catalog_url: Option<String>,

    #[serde(default)]
    pub broadcast_capacity: Option<usize>,
}

/// Command-line configuration overrides
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database_path: Option<PathBuf>,
    pub party_ttl_seconds: Option<u64>,
    pub catalog_url: Option<String>,
}

/// Resolved server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: PathBuf,
    pub party_ttl_seconds: u64,
    pub catalog_url: Option<String>,
    pub broadcast_capacity: usize,
}

impl Config {
    /// Load configuration from an optional TOML file plus CLI overrides.
    ///
    /// When `toml_path` is `None`, the platform config directories are
    /// searched for `micdrop/config.toml`; a missing file is not an
    /// error, the compiled defaults apply.
    pub fn load(toml_path: Option<&Path>, overrides: ConfigOverrides) -> Result<Self> {
        let toml_config = match toml_path {
            Some(path) => {
                let config = read_toml(path)?;
                info!("Loaded configuration from {:?}", path);
                config
            }
            None => match find_default_config_file() {
                Some(path) => {
                    let config = read_toml(&path)?;
                    info!("Loaded configuration from {:?}", path);
                    config
                }
                None => TomlConfig::default(),
            },
        };

        Self::merge(toml_config, overrides)
    }

    /// Merge TOML settings with CLI overrides, filling gaps from the
    /// compiled defaults.
    fn merge(toml_config: TomlConfig, overrides: ConfigOverrides) -> Result<Self> {
        let host = overrides
            .host
            .or(toml_config.host)
            .unwrap_or_else(|| DEFAULT_HOST.to_string());

        let port = overrides.port.or(toml_config.port).unwrap_or(DEFAULT_PORT);

        let database_path = overrides
            .database_path
            .or(toml_config.database_path)
            .unwrap_or_else(default_database_path);

        let party_ttl_seconds = overrides
            .party_ttl_seconds
            .or(toml_config.party_ttl_seconds)
            .unwrap_or(DEFAULT_PARTY_TTL_SECONDS);
        if party_ttl_seconds == 0 {
            return Err(Error::Config(
                "party_ttl_seconds must be greater than zero".to_string(),
            ));
        }

        let catalog_url = overrides.catalog_url.or(toml_config.catalog_url);

        let broadcast_capacity = toml_config
            .broadcast_capacity
            .unwrap_or(DEFAULT_BROADCAST_CAPACITY);
        if broadcast_capacity == 0 {
            return Err(Error::Config(
                "broadcast_capacity must be greater than zero".to_string(),
            ));
        }

        Ok(Config {
            host,
            port,
            database_path,
            party_ttl_seconds,
            catalog_url,
            broadcast_capacity,
        })
    }

    /// Party expiry window as a Duration.
    pub fn party_ttl(&self) -> Duration {
        Duration::from_secs(self.party_ttl_seconds)
    }
}

fn read_toml(path: &Path) -> Result<TomlConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read config file {:?}: {}", path, e)))?;
    toml::from_str(&contents)
        .map_err(|e| Error::Config(format!("Failed to parse config file {:?}: {}", path, e)))
}

/// Search the platform config directories for `micdrop/config.toml`.
fn find_default_config_file() -> Option<PathBuf> {
    if let Some(path) = dirs::config_dir().map(|d| d.join("micdrop").join("config.toml")) {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/micdrop/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// OS-dependent default database location.
fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("micdrop").join("micdrop.db"))
        .unwrap_or_else(|| PathBuf::from("./micdrop.db"))
}
