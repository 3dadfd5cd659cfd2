//! Configuration loading
//!
//! Two tiers:
//! 1. **Bootstrap** (TOML file, overridden by CLI/environment): database path,
//!    bind address, port, log level. Read once at startup.
//! 2. **Runtime** (`settings` table): retry policies, XP per level, cache TTL.
//!
//! Bootstrap priority order:
//! 1. Command-line argument / environment variable (resolved by clap)
//! 2. TOML config file
//! 3. OS-dependent compiled default

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::db::settings::get_setting;
use crate::progression::DEFAULT_XP_PER_LEVEL;
use crate::retry::{RetryPolicy, DEFAULT_MAX_RETRIES};
use crate::{Error, Result};

/// Default HTTP port for the progress service
pub const DEFAULT_PORT: u16 = 5810;

/// Default bind address
pub const DEFAULT_BIND: &str = "127.0.0.1";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    /// Path to SQLite database file
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub bind: Option<String>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TomlConfig {
    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Invalid config file {}: {}", path.display(), e)))
    }

    /// Load the config file if one is given and readable.
    ///
    /// A missing file is not fatal: log a warning and fall back to defaults.
    /// A file that exists but does not parse is a configuration error.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path.map(Path::to_path_buf).or_else(default_config_path) else {
            return Ok(Self::default());
        };

        if !path.exists() {
            warn!("Config file not found: {} (using defaults)", path.display());
            return Ok(Self::default());
        }

        let config = Self::from_file(&path)?;
        info!("Loaded config file: {}", path.display());
        Ok(config)
    }

    /// Database path: explicit override, then TOML, then compiled default
    pub fn resolve_database_path(&self, cli_override: Option<&Path>) -> PathBuf {
        cli_override
            .map(Path::to_path_buf)
            .or_else(|| self.database_path.clone())
            .unwrap_or_else(default_database_path)
    }
}

/// Platform config file location, e.g. `~/.config/skilvania/config.toml`
fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("skilvania").join("config.toml"))
}

/// OS-dependent default database location
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("skilvania"))
        .unwrap_or_else(|| PathBuf::from("./skilvania_data"))
        .join("skilvania.db")
}

/// Runtime settings loaded from the `settings` table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeSettings {
    pub completion_retry: RetryPolicy,
    pub rating_retry: RetryPolicy,
    pub xp_per_level: i64,
    pub node_type_cache_ttl: Duration,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            completion_retry: RetryPolicy::default(),
            rating_retry: RetryPolicy::default(),
            xp_per_level: DEFAULT_XP_PER_LEVEL,
            node_type_cache_ttl: Duration::from_secs(300),
        }
    }
}

impl RuntimeSettings {
    /// Load runtime settings, using built-in defaults for missing values
    pub async fn load(pool: &SqlitePool) -> Result<Self> {
        let defaults = Self::default();

        let completion_retry = RetryPolicy::new(
            get_setting(pool, "completion_max_retries")
                .await?
                .unwrap_or(DEFAULT_MAX_RETRIES),
            Duration::from_millis(
                get_setting(pool, "completion_retry_delay_ms")
                    .await?
                    .unwrap_or(defaults.completion_retry.retry_delay.as_millis() as u64),
            ),
        );

        let rating_retry = RetryPolicy::new(
            get_setting(pool, "rating_max_retries")
                .await?
                .unwrap_or(DEFAULT_MAX_RETRIES),
            Duration::from_millis(
                get_setting(pool, "rating_retry_delay_ms")
                    .await?
                    .unwrap_or(defaults.rating_retry.retry_delay.as_millis() as u64),
            ),
        );

        let xp_per_level: i64 = get_setting(pool, "xp_per_level")
            .await?
            .unwrap_or(defaults.xp_per_level);
        if xp_per_level <= 0 {
            return Err(Error::Config(format!(
                "xp_per_level must be positive, got {}",
                xp_per_level
            )));
        }

        let node_type_cache_ttl = get_setting::<u64>(pool, "node_type_cache_ttl_secs")
            .await?
            .map(Duration::from_secs)
            .unwrap_or(defaults.node_type_cache_ttl);

        Ok(Self {
            completion_retry,
            rating_retry,
            xp_per_level,
            node_type_cache_ttl,
        })
    }
}
