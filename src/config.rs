//! Configuration loading and validation.
//!
//! A single `courier.toml` with one section per concern. Every field has a
//! default so an absent file yields a usable local configuration.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Row store / index database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Third-party transport settings.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Dispatch queue and worker settings.
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

/// SQLite database settings.
#[derive(Debug, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the database file.
    #[serde(default = "default_db_path")]
    pub path: String,

    /// Maximum pooled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Third-party SMS API settings.
#[derive(Debug, Deserialize)]
pub struct TransportConfig {
    /// Endpoint the transport client POSTs payloads to.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// TCP connect timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Response read timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub read_timeout_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            connect_timeout_secs: default_timeout_secs(),
            read_timeout_secs: default_timeout_secs(),
        }
    }
}

/// Dispatch queue and worker pool settings.
#[derive(Debug, Deserialize)]
pub struct DispatchConfig {
    /// Number of concurrent dispatch workers.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Bounded queue capacity (backpressure limit).
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// How long a publish blocks waiting for queue space, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub publish_timeout_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            publish_timeout_secs: default_timeout_secs(),
        }
    }
}

// Default value functions for serde

fn default_db_path() -> String {
    "courier.db".to_owned()
}
fn default_max_connections() -> u32 {
    5
}
fn default_api_url() -> String {
    "https://notification.free.beeceptor.com/resources/v1/messaging".to_owned()
}
fn default_timeout_secs() -> u64 {
    5
}
fn default_workers() -> usize {
    4
}
fn default_queue_capacity() -> usize {
    1024
}

/// Load configuration from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config at {}: {e}", path.display()))?;
    let config: Config = toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("failed to parse config at {}: {e}", path.display()))?;
    Ok(config)
}

/// Resolve the default config directory (`~/.courier/`).
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn config_dir() -> anyhow::Result<PathBuf> {
    let home = directories::BaseDirs::new()
        .ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
    Ok(home.home_dir().join(".courier"))
}
