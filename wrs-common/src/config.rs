//! Configuration loading and config file resolution
//!
//! Bootstrap configuration for WRS services lives in a single TOML file.
//! Every field has a built-in default, so a missing file is not an error:
//! the service starts with defaults and says so in the log.
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments (applied by the binary)
//! 2. Environment variables (applied by the binary through clap)
//! 3. TOML configuration file
//! 4. Built-in defaults (code constants)

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "WRS_CONFIG";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub server: ServerConfig,
    pub source: SourceConfig,
    pub ingest: IngestConfig,
    pub rate: RateConfig,
    pub logging: LoggingConfig,
}

/// HTTP query surface settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the query surface binds to
    pub listen_addr: String,

    /// Per-request timeout
    pub request_timeout_secs: u64,

    /// Bounded grace period for in-flight requests at shutdown
    pub shutdown_grace_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3000".to_string(),
            request_timeout_secs: 10,
            shutdown_grace_secs: 30,
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

/// Kind of message stream the service consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Newline-delimited envelopes over a TCP connection
    Tcp,
    /// Newline-delimited envelopes on standard input
    Stdin,
}

/// Message stream settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub kind: SourceKind,

    /// Remote address for `kind = "tcp"`
    pub addr: String,

    /// Longest envelope line accepted; longer lines are skipped
    pub max_line_bytes: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Tcp,
            addr: "127.0.0.1:7000".to_string(),
            max_line_bytes: 64 * 1024,
        }
    }
}

/// Ingestion pipeline settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Maximum number of concurrently in-flight tokenize+increment hand-offs
    pub max_in_flight: usize,

    /// Bound on the drain phase of `stop()`
    pub drain_timeout_secs: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 64,
            drain_timeout_secs: 30,
        }
    }
}

impl IngestConfig {
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }
}

/// How the rate tracker turns counter deltas into a rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateStrategy {
    /// Mean of the most recent `window` per-period deltas
    Windowed,
    /// Latest per-period delta divided by the number of ticks taken so far
    TickNormalized,
}

/// Rate tracker settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateConfig {
    /// Sampling period in milliseconds
    pub period_ms: u64,
    pub strategy: RateStrategy,
    /// Number of ticks averaged by the windowed strategy
    pub window: usize,
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            period_ms: 1000,
            strategy: RateStrategy::Windowed,
            window: 60,
        }
    }
}

impl RateConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl TomlConfig {
    /// Parse configuration from TOML text and validate it
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `path`, or built-in defaults when `path` is None
    ///
    /// An explicitly named file that cannot be read is an error. Nothing is
    /// logged here: this runs before the subscriber exists, so the caller
    /// reports which source was used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("Cannot read {}: {}", path.display(), e))
                })?;
                Self::from_toml_str(&content)
            }
            None => Ok(Self::default()),
        }
    }

    /// Reject values the services cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.ingest.max_in_flight == 0 {
            return Err(Error::Config(
                "ingest.max_in_flight must be at least 1".to_string(),
            ));
        }
        if self.source.max_line_bytes == 0 {
            return Err(Error::Config(
                "source.max_line_bytes must be at least 1".to_string(),
            ));
        }
        if self.rate.period_ms == 0 {
            return Err(Error::Config("rate.period_ms must be at least 1".to_string()));
        }
        if self.rate.window == 0 {
            return Err(Error::Config("rate.window must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Resolve which config file to load
///
/// 1. Explicit path from the command line
/// 2. `WRS_CONFIG` environment variable
/// 3. `<user config dir>/wrs/config.toml`, if it exists
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    dirs::config_dir()
        .map(|d| d.join("wrs").join("config.toml"))
        .filter(|p| p.exists())
}
