//! Configuration loading
//!
//! The TOML file is optional. Resolution order for its location:
//! 1. Command-line argument (highest priority)
//! 2. `ZOUSHO_CONFIG` environment variable
//! 3. `<config dir>/zousho/config.toml`
//! 4. Compiled defaults (no file)
//!
//! A missing or unreadable file logs a warning and falls back to defaults; it
//! never stops startup.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "ZOUSHO_CONFIG";

/// Default HTTP port for zousho-bi
pub const DEFAULT_PORT: u16 = 5730;

/// Largest batch any provider may be sent at once
pub const MAX_BATCH_SIZE: usize = 2;

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// HTTP server port
    #[serde(default)]
    pub port: Option<u16>,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Per-provider overrides
    #[serde(default)]
    pub sources: SourcesConfig,
}

impl TomlConfig {
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// `[sources.*]` tables
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default)]
    pub openbd: SourceOverrides,
    #[serde(default)]
    pub rakuten: SourceOverrides,
    #[serde(default)]
    pub google_books: SourceOverrides,
}

/// Values a user may override for one provider; unset fields keep the
/// provider's built-in default
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceOverrides {
    pub enabled: Option<bool>,
    pub batch_size: Option<usize>,
    pub spacing_ms: Option<u64>,
    pub retry_delay_ms: Option<u64>,
    pub requests_per_second: Option<u32>,
    pub timeout_secs: Option<u64>,
    pub api_key: Option<String>,
}

/// Fully resolved settings for one provider
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSettings {
    pub enabled: bool,
    /// Keys sent per batch, 1..=2
    pub batch_size: usize,
    /// Minimum gap between one batch completing and the next starting
    pub spacing: Duration,
    /// Delay before a rate-limited key is re-queued
    pub retry_delay: Duration,
    /// Hard cap on raw HTTP requests
    pub requests_per_second: u32,
    pub timeout: Duration,
    pub api_key: Option<String>,
}

impl SourceSettings {
    /// openBD tolerates bursts; keep it quick
    pub fn openbd() -> Self {
        Self {
            enabled: true,
            batch_size: 2,
            spacing: Duration::from_millis(10),
            retry_delay: Duration::from_millis(500),
            requests_per_second: 10,
            timeout: Duration::from_secs(15),
            api_key: None,
        }
    }

    /// Rakuten Books allows roughly one request per second per application id
    pub fn rakuten() -> Self {
        Self {
            enabled: true,
            batch_size: 1,
            spacing: Duration::from_millis(1000),
            retry_delay: Duration::from_millis(500),
            requests_per_second: 1,
            timeout: Duration::from_secs(15),
            api_key: None,
        }
    }

    pub fn google_books() -> Self {
        Self {
            enabled: true,
            batch_size: 2,
            spacing: Duration::from_millis(100),
            retry_delay: Duration::from_millis(500),
            requests_per_second: 5,
            timeout: Duration::from_secs(15),
            api_key: None,
        }
    }

    /// Apply TOML overrides on top of these defaults
    ///
    /// `batch_size` is clamped to `1..=MAX_BATCH_SIZE` and
    /// `requests_per_second` to at least 1.
    pub fn with_overrides(mut self, overrides: &SourceOverrides) -> Self {
        if let Some(enabled) = overrides.enabled {
            self.enabled = enabled;
        }
        if let Some(batch_size) = overrides.batch_size {
            self.batch_size = batch_size.clamp(1, MAX_BATCH_SIZE);
        }
        if let Some(ms) = overrides.spacing_ms {
            self.spacing = Duration::from_millis(ms);
        }
        if let Some(ms) = overrides.retry_delay_ms {
            self.retry_delay = Duration::from_millis(ms);
        }
        if let Some(rps) = overrides.requests_per_second {
            self.requests_per_second = rps.max(1);
        }
        if let Some(secs) = overrides.timeout_secs {
            self.timeout = Duration::from_secs(secs);
        }
        if let Some(key) = &overrides.api_key {
            self.api_key = Some(key.clone());
        }
        self
    }
}

/// Locate the config file, see module docs for priority
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Per-user config directory
    default_config_path().filter(|p| p.exists())
}

/// `<config dir>/zousho/config.toml` for the current platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("zousho").join("config.toml"))
}

/// Read and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Resolve and load configuration, degrading to defaults on any failure
pub fn load_or_default(cli_arg: Option<&Path>) -> TomlConfig {
    let Some(path) = resolve_config_path(cli_arg) else {
        info!("No config file found, using built-in defaults");
        return TomlConfig::default();
    };

    match load_toml_config(&path) {
        Ok(config) => {
            info!("Loaded configuration from {}", path.display());
            config
        }
        Err(e) => {
            warn!("{}; using built-in defaults", e);
            TomlConfig::default()
        }
    }
}

/// Write a config file, creating parent directories
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize config failed: {}", e)))?;
    std::fs::write(path, content)?;
    Ok(())
}
