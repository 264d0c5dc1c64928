//! TOML configuration file loading
//!
//! Settings resolve in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! This module covers tier 3. A missing config file is never fatal: the
//! caller gets an empty [`TomlConfig`] and falls through to defaults.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Settings read from `<config_dir>/xyzb/<module>.toml`
///
/// Every field is optional so a partial file only overrides what it names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Catalog API base URL (e.g. `http://localhost:9001/api`)
    #[serde(default)]
    pub api_server_url: Option<String>,

    /// Path of the ledger file
    #[serde(default)]
    pub ledger_file: Option<PathBuf>,

    /// Required file name suffix for the ledger (e.g. `.csv`)
    #[serde(default)]
    pub ledger_extension: Option<String>,

    /// Create the ledger file when it does not exist yet
    #[serde(default)]
    pub create_ledger: Option<bool>,

    /// Seconds between pipeline runs
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,

    /// Failed runs tolerated before the supervisor gives up
    #[serde(default)]
    pub error_limit: Option<u32>,

    /// Reset the failed-run counter after a successful run
    #[serde(default)]
    pub reset_errors_on_success: Option<bool>,

    /// Number of concurrent enrichment workers
    #[serde(default)]
    pub workers: Option<usize>,

    /// Per-request timeout for catalog API calls, in seconds
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
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

/// Platform config file location for a module: `<config_dir>/xyzb/<module>.toml`
pub fn default_config_path(module_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("xyzb").join(format!("{}.toml", module_name)))
}

/// Parse a TOML config file
///
/// Read and parse failures are both reported as [`Error::Config`].
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read config file {}: {}", path.display(), e)))?;

    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse TOML {}: {}", path.display(), e)))
}

/// Load the TOML tier for `module_name`
///
/// An explicitly requested file must exist and parse. Without one, the
/// platform default location is tried; if nothing is there, defaults are
/// returned with a warning.
pub fn load_module_config(explicit: Option<&Path>, module_name: &str) -> Result<TomlConfig> {
    if let Some(path) = explicit {
        let config = load_toml_config(path)?;
        info!("Loaded TOML configuration from {}", path.display());
        return Ok(config);
    }

    match default_config_path(module_name) {
        Some(path) if path.exists() => {
            let config = load_toml_config(&path)?;
            info!("Loaded TOML configuration from {}", path.display());
            Ok(config)
        }
        Some(path) => {
            warn!(
                "No config file at {}, using command-line, environment and built-in defaults",
                path.display()
            );
            Ok(TomlConfig::default())
        }
        None => {
            warn!("Could not determine config directory, using built-in defaults");
            Ok(TomlConfig::default())
        }
    }
}
