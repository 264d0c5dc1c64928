//! Configuration resolution for xyzb-enricher
//!
//! Each setting resolves with CLI → ENV → TOML → default priority. clap
//! covers the first two tiers; [`TomlConfig`] supplies the third.

use crate::catalog::{CatalogClientConfig, DEFAULT_REQUEST_TIMEOUT};
use crate::ledger::{LedgerOptions, DEFAULT_LEDGER_EXTENSION};
use crate::pipeline::{default_worker_count, PipelineConfig};
use crate::supervisor::{
    ErrorCountPolicy, SupervisorConfig, DEFAULT_ERROR_LIMIT, DEFAULT_POLL_INTERVAL,
};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use xyzb_common::config::TomlConfig;
use xyzb_common::{Error, Result};

pub const DEFAULT_API_SERVER_URL: &str = "http://localhost:9001/api";
pub const DEFAULT_LEDGER_FILE: &str = "test.csv";

/// Command-line arguments for xyzb-enricher
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "xyzb-enricher")]
#[command(about = "Fills in missing ISBN-10s in the XYZ Books catalog")]
#[command(version)]
pub struct Args {
    /// Catalog API base URL
    #[arg(long = "api-url", env = "API_SERVER_URL")]
    pub api_url: Option<String>,

    /// Ledger file of processed ISBNs
    #[arg(short = 'f', long = "file", env = "XYZB_LEDGER_FILE")]
    pub file: Option<PathBuf>,

    /// Required ledger file extension
    #[arg(long, env = "XYZB_LEDGER_EXTENSION")]
    pub ledger_extension: Option<String>,

    /// Create the ledger file if it does not exist
    #[arg(long)]
    pub create_ledger: bool,

    /// Seconds to wait between runs
    #[arg(long, env = "POLL_INTERVAL_SECS")]
    pub poll_interval_secs: Option<u64>,

    /// Failed runs tolerated before exiting
    #[arg(long, env = "ERROR_LIMIT")]
    pub error_limit: Option<u32>,

    /// Clear the failed-run count after a successful run
    #[arg(long)]
    pub reset_errors_on_success: bool,

    /// Number of concurrent enrichment workers
    #[arg(long, env = "XYZB_WORKERS")]
    pub workers: Option<usize>,

    /// Per-request timeout for catalog calls, in seconds
    #[arg(long)]
    pub request_timeout_secs: Option<u64>,

    /// Run the pipeline once and exit
    #[arg(long)]
    pub once: bool,

    /// TOML config file (default: <config_dir>/xyzb/enricher.toml)
    #[arg(long, env = "XYZB_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Fully resolved enricher settings
#[derive(Debug, Clone, PartialEq)]
pub struct EnricherConfig {
    pub api_server_url: String,
    pub ledger_file: PathBuf,
    pub ledger_extension: String,
    pub create_ledger: bool,
    pub poll_interval: Duration,
    pub error_limit: u32,
    pub error_policy: ErrorCountPolicy,
    pub workers: usize,
    pub request_timeout: Duration,
    pub once: bool,
}

impl EnricherConfig {
    /// Merge CLI/ENV arguments over the TOML file, then defaults
    pub fn resolve(args: &Args, toml: &TomlConfig) -> Result<Self> {
        let api_server_url = args
            .api_url
            .clone()
            .or_else(|| toml.api_server_url.clone())
            .unwrap_or_else(|| DEFAULT_API_SERVER_URL.to_string());

        let ledger_file = args
            .file
            .clone()
            .or_else(|| toml.ledger_file.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LEDGER_FILE));

        let ledger_extension = args
            .ledger_extension
            .clone()
            .or_else(|| toml.ledger_extension.clone())
            .unwrap_or_else(|| DEFAULT_LEDGER_EXTENSION.to_string());

        let create_ledger = args.create_ledger || toml.create_ledger.unwrap_or(false);

        let poll_interval = args
            .poll_interval_secs
            .or(toml.poll_interval_secs)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_POLL_INTERVAL);

        let error_limit = args
            .error_limit
            .or(toml.error_limit)
            .unwrap_or(DEFAULT_ERROR_LIMIT);

        let error_policy =
            if args.reset_errors_on_success || toml.reset_errors_on_success.unwrap_or(false) {
                ErrorCountPolicy::ResetOnSuccess
            } else {
                ErrorCountPolicy::Cumulative
            };

        let workers = args
            .workers
            .or(toml.workers)
            .unwrap_or_else(default_worker_count);

        let request_timeout = args
            .request_timeout_secs
            .or(toml.request_timeout_secs)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        let config = Self {
            api_server_url,
            ledger_file,
            ledger_extension,
            create_ledger,
            poll_interval,
            error_limit,
            error_policy,
            workers,
            request_timeout,
            once: args.once,
        };
        config.validate()?;

        info!(
            api_server_url = %config.api_server_url,
            ledger_file = %config.ledger_file.display(),
            workers = config.workers,
            poll_interval_secs = config.poll_interval.as_secs(),
            error_limit = config.error_limit,
            "Resolved enricher configuration"
        );

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.api_server_url.trim().is_empty() {
            return Err(Error::Config("API server URL must not be empty".to_string()));
        }
        if self.ledger_file.as_os_str().is_empty() {
            return Err(Error::Config("Ledger file must not be empty".to_string()));
        }
        if self.workers == 0 {
            return Err(Error::InvalidInput(
                "Worker count must be at least 1".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(Error::InvalidInput(
                "Request timeout must be at least 1 second".to_string(),
            ));
        }
        Ok(())
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            ledger_path: self.ledger_file.clone(),
            ledger: LedgerOptions {
                expected_extension: self.ledger_extension.clone(),
                create_if_missing: self.create_ledger,
            },
            worker_count: self.workers,
        }
    }

    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            poll_interval: self.poll_interval,
            error_limit: self.error_limit,
            error_policy: self.error_policy,
            max_runs: self.once.then_some(1),
        }
    }

    pub fn catalog_client_config(&self) -> CatalogClientConfig {
        CatalogClientConfig {
            base_url: self.api_server_url.clone(),
            request_timeout: self.request_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EnricherConfig::resolve(&Args::default(), &TomlConfig::default()).unwrap();

        assert_eq!(config.api_server_url, DEFAULT_API_SERVER_URL);
        assert_eq!(config.ledger_file, PathBuf::from("test.csv"));
        assert_eq!(config.ledger_extension, ".csv");
        assert!(!config.create_ledger);
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.error_limit, 5);
        assert_eq!(config.error_policy, ErrorCountPolicy::Cumulative);
        assert_eq!(config.workers, default_worker_count());
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert!(!config.once);
    }

    #[test]
    fn test_once_bounds_supervisor() {
        let args = Args {
            once: true,
            ..Default::default()
        };
        let config = EnricherConfig::resolve(&args, &TomlConfig::default()).unwrap();
        assert_eq!(config.supervisor_config().max_runs, Some(1));
    }
}
