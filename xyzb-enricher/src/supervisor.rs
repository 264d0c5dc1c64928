//! Poll loop around the enrichment pipeline
//!
//! Runs the pipeline, sleeps for the poll interval, and repeats. Failed runs
//! are counted; once the count exceeds the configured limit the supervisor
//! stops. Shutdown is only observed between runs, never during one.

use crate::pipeline::{EnrichmentPipeline, RunFailure, RunSummary};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Default seconds between runs
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default number of failed runs tolerated
pub const DEFAULT_ERROR_LIMIT: u32 = 5;

/// Something the supervisor can run once per poll cycle
#[async_trait]
pub trait PipelineRunner: Send + Sync {
    async fn run_once(&self) -> Result<RunSummary, RunFailure>;
}

#[async_trait]
impl PipelineRunner for EnrichmentPipeline {
    async fn run_once(&self) -> Result<RunSummary, RunFailure> {
        self.run().await
    }
}

/// What a successful run does to the failed-run counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorCountPolicy {
    /// Failures accumulate for the lifetime of the process
    #[default]
    Cumulative,
    /// A successful run clears the counter
    ResetOnSuccess,
}

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub poll_interval: Duration,
    /// Stop once more than this many runs have failed
    pub error_limit: u32,
    pub error_policy: ErrorCountPolicy,
    /// Stop after this many runs (`None` = until shutdown)
    pub max_runs: Option<u64>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            error_limit: DEFAULT_ERROR_LIMIT,
            error_policy: ErrorCountPolicy::default(),
            max_runs: None,
        }
    }
}

/// Totals for a supervisor session that ended normally
#[derive(Debug, Clone, Default)]
pub struct SupervisorReport {
    pub runs: u64,
    pub failed_runs: u64,
    /// Most recent summary, including one attached to a failed run
    pub last_summary: Option<RunSummary>,
}

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("Reached error limit of {limit} after {runs} runs, last error: {last_error}")]
    ErrorLimitReached {
        limit: u32,
        runs: u64,
        last_error: String,
    },
}

pub struct Supervisor {
    config: SupervisorConfig,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        Self { config }
    }

    /// Poll until shutdown, `max_runs`, or the error limit
    pub async fn run(
        &self,
        runner: &dyn PipelineRunner,
        shutdown: CancellationToken,
    ) -> Result<SupervisorReport, SupervisorError> {
        info!(
            poll_interval_secs = self.config.poll_interval.as_secs_f64(),
            error_limit = self.config.error_limit,
            error_policy = ?self.config.error_policy,
            "Starting enrichment supervisor"
        );

        let mut report = SupervisorReport::default();
        let mut error_count: u32 = 0;

        loop {
            if shutdown.is_cancelled() {
                info!("Shutdown requested, not starting another run");
                break;
            }

            report.runs += 1;
            info!(poll_count = report.runs, "Starting enrichment run");

            match runner.run_once().await {
                Ok(summary) => {
                    if self.config.error_policy == ErrorCountPolicy::ResetOnSuccess && error_count > 0 {
                        info!(previous = error_count, "Run succeeded, resetting error count");
                        error_count = 0;
                    }
                    report.last_summary = Some(summary);
                }
                Err(failure) => {
                    error_count += 1;
                    report.failed_runs += 1;
                    error!(error = %failure, error_count, "Failed to run enrichment pipeline");

                    let last_error = failure.to_string();
                    if let Some(summary) = failure.summary {
                        report.last_summary = Some(summary);
                    }

                    if error_count > self.config.error_limit {
                        error!(
                            limit = self.config.error_limit,
                            "Reached error limit, terminating"
                        );
                        return Err(SupervisorError::ErrorLimitReached {
                            limit: self.config.error_limit,
                            runs: report.runs,
                            last_error,
                        });
                    }
                }
            }

            if self.config.max_runs.is_some_and(|max| report.runs >= max) {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval) => {}
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested during poll interval");
                    break;
                }
            }
        }

        if report.failed_runs > 0 {
            warn!(
                runs = report.runs,
                failed_runs = report.failed_runs,
                "Supervisor stopped with failed runs"
            );
        } else {
            info!(runs = report.runs, "Supervisor stopped");
        }

        Ok(report)
    }
}
