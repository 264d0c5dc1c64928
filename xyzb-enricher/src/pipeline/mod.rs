//! Enrichment pipeline
//!
//! One run walks a fixed sequence of stages:
//!
//! `LoadLedger → FetchCatalog → Dispatch → Collect → PersistLedger → Done`
//!
//! A failure in `LoadLedger` or `FetchCatalog` ends the run with an error and
//! no summary. Once records have been dispatched a summary is always
//! produced; a `PersistLedger` failure returns it alongside the error.
//!
//! # Error Handling
//! - Per-record failures (bad identifier, rejected update) are counted, not raised
//! - Nothing is retried within a run; the supervisor decides whether to run again
//!
//! # Example
//! ```rust,ignore
//! let pipeline = EnrichmentPipeline::new(PipelineConfig::new("isbn.csv"), catalog);
//! let summary = pipeline.run().await?;
//! ```

pub mod summary;
pub mod worker;

pub use summary::RunSummary;
pub use worker::{FailureStage, WorkFailure, WorkResult};

use crate::catalog::CatalogApi;
use crate::error::EnrichError;
use crate::ledger::{Ledger, LedgerIndex, LedgerOptions, LedgerStore};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, info_span, Instrument};
use uuid::Uuid;
use xyzb_common::LedgerEntry;

/// Worker count used when none is configured: two per CPU
pub fn default_worker_count() -> usize {
    (num_cpus::get() * 2).max(1)
}

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Ledger file location
    pub ledger_path: PathBuf,
    pub ledger: LedgerOptions,
    /// Number of concurrent enrichment workers
    pub worker_count: usize,
}

impl PipelineConfig {
    pub fn new(ledger_path: impl Into<PathBuf>) -> Self {
        Self {
            ledger_path: ledger_path.into(),
            ledger: LedgerOptions::default(),
            worker_count: default_worker_count(),
        }
    }
}

/// Stages of a single run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    LoadLedger,
    FetchCatalog,
    Dispatch,
    Collect,
    PersistLedger,
    Done,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunStage::LoadLedger => "load_ledger",
            RunStage::FetchCatalog => "fetch_catalog",
            RunStage::Dispatch => "dispatch",
            RunStage::Collect => "collect",
            RunStage::PersistLedger => "persist_ledger",
            RunStage::Done => "done",
        };
        f.write_str(name)
    }
}

/// A run that ended with a run-level error
///
/// `summary` is present when the failure happened after dispatch.
#[derive(Debug, Error)]
#[error("Enrichment run failed at {stage}: {error}")]
pub struct RunFailure {
    pub stage: RunStage,
    pub summary: Option<RunSummary>,
    #[source]
    pub error: EnrichError,
}

impl RunFailure {
    fn new(stage: RunStage, summary: Option<RunSummary>, error: EnrichError) -> Self {
        Self {
            stage,
            summary,
            error,
        }
    }
}

/// How a collected result is counted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    /// ISBN-13 already in the ledger
    Skipped,
    /// Not in the ledger but already had an ISBN-10
    AlreadyComplete,
    Enriched,
    Failed,
}

/// Classify a result against the ledger as it stood at the start of the run
///
/// A known identifier is always skipped, even if a worker enriched it again.
pub(crate) fn classify(known: &LedgerIndex, result: &WorkResult) -> Outcome {
    if known.contains(&result.book.isbn13) {
        Outcome::Skipped
    } else if result.failure.is_some() {
        Outcome::Failed
    } else if result.isbn_updated {
        Outcome::Enriched
    } else {
        Outcome::AlreadyComplete
    }
}

/// ISBN-10 enrichment pipeline
pub struct EnrichmentPipeline {
    config: PipelineConfig,
    catalog: Arc<dyn CatalogApi>,
}

impl EnrichmentPipeline {
    pub fn new(config: PipelineConfig, catalog: Arc<dyn CatalogApi>) -> Self {
        Self { config, catalog }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Execute one complete run against the configured ledger file
    pub async fn run(&self) -> Result<RunSummary, RunFailure> {
        let run_id = Uuid::new_v4();
        self.open_and_execute(run_id)
            .instrument(info_span!("enrichment_run", run_id = %run_id))
            .await
    }

    /// Execute one complete run against an already opened ledger
    pub async fn run_with_ledger<L: LedgerStore>(&self, ledger: L) -> Result<RunSummary, RunFailure> {
        let run_id = Uuid::new_v4();
        self.execute(run_id, Utc::now(), ledger)
            .instrument(info_span!("enrichment_run", run_id = %run_id))
            .await
    }

    async fn open_and_execute(&self, run_id: Uuid) -> Result<RunSummary, RunFailure> {
        let started_at = Utc::now();

        // 1 - Known identifiers from the ledger
        debug!(stage = %RunStage::LoadLedger, path = %self.config.ledger_path.display(), "Loading ledger");
        let ledger = Ledger::open(&self.config.ledger_path, &self.config.ledger)
            .await
            .map_err(|e| fail(RunStage::LoadLedger, None, e))?;

        self.execute(run_id, started_at, ledger).await
    }

    async fn execute<L: LedgerStore>(
        &self,
        run_id: Uuid,
        started_at: DateTime<Utc>,
        mut ledger: L,
    ) -> Result<RunSummary, RunFailure> {
        let known = ledger
            .load()
            .await
            .map_err(|e| fail(RunStage::LoadLedger, None, e))?;

        // 2 - Records from the catalog
        debug!(stage = %RunStage::FetchCatalog, "Fetching catalog");
        let books = self
            .catalog
            .fetch_all()
            .await
            .map_err(|e| fail(RunStage::FetchCatalog, None, e))?;

        // 3 - Fan out to workers
        debug!(stage = %RunStage::Dispatch, "Dispatching records");
        let expected = books.len();
        let mut summary = RunSummary::new(run_id, started_at, expected);
        let mut pool =
            worker::dispatch(books, self.config.worker_count, Arc::clone(&self.catalog)).await;

        // 4 - Fan in, exactly one result per submitted record
        debug!(stage = %RunStage::Collect, submitted = pool.submitted, "Collecting results");
        let mut batch = Vec::new();
        let mut batched = HashSet::new();
        let mut received = 0;

        while received < pool.submitted {
            let Some(result) = pool.results.recv().await else {
                break;
            };
            received += 1;

            match classify(&known, &result) {
                Outcome::Skipped => summary.skipped += 1,
                Outcome::AlreadyComplete => {
                    summary.skipped += 1;
                    summary.already_complete += 1;
                }
                Outcome::Failed => summary.failed += 1,
                Outcome::Enriched => {
                    summary.enriched += 1;
                    if batched.insert(result.book.isbn13.clone()) {
                        batch.push(LedgerEntry::from(&result.book));
                    }
                }
            }
        }

        for handle in pool.workers {
            if let Err(e) = handle.await {
                error!(error = %e, "Enrichment worker terminated abnormally");
            }
        }

        if received < expected {
            let missing = expected - received;
            error!(missing, "No result for some dispatched records, counting them as failed");
            summary.failed += missing;
        }

        // 5 - Persist new identifiers
        debug!(stage = %RunStage::PersistLedger, batch = batch.len(), "Persisting ledger");
        let appended = ledger.append_new(&batch).await;
        summary.finished_at = Utc::now();

        match appended {
            Ok(written) => {
                summary.ledger_appended = written;
                log_summary(&summary);
                debug!(stage = %RunStage::Done, "Run complete");
                Ok(summary)
            }
            Err(e) => {
                error!(error = %e, "Failed to append ledger entries");
                log_summary(&summary);
                Err(fail(RunStage::PersistLedger, Some(summary), e))
            }
        }
    }
}

fn fail(stage: RunStage, summary: Option<RunSummary>, error: EnrichError) -> RunFailure {
    error!(stage = %stage, error = %error, "Enrichment run failed");
    RunFailure::new(stage, summary, error)
}

fn log_summary(summary: &RunSummary) {
    info!(
        total = summary.seen,
        skipped = summary.skipped,
        added = summary.enriched,
        failed = summary.failed,
        already_complete = summary.already_complete,
        ledger_appended = summary.ledger_appended,
        "Done processing books"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use xyzb_common::BookRecord;

    fn result(isbn13: &str, isbn_updated: bool, failed: bool) -> WorkResult {
        WorkResult {
            book: BookRecord {
                isbn13: isbn13.to_string(),
                ..Default::default()
            },
            isbn_updated,
            failure: failed.then(|| WorkFailure {
                stage: FailureStage::Push,
                error: EnrichError::CatalogRejected {
                    book_id: String::new(),
                    status: Some(500),
                    body: String::new(),
                },
            }),
        }
    }

    #[test]
    fn test_classify() {
        let mut known = LedgerIndex::default();
        known.insert(LedgerEntry::new("9781891830853", Some("1891830856".into())));

        // Known identifiers are skipped whatever the worker did
        assert_eq!(classify(&known, &result("9781891830853", true, false)), Outcome::Skipped);
        assert_eq!(classify(&known, &result("9781891830853", false, true)), Outcome::Skipped);
        assert_eq!(classify(&known, &result("9781891830853", false, false)), Outcome::Skipped);

        assert_eq!(classify(&known, &result("9781234567897", true, false)), Outcome::Enriched);
        assert_eq!(classify(&known, &result("9781234567897", false, true)), Outcome::Failed);
        assert_eq!(
            classify(&known, &result("9781234567897", false, false)),
            Outcome::AlreadyComplete
        );
    }

    #[test]
    fn test_run_stage_display() {
        assert_eq!(RunStage::LoadLedger.to_string(), "load_ledger");
        assert_eq!(RunStage::PersistLedger.to_string(), "persist_ledger");
    }

    #[test]
    fn test_default_worker_count() {
        assert!(default_worker_count() >= 2);
        assert_eq!(PipelineConfig::new("isbn.csv").worker_count, default_worker_count());
    }
}
