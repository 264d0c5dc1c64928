//! Per-run counters

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Aggregate counters for one pipeline invocation
///
/// `seen == skipped + enriched + failed` holds for every summary the
/// pipeline produces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Records fetched from the catalog
    pub seen: usize,
    /// Records already in the ledger, or already carrying an ISBN-10
    pub skipped: usize,
    /// Records that received a new ISBN-10 in this run
    pub enriched: usize,
    /// Records whose conversion or update failed
    pub failed: usize,
    /// Portion of `skipped` that was not in the ledger but already complete
    pub already_complete: usize,
    /// Lines written to the ledger at the end of the run
    pub ledger_appended: usize,
}

impl RunSummary {
    pub(crate) fn new(run_id: Uuid, started_at: DateTime<Utc>, seen: usize) -> Self {
        Self {
            run_id,
            started_at,
            finished_at: started_at,
            seen,
            skipped: 0,
            enriched: 0,
            failed: 0,
            already_complete: 0,
            ledger_appended: 0,
        }
    }

    /// Check the counter invariant
    pub fn is_consistent(&self) -> bool {
        self.seen == self.skipped + self.enriched + self.failed
            && self.already_complete <= self.skipped
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "seen={} skipped={} enriched={} failed={}",
            self.seen, self.skipped, self.enriched, self.failed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_summary_is_consistent_only_when_empty() {
        let summary = RunSummary::new(Uuid::new_v4(), Utc::now(), 0);
        assert!(summary.is_consistent());

        let summary = RunSummary::new(Uuid::new_v4(), Utc::now(), 3);
        assert!(!summary.is_consistent());
    }

    #[test]
    fn test_display() {
        let mut summary = RunSummary::new(Uuid::new_v4(), Utc::now(), 4);
        summary.skipped = 1;
        summary.enriched = 2;
        summary.failed = 1;
        assert!(summary.is_consistent());
        assert_eq!(summary.to_string(), "seen=4 skipped=1 enriched=2 failed=1");
    }
}
