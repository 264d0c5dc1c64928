//! Error types for xyzb-enricher
//!
//! Per-record errors ([`EnrichError::InvalidIdentifier`],
//! [`EnrichError::CatalogRejected`]) are folded into the run summary and never
//! abort a run. Run-level errors ([`EnrichError::CatalogUnavailable`],
//! [`EnrichError::StorageUnavailable`]) end the current run and are reported
//! to the supervisor.

use thiserror::Error;

/// Enrichment error taxonomy
#[derive(Debug, Error)]
pub enum EnrichError {
    /// Codec input malformed; a data defect in the catalog, never retried
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Bulk catalog fetch failed
    #[error("Catalog unavailable: {0}")]
    CatalogUnavailable(String),

    /// The catalog refused a single record update
    #[error("Catalog rejected update for book {book_id} ({}): {body}", describe_status(.status))]
    CatalogRejected {
        book_id: String,
        /// HTTP status, if a response was received at all
        status: Option<u16>,
        /// Response body (or transport error) for diagnostics
        body: String,
    },

    /// Ledger file unreadable or unwritable
    #[error("Ledger storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl EnrichError {
    /// True for errors that end the current run
    pub fn is_run_fatal(&self) -> bool {
        matches!(
            self,
            EnrichError::CatalogUnavailable(_) | EnrichError::StorageUnavailable(_)
        )
    }
}

impl From<xyzb_common::Error> for EnrichError {
    fn from(err: xyzb_common::Error) -> Self {
        match err {
            xyzb_common::Error::InvalidIdentifier(msg) => EnrichError::InvalidIdentifier(msg),
            xyzb_common::Error::Io(e) => EnrichError::StorageUnavailable(e.to_string()),
            other => EnrichError::InvalidIdentifier(other.to_string()),
        }
    }
}

fn describe_status(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!("HTTP {}", code),
        None => "no response".to_string(),
    }
}
