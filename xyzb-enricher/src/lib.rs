//! xyzb-enricher library interface
//!
//! Fills in missing ISBN-10s in the XYZ Books catalog and records every
//! processed ISBN-13 in a local ledger so later runs skip it.

pub mod catalog;
pub mod config;
pub mod error;
pub mod ledger;
pub mod pipeline;
pub mod supervisor;

pub use crate::catalog::{CatalogApi, CatalogClientConfig, HttpCatalogClient};
pub use crate::config::{Args, EnricherConfig};
pub use crate::error::EnrichError;
pub use crate::ledger::{Ledger, LedgerIndex, LedgerOptions, LedgerStore};
pub use crate::pipeline::{EnrichmentPipeline, PipelineConfig, RunFailure, RunStage, RunSummary};
pub use crate::supervisor::{
    ErrorCountPolicy, PipelineRunner, Supervisor, SupervisorConfig, SupervisorError,
    SupervisorReport,
};
