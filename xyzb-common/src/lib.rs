//! # XYZ Books Common Library
//!
//! Shared code for the XYZ Books tooling:
//! - ISBN-13 / ISBN-10 conversion and validation
//! - Catalog data model (book records, ledger entries)
//! - Configuration loading
//! - Common error type

pub mod config;
pub mod error;
pub mod isbn;
pub mod models;

pub use error::{Error, Result};
pub use models::{Author, BookRecord, LedgerEntry, Publisher};
