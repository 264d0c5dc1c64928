//! Common error types for XYZ Books tooling

use thiserror::Error;

/// Common result type for XYZ Books operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the XYZ Books crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Book identifier is malformed (wrong length, prefix or characters)
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
