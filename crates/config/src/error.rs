//! Config Error Types

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Configuration errors are never retryable: the invocation cannot make
/// progress until an operator fixes the configuration.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("configuration file not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    #[display("unsupported configuration format: {}", _0.display())]
    UnsupportedFormat(#[error(not(source))] PathBuf),
    /// Layers could not be merged or deserialized.
    #[display("could not load configuration: {_0}")]
    Load(#[error(not(source))] String),
    /// The configuration loaded but is unusable.
    #[display("invalid configuration: {_0}")]
    Invalid(#[error(not(source))] String),
}

impl ErrorKind {
    pub fn is_retryable(&self) -> bool {
        false
    }
}
