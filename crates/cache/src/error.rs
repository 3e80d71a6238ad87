//! Cache Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A cache error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The database could not be reached or rejected the statement.
    #[display("database error")]
    Database,
    #[display("database migration error")]
    Migration,
    /// A value could not be converted to or from its stored form.
    #[display("invalid cache data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    ///
    /// SQLite errors are mostly `SQLITE_BUSY` under write contention, which
    /// a later redelivery resolves.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database)
    }
}
