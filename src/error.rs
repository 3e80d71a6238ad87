//! Binary Error Types

use derive_more::{Display, Error};

/// A top-level error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for command and bootstrap operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Configuration could not be loaded, or names something unusable.
    #[display("invalid configuration: {_0}")]
    Config(#[error(not(source))] String),
    #[display("database unavailable")]
    Database,
    #[display("could not open bucket `{_0}`")]
    Storage(#[error(not(source))] String),
    #[display("could not build upstream client")]
    Upstream,
    /// A worker invocation failed as a whole.
    #[display("{_0}")]
    Pipeline(#[error(not(source))] String),
    #[display("HTTP server failed")]
    Server,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Database | Self::Pipeline(_) | Self::Server => true,
            Self::Config(_) | Self::Storage(_) | Self::Upstream => false,
        }
    }
}
