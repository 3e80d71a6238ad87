//! Upstream Error Types

use derive_more::{Display, Error};

/// An upstream error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for upstream operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Upstream answered with a non-success status.
    #[display("{url} returned HTTP {status}")]
    Status {
        #[error(not(source))]
        url: String,
        #[error(not(source))]
        status: u16,
    },
    /// The request never got a response (DNS, TLS, timeout, reset).
    #[display("request to {url} failed: {reason}")]
    Network {
        #[error(not(source))]
        url: String,
        #[error(not(source))]
        reason: String,
    },
    /// The response body was not what the endpoint promises.
    #[display("malformed response from {_0}")]
    InvalidResponse(#[error(not(source))] String),
    /// The client could not be built from its configuration.
    #[display("invalid upstream configuration: {_0}")]
    Config(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    ///
    /// Client errors other than throttling will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Network { .. } => true,
            Self::InvalidResponse(_) | Self::Config(_) => false,
        }
    }
}
