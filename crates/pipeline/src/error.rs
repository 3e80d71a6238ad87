//! Pipeline Error Types
//!
//! Two kinds of failure come out of a worker invocation. Fatal errors (the
//! queue cannot be leased from) are returned from `run()`. Everything that
//! goes wrong with a single message is an item error: it is logged, folded
//! into the report, and the message is left for redelivery.

use derive_more::{Display, Error};

/// A pipeline error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Leasing, enqueueing or acknowledging failed.
    #[display("queue error: {_0}")]
    Queue(#[error(not(source))] String),
    /// The message body does not match its lane's schema.
    #[display("invalid message: {_0}")]
    Payload(#[error(not(source))] String),
    /// Upstream request failed.
    #[display("{_0}")]
    Upstream(#[error(not(source))] String),
    /// Writing to or reading from the database failed.
    #[display("cache error: {_0}")]
    Cache(#[error(not(source))] String),
    /// Blob storage rejected a read or write.
    #[display("storage error: {_0}")]
    Storage(#[error(not(source))] String),
    /// Neither the message nor the URL names a resource type.
    #[display("cannot determine resource type of {_0}")]
    UnknownResourceType(#[error(not(source))] String),
    /// The upstream document is not a JSON object with usable identity.
    #[display("unrecognised document at {_0}")]
    Document(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if redelivering the message might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Queue(_) | Self::Upstream(_) | Self::Cache(_) | Self::Storage(_) => true,
            Self::Payload(_) | Self::UnknownResourceType(_) | Self::Document(_) => false,
        }
    }
}

/// Converters used with `map_err` at crate boundaries. The source error's
/// message is kept so reports say what actually went wrong.
pub(crate) fn queue(err: pokemirror_queue::error::Error) -> ErrorKind {
    ErrorKind::Queue((*err).to_string())
}

pub(crate) fn upstream(err: pokemirror_upstream::error::Error) -> ErrorKind {
    ErrorKind::Upstream((*err).to_string())
}

pub(crate) fn cache(err: pokemirror_cache::error::Error) -> ErrorKind {
    ErrorKind::Cache((*err).to_string())
}

pub(crate) fn storage(err: pokemirror_storage::error::Error) -> ErrorKind {
    ErrorKind::Storage((*err).to_string())
}
