//! Queue Error Types

use derive_more::{Display, Error};

/// A queue error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for queue operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The queue table could not be read or written.
    #[display("queue storage error")]
    Database,
    /// A payload could not be serialized for enqueueing.
    #[display("unserializable payload")]
    Encode,
    /// A leased payload does not match the shape the consumer expects.
    #[display("invalid payload in message {_0}: {_1}")]
    InvalidPayload(#[error(not(source))] i64, #[error(not(source))] String),
    /// A stored value is out of range.
    #[display("invalid queue data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database)
    }
}
