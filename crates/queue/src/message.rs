use crate::Lane;
use crate::error::{ErrorKind, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use time::UtcDateTime;

/// A leased queue message.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: i64,
    pub lane: Lane,
    pub payload: serde_json::Value,
    pub enqueued_at: UtcDateTime,
    /// When the current lease expires.
    pub visible_at: UtcDateTime,
    /// Number of times this message has been leased, including this lease.
    pub read_count: u32,
}

impl Message {
    /// Decode the payload into a typed message body.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(T::deserialize(&self.payload).map_err(|e| ErrorKind::InvalidPayload(self.id, e.to_string()))?)
    }
}

/// The result of one [`lease`](crate::Queue::lease) call.
#[derive(Debug, Default)]
pub struct Lease {
    /// Leased messages in id order.
    pub messages: Vec<Message>,
    /// Messages moved to the dead-letter lane by this call.
    pub dead_lettered: u64,
}

impl Lease {
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Point-in-time counters for one lane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LaneMetrics {
    pub lane: String,
    pub queue_length: u64,
    pub visible: u64,
    pub leased: u64,
    /// Unix milliseconds of the oldest message still in the lane.
    pub oldest_enqueued_at: Option<i64>,
}

pub(crate) fn millis_to_datetime(millis: i64) -> Result<UtcDateTime> {
    UtcDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
        .map_err(|_| ErrorKind::InvalidData("timestamp").into())
}
