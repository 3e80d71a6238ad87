//! Durable work queue.
//!
//! Messages live in the shared SQLite database, partitioned into lanes.
//! Delivery is at-least-once: [`Queue::lease`] hides messages for a
//! visibility timeout, [`Queue::ack`] deletes them, and anything not acked
//! before its timeout becomes leasable again. A message leased
//! `max_deliveries` times without an ack is moved to the lane's dead-letter
//! lane on the next lease.
//!
//! Time comes from an injectable [`Clock`] so redelivery can be tested by
//! advancing a [`ManualClock`] instead of sleeping.

mod clock;
pub mod error;
mod lane;
mod message;
mod queue;

pub use crate::clock::{Clock, ManualClock, SystemClock};
pub use crate::lane::Lane;
pub use crate::message::{LaneMetrics, Lease, Message};
pub use crate::queue::{DEFAULT_MAX_DELIVERIES, Queue};
