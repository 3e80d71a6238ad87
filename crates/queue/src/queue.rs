use crate::clock::{Clock, SystemClock};
use crate::error::{ErrorKind, Result};
use crate::message::millis_to_datetime;
use crate::{Lane, LaneMetrics, Lease, Message};
use exn::ResultExt;
use pokemirror_cache::Database;
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Deliveries allowed before a message is dead-lettered.
pub const DEFAULT_MAX_DELIVERIES: u32 = 5;

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: i64,
    lane: String,
    payload: String,
    enqueued_at: i64,
    visible_at: i64,
    read_count: i64,
}
impl TryFrom<MessageRow> for Message {
    type Error = crate::error::Error;
    fn try_from(row: MessageRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            lane: Lane::new(row.lane),
            payload: serde_json::from_str(&row.payload)
                .map_err(|e| ErrorKind::InvalidPayload(row.id, e.to_string()))?,
            enqueued_at: millis_to_datetime(row.enqueued_at)?,
            visible_at: millis_to_datetime(row.visible_at)?,
            read_count: u32::try_from(row.read_count).or_raise(|| ErrorKind::InvalidData("read count"))?,
        })
    }
}

/// Handle to the work queue. Cloning is cheap; clones share the pool.
#[derive(Debug, Clone)]
pub struct Queue {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
    max_deliveries: u32,
}

impl Queue {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
            clock: Arc::new(SystemClock),
            max_deliveries: DEFAULT_MAX_DELIVERIES,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Set the dead-letter threshold. `0` disables dead-lettering.
    pub fn with_max_deliveries(mut self, max_deliveries: u32) -> Self {
        self.max_deliveries = max_deliveries;
        self
    }

    /// Append messages to a lane, returning how many were accepted.
    ///
    /// All messages are written in one transaction: either every message is
    /// enqueued or none is.
    #[instrument(skip(self, lane, messages), fields(lane = %lane, count = messages.len()))]
    pub async fn enqueue<T: Serialize>(&self, lane: &Lane, messages: &[T]) -> Result<u64> {
        if messages.is_empty() {
            return Ok(0);
        }
        let payloads = messages
            .iter()
            .map(|m| serde_json::to_string(m).or_raise(|| ErrorKind::Encode))
            .collect::<Result<Vec<_>>>()?;
        let now = self.clock.now_millis();
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        for payload in payloads {
            sqlx::query(include_str!("../queries/enqueue.sql"))
                .bind(lane.name())
                .bind(payload)
                .bind(now)
                .bind(now)
                .execute(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
        }
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(messages.len() as u64)
    }

    /// Lease up to `n` visible messages, hiding them for `visibility_timeout`.
    ///
    /// Before leasing, visible messages that have already been delivered
    /// `max_deliveries` times are moved to the dead-letter lane. Both steps
    /// run in a single transaction.
    #[instrument(skip(self, lane), fields(lane = %lane))]
    pub async fn lease(&self, lane: &Lane, visibility_timeout: Duration, n: usize) -> Result<Lease> {
        if n == 0 {
            return Ok(Lease::default());
        }
        let now = self.clock.now_millis();
        let timeout = i64::try_from(visibility_timeout.as_millis()).or_raise(|| ErrorKind::InvalidData("timeout"))?;
        let limit = i64::try_from(n).or_raise(|| ErrorKind::InvalidData("batch size"))?;
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;

        let mut dead_lettered = 0;
        if self.max_deliveries > 0 && !lane.is_dead_letter() {
            dead_lettered = sqlx::query(include_str!("../queries/dead_letter.sql"))
                .bind(lane.dead_letter().name())
                .bind(lane.name())
                .bind(now)
                .bind(i64::from(self.max_deliveries))
                .execute(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?
                .rows_affected();
            if dead_lettered > 0 {
                tracing::warn!(count = dead_lettered, dead_letter_lane = %lane.dead_letter(), "dead-lettered messages");
            }
        }

        let rows: Vec<MessageRow> = sqlx::query_as(include_str!("../queries/lease.sql"))
            .bind(now.saturating_add(timeout))
            .bind(lane.name())
            .bind(now)
            .bind(limit)
            .fetch_all(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;

        let mut messages = rows.into_iter().map(Message::try_from).collect::<Result<Vec<_>>>()?;
        // RETURNING order is unspecified in SQLite.
        messages.sort_by_key(|m| m.id);
        tracing::debug!(leased = messages.len(), "leased messages");
        Ok(Lease { messages, dead_lettered })
    }

    /// Permanently remove a message. Returns `false` if it no longer exists.
    pub async fn ack(&self, lane: &Lane, id: i64) -> Result<bool> {
        let result = sqlx::query(include_str!("../queries/ack.sql"))
            .bind(lane.name())
            .bind(id)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn metrics(&self, lane: &Lane) -> Result<LaneMetrics> {
        let (queue_length, visible, oldest_enqueued_at): (i64, i64, Option<i64>) =
            sqlx::query_as(include_str!("../queries/metrics.sql"))
                .bind(self.clock.now_millis())
                .bind(lane.name())
                .fetch_one(&self.pool)
                .await
                .or_raise(|| ErrorKind::Database)?;
        let queue_length = u64::try_from(queue_length).or_raise(|| ErrorKind::InvalidData("queue length"))?;
        let visible = u64::try_from(visible).or_raise(|| ErrorKind::InvalidData("visible count"))?;
        Ok(LaneMetrics {
            lane: lane.name().to_string(),
            queue_length,
            visible,
            leased: queue_length.saturating_sub(visible),
            oldest_enqueued_at,
        })
    }
}
