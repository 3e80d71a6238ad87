//! Turning queued resource URLs into cached documents.

use crate::discover::{parse_api_url, sprite_urls, target_path};
use crate::error::{self, ErrorKind, Result};
use crate::{IngestMessage, SpriteMessage, pool};
use pokemirror_cache::{CachedResource, PokemonBasics, Repository};
use pokemirror_queue::{Lane, Message, Queue};
use pokemirror_upstream::UpstreamHandle;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use time::UtcDateTime;
use tracing::instrument;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOptions {
    pub batch_size: usize,
    pub visibility_timeout: Duration,
    pub concurrency: usize,
    /// Queue discovered assets for the sprite worker.
    pub enqueue_sprites: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            batch_size: 10,
            visibility_timeout: Duration::from_secs(300),
            concurrency: 4,
            enqueue_sprites: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ingested {
    pub message_id: i64,
    pub url: String,
    pub resource_type: String,
    pub resource_key: String,
    pub sprites_enqueued: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestFailure {
    pub message_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub processed: Vec<Ingested>,
    pub failed: Vec<IngestFailure>,
    /// Messages moved to the dead-letter lane while leasing.
    pub dead_lettered: u64,
}

impl IngestReport {
    /// Whether the lease that produced this report came back empty.
    pub fn is_empty(&self) -> bool {
        self.processed.is_empty() && self.failed.is_empty()
    }
}

pub struct IngestWorker {
    upstream: UpstreamHandle,
    repo: Repository,
    queue: Queue,
    sprite_bucket: String,
    request_delay: Duration,
}

impl IngestWorker {
    /// Discovered assets are addressed to `sprite_bucket`.
    pub fn new(upstream: UpstreamHandle, repo: Repository, queue: Queue, sprite_bucket: impl Into<String>) -> Self {
        Self {
            upstream,
            repo,
            queue,
            sprite_bucket: sprite_bucket.into(),
            request_delay: Duration::ZERO,
        }
    }

    /// Pause after every upstream fetch.
    pub fn with_request_delay(mut self, request_delay: Duration) -> Self {
        self.request_delay = request_delay;
        self
    }

    /// Lease one batch from the ingest lane and process it.
    ///
    /// Only a failed lease is fatal. Every other failure belongs to a single
    /// message, which is reported and left unacknowledged so it comes back
    /// after the visibility timeout.
    #[instrument(name = "ingest", skip_all, fields(batch_size = options.batch_size, concurrency = options.concurrency))]
    pub async fn run(&self, options: &IngestOptions) -> Result<IngestReport> {
        let lease = self
            .queue
            .lease(&Lane::INGEST, options.visibility_timeout, options.batch_size)
            .await
            .map_err(error::queue)?;
        if lease.dead_lettered > 0 {
            tracing::warn!(dead_lettered = lease.dead_lettered, lane = %Lane::INGEST.dead_letter(), "dead-lettered messages");
        }
        let mut report = IngestReport {
            dead_lettered: lease.dead_lettered,
            ..IngestReport::default()
        };
        if lease.is_empty() {
            tracing::debug!("nothing to ingest");
            return Ok(report);
        }
        tracing::info!(messages = lease.messages.len(), "processing ingest batch");

        let work = lease.messages.iter().map(|message| async move {
            let outcome = self.process(message, options.enqueue_sprites).await;
            (message, outcome)
        }).collect::<Vec<_>>();
        for (message, outcome) in pool::bounded(work, options.concurrency).await {
            match outcome {
                Ok(ingested) => report.processed.push(ingested),
                Err(err) => {
                    let url = message.payload.get("url").and_then(Value::as_str).map(str::to_string);
                    let reason = (*err).to_string();
                    tracing::warn!(message_id = message.id, ?url, error = %reason, retryable = err.is_retryable(), "ingest failed");
                    report.failed.push(IngestFailure {
                        message_id: message.id,
                        url,
                        error: reason,
                    });
                },
            }
        }
        report.processed.sort_by_key(|ingested| ingested.message_id);
        report.failed.sort_by_key(|failure| failure.message_id);
        tracing::info!(processed = report.processed.len(), failed = report.failed.len(), "ingest batch done");
        Ok(report)
    }

    async fn process(&self, message: &Message, enqueue_sprites: bool) -> Result<Ingested> {
        let body: IngestMessage = message.decode().map_err(|e| ErrorKind::Payload((*e).to_string()))?;
        let (url_type, url_key) = parse_api_url(&body.url);
        let resource_type = body
            .resource_type
            .or(url_type)
            .ok_or_else(|| ErrorKind::UnknownResourceType(body.url.clone()))?;

        let document = self.upstream.fetch_json(&body.url).await.map_err(error::upstream)?;
        tokio::time::sleep(self.request_delay).await;
        let fetched_at = UtcDateTime::now();

        let resource_id = document.get("id").and_then(Value::as_i64);
        let resource_key = resource_id
            .map(|id| id.to_string())
            .or(url_key)
            .ok_or_else(|| ErrorKind::Document(body.url.clone()))?;
        let name = document.get("name").and_then(Value::as_str).map(str::to_string);
        let mut sprites: Vec<SpriteMessage> = Vec::new();
        if enqueue_sprites {
            sprites.extend(sprite_urls(&resource_type, &document).into_iter().map(|source_url| SpriteMessage {
                target_path: target_path(&resource_type, &resource_key, &source_url),
                source_url,
                resource_type: Some(resource_type.clone()),
                resource_id,
                target_bucket: Some(self.sprite_bucket.clone()),
            }));
        }
        let basics = match resource_type.as_str() {
            "pokemon" => PokemonBasics::from_payload(&document),
            _ => None,
        };

        let resource =
            CachedResource::fetched(&resource_type, &resource_key, name, &body.url, document, fetched_at);
        if !self.repo.upsert_resource(&resource).await.map_err(error::cache)? {
            tracing::debug!(%resource_type, %resource_key, "newer copy already cached");
        }
        if let Some(basics) = basics {
            self.repo.upsert_pokemon_basics(&basics, fetched_at).await.map_err(error::cache)?;
        }
        let sprites_enqueued = self.queue.enqueue(&Lane::SPRITES, &sprites).await.map_err(error::queue)?;
        self.queue.ack(&Lane::INGEST, message.id).await.map_err(error::queue)?;

        tracing::debug!(message_id = message.id, %resource_type, %resource_key, sprites_enqueued, "ingested");
        Ok(Ingested {
            message_id: message.id,
            url: body.url,
            resource_type,
            resource_key,
            sprites_enqueued,
        })
    }
}
