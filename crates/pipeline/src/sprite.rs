//! Mirroring asset bytes into blob storage.

use crate::classify::Classifier;
use crate::error::{self, ErrorKind, Result};
use crate::{SpriteMessage, pool};
use pokemirror_cache::{MirroredAsset, Repository, SpriteRole};
use pokemirror_queue::{Lane, Message, Queue};
use pokemirror_storage::{Buckets, validate_path};
use pokemirror_upstream::UpstreamHandle;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use time::UtcDateTime;
use tracing::instrument;

pub const ASSET_KIND: &str = "sprite";
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpriteOptions {
    pub batch_size: usize,
    pub visibility_timeout: Duration,
    /// Downloads in flight at once.
    pub concurrency: usize,
}

impl Default for SpriteOptions {
    fn default() -> Self {
        Self {
            batch_size: 10,
            visibility_timeout: Duration::from_secs(600),
            concurrency: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    /// Downloaded and written to the target path.
    Mirrored,
    /// Downloaded, but identical bytes were already stored in the bucket.
    Deduplicated,
    /// An asset row for the source URL already existed; nothing was fetched.
    AlreadyMirrored,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Mirrored {
    pub message_id: i64,
    pub source_url: String,
    pub bucket: String,
    pub path: String,
    pub outcome: Outcome,
    /// Set when a pokemon projection column was pointed at this asset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<SpriteRole>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpriteFailure {
    pub message_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpriteReport {
    pub processed: Vec<Mirrored>,
    pub failed: Vec<SpriteFailure>,
    pub dead_lettered: u64,
}

impl SpriteReport {
    pub fn is_empty(&self) -> bool {
        self.processed.is_empty() && self.failed.is_empty()
    }
}

pub struct SpriteWorker {
    upstream: UpstreamHandle,
    repo: Repository,
    queue: Queue,
    buckets: Buckets,
    classifier: Classifier,
}

impl SpriteWorker {
    pub fn new(upstream: UpstreamHandle, repo: Repository, queue: Queue, buckets: Buckets) -> Self {
        Self {
            upstream,
            repo,
            queue,
            buckets,
            classifier: Classifier::default(),
        }
    }

    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Lease one batch from the sprite lane and mirror it.
    ///
    /// The first message for each source URL goes through the bounded pool.
    /// Later messages for the same URL wait until the pool drains and then
    /// find the asset row their leader wrote, so each URL is downloaded at
    /// most once per batch. Per-item failures never affect siblings.
    #[instrument(name = "sprites", skip_all, fields(batch_size = options.batch_size, concurrency = options.concurrency))]
    pub async fn run(&self, options: &SpriteOptions) -> Result<SpriteReport> {
        let lease = self
            .queue
            .lease(&Lane::SPRITES, options.visibility_timeout, options.batch_size)
            .await
            .map_err(error::queue)?;
        if lease.dead_lettered > 0 {
            tracing::warn!(dead_lettered = lease.dead_lettered, lane = %Lane::SPRITES.dead_letter(), "dead-lettered messages");
        }
        let mut report = SpriteReport {
            dead_lettered: lease.dead_lettered,
            ..SpriteReport::default()
        };
        if lease.is_empty() {
            tracing::debug!("nothing to mirror");
            return Ok(report);
        }
        tracing::info!(messages = lease.messages.len(), "processing sprite batch");

        let mut leaders = Vec::new();
        let mut followers = Vec::new();
        let mut seen = HashSet::new();
        for message in &lease.messages {
            match message.decode::<SpriteMessage>() {
                Ok(body) if seen.insert(body.source_url.clone()) => leaders.push((message, body)),
                Ok(body) => followers.push((message, body)),
                Err(err) => report.failed.push(failure(message, ErrorKind::Payload((*err).to_string()).into())),
            }
        }

        let work = leaders.iter().map(|(message, body)| async move { (*message, self.process(message, body).await) }).collect::<Vec<_>>();
        let mut outcomes = pool::bounded(work, options.concurrency).await;
        for (message, body) in &followers {
            outcomes.push((*message, self.process(message, body).await));
        }

        for (message, outcome) in outcomes {
            match outcome {
                Ok(mirrored) => report.processed.push(mirrored),
                Err(err) => report.failed.push(failure(message, err)),
            }
        }
        report.processed.sort_by_key(|mirrored| mirrored.message_id);
        report.failed.sort_by_key(|failure| failure.message_id);
        tracing::info!(processed = report.processed.len(), failed = report.failed.len(), "sprite batch done");
        Ok(report)
    }

    async fn process(&self, message: &Message, body: &SpriteMessage) -> Result<Mirrored> {
        if let Some(existing) = self.repo.get_asset_by_source_url(&body.source_url).await.map_err(error::cache)? {
            self.queue.ack(&Lane::SPRITES, message.id).await.map_err(error::queue)?;
            tracing::debug!(message_id = message.id, source_url = %body.source_url, "already mirrored");
            return Ok(Mirrored {
                message_id: message.id,
                source_url: body.source_url.clone(),
                bucket: existing.bucket,
                path: existing.path,
                outcome: Outcome::AlreadyMirrored,
                role: None,
            });
        }

        let backend = self.buckets.resolve(body.target_bucket.as_deref()).map_err(error::storage)?;
        let bucket = backend.name().to_string();
        let target = validate_path(&body.target_path).map_err(error::storage)?;

        let download = self.upstream.fetch_bytes(&body.source_url).await.map_err(error::upstream)?;
        let content_hash = format!("{:x}", Sha256::digest(&download.bytes));
        let content_type = download.content_type.unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

        let twin = self.repo.find_asset_by_content_hash(&bucket, &content_hash).await.map_err(error::cache)?;
        let (path, outcome) = match twin {
            Some(twin) if backend.exists(Path::new(&twin.path)).await.map_err(error::storage)? => {
                (twin.path, Outcome::Deduplicated)
            },
            _ => {
                backend.write(&target, &download.bytes, Some(&content_type)).await.map_err(error::storage)?;
                (body.target_path.clone(), Outcome::Mirrored)
            },
        };

        let now = UtcDateTime::now();
        let asset = MirroredAsset {
            id: None,
            asset_kind: ASSET_KIND.to_string(),
            resource_type: body.resource_type.clone(),
            resource_id: body.resource_id,
            source_url: body.source_url.clone(),
            bucket: bucket.clone(),
            path: path.clone(),
            content_type: Some(content_type),
            byte_size: u64::try_from(download.bytes.len()).unwrap_or(u64::MAX),
            content_hash,
            updated_at: now,
        };
        self.repo.upsert_asset(&asset).await.map_err(error::cache)?;

        let role = self.patch_projection(body, &path, now).await?;
        self.queue.ack(&Lane::SPRITES, message.id).await.map_err(error::queue)?;

        tracing::debug!(message_id = message.id, %bucket, %path, ?outcome, "mirrored");
        Ok(Mirrored {
            message_id: message.id,
            source_url: body.source_url.clone(),
            bucket,
            path,
            outcome,
            role,
        })
    }

    /// Point the owning pokemon's projection at the stored asset when the
    /// target path has a recognised role.
    async fn patch_projection(&self, body: &SpriteMessage, path: &str, now: UtcDateTime) -> Result<Option<SpriteRole>> {
        let (Some("pokemon"), Some(pokemon_id)) = (body.resource_type.as_deref(), body.resource_id) else {
            return Ok(None);
        };
        let Some(role) = self.classifier.classify(&body.target_path) else {
            return Ok(None);
        };
        let patched = self.repo.patch_pokemon_sprite(pokemon_id, role, path, now).await.map_err(error::cache)?;
        if !patched {
            tracing::debug!(pokemon_id, %role, "no projection row to patch yet");
            return Ok(None);
        }
        Ok(Some(role))
    }
}

fn failure(message: &Message, err: error::Error) -> SpriteFailure {
    let source_url = message.payload.get("source_url").and_then(Value::as_str).map(str::to_string);
    let reason = (*err).to_string();
    tracing::warn!(message_id = message.id, ?source_url, error = %reason, retryable = err.is_retryable(), "sprite failed");
    SpriteFailure {
        message_id: message.id,
        source_url,
        error: reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pokemirror_cache::{Database, PokemonBasics};
    use pokemirror_storage::BackendHandle;
    use pokemirror_storage::backend::{MockBackend, StorageBackend};
    use pokemirror_upstream::MockUpstream;
    use serde_json::json;
    use std::sync::Arc;

    const SPRITES: &str = "https://raw.githubusercontent.com/PokeAPI/sprites/master/sprites";

    struct Harness {
        db: Database,
        queue: Queue,
        backend: Arc<MockBackend>,
    }

    impl Harness {
        async fn new() -> Self {
            let db = Database::connect_in_memory().await.unwrap();
            let queue = Queue::new(&db);
            let backend = Arc::new(MockBackend::default().with_name("pokedex-sprites"));
            Self { db, queue, backend }
        }

        fn repo(&self) -> Repository {
            Repository::from(&self.db)
        }

        fn worker(&self, upstream: MockUpstream) -> SpriteWorker {
            let backend: BackendHandle = self.backend.clone();
            SpriteWorker::new(Arc::new(upstream), self.repo(), self.queue.clone(), Buckets::single(backend))
        }

        async fn enqueue(&self, messages: &[SpriteMessage]) {
            self.queue.enqueue(&Lane::SPRITES, messages).await.unwrap();
        }
    }

    fn sprite(source: &str, target_path: &str) -> SpriteMessage {
        SpriteMessage {
            source_url: format!("{SPRITES}/{source}"),
            resource_type: Some("pokemon".to_string()),
            resource_id: Some(25),
            target_bucket: Some("pokedex-sprites".to_string()),
            target_path: target_path.to_string(),
        }
    }

    #[tokio::test]
    async fn test_one_missing_download_does_not_affect_siblings() {
        let harness = Harness::new().await;
        let mut upstream = MockUpstream::new();
        let mut messages = Vec::new();
        for n in 1..=5 {
            if n != 3 {
                upstream = upstream.with_bytes(format!("{SPRITES}/pokemon/{n}.png"), vec![n as u8; 8], Some("image/png"));
            }
            messages.push(sprite(&format!("pokemon/{n}.png"), &format!("pokemon/{n}/pokemon/{n}.png")));
        }
        harness.enqueue(&messages).await;

        let report = harness.worker(upstream).run(&SpriteOptions::default()).await.unwrap();
        assert_eq!(report.processed.len(), 4);
        assert!(report.processed.iter().all(|m| m.outcome == Outcome::Mirrored));
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].source_url.as_deref(), Some(format!("{SPRITES}/pokemon/3.png").as_str()));
        assert!(report.failed[0].error.contains("404"));

        let metrics = harness.queue.metrics(&Lane::SPRITES).await.unwrap();
        assert_eq!(metrics.queue_length, 1);
        assert_eq!(metrics.leased, 1);
        assert_eq!(harness.repo().count_assets().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_same_source_url_downloaded_once() {
        let harness = Harness::new().await;
        let source_url = format!("{SPRITES}/pokemon/25.png");
        let upstream = MockUpstream::new().with_bytes(&source_url, b"pika".to_vec(), Some("image/png"));
        harness
            .enqueue(&[
                sprite("pokemon/25.png", "pokemon/25/pokemon/25.png"),
                sprite("pokemon/25.png", "pokemon/25/elsewhere/25.png"),
            ])
            .await;
        let worker = harness.worker(upstream);

        let report = worker.run(&SpriteOptions::default()).await.unwrap();
        assert!(report.failed.is_empty());
        let outcomes: Vec<Outcome> = report.processed.iter().map(|m| m.outcome).collect();
        assert_eq!(outcomes, vec![Outcome::Mirrored, Outcome::AlreadyMirrored]);
        assert_eq!(report.processed[1].path, "pokemon/25/pokemon/25.png");
        assert_eq!(harness.backend.write_count(), 1);
        assert_eq!(harness.repo().count_assets().await.unwrap(), 1);
        assert_eq!(harness.queue.metrics(&Lane::SPRITES).await.unwrap().queue_length, 0);
    }

    #[tokio::test]
    async fn test_already_mirrored_across_invocations() {
        let harness = Harness::new().await;
        let source_url = format!("{SPRITES}/pokemon/25.png");
        let upstream = MockUpstream::new().with_bytes(&source_url, b"pika".to_vec(), Some("image/png"));
        let worker = harness.worker(upstream);
        let message = sprite("pokemon/25.png", "pokemon/25/pokemon/25.png");

        harness.enqueue(std::slice::from_ref(&message)).await;
        worker.run(&SpriteOptions::default()).await.unwrap();
        harness.enqueue(&[message]).await;
        let report = worker.run(&SpriteOptions::default()).await.unwrap();

        assert_eq!(report.processed[0].outcome, Outcome::AlreadyMirrored);
        assert_eq!(harness.backend.write_count(), 1);
    }

    #[tokio::test]
    async fn test_identical_bytes_are_stored_once() {
        let harness = Harness::new().await;
        let upstream = MockUpstream::new()
            .with_bytes(format!("{SPRITES}/pokemon/25.png"), b"same".to_vec(), Some("image/png"))
            .with_bytes(format!("{SPRITES}/pokemon/showdown/25.png"), b"same".to_vec(), Some("image/png"));
        let options = SpriteOptions {
            concurrency: 1,
            ..SpriteOptions::default()
        };
        let worker = harness.worker(upstream);

        harness.enqueue(&[sprite("pokemon/25.png", "pokemon/25/pokemon/25.png")]).await;
        worker.run(&options).await.unwrap();
        harness
            .enqueue(&[sprite("pokemon/showdown/25.png", "pokemon/25/pokemon/showdown/25.png")])
            .await;
        let report = worker.run(&options).await.unwrap();

        assert_eq!(report.processed[0].outcome, Outcome::Deduplicated);
        assert_eq!(report.processed[0].path, "pokemon/25/pokemon/25.png");
        assert_eq!(harness.backend.write_count(), 1);
        let twin = harness
            .repo()
            .get_asset_by_source_url(format!("{SPRITES}/pokemon/showdown/25.png"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(twin.path, "pokemon/25/pokemon/25.png");
        assert_eq!(twin.content_hash, format!("{:x}", Sha256::digest(b"same")));
    }

    #[tokio::test]
    async fn test_hash_twin_with_missing_blob_is_rewritten() {
        let harness = Harness::new().await;
        harness
            .repo()
            .upsert_asset(&MirroredAsset {
                id: None,
                asset_kind: ASSET_KIND.to_string(),
                resource_type: None,
                resource_id: None,
                source_url: "https://example.test/lost.png".to_string(),
                bucket: "pokedex-sprites".to_string(),
                path: "lost/lost.png".to_string(),
                content_type: None,
                byte_size: 4,
                content_hash: format!("{:x}", Sha256::digest(b"same")),
                updated_at: UtcDateTime::now(),
            })
            .await
            .unwrap();
        let upstream = MockUpstream::new().with_bytes(format!("{SPRITES}/pokemon/25.png"), b"same".to_vec(), None);
        harness.enqueue(&[sprite("pokemon/25.png", "pokemon/25/pokemon/25.png")]).await;

        let report = harness.worker(upstream).run(&SpriteOptions::default()).await.unwrap();
        assert_eq!(report.processed[0].outcome, Outcome::Mirrored);
        assert!(harness.backend.exists(Path::new("pokemon/25/pokemon/25.png")).await.unwrap());
        assert_eq!(
            harness.backend.content_type("pokemon/25/pokemon/25.png").await.as_deref(),
            Some(DEFAULT_CONTENT_TYPE)
        );
    }

    #[tokio::test]
    async fn test_projection_is_patched_for_recognised_roles() {
        let harness = Harness::new().await;
        let basics = PokemonBasics {
            id: 25,
            name: "pikachu".to_string(),
            height: Some(4),
            weight: Some(60),
            base_experience: Some(112),
            is_default: true,
        };
        harness.repo().upsert_pokemon_basics(&basics, UtcDateTime::now()).await.unwrap();
        let upstream = MockUpstream::new()
            .with_bytes(format!("{SPRITES}/pokemon/other/official-artwork/25.png"), b"art".to_vec(), Some("image/png"))
            .with_bytes(format!("{SPRITES}/pokemon/25.png"), b"front".to_vec(), Some("image/png"))
            .with_bytes(format!("{SPRITES}/pokemon/back/25.png"), b"back".to_vec(), Some("image/png"));
        harness
            .enqueue(&[
                sprite("pokemon/other/official-artwork/25.png", "pokemon/25/pokemon/other/official-artwork/25.png"),
                sprite("pokemon/25.png", "pokemon/25/pokemon/25.png"),
                sprite("pokemon/back/25.png", "pokemon/25/pokemon/back/25.png"),
            ])
            .await;

        let report = harness.worker(upstream).run(&SpriteOptions::default()).await.unwrap();
        let roles: Vec<Option<SpriteRole>> = report.processed.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Some(SpriteRole::OfficialArtwork), Some(SpriteRole::FrontDefault), None]);

        let projection = harness.repo().get_pokemon(25).await.unwrap().unwrap();
        assert_eq!(
            projection.sprite_path(SpriteRole::OfficialArtwork),
            Some("pokemon/25/pokemon/other/official-artwork/25.png")
        );
        assert_eq!(projection.sprite_path(SpriteRole::FrontDefault), Some("pokemon/25/pokemon/25.png"));
    }

    #[tokio::test]
    async fn test_unknown_bucket_fails_only_that_item() {
        let harness = Harness::new().await;
        let upstream = MockUpstream::new().with_bytes(format!("{SPRITES}/pokemon/25.png"), b"pika".to_vec(), None);
        let mut stray = sprite("pokemon/26.png", "pokemon/26/pokemon/26.png");
        stray.target_bucket = Some("nowhere".to_string());
        harness.enqueue(&[sprite("pokemon/25.png", "pokemon/25/pokemon/25.png"), stray]).await;

        let report = harness.worker(upstream).run(&SpriteOptions::default()).await.unwrap();
        assert_eq!(report.processed.len(), 1);
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].error.contains("nowhere"));
    }

    #[tokio::test]
    async fn test_storage_failure_leaves_no_asset_row() {
        let harness = Harness::new().await;
        let backend: BackendHandle = Arc::new(MockBackend::default().with_name("pokedex-sprites").failing_writes());
        let upstream = MockUpstream::new().with_bytes(format!("{SPRITES}/pokemon/25.png"), b"pika".to_vec(), None);
        let worker =
            SpriteWorker::new(Arc::new(upstream), harness.repo(), harness.queue.clone(), Buckets::single(backend));
        harness.enqueue(&[sprite("pokemon/25.png", "pokemon/25/pokemon/25.png")]).await;

        let report = worker.run(&SpriteOptions::default()).await.unwrap();
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].error.starts_with("storage error"));
        assert_eq!(harness.repo().count_assets().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_malformed_message_is_reported() {
        let harness = Harness::new().await;
        harness.queue.enqueue(&Lane::SPRITES, &[json!({"source_url": "https://x.test/a.png"})]).await.unwrap();
        let report = harness.worker(MockUpstream::new()).run(&SpriteOptions::default()).await.unwrap();
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].source_url.as_deref(), Some("https://x.test/a.png"));
        assert!(report.failed[0].error.starts_with("invalid message"));
    }

    #[tokio::test]
    async fn test_traversal_target_is_rejected() {
        let harness = Harness::new().await;
        let upstream = MockUpstream::new().with_bytes(format!("{SPRITES}/pokemon/25.png"), b"pika".to_vec(), None);
        harness.enqueue(&[sprite("pokemon/25.png", "../../etc/passwd")]).await;
        let worker = harness.worker(upstream);

        let report = worker.run(&SpriteOptions::default()).await.unwrap();
        assert_eq!(report.failed.len(), 1);
        assert_eq!(harness.backend.write_count(), 0);
    }

    #[test]
    fn test_report_wire_format() {
        let mirrored = Mirrored {
            message_id: 4,
            source_url: format!("{SPRITES}/pokemon/25.png"),
            bucket: "pokedex-sprites".to_string(),
            path: "pokemon/25/pokemon/25.png".to_string(),
            outcome: Outcome::AlreadyMirrored,
            role: Some(SpriteRole::FrontDefault),
        };
        let value = serde_json::to_value(&mirrored).unwrap();
        assert_eq!(value["outcome"], "already-mirrored");
        assert_eq!(value["role"], "front-default");
        assert_eq!(value["sourceUrl"], format!("{SPRITES}/pokemon/25.png"));
    }
}
