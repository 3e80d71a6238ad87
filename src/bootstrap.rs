//! Building pipeline components from configuration.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use pokemirror_cache::{Database, Repository};
use pokemirror_config::{BucketConfig, Config, IngestLaneConfig, SpriteLaneConfig, StorageConfig};
use pokemirror_pipeline::{IngestOptions, IngestWorker, Seeder, SpriteOptions, SpriteWorker};
use pokemirror_queue::{Lane, LaneMetrics, Queue};
use pokemirror_storage::backend::LocalBackend;
use pokemirror_storage::{BackendHandle, Buckets};
use pokemirror_upstream::{HttpUpstream, UpstreamHandle};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Everything a command or request handler needs, built once per process.
pub struct App {
    config: Config,
    db: Database,
    queue: Queue,
    upstream: UpstreamHandle,
    buckets: Buckets,
}

/// Queue depths plus cache totals.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub lanes: Vec<LaneMetrics>,
    pub resources: BTreeMap<String, u64>,
    pub assets: u64,
    /// Configured bucket names, sorted.
    pub buckets: Vec<String>,
}

impl App {
    /// Connect to everything the configuration names. Any failure here is a
    /// configuration problem no invocation could recover from.
    pub async fn from_config(config: Config) -> Result<Self> {
        let db = Database::connect(&config.database.path).await.or_raise(|| ErrorKind::Database)?;
        let base_url = url::Url::parse(&config.upstream.base_url)
            .map_err(|e| ErrorKind::Config(format!("upstream.base_url: {e}")))?;
        let mut upstream = HttpUpstream::new(base_url, config.upstream.timeout()).or_raise(|| ErrorKind::Upstream)?;
        if let Some(user_agent) = &config.upstream.user_agent {
            upstream = upstream.with_user_agent(user_agent);
        }
        let buckets = open_buckets(&config.storage).await?;
        Ok(Self::new(config, db, Arc::new(upstream), buckets))
    }

    pub fn new(config: Config, db: Database, upstream: UpstreamHandle, buckets: Buckets) -> Self {
        let queue = Queue::new(&db).with_max_deliveries(config.queue.max_deliveries);
        Self {
            config,
            db,
            queue,
            upstream,
            buckets,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn repo(&self) -> Repository {
        Repository::from(&self.db)
    }

    pub fn seeder(&self) -> Seeder {
        Seeder::new(self.upstream.clone(), self.queue.clone()).with_page_delay(self.config.upstream.request_delay())
    }

    pub fn ingest_worker(&self) -> IngestWorker {
        IngestWorker::new(self.upstream.clone(), self.repo(), self.queue.clone(), self.buckets.default_name())
            .with_request_delay(self.config.upstream.request_delay())
    }

    pub fn sprite_worker(&self) -> SpriteWorker {
        SpriteWorker::new(self.upstream.clone(), self.repo(), self.queue.clone(), self.buckets.clone())
    }

    pub fn ingest_defaults(&self) -> IngestOptions {
        let IngestLaneConfig {
            batch_size,
            visibility_timeout,
            concurrency,
            enqueue_sprites,
        } = self.config.queue.ingest;
        IngestOptions {
            batch_size,
            visibility_timeout: Duration::from_secs(visibility_timeout),
            concurrency,
            enqueue_sprites,
        }
    }

    pub fn sprite_defaults(&self) -> SpriteOptions {
        let SpriteLaneConfig {
            batch_size,
            visibility_timeout,
            concurrency,
        } = self.config.queue.sprites;
        SpriteOptions {
            batch_size,
            visibility_timeout: Duration::from_secs(visibility_timeout),
            concurrency,
        }
    }

    pub async fn status(&self) -> Result<Status> {
        let mut lanes = Vec::new();
        for lane in [Lane::INGEST, Lane::INGEST.dead_letter(), Lane::SPRITES, Lane::SPRITES.dead_letter()] {
            lanes.push(self.queue.metrics(&lane).await.or_raise(|| ErrorKind::Database)?);
        }
        let mut buckets: Vec<String> = self.buckets.names().map(str::to_string).collect();
        buckets.sort();
        let repo = self.repo();
        Ok(Status {
            lanes,
            buckets,
            resources: repo.count_resources_by_type().await.or_raise(|| ErrorKind::Database)?,
            assets: repo.count_assets().await.or_raise(|| ErrorKind::Database)?,
        })
    }

    pub async fn healthy(&self) -> bool {
        self.db.ping().await
    }

    pub async fn close(&self) {
        self.db.close().await;
    }
}

async fn open_buckets(storage: &StorageConfig) -> Result<Buckets> {
    let mut backends: Vec<BackendHandle> = Vec::new();
    for (name, bucket) in &storage.buckets {
        backends.push(open_bucket(name, bucket).await?);
    }
    Ok(Buckets::new(storage.default_bucket.clone(), backends)
        .or_raise(|| ErrorKind::Config(format!("default bucket `{}` is not configured", storage.default_bucket)))?)
}

async fn open_bucket(name: &str, bucket: &BucketConfig) -> Result<BackendHandle> {
    match bucket {
        BucketConfig::Local { root } => {
            let root = std::path::absolute(root).or_raise(|| ErrorKind::Storage(name.to_string()))?;
            tracing::debug!(bucket = name, root = %root.display(), "opening local bucket");
            let backend = LocalBackend::new(name, root).or_raise(|| ErrorKind::Storage(name.to_string()))?;
            Ok(Arc::new(backend))
        },
        #[cfg(feature = "s3")]
        BucketConfig::S3 {
            bucket,
            prefix,
            region,
            endpoint,
            key_id,
            key_secret,
        } => {
            tracing::debug!(bucket = name, s3_bucket = %bucket, %region, "opening s3 bucket");
            let backend = pokemirror_storage::backend::S3Backend::new(
                name,
                bucket,
                prefix.clone(),
                region,
                endpoint.clone(),
                key_id,
                key_secret,
            )
            .await
            .or_raise(|| ErrorKind::Storage(name.to_string()))?;
            Ok(Arc::new(backend))
        },
        #[cfg(not(feature = "s3"))]
        BucketConfig::S3 { .. } => {
            exn::bail!(ErrorKind::Config(format!("bucket `{name}` needs a build with the `s3` feature")))
        },
    }
}
