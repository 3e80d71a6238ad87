use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://pokeapi.co/api/v2";
pub const DEFAULT_BUCKET: &str = "pokedex-sprites";

/// The upstream REST API.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub base_url: String,
    /// Overrides the client's default `User-Agent`.
    pub user_agent: Option<String>,
    /// Pause after every upstream request, in milliseconds.
    pub request_delay_ms: u64,
    pub timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: None,
            request_delay_ms: 100,
            timeout_secs: 30,
        }
    }
}

impl UpstreamConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file holding the cache, asset metadata, projections and queue.
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: crate::data_dir().join("pokemirror.sqlite"),
        }
    }
}

/// One named blob storage bucket.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BucketConfig {
    /// Directory on the local filesystem.
    Local { root: PathBuf },
    /// S3-compatible object storage.
    S3 {
        bucket: String,
        #[serde(default)]
        prefix: Option<String>,
        region: String,
        /// Custom endpoint for non-AWS services.
        #[serde(default)]
        endpoint: Option<String>,
        key_id: String,
        key_secret: String,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Bucket used when a sprite message names none.
    pub default_bucket: String,
    pub buckets: BTreeMap<String, BucketConfig>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            default_bucket: DEFAULT_BUCKET.to_string(),
            buckets: BTreeMap::from([(
                DEFAULT_BUCKET.to_string(),
                BucketConfig::Local {
                    root: crate::data_dir().join("sprites"),
                },
            )]),
        }
    }
}

/// Defaults for ingest worker invocations; request bodies override them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestLaneConfig {
    pub batch_size: usize,
    /// Seconds a leased message stays hidden.
    pub visibility_timeout: u64,
    pub concurrency: usize,
    pub enqueue_sprites: bool,
}

impl Default for IngestLaneConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            visibility_timeout: 300,
            concurrency: 4,
            enqueue_sprites: true,
        }
    }
}

/// Defaults for sprite worker invocations; request bodies override them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpriteLaneConfig {
    pub batch_size: usize,
    /// Seconds a leased message stays hidden.
    pub visibility_timeout: u64,
    pub concurrency: usize,
}

impl Default for SpriteLaneConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            visibility_timeout: 600,
            concurrency: 3,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Deliveries before a message moves to its dead-letter lane; `0`
    /// disables dead-lettering.
    pub max_deliveries: u32,
    pub ingest: IngestLaneConfig,
    pub sprites: SpriteLaneConfig,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_deliveries: 5,
            ingest: IngestLaneConfig::default(),
            sprites: SpriteLaneConfig::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}
