//! Layered configuration.
//!
//! Values are merged from, lowest precedence first:
//! 1. built-in defaults,
//! 2. a configuration file (TOML, YAML or JSON, chosen by extension),
//! 3. environment variables prefixed `POKEMIRROR_`, with `__` separating
//!    nested keys (`POKEMIRROR_QUEUE__MAX_DELIVERIES=3`).
//!
//! Components never read the environment themselves; the binary loads a
//! [`Config`] once and hands each component the section it needs.

pub mod error;
mod sections;

pub use crate::sections::{
    BucketConfig, DEFAULT_BASE_URL, DEFAULT_BUCKET, DatabaseConfig, IngestLaneConfig, QueueConfig, ServerConfig,
    SpriteLaneConfig, StorageConfig, UpstreamConfig,
};
use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

pub const ENV_PREFIX: &str = "POKEMIRROR_";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub upstream: UpstreamConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub queue: QueueConfig,
    pub server: ServerConfig,
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "pokemirror")
}

pub(crate) fn data_dir() -> PathBuf {
    project_dirs().map(|dirs| dirs.data_dir().to_path_buf()).unwrap_or_else(|| PathBuf::from("./data"))
}

/// `config.toml` in the platform configuration directory.
pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
}

impl Config {
    /// Build the layered figment without extracting it.
    ///
    /// An explicit `path` must exist. Without one, the default location is
    /// used if a file is present there.
    pub fn figment(path: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        let file = match path {
            Some(path) if !path.exists() => exn::bail!(ErrorKind::NotFound(path.to_path_buf())),
            Some(path) => Some(path.to_path_buf()),
            None => default_config_path().filter(|p| p.exists()),
        };
        if let Some(file) = file {
            tracing::info!(config_path = %file.display(), "loading configuration from file");
            figment = match file.extension().and_then(|e| e.to_str()) {
                Some("toml") => figment.merge(Toml::file(&file)),
                Some("yaml" | "yml") => figment.merge(Yaml::file(&file)),
                Some("json") => figment.merge(Json::file(&file)),
                _ => exn::bail!(ErrorKind::UnsupportedFormat(file)),
            };
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).ignore(&["config"]).split("__")))
    }

    /// Load and validate the configuration.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config: Config = Self::figment(path)?.extract().map_err(|e| ErrorKind::Load(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations no invocation could succeed with.
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.upstream.base_url)
            .map_err(|e| ErrorKind::Invalid(format!("upstream.base_url `{}`: {e}", self.upstream.base_url)))?;
        if self.upstream.timeout_secs == 0 {
            exn::bail!(ErrorKind::Invalid("upstream.timeout_secs must be positive".to_string()));
        }
        if !self.storage.buckets.contains_key(&self.storage.default_bucket) {
            exn::bail!(ErrorKind::Invalid(format!(
                "storage.default_bucket `{}` is not configured",
                self.storage.default_bucket
            )));
        }
        for (name, bucket) in &self.storage.buckets {
            match bucket {
                BucketConfig::Local { root } if root.as_os_str().is_empty() => {
                    exn::bail!(ErrorKind::Invalid(format!("storage.buckets.{name}: empty root")))
                },
                BucketConfig::S3 { key_id, key_secret, .. } if key_id.is_empty() || key_secret.is_empty() => {
                    exn::bail!(ErrorKind::Invalid(format!("storage.buckets.{name}: missing credentials")))
                },
                BucketConfig::S3 { bucket, .. } if bucket.is_empty() => {
                    exn::bail!(ErrorKind::Invalid(format!("storage.buckets.{name}: empty bucket")))
                },
                _ => {},
            }
        }
        if self.queue.ingest.batch_size == 0 || self.queue.sprites.batch_size == 0 {
            exn::bail!(ErrorKind::Invalid("queue batch sizes must be positive".to_string()));
        }
        self.server
            .bind
            .parse::<SocketAddr>()
            .map_err(|e| ErrorKind::Invalid(format!("server.bind `{}`: {e}", self.server.bind)))?;
        Ok(())
    }
}
