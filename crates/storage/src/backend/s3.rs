//! S3-compatible storage backend.
//!
//! This module provides a storage backend implementation for S3-compatible
//! services including AWS S3, Backblaze B2, Tigris (Fly.io), MinIO, and the
//! storage API of hosted Postgres platforms.
//!
//! # Credentials
//!
//! Credentials are provided explicitly via the configuration file. Each
//! bucket specifies its own `key_id` and `key_secret`.

use crate::{
    StorageBackend,
    error::{ErrorKind, Result},
    validate_path,
};
use async_trait::async_trait;
use aws_sdk_s3::{
    Client,
    config::{BehaviorVersion, Credentials, Region, retry::RetryConfig},
    error::DisplayErrorContext,
    primitives::ByteStream,
};
use exn::{OptionExt, ResultExt};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Generous default for concurrent S3 requests.
const DEFAULT_CONCURRENT_REQUESTS: usize = 100;

/// S3-compatible storage backend.
///
/// Stores objects in an S3 bucket, optionally under a key prefix. All paths
/// are relative to the configured prefix (if any).
///
/// # Examples
///
/// ```no_run
/// use pokemirror_storage::backend::S3Backend;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = S3Backend::new(
///     "pokedex-sprites",
///     "pokedex-sprites",
///     Some("mirror/".to_string()),
///     "us-east-1",
///     Some("https://project.supabase.co/storage/v1/s3".to_string()),
///     "access_key_id",
///     "secret_access_key",
/// ).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct S3Backend {
    name: String,
    client: Client,
    bucket: String,
    prefix: Option<String>,
    /// Rate limiter for concurrent S3 requests.
    rate_limiter: Arc<Semaphore>,
}

impl S3Backend {
    /// Create a new S3 storage backend.
    ///
    /// # Arguments
    /// * `name` - Configured bucket name (recorded on asset rows)
    /// * `bucket` - S3 bucket name
    /// * `prefix` - Optional key prefix (acts as virtual directory)
    /// * `region` - AWS region or provider-specific region
    /// * `endpoint` - Custom endpoint URL for S3-compatible services
    /// * `key_id` - Access key ID
    /// * `key_secret` - Secret access key
    pub async fn new(
        name: impl Into<String>,
        bucket: impl Into<String>,
        prefix: Option<String>,
        region: impl Into<String>,
        endpoint: Option<impl Into<String>>,
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
    ) -> Result<Self> {
        let prefix = prefix
            .map(validate_path)
            .transpose()?
            .map(|p| p.to_str().map(|s| s.to_string()).ok_or_raise(|| ErrorKind::InvalidPath(p.clone())))
            .transpose()?;
        let region = Region::new(region.into());
        let credentials = Credentials::new(key_id, key_secret, None, None, "pokemirror-config");
        let mut config_builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(region)
            // 1 initial attempt + 3 retries with exponential backoff
            .retry_config(RetryConfig::standard().with_max_attempts(4))
            // Path-style addressing works with every S3-compatible service.
            .force_path_style(true);
        if let Some(endpoint_url) = endpoint {
            config_builder = config_builder.endpoint_url(endpoint_url);
        }
        Ok(Self {
            name: name.into(),
            client: Client::from_conf(config_builder.build()),
            bucket: bucket.into(),
            prefix,
            rate_limiter: Arc::new(Semaphore::new(DEFAULT_CONCURRENT_REQUESTS)),
        })
    }

    /// Construct the full S3 key from a relative path.
    fn full_key(&self, path: &Path) -> Result<String> {
        let validated = validate_path(path)?;
        let path_str = validated.to_str().ok_or_raise(|| ErrorKind::InvalidPath(validated.clone()))?;
        Ok(join_key(self.prefix.as_deref(), path_str))
    }

    /// Acquire a rate limiter permit before making an S3 API call.
    async fn acquire_permit(&self) -> Result<OwnedSemaphorePermit> {
        self.rate_limiter
            .clone()
            .acquire_owned()
            .await
            .or_raise(|| ErrorKind::BackendError("S3 rate limiter closed".to_string()))
    }
}

fn join_key(prefix: Option<&str>, path: &str) -> String {
    match prefix {
        Some(prefix) => format!("{}/{}", prefix.trim_end_matches('/'), path),
        None => path.to_string(),
    }
}

#[async_trait]
impl StorageBackend for S3Backend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let key = self.full_key(path)?;
        let _permit = self.acquire_permit().await?;
        match self.client.head_object().bucket(&self.bucket).key(&key).send().await {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|s| s.is_not_found()) => Ok(false),
            Err(e) => exn::bail!(ErrorKind::Network(DisplayErrorContext(&e).to_string())),
        }
    }

    async fn write(&self, path: &Path, data: &[u8], content_type: Option<&str>) -> Result<()> {
        let key = self.full_key(path)?;
        let _permit = self.acquire_permit().await?;
        // PutObject replaces the whole object atomically.
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(data.to_vec()))
            .set_content_type(content_type.map(str::to_string))
            .send()
            .await
            .map_err(|e| ErrorKind::Network(DisplayErrorContext(&e).to_string()))?;
        tracing::trace!(bucket = %self.name, key = %key, bytes = data.len(), "uploaded object");
        Ok(())
    }
}
