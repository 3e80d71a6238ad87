//! Storage backend trait and implementations.
//!
//! This module defines the `StorageBackend` trait, a unified interface over
//! the places a mirrored asset can live (local filesystem, S3-compatible
//! services, or memory in tests).

mod local;
#[cfg(feature = "mock")]
mod mock;
#[cfg(feature = "s3")]
mod s3;

pub use self::local::LocalBackend;
#[cfg(feature = "mock")]
pub use self::mock::MockBackend;
#[cfg(feature = "s3")]
pub use self::s3::S3Backend;
use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Unified interface for storage backends.
///
/// Assets are written once and served by whatever fronts the bucket, so the
/// interface is a small write-side surface rather than a filesystem abstraction.
///
/// # Path Handling
/// All paths are relative to the bucket root and must be validated using
/// [`validate_path`](crate::validate_path) before use. Implementations
/// enforce this validation.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use pokemirror_storage::{backend::StorageBackend, error::Result};
///
/// async fn store_once(backend: &dyn StorageBackend, bytes: &[u8]) -> Result<bool> {
///     let path = Path::new("pokemon/25/pokemon/25.png");
///     if backend.exists(path).await? {
///         return Ok(false);
///     }
///     backend.write(path, bytes, Some("image/png")).await?;
///     Ok(true)
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name of the configured bucket (taken from the configuration object
    /// key). Asset rows record this name, so it must be unique across the
    /// configured buckets.
    fn name(&self) -> &str;

    /// Check if an object exists.
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Write object contents.
    ///
    /// Creates a new object or replaces an existing one. Readers never see a
    /// partially written object.
    ///
    /// # Notes
    /// - Implementations create parent directories as needed.
    /// - `content_type` is recorded where the backend supports object
    ///   metadata and ignored elsewhere.
    ///
    /// ```no_run
    /// use std::path::Path;
    /// # use pokemirror_storage::{backend::StorageBackend, error::Result};
    /// # async fn example(backend: &dyn StorageBackend) -> Result<()> {
    /// let png = [0x89, b'P', b'N', b'G'];
    /// backend.write(Path::new("pokemon/1/pokemon/1.png"), &png, Some("image/png")).await?;
    /// # Ok(())
    /// # }
    /// ```
    async fn write(&self, path: &Path, data: &[u8], content_type: Option<&str>) -> Result<()>;
}
