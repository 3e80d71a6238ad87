//! Local filesystem storage backend.
//!
//! Objects are stored under a configured root directory using `tokio::fs`.
//! Writes go to a sibling temporary file first and are renamed into place,
//! so a crash mid-write never leaves a truncated sprite behind.

use crate::error::{ErrorKind, Result};
use crate::{StorageBackend, path::validate as validate_path};
use async_trait::async_trait;
use std::fs::create_dir_all as sync_create_dir;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;

/// Local filesystem storage backend.
///
/// # Examples
///
/// ```no_run
/// use pokemirror_storage::backend::LocalBackend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = LocalBackend::new("pokedex-sprites", "/var/lib/pokemirror/sprites")?;
/// # Ok(())
/// # }
/// ```
pub struct LocalBackend {
    name: String,
    /// Root directory of the bucket
    root: PathBuf,
    /// Suffix counter for temporary files, unique within this process.
    sequence: AtomicU64,
}
impl LocalBackend {
    /// Create a new local filesystem backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not absolute, or exists and is not a
    /// directory.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidPath(root));
        }
        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::InvalidPath(root));
            }
        } else {
            // Runs once at startup; not worth making the constructor async.
            sync_create_dir(&root).map_err(|e| Self::map_io_error(e, &root))?;
        }
        Ok(Self {
            name: name.into(),
            root,
            sequence: AtomicU64::new(0),
        })
    }

    /// Validates the path and joins it with the root directory.
    fn absolute_path(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let validated = validate_path(path.as_ref())?;
        Ok(self.root.join(validated))
    }

    fn temporary_path(&self, target: &Path) -> PathBuf {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let file_name = target.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        target.with_file_name(format!(".{file_name}.{}.{sequence}.tmp", std::process::id()))
    }

    fn map_io_error(e: std::io::Error, path: &Path) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.to_path_buf()),
            _ => ErrorKind::Io(e),
        }
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let abs_path = self.absolute_path(path)?;
        Ok(fs::try_exists(&abs_path).await.map_err(ErrorKind::Io)?)
    }

    async fn write(&self, path: &Path, data: &[u8], _content_type: Option<&str>) -> Result<()> {
        let abs_path = self.absolute_path(path)?;
        // Create parent directories if needed, to keep behaviour
        // consistent with S3-compatible storage.
        if let Some(parent) = abs_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| Self::map_io_error(e, path))?;
        }
        let temporary = self.temporary_path(&abs_path);
        if let Err(e) = fs::write(&temporary, data).await {
            let _ = fs::remove_file(&temporary).await;
            exn::bail!(Self::map_io_error(e, path));
        }
        if let Err(e) = fs::rename(&temporary, &abs_path).await {
            let _ = fs::remove_file(&temporary).await;
            exn::bail!(Self::map_io_error(e, path));
        }
        tracing::trace!(bucket = %self.name, path = %path.display(), bytes = data.len(), "wrote object");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_requires_absolute_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(LocalBackend::new("name", temp_dir.path()).is_ok());
        assert!(LocalBackend::new("name", "relative/path").is_err());
        assert!(LocalBackend::new("name", "./relative").is_err());
    }

    #[test]
    fn test_new_creates_missing_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().join("sprites");
        LocalBackend::new("name", &root).unwrap();
        assert!(root.is_dir());
    }

    #[test]
    fn test_absolute_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        let expected = temp_dir.path().join("pokemon/25/pokemon/25.png");
        assert_eq!(backend.absolute_path(Path::new("pokemon/25/pokemon/25.png")).unwrap(), expected);
        assert!(backend.absolute_path(Path::new("../etc/passwd")).is_err());
    }

    #[tokio::test]
    async fn test_write() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        backend.write(Path::new("sprite.png"), b"\x89PNG", Some("image/png")).await.unwrap();
        assert_eq!(std::fs::read(temp_dir.path().join("sprite.png")).unwrap(), b"\x89PNG");
    }

    #[tokio::test]
    async fn test_write_creates_directories() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        backend.write(Path::new("pokemon/1/other/home/1.png"), b"data", None).await.unwrap();
        assert!(backend.exists(Path::new("pokemon/1/other/home/1.png")).await.unwrap());
    }

    #[tokio::test]
    async fn test_write_overwrites_and_leaves_no_temporaries() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        backend.write(Path::new("a/file.png"), b"first", None).await.unwrap();
        backend.write(Path::new("a/file.png"), b"second", None).await.unwrap();
        assert_eq!(std::fs::read(temp_dir.path().join("a/file.png")).unwrap(), b"second");
        let entries = std::fs::read_dir(temp_dir.path().join("a")).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[tokio::test]
    async fn test_exists() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        assert!(!backend.exists(Path::new("nonexistent.png")).await.unwrap());
        backend.write(Path::new("exists.png"), b"data", None).await.unwrap();
        assert!(backend.exists(Path::new("exists.png")).await.unwrap());
    }

    #[tokio::test]
    async fn test_write_into_file_parent_is_an_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        backend.write(Path::new("a"), b"file", None).await.unwrap();
        assert!(backend.write(Path::new("a/b.png"), b"data", None).await.is_err());
    }

    #[tokio::test]
    async fn test_path_security() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        assert!(backend.exists(Path::new("../etc/passwd")).await.is_err());
        assert!(backend.exists(Path::new("etc/../../passwd")).await.is_err());
        assert!(backend.write(Path::new("../etc/passwd"), b"data", None).await.is_err());
    }
}
