//! In-memory storage backend for testing.

use crate::StorageBackend;
use crate::error::{ErrorKind, Result};
use crate::path::validate as validate_path;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

#[derive(Clone)]
struct StoredObject {
    data: Vec<u8>,
    content_type: Option<String>,
}

/// In-memory storage backend for testing.
///
/// Objects are stored in a `HashMap` behind a [`RwLock`], so all trait
/// methods can operate on `&self` without external synchronisation. Every
/// write is counted, which lets tests assert how many uploads happened.
///
/// # Examples
///
/// ```
/// use pokemirror_storage::backend::{MockBackend, StorageBackend};
/// use std::path::Path;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockBackend::with_files([
///     ("pokemon/1/pokemon/1.png", b"png"),
/// ]);
/// assert!(backend.exists(Path::new("pokemon/1/pokemon/1.png")).await?);
///
/// backend.write(Path::new("item/1/items/potion.png"), b"png", None).await?;
/// assert_eq!(backend.write_count(), 1);
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    name: String,
    storage: RwLock<HashMap<PathBuf, StoredObject>>,
    writes: AtomicUsize,
    fail_writes: bool,
}

impl MockBackend {
    /// Create a mock backend pre-populated with objects.
    ///
    /// Panics if any path fails validation (e.g. path traversal). If test
    /// setup is wrong, then test should not pass.
    pub fn with_files(files: impl IntoIterator<Item = (impl Into<PathBuf>, impl Into<Vec<u8>>)>) -> Self {
        let mut map = HashMap::new();
        for (path, data) in files {
            let path = path.into();
            let Ok(validated) = validate_path(&path) else {
                panic!("MockBackend::with_files: invalid path {}", path.display());
            };
            map.insert(
                validated,
                StoredObject {
                    data: data.into(),
                    content_type: None,
                },
            );
        }
        Self {
            name: "mock".to_string(),
            storage: RwLock::new(map),
            writes: AtomicUsize::new(0),
            fail_writes: false,
        }
    }

    /// Change the name of the mock backend.
    ///
    /// # Example
    ///
    /// ```
    /// use pokemirror_storage::backend::MockBackend;
    ///
    /// let backend = MockBackend::default().with_name("pokedex-sprites");
    /// ```
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Make every write fail with a backend error.
    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// Number of successful writes since construction.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of objects currently stored.
    pub async fn len(&self) -> usize {
        self.storage.read().await.len()
    }

    /// Stored bytes of an object, if present.
    pub async fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        let path = validate_path(path.as_ref()).ok()?;
        self.storage.read().await.get(&path).map(|o| o.data.clone())
    }

    /// Content type recorded for an object, if any.
    pub async fn content_type(&self, path: impl AsRef<Path>) -> Option<String> {
        let path = validate_path(path.as_ref()).ok()?;
        self.storage.read().await.get(&path).and_then(|o| o.content_type.clone())
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        let files: [(&str, &str); 0] = [];
        Self::with_files(files)
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let path = validate_path(path)?;
        Ok(self.storage.read().await.contains_key(&path))
    }

    async fn write(&self, path: &Path, data: &[u8], content_type: Option<&str>) -> Result<()> {
        let path = validate_path(path)?;
        if self.fail_writes {
            exn::bail!(ErrorKind::BackendError(format!("mock write refused: {}", path.display())));
        }
        let object = StoredObject {
            data: data.to_vec(),
            content_type: content_type.map(str::to_string),
        };
        self.storage.write().await.insert(path, object);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
