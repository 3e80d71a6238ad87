use crate::BackendHandle;
use crate::error::{ErrorKind, Result};
use exn::OptionExt;
use std::collections::HashMap;

/// Named storage backends plus the bucket used when a message names none.
#[derive(Clone)]
pub struct Buckets {
    backends: HashMap<String, BackendHandle>,
    default: String,
}

impl Buckets {
    /// Routes to the given backends, keyed by [`name()`](crate::StorageBackend::name).
    ///
    /// Fails with [`UnknownBucket`](ErrorKind::UnknownBucket) when no backend
    /// carries the default name.
    pub fn new(default: impl Into<String>, backends: impl IntoIterator<Item = BackendHandle>) -> Result<Self> {
        let default = default.into();
        let backends: HashMap<String, BackendHandle> =
            backends.into_iter().map(|backend| (backend.name().to_string(), backend)).collect();
        if !backends.contains_key(&default) {
            exn::bail!(ErrorKind::UnknownBucket(default));
        }
        Ok(Self { backends, default })
    }

    /// A single backend that is also the default.
    pub fn single(backend: BackendHandle) -> Self {
        let default = backend.name().to_string();
        Self {
            backends: HashMap::from([(default.clone(), backend)]),
            default,
        }
    }

    pub fn default_name(&self) -> &str {
        &self.default
    }

    /// Looks up a bucket by name, falling back to the default for `None`.
    pub fn resolve(&self, name: Option<&str>) -> Result<&BackendHandle> {
        let name = name.unwrap_or(&self.default);
        self.backends.get(name).ok_or_raise(|| ErrorKind::UnknownBucket(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.backends.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use std::sync::Arc;

    fn buckets() -> Buckets {
        let sprites: BackendHandle = Arc::new(MockBackend::default().with_name("pokedex-sprites"));
        let art: BackendHandle = Arc::new(MockBackend::default().with_name("artwork"));
        Buckets::new("pokedex-sprites", [sprites, art]).unwrap()
    }

    #[test]
    fn test_resolve_default() {
        assert_eq!(buckets().resolve(None).unwrap().name(), "pokedex-sprites");
    }

    #[test]
    fn test_resolve_named() {
        assert_eq!(buckets().resolve(Some("artwork")).unwrap().name(), "artwork");
    }

    #[test]
    fn test_resolve_unknown() {
        let buckets = buckets();
        let err = buckets.resolve(Some("nope")).err().unwrap();
        assert!(matches!(&*err, ErrorKind::UnknownBucket(name) if name == "nope"));
    }

    #[test]
    fn test_names() {
        let buckets = buckets();
        let mut names: Vec<&str> = buckets.names().collect();
        names.sort_unstable();
        assert_eq!(names, vec!["artwork", "pokedex-sprites"]);
    }

    #[test]
    fn test_missing_default_is_rejected() {
        let only: BackendHandle = Arc::new(MockBackend::default().with_name("artwork"));
        assert!(Buckets::new("pokedex-sprites", [only]).is_err());
    }
}
