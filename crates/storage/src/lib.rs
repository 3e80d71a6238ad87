//! Blob storage for mirrored assets.
//!
//! Every configured bucket is a [`StorageBackend`]; the backend's name is the
//! bucket name that queue messages and asset rows refer to. [`Buckets`] routes
//! a bucket name (or the default) to its backend.

pub mod backend;
mod buckets;
pub mod error;
mod path;

pub use crate::backend::StorageBackend;
pub use crate::buckets::Buckets;
pub use crate::path::validate as validate_path;
use std::sync::Arc;

pub type BackendHandle = Arc<dyn StorageBackend + Send + Sync>;
