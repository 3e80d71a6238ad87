//! SQLite store for the mirror.
//!
//! The database holds everything the pipeline persists:
//! - **Cached resources**: raw upstream JSON documents keyed by
//!   `(resource_type, resource_key)`. Writes are upserts; the newest fetch
//!   wins.
//! - **Mirrored assets**: metadata for binary assets copied into blob
//!   storage, unique by `source_url` and indexed by content hash.
//! - **Pokemon projections**: denormalised rows whose sprite columns are
//!   patched once the matching asset has been mirrored.
//!
//! Nothing here deletes cached resources or assets. The queue crate shares
//! this database (and its migrations) for its message table.

mod db;
pub mod error;
mod models;
mod repo;

pub use crate::db::Database;
pub use crate::models::{
    CURRENT_SCHEMA_VERSION, CachedResource, MirroredAsset, PokemonBasics, PokemonProjection, SpriteRole,
};
pub use crate::repo::Repository;
