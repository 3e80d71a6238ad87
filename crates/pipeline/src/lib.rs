//! The mirroring pipeline.
//!
//! Three independently invocable units share the queue and the database:
//!
//! - [`Seeder`] lists every resource type phase by phase and queues each
//!   resource URL on the ingest lane.
//! - [`IngestWorker`] fetches queued URLs into the resource cache and queues
//!   the asset URLs it finds on the sprite lane.
//! - [`SpriteWorker`] downloads queued assets into blob storage, dedups them
//!   by source URL and content hash, and patches pokemon projections.
//!
//! None of them keeps state between invocations. A unit that dies mid-batch
//! leaves its leased messages to reappear after the visibility timeout, and
//! every write is an upsert on a natural key, so reprocessing converges.

mod classify;
mod consts;
mod discover;
pub mod error;
mod ingest;
mod message;
mod phase;
mod pool;
mod seed;
mod sprite;

pub use crate::classify::{Classifier, Rule};
pub use crate::discover::{SPRITE_BEARING_TYPES, parse_api_url, sprite_urls, target_path};
pub use crate::ingest::{IngestFailure, IngestOptions, IngestReport, IngestWorker, Ingested};
pub use crate::message::{IngestMessage, SpriteMessage};
pub use crate::phase::Phase;
pub use crate::seed::{
    DEFAULT_MAX_PAGES_PER_TYPE, DEFAULT_PAGE_DELAY, DEFAULT_PAGE_LIMIT, SeedEvent, SeedFailure, SeedOptions, SeedReport,
    Seeder,
};
pub use crate::sprite::{
    ASSET_KIND, DEFAULT_CONTENT_TYPE, Mirrored, Outcome, SpriteFailure, SpriteOptions, SpriteReport, SpriteWorker,
};
