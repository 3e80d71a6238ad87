//! Client for the upstream Pokémon REST API.
//!
//! The pipeline only needs three things from upstream: paged listings of a
//! resource type, individual JSON documents, and raw asset bytes. The
//! [`Upstream`] trait covers exactly that so workers can be driven by
//! [`MockUpstream`] in tests.

pub mod error;
mod http;
#[cfg(feature = "mock")]
mod mock;
mod model;

pub use crate::http::{DEFAULT_USER_AGENT, HttpUpstream};
#[cfg(feature = "mock")]
pub use crate::mock::MockUpstream;
pub use crate::model::{Download, ListPage, NamedResource};
use async_trait::async_trait;
use std::sync::Arc;
use url::Url;

pub type UpstreamHandle = Arc<dyn Upstream>;

#[async_trait]
pub trait Upstream: Send + Sync {
    /// Root of the REST API, e.g. `https://pokeapi.co/api/v2`.
    fn base_url(&self) -> &Url;

    /// Fetch one page of the listing for `resource_type`.
    async fn list_page(&self, resource_type: &str, limit: u32, offset: u64) -> error::Result<ListPage>;

    /// Fetch and parse a JSON document.
    async fn fetch_json(&self, url: &str) -> error::Result<serde_json::Value>;

    /// Download raw bytes (sprites, artwork).
    async fn fetch_bytes(&self, url: &str) -> error::Result<Download>;

    /// The listing URL for a page; identical for every implementation.
    fn list_url(&self, resource_type: &str, limit: u32, offset: u64) -> String {
        format!(
            "{}/{}?limit={limit}&offset={offset}",
            self.base_url().as_str().trim_end_matches('/'),
            resource_type.trim_matches('/')
        )
    }
}
