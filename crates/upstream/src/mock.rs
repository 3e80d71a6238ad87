//! Scripted in-memory upstream for testing.

use crate::error::{ErrorKind, Result};
use crate::{Download, ListPage, NamedResource, Upstream};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use url::Url;

/// Scripted upstream.
///
/// Listings are paged by `limit`/`offset` exactly like the real API,
/// including the `next` cursor. Anything not registered answers HTTP 404.
/// Every request URL is recorded.
///
/// # Examples
///
/// ```
/// use pokemirror_upstream::{MockUpstream, Upstream};
/// use serde_json::json;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let upstream = MockUpstream::new()
///     .with_listing("type", 3)
///     .with_json("https://pokeapi.co/api/v2/type/1/", json!({"id": 1, "name": "type-1"}));
/// let page = upstream.list_page("type", 2, 0).await.unwrap();
/// assert_eq!(page.results.len(), 2);
/// assert!(page.next.is_some());
/// assert!(upstream.fetch_json("https://pokeapi.co/api/v2/type/9/").await.is_err());
/// # }
/// ```
pub struct MockUpstream {
    base_url: Url,
    listings: HashMap<String, Vec<NamedResource>>,
    failing_listings: HashMap<String, u16>,
    documents: HashMap<String, serde_json::Value>,
    downloads: HashMap<String, Download>,
    failing_urls: HashMap<String, u16>,
    requests: Mutex<Vec<String>>,
}

impl MockUpstream {
    pub fn new() -> Self {
        Self {
            base_url: Url::parse("https://pokeapi.co/api/v2").expect("static URL parses"),
            listings: HashMap::new(),
            failing_listings: HashMap::new(),
            documents: HashMap::new(),
            downloads: HashMap::new(),
            failing_urls: HashMap::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Register a listing of `count` resources named `{type}-{n}` at
    /// `{base}/{type}/{n}/`, numbered from 1.
    pub fn with_listing(self, resource_type: &str, count: usize) -> Self {
        let entries = (1..=count)
            .map(|n| NamedResource {
                name: Some(format!("{resource_type}-{n}")),
                url: self.resource_url(resource_type, n),
            })
            .collect();
        self.with_listing_entries(resource_type, entries)
    }

    pub fn with_listing_entries(mut self, resource_type: &str, entries: Vec<NamedResource>) -> Self {
        self.listings.insert(resource_type.to_string(), entries);
        self
    }

    /// Make every page of a listing answer with `status`.
    pub fn with_failing_listing(mut self, resource_type: &str, status: u16) -> Self {
        self.failing_listings.insert(resource_type.to_string(), status);
        self
    }

    pub fn with_json(mut self, url: impl Into<String>, document: serde_json::Value) -> Self {
        self.documents.insert(url.into(), document);
        self
    }

    pub fn with_bytes(mut self, url: impl Into<String>, bytes: impl Into<Vec<u8>>, content_type: Option<&str>) -> Self {
        let download = Download {
            bytes: bytes.into(),
            content_type: content_type.map(str::to_string),
        };
        self.downloads.insert(url.into(), download);
        self
    }

    /// Make a document or download answer with `status`.
    pub fn with_failing_url(mut self, url: impl Into<String>, status: u16) -> Self {
        self.failing_urls.insert(url.into(), status);
        self
    }

    /// Canonical URL of the `n`th resource of a type.
    pub fn resource_url(&self, resource_type: &str, n: usize) -> String {
        format!("{}/{resource_type}/{n}/", self.base_url.as_str().trim_end_matches('/'))
    }

    /// All request URLs in the order they were made.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Number of requests made for `url`.
    pub fn request_count(&self, url: &str) -> usize {
        self.requests.lock().map(|r| r.iter().filter(|u| *u == url).count()).unwrap_or_default()
    }

    fn record(&self, url: &str) {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(url.to_string());
        }
    }

    fn status(url: &str, status: u16) -> exn::Exn<ErrorKind> {
        exn::Exn::from(ErrorKind::Status {
            url: url.to_string(),
            status,
        })
    }
}

impl Default for MockUpstream {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Upstream for MockUpstream {
    fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn list_page(&self, resource_type: &str, limit: u32, offset: u64) -> Result<ListPage> {
        let url = self.list_url(resource_type, limit, offset);
        self.record(&url);
        if let Some(status) = self.failing_listings.get(resource_type) {
            return Err(Self::status(&url, *status));
        }
        let entries = self.listings.get(resource_type).ok_or_else(|| Self::status(&url, 404))?;
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(entries.len());
        let end = start.saturating_add(limit as usize).min(entries.len());
        let next = (end < entries.len()).then(|| self.list_url(resource_type, limit, end as u64));
        Ok(ListPage {
            count: Some(entries.len() as u64),
            next,
            results: entries[start..end].to_vec(),
        })
    }

    async fn fetch_json(&self, url: &str) -> Result<serde_json::Value> {
        self.record(url);
        if let Some(status) = self.failing_urls.get(url) {
            return Err(Self::status(url, *status));
        }
        self.documents.get(url).cloned().ok_or_else(|| Self::status(url, 404))
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Download> {
        self.record(url);
        if let Some(status) = self.failing_urls.get(url) {
            return Err(Self::status(url, *status));
        }
        self.downloads.get(url).cloned().ok_or_else(|| Self::status(url, 404))
    }
}
