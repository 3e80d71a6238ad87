//! Enumerating every resource URL and queueing it for ingest.

use crate::{IngestMessage, Phase};
use async_stream::stream;
use futures::{Stream, StreamExt};
use pokemirror_queue::{Lane, Queue};
use pokemirror_upstream::UpstreamHandle;
use serde::Serialize;
use std::collections::BTreeMap;
use std::pin::pin;
use std::time::Duration;
use tracing::instrument;

pub const DEFAULT_PAGE_LIMIT: u32 = 200;
pub const DEFAULT_MAX_PAGES_PER_TYPE: u32 = 500;
pub const DEFAULT_PAGE_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedOptions {
    /// Restrict seeding to these types; `None` (or empty) seeds everything.
    pub resource_types: Option<Vec<String>>,
    /// Listing page size.
    pub limit: u32,
    /// Safety cap on listing pages fetched per type.
    pub max_pages_per_type: u32,
}

impl Default for SeedOptions {
    fn default() -> Self {
        Self {
            resource_types: None,
            limit: DEFAULT_PAGE_LIMIT,
            max_pages_per_type: DEFAULT_MAX_PAGES_PER_TYPE,
        }
    }
}

impl SeedOptions {
    fn is_requested(&self, resource_type: &str) -> bool {
        match &self.resource_types {
            Some(types) if !types.is_empty() => types.iter().any(|t| t == resource_type),
            _ => true,
        }
    }

    fn unknown_types(&self) -> Vec<String> {
        self.resource_types
            .iter()
            .flatten()
            .filter(|t| Phase::of(t).is_none())
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeedFailure {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedReport {
    pub total_enqueued: u64,
    /// Enqueued count for every type that was attempted, including partial
    /// counts for types that failed part-way.
    pub per_type: BTreeMap<String, u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<SeedFailure>,
}

/// Progress events emitted by [`Seeder::seed`].
///
/// `Started` comes first and `Complete` last, exactly once each. In between,
/// every attempted type gets `PageEnqueued` events followed by exactly one of
/// `TypeCompleted` or `TypeFailed`. Unknown requested types get a
/// `TypeFailed` straight after `Started`.
#[derive(Debug, Clone, PartialEq)]
pub enum SeedEvent {
    Started { resource_types: usize },
    PhaseStarted(Phase),
    PageEnqueued { resource_type: String, offset: u64, enqueued: u64 },
    TypeFailed { resource_type: String, error: String },
    TypeCompleted { resource_type: String, enqueued: u64 },
    Complete(SeedReport),
}

pub struct Seeder {
    upstream: UpstreamHandle,
    queue: Queue,
    page_delay: Duration,
}

impl Seeder {
    pub fn new(upstream: UpstreamHandle, queue: Queue) -> Self {
        Self {
            upstream,
            queue,
            page_delay: DEFAULT_PAGE_DELAY,
        }
    }

    /// Pause between listing pages of the same type.
    pub fn with_page_delay(mut self, page_delay: Duration) -> Self {
        self.page_delay = page_delay;
        self
    }

    /// Seed and return the folded report.
    #[instrument(name = "seed", skip_all, fields(limit = options.limit, max_pages = options.max_pages_per_type))]
    pub async fn run(&self, options: &SeedOptions) -> SeedReport {
        let mut events = pin!(self.seed(options));
        let mut report = SeedReport::default();
        while let Some(event) = events.next().await {
            if let SeedEvent::Complete(complete) = event {
                report = complete;
            }
        }
        report
    }

    /// Seed phase by phase, type by type, yielding progress as it goes.
    ///
    /// Nothing here is fatal: a type whose listing or enqueue fails is
    /// recorded and the remaining types still run.
    pub fn seed<'a>(&'a self, options: &'a SeedOptions) -> impl Stream<Item = SeedEvent> + 'a {
        // A zero page size would never advance the offset.
        let limit = match options.limit {
            0 => DEFAULT_PAGE_LIMIT,
            limit => limit,
        };
        stream! {
            let mut report = SeedReport::default();
            let planned: Vec<(Phase, Vec<&'static str>)> = Phase::ALL
                .into_iter()
                .map(|phase| {
                    let types: Vec<&'static str> =
                        phase.resource_types().iter().copied().filter(|t| options.is_requested(t)).collect();
                    (phase, types)
                })
                .filter(|(_, types)| !types.is_empty())
                .collect();
            yield SeedEvent::Started { resource_types: planned.iter().map(|(_, types)| types.len()).sum() };

            for resource_type in options.unknown_types() {
                tracing::warn!(%resource_type, "ignoring unknown resource type");
                let error = "unknown resource type".to_string();
                report.errors.push(SeedFailure { resource_type: resource_type.clone(), error: error.clone() });
                yield SeedEvent::TypeFailed { resource_type, error };
            }

            for (phase, types) in planned {
                tracing::info!(%phase, types = types.len(), "seeding phase");
                yield SeedEvent::PhaseStarted(phase);
                for resource_type in types {
                    report.per_type.insert(resource_type.to_string(), 0);
                    let mut offset = 0u64;
                    let mut pages = 0u32;
                    let mut failure = None;
                    while pages < options.max_pages_per_type {
                        let page = match self.upstream.list_page(resource_type, limit, offset).await {
                            Ok(page) => page,
                            Err(err) => {
                                failure = Some(format!("failed to list {resource_type}: {}", *err));
                                break;
                            },
                        };
                        if page.results.is_empty() {
                            tracing::debug!(resource_type, offset, "no more results");
                            break;
                        }
                        let messages: Vec<IngestMessage> = page
                            .results
                            .into_iter()
                            .map(|entry| IngestMessage {
                                url: entry.url,
                                resource_type: Some(resource_type.to_string()),
                                phase: Some(phase.to_string()),
                            })
                            .collect();
                        let enqueued = match self.queue.enqueue(&Lane::INGEST, &messages).await {
                            Ok(enqueued) => enqueued,
                            Err(err) => {
                                failure = Some(format!("failed to enqueue {resource_type}: {}", *err));
                                break;
                            },
                        };
                        report.total_enqueued += enqueued;
                        *report.per_type.entry(resource_type.to_string()).or_default() += enqueued;
                        pages += 1;
                        tracing::debug!(resource_type, offset, enqueued, "page enqueued");
                        yield SeedEvent::PageEnqueued { resource_type: resource_type.to_string(), offset, enqueued };

                        if page.next.is_none() {
                            break;
                        }
                        offset += u64::from(limit);
                        tokio::time::sleep(self.page_delay).await;
                    }

                    let enqueued = report.per_type.get(resource_type).copied().unwrap_or_default();
                    match failure {
                        Some(error) => {
                            tracing::error!(resource_type, %error, enqueued, "seeding type failed");
                            report.errors.push(SeedFailure { resource_type: resource_type.to_string(), error: error.clone() });
                            yield SeedEvent::TypeFailed { resource_type: resource_type.to_string(), error };
                        },
                        None => {
                            tracing::info!(resource_type, enqueued, "seeded type");
                            yield SeedEvent::TypeCompleted { resource_type: resource_type.to_string(), enqueued };
                        },
                    }
                }
            }

            tracing::info!(total_enqueued = report.total_enqueued, errors = report.errors.len(), "seeding complete");
            yield SeedEvent::Complete(report);
        }
    }
}
