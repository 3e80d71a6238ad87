//! HTTP triggers for the pipeline.
//!
//! Each POST runs one invocation and answers with `{ok: true, ...report}`.
//! Per-item failures are part of a successful report; only a failure of the
//! invocation as a whole turns into `500 {ok: false, error}`.

use crate::bootstrap::App;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use pokemirror_pipeline::{IngestOptions, SeedOptions, SpriteOptions};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

pub fn router(app: Arc<App>) -> Router {
    Router::new()
        .route("/seed", post(seed))
        .route("/ingest-worker", post(ingest_worker))
        .route("/sprite-worker", post(sprite_worker))
        .route("/status", get(status))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(app)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SeedRequest {
    resource_types: Option<Vec<String>>,
    limit: Option<u32>,
    max_pages_per_type: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct IngestRequest {
    batch_size: Option<usize>,
    /// Seconds.
    visibility_timeout: Option<u64>,
    concurrency: Option<usize>,
    enqueue_sprites: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SpriteRequest {
    batch_size: Option<usize>,
    /// Seconds.
    visibility_timeout: Option<u64>,
    concurrency: Option<usize>,
}

impl SeedRequest {
    fn into_options(self) -> SeedOptions {
        let defaults = SeedOptions::default();
        SeedOptions {
            resource_types: self.resource_types,
            // Zero would never advance the listing offset.
            limit: self.limit.filter(|limit| *limit > 0).unwrap_or(defaults.limit),
            max_pages_per_type: self.max_pages_per_type.unwrap_or(defaults.max_pages_per_type),
        }
    }
}

impl IngestRequest {
    fn into_options(self, defaults: IngestOptions) -> IngestOptions {
        IngestOptions {
            batch_size: self.batch_size.unwrap_or(defaults.batch_size),
            visibility_timeout: self.visibility_timeout.map(Duration::from_secs).unwrap_or(defaults.visibility_timeout),
            concurrency: self.concurrency.unwrap_or(defaults.concurrency),
            enqueue_sprites: self.enqueue_sprites.unwrap_or(defaults.enqueue_sprites),
        }
    }
}

impl SpriteRequest {
    fn into_options(self, defaults: SpriteOptions) -> SpriteOptions {
        SpriteOptions {
            batch_size: self.batch_size.unwrap_or(defaults.batch_size),
            visibility_timeout: self.visibility_timeout.map(Duration::from_secs).unwrap_or(defaults.visibility_timeout),
            concurrency: self.concurrency.unwrap_or(defaults.concurrency),
        }
    }
}

/// An empty or unparseable body means "all defaults".
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> T {
    if body.is_empty() {
        return T::default();
    }
    serde_json::from_slice(body).unwrap_or_else(|err| {
        tracing::debug!(error = %err, "ignoring malformed request body");
        T::default()
    })
}

#[derive(Serialize)]
struct Envelope<T> {
    ok: bool,
    #[serde(flatten)]
    body: T,
}

fn ok<T: Serialize>(body: T) -> Response {
    Json(Envelope { ok: true, body }).into_response()
}

fn fatal(error: String) -> Response {
    tracing::error!(%error, "invocation failed");
    (StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::json!({"ok": false, "error": error}))).into_response()
}

async fn seed(State(app): State<Arc<App>>, body: Bytes) -> Response {
    let options = parse_body::<SeedRequest>(&body).into_options();
    ok(app.seeder().run(&options).await)
}

async fn ingest_worker(State(app): State<Arc<App>>, body: Bytes) -> Response {
    let options = parse_body::<IngestRequest>(&body).into_options(app.ingest_defaults());
    match app.ingest_worker().run(&options).await {
        Ok(report) => ok(report),
        Err(err) => fatal((*err).to_string()),
    }
}

async fn sprite_worker(State(app): State<Arc<App>>, body: Bytes) -> Response {
    let options = parse_body::<SpriteRequest>(&body).into_options(app.sprite_defaults());
    match app.sprite_worker().run(&options).await {
        Ok(report) => ok(report),
        Err(err) => fatal((*err).to_string()),
    }
}

async fn status(State(app): State<Arc<App>>) -> Response {
    match app.status().await {
        Ok(status) => ok(status),
        Err(err) => fatal((*err).to_string()),
    }
}

async fn health(State(app): State<Arc<App>>) -> Response {
    if app.healthy().await {
        return ok(serde_json::json!({}));
    }
    let body = serde_json::json!({"ok": false, "error": "database unavailable"});
    (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
}
