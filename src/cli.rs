use crate::bootstrap::App;
use crate::error::{ErrorKind, Result};
use crate::server;
use clap::{Args, Parser, Subcommand};
use exn::ResultExt;
use futures::StreamExt;
use pokemirror_pipeline::{IngestOptions, SeedEvent, SeedOptions, SpriteOptions};
use serde::Serialize;
use std::path::PathBuf;
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

/// Mirror the PokéAPI dataset and its sprites.
#[derive(Debug, Parser)]
#[command(name = "pokemirror", version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (TOML, YAML or JSON).
    #[arg(short, long, global = true, env = "POKEMIRROR_CONFIG")]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the HTTP triggers.
    Serve {
        /// Overrides `server.bind`.
        #[arg(long)]
        bind: Option<String>,
    },
    /// Queue every resource URL for ingest.
    Seed(SeedArgs),
    /// Fetch queued resource URLs into the cache.
    Ingest(IngestArgs),
    /// Mirror queued sprites into blob storage.
    Sprites(SpriteArgs),
    /// Print queue depths and cache totals.
    Status,
}

#[derive(Debug, Args)]
pub struct SeedArgs {
    /// Seed only this resource type (repeatable).
    #[arg(long = "type", value_name = "TYPE")]
    pub resource_types: Vec<String>,
    /// Listing page size.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub limit: Option<u32>,
    #[arg(long)]
    pub max_pages: Option<u32>,
}

#[derive(Debug, Args)]
pub struct IngestArgs {
    #[arg(long)]
    pub batch_size: Option<usize>,
    /// Seconds.
    #[arg(long)]
    pub visibility_timeout: Option<u64>,
    #[arg(long)]
    pub concurrency: Option<usize>,
    /// Do not queue discovered sprites.
    #[arg(long)]
    pub no_sprites: bool,
    /// Keep leasing batches until the lane is empty.
    #[arg(long)]
    pub drain: bool,
}

#[derive(Debug, Args)]
pub struct SpriteArgs {
    #[arg(long)]
    pub batch_size: Option<usize>,
    /// Seconds.
    #[arg(long)]
    pub visibility_timeout: Option<u64>,
    #[arg(long)]
    pub concurrency: Option<usize>,
    /// Keep leasing batches until the lane is empty.
    #[arg(long)]
    pub drain: bool,
}

impl SeedArgs {
    fn options(&self) -> SeedOptions {
        let defaults = SeedOptions::default();
        SeedOptions {
            resource_types: (!self.resource_types.is_empty()).then(|| self.resource_types.clone()),
            limit: self.limit.unwrap_or(defaults.limit),
            max_pages_per_type: self.max_pages.unwrap_or(defaults.max_pages_per_type),
        }
    }
}

impl IngestArgs {
    fn options(&self, defaults: IngestOptions) -> IngestOptions {
        IngestOptions {
            batch_size: self.batch_size.unwrap_or(defaults.batch_size),
            visibility_timeout: self.visibility_timeout.map(Duration::from_secs).unwrap_or(defaults.visibility_timeout),
            concurrency: self.concurrency.unwrap_or(defaults.concurrency),
            enqueue_sprites: defaults.enqueue_sprites && !self.no_sprites,
        }
    }
}

impl SpriteArgs {
    fn options(&self, defaults: SpriteOptions) -> SpriteOptions {
        SpriteOptions {
            batch_size: self.batch_size.unwrap_or(defaults.batch_size),
            visibility_timeout: self.visibility_timeout.map(Duration::from_secs).unwrap_or(defaults.visibility_timeout),
            concurrency: self.concurrency.unwrap_or(defaults.concurrency),
        }
    }
}

fn print_json(value: &impl Serialize) -> Result<()> {
    let json = serde_json::to_string_pretty(value).or_raise(|| ErrorKind::Pipeline("unprintable report".to_string()))?;
    println!("{json}");
    Ok(())
}

pub async fn run(app: App, command: Command) -> Result<()> {
    match command {
        Command::Serve { bind } => serve(app, bind).await,
        Command::Seed(args) => seed(&app, &args).await,
        Command::Ingest(args) => {
            let options = args.options(app.ingest_defaults());
            let worker = app.ingest_worker();
            loop {
                let report = worker.run(&options).await.map_err(|e| ErrorKind::Pipeline((*e).to_string()))?;
                print_json(&report)?;
                if !args.drain || report.is_empty() {
                    return Ok(());
                }
            }
        },
        Command::Sprites(args) => {
            let options = args.options(app.sprite_defaults());
            let worker = app.sprite_worker();
            loop {
                let report = worker.run(&options).await.map_err(|e| ErrorKind::Pipeline((*e).to_string()))?;
                print_json(&report)?;
                if !args.drain || report.is_empty() {
                    return Ok(());
                }
            }
        },
        Command::Status => print_json(&app.status().await?),
    }
}

async fn seed(app: &App, args: &SeedArgs) -> Result<()> {
    let options = args.options();
    let seeder = app.seeder();
    let mut events = pin!(seeder.seed(&options));
    while let Some(event) = events.next().await {
        match event {
            SeedEvent::Started { resource_types } => eprintln!("seeding {resource_types} resource types"),
            SeedEvent::PhaseStarted(phase) => eprintln!("phase {phase}"),
            SeedEvent::PageEnqueued {
                resource_type,
                offset,
                enqueued,
            } => eprintln!("  {resource_type}: +{enqueued} (offset {offset})"),
            SeedEvent::TypeFailed { resource_type, error } => eprintln!("  {resource_type}: FAILED {error}"),
            SeedEvent::TypeCompleted { resource_type, enqueued } => eprintln!("  {resource_type}: {enqueued} queued"),
            SeedEvent::Complete(report) => print_json(&report)?,
        }
    }
    Ok(())
}

async fn serve(app: App, bind: Option<String>) -> Result<()> {
    let bind = bind.unwrap_or_else(|| app.config().server.bind.clone());
    let listener = tokio::net::TcpListener::bind(&bind).await.or_raise(|| ErrorKind::Server)?;
    tracing::info!(%bind, "listening");
    let app = Arc::new(app);
    axum::serve(listener, server::router(app.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .or_raise(|| ErrorKind::Server)?;
    app.close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "could not listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
