//! `pokemirror` command-line entry point.

mod bootstrap;
mod cli;
mod error;
mod server;

use crate::bootstrap::App;
use crate::cli::Cli;
use crate::error::{ErrorKind, Result};
use clap::Parser;
use pokemirror_config::Config;
use std::process::ExitCode;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,tower_http=info".into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref()).map_err(|e| ErrorKind::Config((*e).to_string()))?;
    let app = App::from_config(config).await?;
    cli::run(app, cli.command).await
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = ?err, retryable = err.is_retryable(), "fatal");
            ExitCode::FAILURE
        },
    }
}
