//! Sage - supervised worker routing with knowledge-graph enrichment
//!
//! CLI entry point.

#![forbid(unsafe_code)]

use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod app;
mod cli;

const DEFAULT_FILTER: &str = "sage=info,sage_core=info,sage_kg=info,sage_llm=info";

/// Install the global subscriber. Logs go to stderr; stdout carries output.
fn init_tracing(logging: &app::config::LoggingConfig, json: bool) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());
    let json = json || logging.json;

    let (file_layer, guard) = match &logging.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, &logging.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().json().with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with((!json).then(|| fmt::layer().with_writer(std::io::stderr)))
        .with(json.then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .with(file_layer)
        .init();
    guard
}

async fn run() -> Result<()> {
    let _ = dotenvy::dotenv();

    let cli = cli::Cli::parse();
    let config = app::load_config()?;
    let _guard = init_tracing(&config.logging, cli.json);

    if cli.command.is_some() {
        info!("Starting Sage v{}", env!("CARGO_PKG_VERSION"));
        debug!(
            provider = %config.llm.provider,
            checkpoint = %config.checkpoint.backend,
            "Configuration loaded"
        );
    }

    cli::run(cli, config).await
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<sage_core::Error>() {
                Some(core) => eprintln!("{}", sage_core::format_error_for_cli(core)),
                None => eprintln!("Error: {:#}", e),
            }
            ExitCode::FAILURE
        }
    }
}
