//! Uploader entry point.
//!
//! This binary is the composition root for the entire system:
//!
//! 1. **Load configuration** from the environment (after an optional `.env`)
//!    into [`trigger::UploaderConfig`], failing fast with every missing value.
//! 2. **Wire observability**: JSON `tracing` output plus an OpenTelemetry OTLP
//!    exporter when `OTEL_EXPORTER_OTLP_ENDPOINT` is set.
//! 3. **Construct infrastructure**: [`gcs::GcsObjectStore`] and
//!    [`airflow::AirflowClient`], injected into [`dispatcher::Uploader`].
//! 4. **Select the run mode**:
//!    - `serve`: CloudEvents HTTP receiver until Ctrl+C / SIGTERM.
//!    - `handle --event FILE`: one invocation for a structured-mode CloudEvent
//!      file, result JSON printed to stdout.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use airflow::AirflowClient;
use anyhow::Context;
use clap::{Parser, Subcommand};
use dispatcher::Uploader;
use gcs::GcsObjectStore;
use tokio::net::TcpListener;
use trigger::UploaderConfig;

mod telemetry;

/// Starts document ingestion runs for newly uploaded storage objects.
#[derive(Debug, Parser)]
#[command(name = "uploader")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the CloudEvents HTTP receiver.
    Serve {
        /// Port to listen on (all interfaces).
        #[arg(long, env = "PORT", default_value = "8080")]
        port: u16,
    },
    /// Handle a single structured-mode CloudEvent read from a file.
    Handle {
        /// Path to the CloudEvent JSON document.
        #[arg(long, value_name = "FILE")]
        event: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Before parsing so `.env` can supply `PORT`.
    let dotenv = dotenvy::dotenv();
    let args = Args::parse();
    let telemetry = telemetry::init()?;

    if let Err(e) = &dotenv {
        if !e.not_found() {
            tracing::warn!(error = %e, "ignoring unreadable .env file");
        }
    }

    let result = run(args).await;
    if let Err(e) = &result {
        tracing::error!("uploader failed: {e:#}");
    }
    telemetry.shutdown();
    result
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = UploaderConfig::from_env().context("loading configuration")?;
    let uploader = Arc::new(build_uploader(&config)?);

    match args.command {
        Commands::Serve { port } => {
            let addr = SocketAddr::from(([0, 0, 0, 0], port));
            let socket = TcpListener::bind(addr)
                .await
                .with_context(|| format!("binding {addr}"))?;
            listener::serve(socket, uploader, listener::shutdown_signal())
                .await
                .context("serving CloudEvents")?;
        }
        Commands::Handle { event } => {
            let body = tokio::fs::read(&event)
                .await
                .with_context(|| format!("reading {}", event.display()))?;
            let event = listener::decode_structured(&body)?;
            let invocation = uploader.handle(&event).await?;
            println!("{}", serde_json::to_string_pretty(&invocation)?);
        }
    }
    Ok(())
}

fn build_uploader(config: &UploaderConfig) -> anyhow::Result<Uploader> {
    let storage =
        GcsObjectStore::from_config(&config.storage).context("configuring storage adapter")?;
    let workflow = AirflowClient::new(&config.airflow).context("configuring Airflow client")?;

    tracing::info!(
        airflow = %workflow.endpoint(),
        storage_emulator = ?config.storage.emulator_host,
        "uploader configured"
    );

    Ok(Uploader::new(
        Arc::new(storage),
        Arc::new(workflow),
        config.dispatch.clone(),
    ))
}
