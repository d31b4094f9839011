//! scalegated — the ScaleGate daemon.
//!
//! Single binary that assembles:
//! - State store (redb)
//! - Coordinator with the configured orchestration hook
//! - REST API
//!
//! # Usage
//!
//! ```text
//! scalegated serve --config /etc/scalegate.toml --port 8080 --data-dir /var/lib/scalegate
//! ```

mod config;
mod webhook;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use scalegate_coordinator::{Coordinator, NoopApplier, ReplicaApplier};
use tracing::{info, warn};

use crate::config::{Overrides, ScalegateConfig};
use crate::webhook::WebhookApplier;

#[derive(Parser)]
#[command(name = "scalegated", about = "ScaleGate scale request daemon")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the scale request API.
    Serve {
        /// Path to a scalegate.toml file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Port to listen on.
        #[arg(long)]
        port: Option<u16>,

        /// Data directory for persistent state.
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Endpoint that receives approved replica counts.
        #[arg(long)]
        orchestrator_url: Option<String>,
    },
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,scalegated=debug,scalegate=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::Serve {
            config,
            port,
            data_dir,
            orchestrator_url,
        } => {
            let overrides = Overrides {
                port,
                data_dir,
                orchestrator_url,
            };
            let config = ScalegateConfig::load(config.as_deref(), overrides)?;
            run_serve(config).await
        }
    }
}

fn build_applier(config: &ScalegateConfig) -> anyhow::Result<Arc<dyn ReplicaApplier>> {
    match &config.orchestrator.url {
        Some(url) => {
            let timeout = config.orchestrator.timeout_ms.map(Duration::from_millis);
            info!(%url, "orchestrator webhook configured");
            Ok(Arc::new(WebhookApplier::new(url.clone(), timeout)?))
        }
        None => {
            warn!("no orchestrator url configured, approvals will not be applied to workloads");
            Ok(Arc::new(NoopApplier))
        }
    }
}

async fn run_serve(config: ScalegateConfig) -> anyhow::Result<()> {
    info!("ScaleGate daemon starting");

    std::fs::create_dir_all(&config.server.data_dir)?;
    let db_path = config.server.data_dir.join("scalegate.redb");

    let store = scalegate_state::StateStore::open(&db_path)?;
    info!(path = ?db_path, "state store opened");

    let applier = build_applier(&config)?;
    let coordinator_config = config.coordinator_config();
    info!(
        lock_timeout = ?coordinator_config.lock_timeout,
        apply_timeout = ?coordinator_config.apply_timeout,
        page_size = coordinator_config.page_size,
        "coordinator initialized"
    );
    let coordinator = Coordinator::new(store, applier, coordinator_config);

    let router = scalegate_api::build_router(coordinator);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));

    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            info!("shutdown signal received");
        })
        .await?;

    info!("ScaleGate daemon stopped");
    Ok(())
}
