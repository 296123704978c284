//! API gateway
//!
//! A reverse proxy that mounts declaratively defined services on path
//! prefixes, balances them across upstreams and runs per-route plugins.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────────┐
//!                        │                    GATEWAY                       │
//!   Client Request       │  ┌─────────┐   ┌─────────┐   ┌───────────────┐   │
//!   ─────────────────────┼─▶│   net   │──▶│  http   │──▶│    routing    │   │
//!                        │  │listener │   │ server  │   │ (request id)  │   │
//!                        │  └─────────┘   └─────────┘   └───────┬───────┘   │
//!                        │                                      ▼           │
//!                        │                              ┌───────────────┐   │
//!                        │                              │    plugins    │   │
//!                        │                              │ limiter, json │   │
//!                        │                              └───────┬───────┘   │
//!                        │                                      ▼           │
//!   Client Response      │                              ┌───────────────┐   │   Upstream
//!   ◀────────────────────┼──────────────────────────────│     proxy     │◀──┼──▶ Server
//!                        │                              │ director + lb │   │
//!                        │                              └───────────────┘   │
//!                        │  service loader (definitions.json) → proxy reg.  │
//!                        │  lifecycle · config · observability              │
//!                        └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use api_gateway::config::load_config;
use api_gateway::lifecycle::{wait_for_signal, Gateway};
use api_gateway::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "gateway")]
#[command(about = "Declarative API gateway", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway
    Start {
        /// Global configuration file (JSON or TOML)
        #[arg(short, long, default_value = "guard.json")]
        config: PathBuf,

        /// Service definition file
        #[arg(short = 'd', long = "svcdef", default_value = "definitions.json")]
        definitions: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start {
            config,
            definitions,
        } => start(config, definitions).await,
    }
}

async fn start(config_path: PathBuf, definitions: PathBuf) -> ExitCode {
    let config = match load_config(&config_path) {
        Ok(config) => config,
        Err(e) => {
            init_logging("info");
            tracing::error!(path = %config_path.display(), error = %e, "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };
    init_logging(&config.log_level);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?config,
        "Gateway starting"
    );

    let gateway = match Gateway::new(config, definitions).start().await {
        Ok(gateway) => gateway,
        Err(e) => {
            tracing::error!(error = %e, "Failed to start gateway");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(address = %gateway.local_addr(), "Gateway is up");

    let shutdown = gateway.shutdown_handle();
    tokio::spawn(async move {
        wait_for_signal().await;
        shutdown.trigger();
    });

    gateway.wait().await;
    ExitCode::SUCCESS
}
