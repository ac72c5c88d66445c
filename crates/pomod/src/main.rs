//! pomod - the pomodoro background service
//!
//! This is the main entry point for pomod.
//! It wires together:
//! - Rule preset selection
//! - Logging
//! - Signal-driven shutdown of the service

use anyhow::{Context, Result};
use clap::Parser;
use pomo_config::RulePreset;
use pomo_util::socket_path_without_env;
use pomod::Service;
use std::path::PathBuf;
use tokio::signal::unix::{SignalKind, signal};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// pomod - pomodoro timer service
#[derive(Parser, Debug)]
#[command(name = "pomod")]
#[command(about = "Pomodoro timer service", long_about = None)]
struct Args {
    /// Socket path (or set POMO_SOCKET env var)
    #[arg(short, long, env = "POMO_SOCKET", default_value_os_t = socket_path_without_env())]
    socket: PathBuf,

    /// Rule preset: "classic" (4 × 25min work) or "test" (4 × 5s work)
    #[arg(short, long, env = "POMO_RULES", default_value_t = RulePreset::Classic)]
    rules: RulePreset,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG wins over --log-level
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "pomod starting");

    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;
    let mut sighup = signal(SignalKind::hangup()).context("Failed to create SIGHUP handler")?;

    let shutdown = async move {
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down gracefully"),
            _ = sigint.recv() => info!("Received SIGINT, shutting down gracefully"),
            _ = sighup.recv() => info!("Received SIGHUP, shutting down gracefully"),
        }
    };

    let service = Service::new(&args.socket, args.rules).await?;
    service.run(shutdown).await
}
