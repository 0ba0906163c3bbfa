mod config;
mod error;
mod ip;
mod provider;
mod reconcile;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::future::Future;
use std::path::PathBuf;

use crate::config::Config;
use crate::reconcile::Reconciler;

#[derive(Parser, Debug)]
#[command(name = "cf-dyndns")]
#[command(about = "Keeps a Cloudflare A record pointed at this host's public IP")]
struct Args {
    /// Path to a TOML configuration file; environment variables are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log at debug level regardless of the configured level
    #[arg(
        short,
        long,
        env = "DDNS_DEBUG",
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    debug: bool,

    /// Run a single reconciliation cycle and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    run(Args::parse()).await
}

fn load_config(args: &Args) -> Result<Config> {
    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::from_env()?,
    };
    Ok(config)
}

async fn run(args: Args) -> Result<()> {
    // Load configuration first (before logger init)
    let config = load_config(&args)?;

    // RUST_LOG still takes precedence over both
    let level = if args.debug {
        "debug"
    } else {
        config.daemon.log_level.as_str()
    };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .try_init();

    match &args.config {
        Some(path) => info!("Loaded configuration from: {}", path.display()),
        None => info!("Loaded configuration from environment"),
    }
    info!(
        "Managing A record {} in zone {}",
        config.cloudflare.record_name, config.cloudflare.zone_id
    );

    let client = ip::build_client(config.daemon.timeout()).context("Failed to start HTTP client")?;
    let reconciler = Reconciler::new(&config, client);

    if args.once {
        reconciler
            .run_once()
            .await
            .context("Reconciliation cycle failed")?;
        return Ok(());
    }

    let shutdown = shutdown_signal()?;
    reconciler.run(config.daemon.interval(), shutdown).await;

    Ok(())
}

/// Resolves on SIGTERM or SIGINT.
#[cfg(unix)]
fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).context("Failed to set up SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to set up SIGINT handler")?;

    Ok(async move {
        let name = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        };
        info!("Received {}, shutting down", name);
    })
}

#[cfg(not(unix))]
fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    Ok(async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl-C, shutting down"),
            Err(e) => {
                log::error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        }
    })
}
