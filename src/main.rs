//! nanokongo - MIDI control surface to keystrokes, mouse, commands and MIDI

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nanokongo::{midi, paths, AppConfig, Router};

/// Turn MIDI control surface buttons and knobs into actions
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "NANOKONGO_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "NANOKONGO_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Override the device pattern from the configuration
    #[arg(short, long, env = "NANOKONGO_DEVICE")]
    device: Option<String>,

    /// Override the MIDI channel (0-15) from the configuration
    #[arg(long, env = "NANOKONGO_CHANNEL")]
    channel: Option<u8>,

    /// List available MIDI ports
    #[arg(long)]
    list_ports: bool,

    /// Load the configuration and build all actions, then exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    init_logging(&args.log_level)?;

    if args.list_ports {
        midi::print_ports()?;
        return Ok(());
    }

    let config_path = paths::resolve_config_path(args.config.as_deref());
    info!("Configuration file: {}", config_path.display());

    let mut config = AppConfig::load(&config_path).await?;
    if let Some(device) = args.device {
        config.device = device;
    }
    if let Some(channel) = args.channel {
        config.channel = channel;
    }

    let mut router = Router::new(&config).context("Failed to bind configuration")?;

    if args.check {
        println!(
            "Configuration OK: {} control(s) on channel {}",
            router.controls().count(),
            router.channel()
        );
        return Ok(());
    }

    router.open()?;
    info!("Ready to process MIDI events!");

    let result = tokio::select! {
        result = router.listen() => result.context("Listening on MIDI input failed"),
        _ = shutdown_signal() => Ok(()),
    };

    info!("Shutting down...");
    router.close();
    result
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .with_context(|| format!("Invalid log level: {}", level))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to install CTRL+C signal handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
