use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ds3_bridge::bridge::Bridge;
use ds3_bridge::config::BridgeConfig;
use ds3_bridge::{console, staging};

/// Log level for the application
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

/// ds3-bridge command line arguments
#[derive(Parser, Debug)]
#[command(name = "ds3-bridge")]
#[command(version, about = "DualShock 3 USB gadget bridge", long_about = None)]
struct CliArgs {
    /// Path to a JSON configuration file
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Bridge working directory (overrides the config file)
    #[arg(short = 'd', long, value_name = "DIR")]
    bridge_dir: Option<PathBuf>,

    /// Run the interactive input console on stdin
    #[arg(short = 'i', long)]
    interactive: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short = 'l', long, value_name = "LEVEL", default_value = "info")]
    log_level: LogLevel,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    init_logging(args.log_level, args.verbose);

    tracing::info!("Starting ds3-bridge v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match &args.config {
        Some(path) => BridgeConfig::load(path)?,
        None => BridgeConfig::default(),
    };
    if let Some(dir) = args.bridge_dir {
        config.bridge_dir = dir;
    }
    tracing::info!("Bridge directory: {}", config.bridge_dir.display());

    staging::prepare(&config)?;

    let bridge = Bridge::start(&config).await?;
    tracing::info!(
        "Pad online; clients can connect on port {}",
        bridge.port()
    );

    if args.interactive {
        tokio::spawn(console::run(bridge.clone()));
    }

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
            bridge.release().await;
        }
        _ = bridge.wait_released() => {}
    }

    tracing::info!("Bridge shutdown complete");
    Ok(())
}

/// Initialize logging with tracing
fn init_logging(level: LogLevel, verbose_count: u8) {
    let effective_level = match verbose_count {
        0 => level,
        1 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };

    let filter = match effective_level {
        LogLevel::Error => "ds3_bridge=error",
        LogLevel::Warn => "ds3_bridge=warn",
        LogLevel::Info => "ds3_bridge=info",
        LogLevel::Debug => "ds3_bridge=debug",
        LogLevel::Trace => "ds3_bridge=trace",
    };

    // environment variable takes highest priority
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    if let Err(err) = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
    {
        eprintln!("failed to initialize tracing: {}", err);
    }
}
