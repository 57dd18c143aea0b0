//! vManage Stats Binary Entry Point
//!
//! Runs the collection loop until SIGINT/SIGTERM.
//! Core functionality is provided by the `vmanage_stats` library crate.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vmanage_stats::{
    AppConfig, Driver, InfluxSink, MeasurementsConfig, Scheduler, VManageClient,
    config::parse_duration,
};

/// vManage Stats - aligned-interval statistics collector
#[derive(Parser, Debug)]
#[command(name = "vmanage-stats", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        default_value = "configs/config.yaml",
        env = "VMANAGE_STATS_CONFIG"
    )]
    config: String,

    /// Measurements file (overrides config file)
    #[arg(short, long, env = "VMANAGE_STATS_MEASUREMENTS")]
    measurements: Option<String>,

    /// Controller address (overrides config file)
    #[arg(long, env = "VMANAGE_STATS_CONTROLLER")]
    controller: Option<String>,

    /// InfluxDB address (overrides config file)
    #[arg(long, env = "VMANAGE_STATS_INFLUX_ADDRESS")]
    influx_address: Option<String>,

    /// InfluxDB port (overrides config file)
    #[arg(long, env = "VMANAGE_STATS_INFLUX_PORT")]
    influx_port: Option<u16>,

    /// Delay before the first connection, e.g. "0s" (overrides config file)
    #[arg(long, env = "VMANAGE_STATS_STARTUP_DELAY")]
    startup_delay: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,vmanage_stats=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("vManage Stats - aligned-interval statistics collector");

    let cli = Cli::parse();

    tracing::info!("Loading configuration from: {}", cli.config);
    let mut config = AppConfig::load(&cli.config)?;

    // Apply CLI/env overrides (CLI > ENV > config file)
    if let Some(path) = cli.measurements {
        config.measurements_path = path;
    }
    if let Some(address) = cli.controller {
        config.controller.address = address;
    }
    if let Some(address) = cli.influx_address {
        config.sink.address = address;
    }
    if let Some(port) = cli.influx_port {
        config.sink.port = port;
    }
    if let Some(delay) = cli.startup_delay {
        config.startup_delay = parse_duration(&delay)?;
    }
    config.validate()?;

    tracing::info!(
        "Controller: {} ({}), InfluxDB: {}:{}/{}",
        config.controller.address,
        config.controller.description,
        config.sink.address,
        config.sink.port,
        config.sink.database,
    );

    // The first load must succeed; later reload failures keep the last good set
    let measurements = MeasurementsConfig::load(&config.measurements_path)?;
    let definitions = measurements.into_definitions();
    tracing::info!(
        "Loaded {} measurements from: {}",
        definitions.len(),
        config.measurements_path
    );

    if !config.startup_delay.is_zero() {
        tracing::info!(
            "Waiting {} before first connection",
            humantime::format_duration(config.startup_delay)
        );
        tokio::select! {
            _ = tokio::time::sleep(config.startup_delay) => {}
            _ = shutdown_signal() => {
                tracing::info!("Shutdown complete");
                return Ok(());
            }
        }
    }

    let origin = config.controller.origin();
    let scheduler = Scheduler::new(
        VManageClient::new(config.controller),
        InfluxSink::new(config.sink),
        origin,
    );

    tracing::info!("Press Ctrl+C to shutdown");
    Driver::new(scheduler, config.measurements_path, definitions)
        .run(shutdown_signal())
        .await;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal");
        }
    }
}
