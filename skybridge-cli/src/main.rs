//! Skybridge binary entry point.
//!
//! Loads options, builds the bridge service, and runs it until Ctrl+C or
//! SIGTERM.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use skybridge::{BridgeConfig, BridgeOptions, BridgeService};

/// Aircraft-tracking to MQTT telemetry bridge.
#[derive(Parser)]
#[command(name = "skybridge", version, about)]
struct Cli {
    /// Path to the JSON options file.
    #[arg(long, default_value = "/data/options.json")]
    options: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "skybridge=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting skybridge v{}", env!("CARGO_PKG_VERSION"));

    let options = BridgeOptions::load_or_default(&cli.options);
    let config = match BridgeConfig::from_options(&options) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(
        broker = %format!("{}:{}", config.mqtt.host, config.mqtt.port),
        poll_interval = ?config.poll_interval,
        tracking_mode = %config.tracking_mode,
        "Configuration loaded"
    );

    let cancellation = CancellationToken::new();
    let service = match BridgeService::new(&config, cancellation.clone()) {
        Ok(service) => service,
        Err(e) => {
            tracing::error!("Failed to start bridge: {}", e);
            return ExitCode::FAILURE;
        }
    };

    tokio::spawn({
        let cancellation = cancellation.clone();
        async move {
            shutdown_signal().await;
            cancellation.cancel();
        }
    });

    match service.run().await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("Bridge terminated: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Resolve when the process receives Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        () = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
