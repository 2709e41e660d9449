//! The token balance exporter binary

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]

use clap::Parser;
use token_balance_exporter::{
    cli::Cli, config::ExporterConfig, error::ExporterError, utils::setup_logging,
    watcher::Watcher,
};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), ExporterError> {
    let cli = Cli::parse();
    setup_logging(cli.json_logs);

    if let Err(e) = run(cli).await {
        error!("{e}");
        return Err(e);
    }

    Ok(())
}

/// Load the configuration, run the watcher until a shutdown signal arrives,
/// then stop it
async fn run(cli: Cli) -> Result<(), ExporterError> {
    let config = ExporterConfig::from_file(&cli.config_file).await?;
    let watcher = Watcher::build_from_config(&config, cli.watcher_settings())?;

    let running = watcher.start(cli.listen).await?;
    info!(listen = %running.local_addr(), "Started");

    shutdown_signal().await;
    running.stop().await?;
    info!("Stop");

    Ok(())
}

/// Wait for SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Can't listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            },
            Err(e) => {
                error!("Can't listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
