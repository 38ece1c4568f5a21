use anyhow::{Context, Result};
use tokio::signal;

use yt_indexer::config::Config;
use yt_indexer::{metrics, service};

/// Run the full service until SIGINT/SIGTERM or the first fatal error
pub async fn serve(config: Config) -> Result<()> {
    if let Err(e) = metrics::init_metrics() {
        tracing::warn!(error = %e, "Metrics initialization failed, continuing without metrics");
    }

    tracing::info!(
        addr = %config.server.bind_addr(),
        index = %config.search.index,
        backend = ?config.election.backend,
        interval_secs = config.fetch.interval_secs,
        "Starting indexer service"
    );

    service::run(config, shutdown_signal())
        .await
        .context("Indexer service stopped with an error")?;

    tracing::info!("Indexer service stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
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
        _ = ctrl_c => tracing::info!("Received Ctrl+C, initiating shutdown"),
        _ = terminate => tracing::info!("Received SIGTERM, initiating shutdown"),
    }
}
