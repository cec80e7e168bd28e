use std::sync::Arc;

use tokio::signal;

use crate::server::AppState;
use crate::store::DescriptionSource;

/// Wait for a shutdown signal (SIGINT or SIGTERM).
pub async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
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
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown...");
        }
    }
}

/// Log what the service learned before exiting. Appends are flushed as they
/// happen, so there is nothing left to write.
pub async fn graceful_shutdown(state: &Arc<AppState>) {
    tracing::info!("Starting graceful shutdown...");

    let store = state.classifier.store();
    let learned = store.count_by_source(DescriptionSource::UserConfirmed).await;
    let total = store.len().await;
    let executions = state.classifier.executions().len().await;

    match (total, learned) {
        (Ok(total), Ok(learned)) => tracing::info!(
            descriptions = total,
            learned,
            executions,
            "Description store closed"
        ),
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not read description store during shutdown")
        }
    }

    tracing::info!("Graceful shutdown complete");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::testing::test_config;

    #[tokio::test]
    async fn test_graceful_shutdown_with_seeded_store() {
        let state = Arc::new(AppState::new(test_config(StoreConfig::default())).await.unwrap());
        graceful_shutdown(&state).await;
        assert!(state.classifier.store().len().await.unwrap() > 0);
    }
}
