//! Storefront maintenance worker
//!
//! Runs the daily cleanup and rate-limiter sweeps against the hosted
//! backend until interrupted.

use std::sync::Arc;

use storefront_client::jobs::{maintenance_task, CleanupConfig};
use storefront_client::{init_tracing, ClientConfig, Storefront, TelemetryConfig, TracingNotifier};
use storefront_core::StorefrontResult;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> StorefrontResult<()> {
    let telemetry_config = TelemetryConfig::from_env();
    init_tracing(&telemetry_config);

    let client_config = ClientConfig::from_env();
    let cleanup_config = CleanupConfig::from_env();
    let storefront = Storefront::connect(client_config, Arc::new(TracingNotifier))?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(maintenance_task(
        Arc::clone(&storefront.optimizer),
        Arc::clone(&storefront.limiter),
        cleanup_config,
        shutdown_rx,
    ));

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    } else {
        tracing::info!("Shutdown signal received");
    }

    let _ = shutdown_tx.send(true);
    match task.await {
        Ok(metrics) => {
            let snapshot = metrics.snapshot();
            tracing::info!(
                cleanup_runs = snapshot.cleanup_runs,
                cleanup_errors = snapshot.cleanup_errors,
                limiter_entries_removed = snapshot.limiter_entries_removed,
                "Maintenance worker stopped"
            );
        }
        Err(e) => tracing::error!(error = %e, "Maintenance task did not shut down cleanly"),
    }
    Ok(())
}
