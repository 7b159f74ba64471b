//! Maintenance Background Task
//!
//! Two periodic duties share one task:
//!
//! - Run the backend's `daily_cleanup` procedure, which prunes old metrics
//!   and rate-limit windows. The facade's query cache is cleared on every
//!   run.
//! - Drop expired entries from the rate limiter's local cache.
//!
//! # Configuration
//!
//! ```rust
//! use storefront_client::jobs::CleanupConfig;
//! use std::time::Duration;
//!
//! let config = CleanupConfig {
//!     cleanup_interval: Duration::from_secs(86_400), // Once a day
//!     limiter_sweep_interval: Duration::from_secs(300),
//!     run_on_start: true,
//! };
//! ```

use crate::constants::{DEFAULT_CLEANUP_INTERVAL_SECS, DEFAULT_LIMITER_SWEEP_INTERVAL_SECS};
use crate::optimizer::DatabaseOptimizer;
use crate::rate_limit::RateLimiter;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupConfig {
    /// How often to run the remote daily cleanup (default: 24 hours)
    pub cleanup_interval: Duration,

    /// How often to prune the limiter's local cache (default: 5 minutes)
    pub limiter_sweep_interval: Duration,

    /// Run the remote cleanup immediately instead of after the first
    /// interval (default: false)
    pub run_on_start: bool,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            cleanup_interval: Duration::from_secs(DEFAULT_CLEANUP_INTERVAL_SECS),
            limiter_sweep_interval: Duration::from_secs(DEFAULT_LIMITER_SWEEP_INTERVAL_SECS),
            run_on_start: false,
        }
    }
}

impl CleanupConfig {
    /// Create CleanupConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `STOREFRONT_CLEANUP_INTERVAL_SECS`: Remote cleanup interval (default: 86400)
    /// - `STOREFRONT_LIMITER_SWEEP_INTERVAL_SECS`: Local limiter sweep interval (default: 300)
    /// - `STOREFRONT_CLEANUP_ON_START`: Run the remote cleanup at startup (default: false)
    pub fn from_env() -> Self {
        let cleanup_interval = Duration::from_secs(
            std::env::var("STOREFRONT_CLEANUP_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(DEFAULT_CLEANUP_INTERVAL_SECS),
        );

        let limiter_sweep_interval = Duration::from_secs(
            std::env::var("STOREFRONT_LIMITER_SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(DEFAULT_LIMITER_SWEEP_INTERVAL_SECS),
        );

        let run_on_start = std::env::var("STOREFRONT_CLEANUP_ON_START")
            .ok()
            .map(|s| s.to_lowercase() == "true")
            .unwrap_or(false);

        Self {
            cleanup_interval,
            limiter_sweep_interval,
            run_on_start,
        }
    }

    /// Short intervals for local development.
    pub fn development() -> Self {
        Self {
            cleanup_interval: Duration::from_secs(60),
            limiter_sweep_interval: Duration::from_secs(10),
            run_on_start: true,
        }
    }

    pub fn production() -> Self {
        Self {
            cleanup_interval: Duration::from_secs(DEFAULT_CLEANUP_INTERVAL_SECS),
            limiter_sweep_interval: Duration::from_secs(DEFAULT_LIMITER_SWEEP_INTERVAL_SECS),
            run_on_start: false,
        }
    }
}

// ============================================================================
// METRICS
// ============================================================================

#[derive(Debug, Default)]
pub struct CleanupMetrics {
    /// Successful remote cleanup runs
    pub cleanup_runs: AtomicU64,

    /// Failed remote cleanup runs
    pub cleanup_errors: AtomicU64,

    /// Local limiter sweeps completed
    pub limiter_sweeps: AtomicU64,

    /// Local limiter entries dropped across all sweeps
    pub limiter_entries_removed: AtomicU64,
}

impl CleanupMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> CleanupSnapshot {
        CleanupSnapshot {
            cleanup_runs: self.cleanup_runs.load(Ordering::Relaxed),
            cleanup_errors: self.cleanup_errors.load(Ordering::Relaxed),
            limiter_sweeps: self.limiter_sweeps.load(Ordering::Relaxed),
            limiter_entries_removed: self.limiter_entries_removed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupSnapshot {
    pub cleanup_runs: u64,
    pub cleanup_errors: u64,
    pub limiter_sweeps: u64,
    pub limiter_entries_removed: u64,
}

// ============================================================================
// BACKGROUND TASK
// ============================================================================

/// Runs until `shutdown_rx` sees `true` (or its sender is dropped) and
/// returns the metrics gathered over its lifetime.
pub async fn maintenance_task(
    optimizer: Arc<DatabaseOptimizer>,
    limiter: Arc<RateLimiter>,
    config: CleanupConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<CleanupMetrics> {
    let metrics = Arc::new(CleanupMetrics::new());

    let first_cleanup = if config.run_on_start {
        Instant::now()
    } else {
        Instant::now() + config.cleanup_interval
    };
    let mut cleanup_interval = interval_at(first_cleanup, config.cleanup_interval);
    cleanup_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut sweep_interval = interval(config.limiter_sweep_interval);
    sweep_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        cleanup_interval_secs = config.cleanup_interval.as_secs(),
        limiter_sweep_interval_secs = config.limiter_sweep_interval.as_secs(),
        run_on_start = config.run_on_start,
        "Maintenance task started"
    );

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::info!("Maintenance task shutting down");
                    break;
                }
            }

            _ = cleanup_interval.tick() => {
                run_cleanup(&optimizer, &metrics).await;
            }

            _ = sweep_interval.tick() => {
                sweep_limiter(&limiter, &metrics);
            }
        }
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        cleanup_runs = snapshot.cleanup_runs,
        cleanup_errors = snapshot.cleanup_errors,
        limiter_sweeps = snapshot.limiter_sweeps,
        limiter_entries_removed = snapshot.limiter_entries_removed,
        "Maintenance task completed"
    );

    metrics
}

async fn run_cleanup(optimizer: &DatabaseOptimizer, metrics: &CleanupMetrics) {
    if optimizer.run_daily_cleanup().await {
        metrics.cleanup_runs.fetch_add(1, Ordering::Relaxed);
    } else {
        // Already logged and recorded as a metric by the facade.
        metrics.cleanup_errors.fetch_add(1, Ordering::Relaxed);
    }
}

fn sweep_limiter(limiter: &RateLimiter, metrics: &CleanupMetrics) {
    metrics.limiter_sweeps.fetch_add(1, Ordering::Relaxed);
    let removed = limiter.cleanup_local_cache();
    if removed > 0 {
        tracing::info!(removed, "Pruned expired rate-limit entries");
        metrics
            .limiter_entries_removed
            .fetch_add(removed as u64, Ordering::Relaxed);
    } else {
        tracing::trace!("Rate-limit sweep found nothing to prune");
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_core::{Clock, ManualClock, StoreError};
    use storefront_storage::RemoteStore;
    use storefront_test_utils::{storefront_store, FailingStore, Operation};

    fn parts(
        store: Arc<dyn RemoteStore>,
        clock: Arc<dyn Clock>,
    ) -> (Arc<DatabaseOptimizer>, Arc<RateLimiter>) {
        let optimizer = Arc::new(DatabaseOptimizer::new(
            Arc::clone(&store),
            Arc::clone(&clock),
        ));
        let limiter = Arc::new(RateLimiter::new(store, clock));
        (optimizer, limiter)
    }

    #[test]
    fn test_config_default() {
        let config = CleanupConfig::default();
        assert_eq!(
            config.cleanup_interval,
            Duration::from_secs(DEFAULT_CLEANUP_INTERVAL_SECS)
        );
        assert_eq!(
            config.limiter_sweep_interval,
            Duration::from_secs(DEFAULT_LIMITER_SWEEP_INTERVAL_SECS)
        );
        assert!(!config.run_on_start);
    }

    #[test]
    fn test_config_presets() {
        let dev = CleanupConfig::development();
        assert_eq!(dev.cleanup_interval, Duration::from_secs(60));
        assert!(dev.run_on_start);
        assert_eq!(CleanupConfig::production(), CleanupConfig::default());
    }

    #[test]
    fn test_metrics_snapshot() {
        let metrics = CleanupMetrics::new();
        metrics.cleanup_runs.store(2, Ordering::Relaxed);
        metrics.limiter_entries_removed.store(7, Ordering::Relaxed);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.cleanup_runs, 2);
        assert_eq!(snapshot.cleanup_errors, 0);
        assert_eq!(snapshot.limiter_entries_removed, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_cleanup_on_start_then_stops() {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::starting_now());
        let store: Arc<dyn RemoteStore> = Arc::new(storefront_store(Arc::clone(&clock)));
        let (optimizer, limiter) = parts(store, clock);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let config = CleanupConfig {
            run_on_start: true,
            ..CleanupConfig::default()
        };
        let handle = tokio::spawn(maintenance_task(optimizer, limiter, config, shutdown_rx));

        tokio::time::sleep(Duration::from_millis(10)).await;
        shutdown_tx.send(true).unwrap();
        let snapshot = handle.await.unwrap().snapshot();

        assert_eq!(snapshot.cleanup_runs, 1);
        assert_eq!(snapshot.cleanup_errors, 0);
        assert_eq!(snapshot.limiter_sweeps, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_counts_failed_cleanup() {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::starting_now());
        let failing = FailingStore::new(Arc::new(storefront_store(Arc::clone(&clock))));
        failing.fail(
            Operation::Rpc,
            Some("daily_cleanup"),
            StoreError::Network {
                message: "offline".to_string(),
            },
        );
        let (optimizer, limiter) = parts(Arc::new(failing), clock);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let config = CleanupConfig {
            run_on_start: true,
            ..CleanupConfig::default()
        };
        let handle = tokio::spawn(maintenance_task(optimizer, limiter, config, shutdown_rx));

        tokio::time::sleep(Duration::from_millis(10)).await;
        drop(shutdown_tx);
        let snapshot = handle.await.unwrap().snapshot();

        assert_eq!(snapshot.cleanup_runs, 0);
        assert_eq!(snapshot.cleanup_errors, 1);
    }
}
