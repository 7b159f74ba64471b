//! Background Jobs for the storefront client
//!
//! - `cleanup`: runs the remote daily cleanup and prunes the rate limiter's
//!   local cache on their own intervals
//!
//! # Usage
//!
//! ```ignore
//! use storefront_client::jobs::{maintenance_task, CleanupConfig};
//! use tokio::sync::watch;
//!
//! let (shutdown_tx, shutdown_rx) = watch::channel(false);
//! let handle = tokio::spawn(maintenance_task(
//!     Arc::clone(&optimizer),
//!     Arc::clone(&limiter),
//!     CleanupConfig::from_env(),
//!     shutdown_rx,
//! ));
//!
//! // On shutdown
//! let _ = shutdown_tx.send(true);
//! let metrics = handle.await?;
//! ```

pub mod cleanup;

pub use cleanup::{maintenance_task, CleanupConfig, CleanupMetrics, CleanupSnapshot};
