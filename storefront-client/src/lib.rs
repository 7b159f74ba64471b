//! Storefront Client - Data Access Layer
//!
//! Everything the storefront's pages use to talk to the hosted backend:
//!
//! - [`DatabaseOptimizer`]: cached, instrumented reads and maintenance
//! - [`RateLimiter`]: fixed-window limits with temporary blocks
//! - [`classify`]: error classification and user notifications
//! - [`views`]: client-side copies of orders, products and site settings
//! - [`Checkout`]: the customer order flow
//! - [`jobs`]: the periodic maintenance task
//!
//! [`Storefront`] wires them together.

pub mod checkout;
pub mod classify;
pub mod config;
pub mod constants;
pub mod health;
pub mod images;
pub mod jobs;
pub mod notify;
pub mod optimizer;
pub mod rate_limit;
pub mod state;
pub mod telemetry;
pub mod views;

// Re-export commonly used types
pub use checkout::{Checkout, CheckoutReceipt};
pub use classify::{
    classify, with_error_handling, Classify, ClassifiedError, ErrorKind, ErrorReporter,
};
pub use config::ClientConfig;
pub use health::{HealthCheck, HealthMonitor, HealthReport, MetricsSummary};
pub use images::{HttpLinkProbe, LinkProbe, ProbeOutcome, SweepReport};
pub use jobs::{maintenance_task, CleanupConfig, CleanupMetrics};
pub use notify::{Notification, NotificationKind, Notifier, RecordingNotifier, TracingNotifier};
pub use optimizer::{DatabaseOptimizer, OrderQuery, ProductQuery};
pub use rate_limit::{RateLimitDecision, RateLimitKey, RateLimitStats, RateLimiter};
pub use state::Storefront;
pub use telemetry::{init_tracing, TelemetryConfig};
pub use views::{
    LoadState, OrderSearch, OrdersView, ProductsView, SettingsView, ViewSnapshot, WatchHandle,
};
