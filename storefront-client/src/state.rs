//! Composition root
//!
//! [`Storefront`] wires one store, one clock and one notifier into the
//! facade, the limiter, the views and checkout. Everything is shared by
//! `Arc`; there are no process-wide singletons.

use crate::checkout::Checkout;
use crate::classify::ErrorReporter;
use crate::config::ClientConfig;
use crate::health::HealthMonitor;
use crate::images::HttpLinkProbe;
use crate::notify::Notifier;
use crate::optimizer::DatabaseOptimizer;
use crate::rate_limit::RateLimiter;
use crate::views::{OrderSearch, OrdersView, ProductsView, SettingsView};
use std::sync::Arc;
use storefront_core::{Clock, StorefrontResult, SystemClock};
use storefront_storage::{RemoteStore, RestStore};

pub struct Storefront {
    config: ClientConfig,
    pub optimizer: Arc<DatabaseOptimizer>,
    pub limiter: Arc<RateLimiter>,
    pub reporter: ErrorReporter,
    pub orders: Arc<OrdersView>,
    pub products: Arc<ProductsView>,
    pub settings: Arc<SettingsView>,
    pub checkout: Checkout,
    pub health: HealthMonitor,
}

impl std::fmt::Debug for Storefront {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storefront")
            .field("environment", &self.config.environment)
            .field("optimizer", &self.optimizer)
            .finish_non_exhaustive()
    }
}

impl Storefront {
    pub fn new(
        config: ClientConfig,
        store: Arc<dyn RemoteStore>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let optimizer = Arc::new(
            DatabaseOptimizer::new(Arc::clone(&store), Arc::clone(&clock))
                .with_ttls(config.cache_ttls)
                .with_sweep_policy(config.sweep),
        );
        let limiter = Arc::new(
            RateLimiter::new(store, Arc::clone(&clock)).with_enabled(config.rate_limit_enabled),
        );
        let reporter = ErrorReporter::new(notifier, config.environment.clone());

        let orders = Arc::new(OrdersView::new(Arc::clone(&optimizer), reporter.clone()));
        let products = Arc::new(ProductsView::new(Arc::clone(&optimizer), reporter.clone()));
        let settings = Arc::new(SettingsView::new(Arc::clone(&optimizer), reporter.clone()));
        let checkout = Checkout::new(
            Arc::clone(&limiter),
            Arc::clone(&orders),
            config.shipping,
            clock,
            reporter.clone(),
        );
        let health = HealthMonitor::new(Arc::clone(&optimizer));

        Self {
            config,
            optimizer,
            limiter,
            reporter,
            orders,
            products,
            settings,
            checkout,
            health,
        }
    }

    /// Build against the hosted backend using the system clock.
    pub fn connect(config: ClientConfig, notifier: Arc<dyn Notifier>) -> StorefrontResult<Self> {
        let rest = RestStore::new(config.rest_config()?)?;
        tracing::info!(
            environment = %config.environment,
            rate_limit_enabled = config.rate_limit_enabled,
            "Storefront client connected"
        );
        Ok(Self::new(config, Arc::new(rest), Arc::new(SystemClock), notifier))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Debounced search over the shared orders view.
    pub fn order_search(&self) -> OrderSearch {
        OrderSearch::spawn(Arc::clone(&self.orders), self.config.search_debounce)
    }

    /// HTTP probe for the image sweep, with the configured per-probe timeout.
    pub fn link_probe(&self) -> StorefrontResult<HttpLinkProbe> {
        Ok(HttpLinkProbe::new(self.config.sweep.probe_timeout)?)
    }
}
