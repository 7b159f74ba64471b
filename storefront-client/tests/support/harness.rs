#![allow(dead_code)]
//! Shared wiring for the client integration tests.
//!
//! Every harness runs against the in-memory backend with the storefront's
//! tables and procedures, behind a call-counting store, on a manual clock.

use std::sync::Arc;
use storefront_client::{ClientConfig, RecordingNotifier, Storefront};
use storefront_core::{Clock, ManualClock};
use storefront_storage::{InMemoryStore, RemoteStore};
use storefront_test_utils::{storefront_store, CountingStore};

pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub backend: Arc<InMemoryStore>,
    pub counting: Arc<CountingStore<InMemoryStore>>,
    pub notifier: Arc<RecordingNotifier>,
    pub storefront: Storefront,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    pub fn with_config(config: ClientConfig) -> Self {
        let clock = Arc::new(ManualClock::starting_now());
        let dyn_clock: Arc<dyn Clock> = clock.clone();
        let backend = Arc::new(storefront_store(Arc::clone(&dyn_clock)));
        let counting = Arc::new(CountingStore::new(Arc::clone(&backend)));
        let notifier = Arc::new(RecordingNotifier::new());

        let store: Arc<dyn RemoteStore> = counting.clone();
        let storefront = Storefront::new(config, store, dyn_clock, notifier.clone());

        Self {
            clock,
            backend,
            counting,
            notifier,
            storefront,
        }
    }

    pub fn dyn_clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    /// Metric rows whose name is `name`.
    pub fn metrics_named(&self, name: &str) -> usize {
        self.backend
            .rows("performance_metrics")
            .unwrap_or_default()
            .iter()
            .filter(|row| row["metric_name"] == name)
            .count()
    }
}
