//! Data-access facade: caching, metrics and maintenance.

#[path = "support/harness.rs"]
mod harness;

use async_trait::async_trait;
use harness::Harness;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use storefront_client::{
    classify, DatabaseOptimizer, ErrorKind, LinkProbe, OrderQuery, ProbeOutcome, ProductQuery,
};
use storefront_core::{Clock, OrderStatus, PerformanceMetric, StoreError, StorefrontError};
use storefront_storage::{Filter, Namespace, Query, RemoteStore};
use storefront_test_utils::{order_row, product_row, settings_row, FailingStore, Operation};

// ============================================================================
// HELPERS
// ============================================================================

/// Answers from a per-URL script; the last outcome repeats.
#[derive(Default)]
struct ScriptedProbe {
    script: Mutex<HashMap<String, Vec<ProbeOutcome>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedProbe {
    fn with(self, url: &str, outcomes: &[ProbeOutcome]) -> Self {
        self.script
            .lock()
            .unwrap()
            .insert(url.to_string(), outcomes.to_vec());
        self
    }

    fn calls_for(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
    }
}

#[async_trait]
impl LinkProbe for ScriptedProbe {
    async fn probe(&self, url: &str) -> ProbeOutcome {
        self.calls.lock().unwrap().push(url.to_string());
        let mut script = self.script.lock().unwrap();
        match script.get_mut(url) {
            Some(outcomes) if outcomes.len() > 1 => outcomes.remove(0),
            Some(outcomes) => outcomes.first().copied().unwrap_or(ProbeOutcome::Reachable),
            None => ProbeOutcome::Reachable,
        }
    }
}

fn seed_products(h: &Harness) {
    h.backend
        .seed(
            "products",
            vec![
                product_row("Keke Serum", true, &["https://cdn.example.com/a.jpg"]),
                product_row("Old Serum", false, &[]),
            ],
        )
        .unwrap();
}

fn seed_orders(h: &Harness) {
    h.backend
        .seed(
            "orders",
            vec![
                order_row("Mona", OrderStatus::New, 350.0),
                order_row("Sara", OrderStatus::Delivered, 500.0),
                order_row("Hala", OrderStatus::Cancelled, 150.0),
            ],
        )
        .unwrap();
}

// ============================================================================
// CACHE-ASIDE READS
// ============================================================================

#[tokio::test]
async fn test_products_second_read_is_served_from_cache() {
    let h = Harness::new();
    seed_products(&h);
    let optimizer = &h.storefront.optimizer;

    let first = optimizer.products(ProductQuery::default()).await.unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].name, "Keke Serum");
    assert_eq!(h.metrics_named("products_query_time"), 1);
    assert_eq!(h.counting.count(Operation::Select, "active_products"), 1);

    h.clock.advance(Duration::from_secs(60));
    let second = optimizer.products(ProductQuery::default()).await.unwrap();
    assert_eq!(second, first);
    assert_eq!(h.metrics_named("products_query_time"), 1);
    assert_eq!(h.counting.count(Operation::Select, "active_products"), 1);
}

#[tokio::test]
async fn test_products_refetched_after_ttl() {
    let h = Harness::new();
    seed_products(&h);
    let optimizer = &h.storefront.optimizer;

    optimizer.products(ProductQuery::default()).await.unwrap();
    h.clock.advance(Duration::from_secs(3 * 60 + 1));
    optimizer.products(ProductQuery::default()).await.unwrap();

    assert_eq!(h.counting.count(Operation::Select, "active_products"), 2);
}

#[tokio::test]
async fn test_all_products_read_the_base_table() {
    let h = Harness::new();
    seed_products(&h);
    let query = ProductQuery {
        active_only: false,
        ..ProductQuery::default()
    };

    let products = h.storefront.optimizer.products(query).await.unwrap();
    assert_eq!(products.len(), 2);
    assert_eq!(h.counting.count(Operation::Select, "products"), 1);
}

#[tokio::test]
async fn test_identical_order_queries_share_a_cache_entry() {
    let h = Harness::new();
    seed_orders(&h);
    let optimizer = &h.storefront.optimizer;
    let query = OrderQuery::default().search("a");

    let first = optimizer.orders(&query).await.unwrap();
    let second = optimizer.orders(&query.clone().without_cache().search("a")).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(h.counting.count(Operation::Rpc, "search_orders"), 2);

    // A cached read with the same parameters is served locally.
    optimizer.orders(&OrderQuery::default().search("a")).await.unwrap();
    assert_eq!(h.counting.count(Operation::Rpc, "search_orders"), 2);

    optimizer
        .orders(&OrderQuery::default().search("a").page(2))
        .await
        .unwrap();
    assert_eq!(h.counting.count(Operation::Rpc, "search_orders"), 3);
}

#[tokio::test]
async fn test_orders_status_filter() {
    let h = Harness::new();
    seed_orders(&h);

    let delivered = h
        .storefront
        .optimizer
        .orders(&OrderQuery::default().status(OrderStatus::Delivered))
        .await
        .unwrap();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].customer_name, "Sara");
}

#[tokio::test]
async fn test_dashboard_stats_and_advanced_search() {
    let h = Harness::new();
    seed_orders(&h);
    seed_products(&h);
    let optimizer = &h.storefront.optimizer;

    let stats = optimizer.dashboard_stats(true).await.unwrap();
    assert_eq!(stats.total_orders, 3);
    assert_eq!(stats.pending_orders, 1);
    assert_eq!(stats.completed_orders, 1);
    assert_eq!(stats.active_products, 1);
    assert_eq!(h.metrics_named("dashboard_stats_query_time"), 1);

    let mut filters = BTreeMap::new();
    filters.insert("min_amount".to_string(), json!(300));
    let found = optimizer.advanced_search("", &filters).await.unwrap();
    assert_eq!(found.len(), 2);

    optimizer.advanced_search("", &filters).await.unwrap();
    assert_eq!(h.counting.count(Operation::Rpc, "advanced_search"), 1);
}

#[tokio::test]
async fn test_site_settings_absent_then_present() {
    let h = Harness::new();
    let optimizer = &h.storefront.optimizer;

    assert_eq!(optimizer.site_settings(true).await.unwrap(), None);

    h.backend.seed("site_settings", vec![settings_row()]).unwrap();
    // Still the cached empty answer until invalidated.
    assert_eq!(optimizer.site_settings(true).await.unwrap(), None);

    optimizer.invalidate_namespace(&Namespace::SiteSettings);
    let settings = optimizer.site_settings(true).await.unwrap().unwrap();
    assert_eq!(settings.site_name.as_deref(), Some("Sandreen Beauty"));
}

// ============================================================================
// FAILURES AND METRICS
// ============================================================================

#[tokio::test]
async fn test_failed_read_records_error_metric() {
    let h = Harness::new();
    let failing = FailingStore::new(Arc::clone(&h.backend));
    failing.fail(
        Operation::Select,
        Some("active_products"),
        StoreError::remote("42P01", "relation does not exist"),
    );
    let optimizer = DatabaseOptimizer::new(Arc::new(failing), h.dyn_clock());

    let err = optimizer.products(ProductQuery::default()).await.unwrap_err();
    assert_eq!(h.metrics_named("products_query_error"), 1);
    assert_eq!(h.metrics_named("products_query_time"), 0);

    let classified = classify(&err);
    assert_eq!(
        classified.kind,
        ErrorKind::Database {
            code: "42P01".to_string()
        }
    );
    assert_eq!(classified.message, "Table not found");
    assert_eq!(optimizer.cache_stats().keys.len(), 0);
}

#[tokio::test]
async fn test_measure_query_records_outcome() {
    let h = Harness::new();
    let optimizer = &h.storefront.optimizer;

    let ok: Result<u32, StorefrontError> = optimizer.measure_query("export", async { Ok(7) }).await;
    assert_eq!(ok, Ok(7));

    let err: Result<u32, StorefrontError> = optimizer
        .measure_query("export", async {
            Err(StorefrontError::NotLoaded {
                resource: "orders".to_string(),
            })
        })
        .await;
    assert!(err.is_err());

    assert_eq!(h.metrics_named("export_duration"), 2);
    assert_eq!(h.metrics_named("export_success"), 1);
    assert_eq!(h.metrics_named("export_error"), 1);

    let errors = optimizer.performance_metrics(Some("export_error"), 1).await;
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].metric_unit, "count");
}

#[tokio::test]
async fn test_metrics_lookback_is_clamped() {
    let h = Harness::new();
    let optimizer = &h.storefront.optimizer;
    let _: Result<(), StorefrontError> = optimizer.measure_query("export", async { Ok(()) }).await;

    let metrics = optimizer.performance_metrics(None, u32::MAX).await;
    assert_eq!(metrics.len(), 2);
}

#[tokio::test]
async fn test_health_report_counts_tables_and_errors() {
    let h = Harness::new();
    let optimizer = &h.storefront.optimizer;
    optimizer
        .measure_query("health_check", async { Err::<(), _>("boom") })
        .await
        .unwrap_err();
    // Not an `_error` metric despite the LIKE match.
    optimizer
        .record_metric(PerformanceMetric::flag("fooerror", optimizer.clock().now()))
        .await;

    let report = h.storefront.health.report().await;
    assert!(report.health.connectivity);
    assert_eq!(report.health.table_count, 5);
    assert_eq!(report.health.recent_errors, 1);
    assert_eq!(report.metrics.total_queries, 3);
    assert!(report.recommendations.is_empty());
}

// ============================================================================
// MAINTENANCE
// ============================================================================

#[tokio::test]
async fn test_daily_cleanup_clears_cache() {
    let h = Harness::new();
    seed_products(&h);
    let optimizer = &h.storefront.optimizer;

    optimizer.products(ProductQuery::default()).await.unwrap();
    optimizer.dashboard_stats(true).await.unwrap();
    assert_eq!(optimizer.cache_stats().keys.len(), 2);

    assert!(optimizer.run_daily_cleanup().await);
    assert_eq!(optimizer.cache_stats().keys.len(), 0);
    assert_eq!(h.metrics_named("daily_cleanup_success"), 1);

    optimizer.products(ProductQuery::default()).await.unwrap();
    assert_eq!(h.counting.count(Operation::Select, "active_products"), 2);
}

#[tokio::test]
async fn test_image_sweep_retries_timeouts_and_drops_failures() {
    let h = Harness::new();
    h.backend
        .seed(
            "products",
            vec![
                product_row("Keke Serum", true, &["https://a", "https://b", "https://c"]),
                product_row("Clean", true, &["https://a"]),
            ],
        )
        .unwrap();
    let optimizer = &h.storefront.optimizer;
    optimizer.products(ProductQuery::default()).await.unwrap();

    let probe = ScriptedProbe::default()
        .with("https://b", &[ProbeOutcome::TimedOut, ProbeOutcome::Reachable])
        .with("https://c", &[ProbeOutcome::Unreachable]);
    let report = optimizer.sweep_product_images(&probe).await.unwrap();

    assert_eq!(report.images_checked, 4);
    assert_eq!(report.images_removed, 1);
    assert_eq!(report.products_modified, 1);
    assert_eq!(probe.calls_for("https://b"), 2);
    assert_eq!(probe.calls_for("https://c"), 1);
    assert_eq!(h.metrics_named("image_optimization_time"), 1);

    let rows = h
        .backend
        .select(&Query::table("products").filter(Filter::eq("name", "Keke Serum")))
        .await
        .unwrap();
    assert_eq!(rows[0]["images"], json!(["https://a", "https://b"]));

    // The sweep dropped cached product lists.
    let products = optimizer.products(ProductQuery::default()).await.unwrap();
    let serum = products.iter().find(|p| p.name == "Keke Serum").unwrap();
    assert_eq!(serum.images, vec!["https://a", "https://b"]);
}

#[tokio::test]
async fn test_image_sweep_survives_a_failed_rewrite() {
    let h = Harness::new();
    h.backend
        .seed(
            "products",
            vec![
                product_row("A", true, &["https://ok/a", "https://bad/a"]),
                product_row("B", true, &["https://ok/b", "https://bad/b"]),
                product_row("C", true, &["https://ok/c", "https://bad/c"]),
            ],
        )
        .unwrap();
    let failing = Arc::new(FailingStore::new(Arc::clone(&h.backend)));
    let store: Arc<dyn RemoteStore> = failing.clone();
    let optimizer = DatabaseOptimizer::new(store, h.dyn_clock());

    let cached = optimizer.products(ProductQuery::default()).await.unwrap();
    assert!(cached.iter().all(|p| p.images.len() == 2));

    failing.fail_times(
        Operation::Update,
        Some("products"),
        StoreError::Network {
            message: "blip".to_string(),
        },
        1,
    );
    let probe = ScriptedProbe::default()
        .with("https://bad/a", &[ProbeOutcome::Unreachable])
        .with("https://bad/b", &[ProbeOutcome::Unreachable])
        .with("https://bad/c", &[ProbeOutcome::Unreachable]);

    let report = optimizer.sweep_product_images(&probe).await.unwrap();
    assert_eq!(report.update_failures, 1);
    assert_eq!(report.products_modified, 2);

    // Rewritten products are served fresh, not from the primed cache.
    let mut served: Vec<usize> = optimizer
        .products(ProductQuery::default())
        .await
        .unwrap()
        .iter()
        .map(|p| p.images.len())
        .collect();
    served.sort_unstable();
    assert_eq!(served, vec![1, 1, 2]);
    assert_eq!(h.metrics_named("image_optimization_time"), 1);
}
