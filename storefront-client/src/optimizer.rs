//! Cached Data-Access Facade
//!
//! `DatabaseOptimizer` is the only way the views read from the backend. Every
//! read follows the same cache-aside template:
//!
//! 1. Build a [`CacheKey`] from the operation's namespace and parameters.
//! 2. On a hit, return the cached value. No remote call, no metric.
//! 3. On a miss, call the store, time the call, record an
//!    `{operation}_time` metric, cache the result with the operation's TTL
//!    and return it.
//!
//! Remote failures are logged, recorded as `{operation}_error` and returned.

use crate::constants::{
    METRIC_DAILY_CLEANUP_ERROR, METRIC_DAILY_CLEANUP_SUCCESS, OP_ADVANCED_SEARCH,
    OP_DASHBOARD_STATS_QUERY, OP_IMAGE_OPTIMIZATION, OP_ORDERS_QUERY, OP_PRODUCTS_QUERY,
    OP_SITE_SETTINGS_QUERY, PRODUCT_LEAN_COLUMNS, RPC_ADVANCED_SEARCH, RPC_DAILY_CLEANUP,
    RPC_DASHBOARD_STATS, RPC_SEARCH_ORDERS, STATUS_FILTER_ALL, TABLE_PERFORMANCE_METRICS,
    TABLE_PRODUCTS, TABLE_SITE_SETTINGS, VIEW_ACTIVE_PRODUCTS, DEFAULT_PAGE_SIZE,
    MAX_LOOKBACK_HOURS,
};
use crate::images::{sweep_images, LinkProbe, SweepReport};
use chrono::Duration as ChronoDuration;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use storefront_core::{
    CacheTtls, Clock, DashboardStats, Order, OrderStatus, PerformanceMetric, Product,
    SiteSettings, StorefrontResult, SweepPolicy,
};
use storefront_storage::{
    decode_row, decode_rows, encode_row, CacheKey, CacheStats, Namespace, Query, RemoteStore,
    RowRange, RpcCall, StoreResult, TtlCache,
};

// ============================================================================
// QUERY PARAMETERS
// ============================================================================

/// Parameters for [`DatabaseOptimizer::orders`]. Field order is the cache
/// key's canonical order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderQuery {
    pub search: String,
    /// `"all"` or an order status label.
    pub status: String,
    /// 1-based.
    pub page: usize,
    pub page_size: usize,
    #[serde(skip)]
    pub use_cache: bool,
}

impl Default for OrderQuery {
    fn default() -> Self {
        Self {
            search: String::new(),
            status: STATUS_FILTER_ALL.to_string(),
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            use_cache: true,
        }
    }
}

impl OrderQuery {
    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.search = search.into();
        self
    }

    pub fn status(mut self, status: OrderStatus) -> Self {
        self.status = status.label().to_string();
        self
    }

    pub fn page(mut self, page: usize) -> Self {
        self.page = page;
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.use_cache = false;
        self
    }

    pub fn range(&self) -> RowRange {
        RowRange::page(self.page, self.page_size)
    }
}

/// Parameters for [`DatabaseOptimizer::products`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProductQuery {
    pub active_only: bool,
    pub include_images: bool,
    #[serde(skip)]
    pub use_cache: bool,
}

impl Default for ProductQuery {
    fn default() -> Self {
        Self {
            active_only: true,
            include_images: true,
            use_cache: true,
        }
    }
}

// ============================================================================
// OPTIMIZER
// ============================================================================

pub struct DatabaseOptimizer {
    store: Arc<dyn RemoteStore>,
    cache: Arc<TtlCache<Value>>,
    clock: Arc<dyn Clock>,
    ttls: CacheTtls,
    sweep_policy: SweepPolicy,
}

impl fmt::Debug for DatabaseOptimizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseOptimizer")
            .field("cache_size", &self.cache.len())
            .field("ttls", &self.ttls)
            .field("sweep_policy", &self.sweep_policy)
            .finish_non_exhaustive()
    }
}

impl DatabaseOptimizer {
    pub fn new(store: Arc<dyn RemoteStore>, clock: Arc<dyn Clock>) -> Self {
        let ttls = CacheTtls::default();
        Self {
            cache: Arc::new(TtlCache::new(ttls.default, clock.clone())),
            store,
            clock,
            ttls,
            sweep_policy: SweepPolicy::default(),
        }
    }

    pub fn with_ttls(mut self, ttls: CacheTtls) -> Self {
        self.cache = Arc::new(TtlCache::new(ttls.default, self.clock.clone()));
        self.ttls = ttls;
        self
    }

    pub fn with_sweep_policy(mut self, policy: SweepPolicy) -> Self {
        self.sweep_policy = policy;
        self
    }

    pub fn store(&self) -> &Arc<dyn RemoteStore> {
        &self.store
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn cache(&self) -> &TtlCache<Value> {
        &self.cache
    }

    pub fn ttls(&self) -> &CacheTtls {
        &self.ttls
    }

    // ========================================================================
    // CACHE-ASIDE TEMPLATE
    // ========================================================================

    async fn cached<T, F, Fut>(
        &self,
        operation: &str,
        key: CacheKey,
        ttl: Duration,
        use_cache: bool,
        mut metadata: Value,
        fetch: F,
    ) -> StorefrontResult<T>
    where
        T: DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = StoreResult<Value>>,
    {
        if use_cache {
            if let Some(value) = self.cache.get(&key) {
                tracing::debug!(operation, key = %key, "Cache hit");
                return Ok(decode_row(value)?);
            }
            tracing::debug!(operation, key = %key, "Cache miss");
        }

        let started = Instant::now();
        let value = match fetch().await {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(operation, key = %key, error = %e, "Query failed");
                self.record_failure(operation, &e.to_string()).await;
                return Err(e.into());
            }
        };
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        let decoded: T = match decode_row(value.clone()) {
            Ok(decoded) => decoded,
            Err(e) => {
                tracing::error!(operation, key = %key, error = %e, "Failed to decode query result");
                self.record_failure(operation, &e.to_string()).await;
                return Err(e.into());
            }
        };

        if let (Some(obj), Some(rows)) = (metadata.as_object_mut(), value.as_array()) {
            obj.insert("resultCount".to_string(), json!(rows.len()));
        }
        self.record_metric(
            PerformanceMetric::millis(format!("{operation}_time"), elapsed_ms, self.clock.now())
                .with_metadata(metadata),
        )
        .await;

        if use_cache {
            self.cache.set_with_ttl(&key, value, ttl);
        }
        Ok(decoded)
    }

    async fn record_failure(&self, operation: &str, error: &str) {
        self.record_metric(
            PerformanceMetric::flag(format!("{operation}_error"), self.clock.now())
                .with_metadata(json!({ "error": error })),
        )
        .await;
    }

    // ========================================================================
    // READS
    // ========================================================================

    /// One page of orders matching a search term and status filter.
    pub async fn orders(&self, query: &OrderQuery) -> StorefrontResult<Vec<Order>> {
        let key = CacheKey::new(Namespace::Orders, query);
        let call = RpcCall::new(
            RPC_SEARCH_ORDERS,
            json!({ "search_term": query.search, "status_filter": query.status }),
        )
        .with_range(query.range());
        let metadata = json!({
            "search": query.search,
            "status": query.status,
            "page": query.page,
            "pageSize": query.page_size,
        });

        self.cached(
            OP_ORDERS_QUERY,
            key,
            self.ttls.orders,
            query.use_cache,
            metadata,
            || self.store.rpc(&call),
        )
        .await
    }

    pub async fn dashboard_stats(&self, use_cache: bool) -> StorefrontResult<DashboardStats> {
        let call = RpcCall::new(RPC_DASHBOARD_STATS, json!({}));
        self.cached(
            OP_DASHBOARD_STATS_QUERY,
            CacheKey::unit(Namespace::DashboardStats),
            self.ttls.dashboard_stats,
            use_cache,
            json!({}),
            || self.store.rpc(&call),
        )
        .await
    }

    /// Free-text search with structured filters. Always cached.
    pub async fn advanced_search(
        &self,
        search_query: &str,
        filters: &BTreeMap<String, Value>,
    ) -> StorefrontResult<Vec<Order>> {
        let key = CacheKey::new(Namespace::AdvancedSearch, &(search_query, filters));
        let call = RpcCall::new(
            RPC_ADVANCED_SEARCH,
            json!({ "search_query": search_query, "filters": filters }),
        );
        self.cached(
            OP_ADVANCED_SEARCH,
            key,
            self.ttls.search,
            true,
            json!({ "query": search_query, "filters": filters }),
            || self.store.rpc(&call),
        )
        .await
    }

    pub async fn products(&self, query: ProductQuery) -> StorefrontResult<Vec<Product>> {
        let key = CacheKey::new(Namespace::Products, &query);
        let table = if query.active_only {
            VIEW_ACTIVE_PRODUCTS
        } else {
            TABLE_PRODUCTS
        };
        let columns = if query.include_images {
            "*"
        } else {
            PRODUCT_LEAN_COLUMNS
        };
        let select = Query::table(table).select(columns).order_desc("created_at");

        self.cached(
            OP_PRODUCTS_QUERY,
            key,
            self.ttls.products,
            query.use_cache,
            json!({ "activeOnly": query.active_only, "includeImages": query.include_images }),
            || async { self.store.select(&select).await.map(Value::Array) },
        )
        .await
    }

    /// The single settings row, if one exists.
    pub async fn site_settings(&self, use_cache: bool) -> StorefrontResult<Option<SiteSettings>> {
        let select = Query::table(TABLE_SITE_SETTINGS).limit(1);
        let rows: Vec<SiteSettings> = self
            .cached(
                OP_SITE_SETTINGS_QUERY,
                CacheKey::unit(Namespace::SiteSettings),
                self.ttls.site_settings,
                use_cache,
                json!({}),
                || async { self.store.select(&select).await.map(Value::Array) },
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    // ========================================================================
    // METRICS
    // ========================================================================

    /// Append a metric. Failures are logged and swallowed.
    pub async fn record_metric(&self, metric: PerformanceMetric) {
        let row = match encode_row(&metric) {
            Ok(row) => row,
            Err(e) => {
                tracing::warn!(metric = %metric.metric_name, error = %e, "Failed to encode metric");
                return;
            }
        };
        if let Err(e) = self.store.insert(TABLE_PERFORMANCE_METRICS, vec![row]).await {
            tracing::warn!(metric = %metric.metric_name, error = %e, "Failed to record metric");
        }
    }

    /// Metrics from the trailing `hours` (at most [`MAX_LOOKBACK_HOURS`]),
    /// newest first. Empty on failure.
    pub async fn performance_metrics(
        &self,
        metric_name: Option<&str>,
        hours: u32,
    ) -> Vec<PerformanceMetric> {
        let hours = hours.min(MAX_LOOKBACK_HOURS);
        let since = self.clock.now() - ChronoDuration::hours(i64::from(hours));
        let mut query = Query::table(TABLE_PERFORMANCE_METRICS)
            .gte(
                "recorded_at",
                since.to_rfc3339_opts(chrono::SecondsFormat::Micros, true),
            )
            .order_desc("recorded_at");
        if let Some(name) = metric_name {
            query = query.eq("metric_name", name);
        }

        match self.store.select(&query).await {
            Ok(rows) => decode_rows(rows).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to decode performance metrics");
                Vec::new()
            }),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to fetch performance metrics");
                Vec::new()
            }
        }
    }

    /// Time `fut`, recording `{name}_duration` and `{name}_success` or
    /// `{name}_error`. The result is passed through unchanged.
    pub async fn measure_query<T, E, Fut>(&self, name: &str, fut: Fut) -> Result<T, E>
    where
        E: fmt::Display,
        Fut: Future<Output = Result<T, E>>,
    {
        let started = Instant::now();
        let result = fut.await;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        let now = self.clock.now();

        self.record_metric(PerformanceMetric::millis(
            format!("{name}_duration"),
            elapsed_ms,
            now,
        ))
        .await;

        let outcome = match &result {
            Ok(_) => count_metric(format!("{name}_success"), now),
            Err(e) => count_metric(format!("{name}_error"), now)
                .with_metadata(json!({ "error": e.to_string() })),
        };
        self.record_metric(outcome).await;

        result
    }

    // ========================================================================
    // MAINTENANCE
    // ========================================================================

    /// Drop broken image links from every product.
    pub async fn sweep_product_images(&self, probe: &dyn LinkProbe) -> StorefrontResult<SweepReport> {
        let started = Instant::now();
        let mut report = match sweep_images(self.store.as_ref(), probe, &self.sweep_policy).await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(error = %e, "Image sweep failed");
                self.record_failure(OP_IMAGE_OPTIMIZATION, &e.to_string()).await;
                return Err(e.into());
            }
        };
        report.elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        self.record_metric(
            PerformanceMetric::millis(
                format!("{OP_IMAGE_OPTIMIZATION}_time"),
                report.elapsed_ms,
                self.clock.now(),
            )
            .with_metadata(json!({
                "productsOptimized": report.products_modified,
                "imagesChecked": report.images_checked,
                "imagesRemoved": report.images_removed,
                "updateFailures": report.update_failures,
            })),
        )
        .await;
        self.cache.invalidate_namespace(&Namespace::Products);

        tracing::info!(
            products_modified = report.products_modified,
            images_checked = report.images_checked,
            images_removed = report.images_removed,
            update_failures = report.update_failures,
            elapsed_ms = report.elapsed_ms,
            "Image sweep completed"
        );
        Ok(report)
    }

    /// Run the backend's `daily_cleanup` procedure. The local cache is
    /// cleared whatever the outcome.
    pub async fn run_daily_cleanup(&self) -> bool {
        let result = self
            .store
            .rpc(&RpcCall::new(RPC_DAILY_CLEANUP, json!({})))
            .await;
        self.cache.clear();

        match result {
            Ok(summary) => {
                tracing::info!(summary = %summary, "Daily cleanup completed");
                self.record_metric(PerformanceMetric::flag(
                    METRIC_DAILY_CLEANUP_SUCCESS,
                    self.clock.now(),
                ))
                .await;
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "Daily cleanup failed");
                self.record_metric(
                    PerformanceMetric::flag(METRIC_DAILY_CLEANUP_ERROR, self.clock.now())
                        .with_metadata(json!({ "error": e.to_string() })),
                )
                .await;
                false
            }
        }
    }

    // ========================================================================
    // CACHE CONTROL
    // ========================================================================

    pub fn invalidate(&self, key: &CacheKey) {
        self.cache.invalidate(key);
    }

    pub fn invalidate_namespace(&self, namespace: &Namespace) -> usize {
        self.cache.invalidate_namespace(namespace)
    }

    pub fn invalidate_namespaces(&self, namespaces: &[Namespace]) -> usize {
        namespaces
            .iter()
            .map(|ns| self.cache.invalidate_namespace(ns))
            .sum()
    }

    pub fn invalidate_pattern(&self, pattern: &Regex) -> usize {
        self.cache.invalidate_pattern(pattern)
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

fn count_metric(name: String, recorded_at: storefront_core::Timestamp) -> PerformanceMetric {
    PerformanceMetric {
        metric_name: name,
        metric_value: 1.0,
        metric_unit: "count".to_string(),
        metadata: None,
        recorded_at,
    }
}
