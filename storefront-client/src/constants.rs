//! Constants for the storefront client
//!
//! Table, procedure and metric names, plus defaults used by the
//! configuration types.

// ============================================================================
// TABLES AND PROCEDURES
// ============================================================================

pub const TABLE_ORDERS: &str = "orders";
pub const TABLE_PRODUCTS: &str = "products";
pub const VIEW_ACTIVE_PRODUCTS: &str = "active_products";
pub const TABLE_SITE_SETTINGS: &str = "site_settings";
pub const TABLE_PERFORMANCE_METRICS: &str = "performance_metrics";
pub const TABLE_RATE_LIMITS: &str = "rate_limits";

pub const RPC_SEARCH_ORDERS: &str = "search_orders";
pub const RPC_DASHBOARD_STATS: &str = "get_dashboard_stats";
pub const RPC_ADVANCED_SEARCH: &str = "advanced_search";
pub const RPC_DAILY_CLEANUP: &str = "daily_cleanup";

/// Columns fetched when product images are not needed.
pub const PRODUCT_LEAN_COLUMNS: &str =
    "id, name, brand, price, description, is_active, created_at, updated_at";

// ============================================================================
// METRICS
// ============================================================================

/// Facade operations. Each records `{operation}_time` on success and
/// `{operation}_error` on failure.
pub const OP_ORDERS_QUERY: &str = "orders_query";
pub const OP_DASHBOARD_STATS_QUERY: &str = "dashboard_stats_query";
pub const OP_ADVANCED_SEARCH: &str = "advanced_search";
pub const OP_PRODUCTS_QUERY: &str = "products_query";
pub const OP_SITE_SETTINGS_QUERY: &str = "site_settings_query";
pub const OP_IMAGE_OPTIMIZATION: &str = "image_optimization";

pub const METRIC_DAILY_CLEANUP_SUCCESS: &str = "daily_cleanup_success";
pub const METRIC_DAILY_CLEANUP_ERROR: &str = "daily_cleanup_error";

// ============================================================================
// PAGINATION AND SEARCH
// ============================================================================

/// Default page size for order listings
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Status filter value meaning "every status"
pub const STATUS_FILTER_ALL: &str = "all";

/// Debounce for search-as-you-type (milliseconds)
pub const DEFAULT_SEARCH_DEBOUNCE_MS: u64 = 300;

/// Longest trailing window accepted by metric and rate-limit queries (hours)
pub const MAX_LOOKBACK_HOURS: u32 = 366 * 24;

// ============================================================================
// NOTIFICATIONS
// ============================================================================

/// How long network error notifications stay up (milliseconds)
pub const NETWORK_ERROR_NOTICE_MS: u64 = 6000;

/// How long every other error notification stays up (milliseconds)
pub const DEFAULT_ERROR_NOTICE_MS: u64 = 4000;

// ============================================================================
// HEALTH
// ============================================================================

/// Connectivity probes slower than this mark indexes as unhealthy (ms)
pub const HEALTHY_RESPONSE_MS: f64 = 100.0;

/// Average response time above which the report recommends index work (ms)
pub const SLOW_RESPONSE_MS: f64 = 200.0;

/// Recent error samples above which the report flags error handling
pub const RECENT_ERROR_THRESHOLD: usize = 10;

/// Metric volume above which the report recommends archiving
pub const METRIC_ARCHIVE_THRESHOLD: usize = 1000;

// ============================================================================
// BACKGROUND CLEANUP
// ============================================================================

/// Default interval between daily-cleanup runs (seconds)
pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// Default interval between rate-limiter local cache sweeps (seconds)
pub const DEFAULT_LIMITER_SWEEP_INTERVAL_SECS: u64 = 5 * 60;

/// Default HTTP request timeout (seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

// ============================================================================
// RATE-LIMITED ENDPOINTS
// ============================================================================

pub const ENDPOINT_ORDER_CREATION: &str = "order_creation";
