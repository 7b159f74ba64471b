//! Reference implementations of the backend's stored procedures, and a
//! fully wired in-memory backend.

use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use storefront_core::{Clock, OrderStatus, Timestamp};
use storefront_storage::{Filter, InMemoryStore, Query, StoreResult, Tables};

/// Tables the storefront reads and writes.
pub const STOREFRONT_TABLES: [&str; 5] = [
    "orders",
    "products",
    "site_settings",
    "performance_metrics",
    "rate_limits",
];

/// Metrics older than this are dropped by `daily_cleanup`.
pub const METRIC_RETENTION_DAYS: i64 = 30;
/// Rate-limit windows older than this are dropped by `daily_cleanup`.
pub const RATE_LIMIT_RETENTION_HOURS: i64 = 24;

/// In-memory backend with every storefront table, the `active_products`
/// view and the four procedures installed.
pub fn storefront_store(clock: Arc<dyn Clock>) -> InMemoryStore {
    let store = InMemoryStore::with_clock(clock);
    for table in STOREFRONT_TABLES {
        store.create_table(table).expect("create table");
    }
    store
        .create_view(
            "active_products",
            "products",
            vec![Filter::eq("is_active", true)],
        )
        .expect("create view");
    install_procedures(&store).expect("install procedures");
    store
}

pub fn install_procedures(store: &InMemoryStore) -> StoreResult<()> {
    store.register_procedure("search_orders", search_orders)?;
    store.register_procedure("get_dashboard_stats", get_dashboard_stats)?;
    store.register_procedure("advanced_search", advanced_search)?;
    store.register_procedure("daily_cleanup", daily_cleanup)?;
    Ok(())
}

fn timestamp_of(row: &Value, column: &str) -> Option<Timestamp> {
    row.get(column)
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn amount_of(row: &Value) -> f64 {
    row.get("total_amount").and_then(Value::as_f64).unwrap_or(0.0)
}

fn text_matches(row: &Value, columns: &[&str], needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    let needle = needle.to_lowercase();
    columns.iter().any(|c| {
        row.get(*c)
            .and_then(Value::as_str)
            .is_some_and(|v| v.to_lowercase().contains(&needle))
    })
}

/// `search_orders(search_term, status_filter)`: newest first; `"all"` or an
/// empty status matches every status.
pub fn search_orders(tables: &mut Tables, args: &Value, _now: Timestamp) -> StoreResult<Value> {
    let term = args["search_term"].as_str().unwrap_or("").trim().to_string();
    let status = args["status_filter"].as_str().unwrap_or("all");

    let mut query = Query::table("orders").order_desc("created_at");
    if !status.is_empty() && status != "all" {
        query = query.eq("status", status);
    }
    let rows = tables
        .select(&query)?
        .into_iter()
        .filter(|row| text_matches(row, &["customer_name", "phone", "address"], &term))
        .collect();
    Ok(Value::Array(rows))
}

pub fn get_dashboard_stats(
    tables: &mut Tables,
    _args: &Value,
    now: Timestamp,
) -> StoreResult<Value> {
    let orders = tables.rows("orders")?;
    let status_of = |row: &Value| {
        row.get("status")
            .and_then(Value::as_str)
            .and_then(OrderStatus::from_label)
            .unwrap_or_default()
    };

    let total_orders = orders.len() as u64;
    let count = |wanted: &[OrderStatus]| {
        orders
            .iter()
            .filter(|row| wanted.contains(&status_of(*row)))
            .count() as u64
    };
    let total_revenue: f64 = orders.iter().map(amount_of).sum();
    let week_ago = now - Duration::days(7);
    let recent_orders = orders
        .iter()
        .filter(|row| timestamp_of(row, "created_at").is_some_and(|t| t >= week_ago))
        .count() as u64;
    let active_products = tables
        .rows("products")?
        .iter()
        .filter(|row| row.get("is_active").and_then(Value::as_bool).unwrap_or(true))
        .count() as u64;

    Ok(json!({
        "total_orders": total_orders,
        "pending_orders": count(&[OrderStatus::New, OrderStatus::Processing]),
        "completed_orders": count(&[OrderStatus::Delivered]),
        "cancelled_orders": count(&[OrderStatus::Cancelled]),
        "total_revenue": total_revenue,
        "average_order_value": if total_orders == 0 { 0.0 } else { total_revenue / total_orders as f64 },
        "active_products": active_products,
        "recent_orders": recent_orders,
    }))
}

/// `advanced_search(search_query, filters)` over orders. Recognised filters:
/// `status`, `governorate`, `min_amount`, `max_amount`, `date_from`,
/// `date_to` (RFC 3339, against `created_at`).
pub fn advanced_search(tables: &mut Tables, args: &Value, _now: Timestamp) -> StoreResult<Value> {
    let needle = args["search_query"].as_str().unwrap_or("").trim().to_string();
    let filters = &args["filters"];

    let mut query = Query::table("orders").order_desc("created_at");
    for column in ["status", "governorate"] {
        if let Some(value) = filters.get(column).and_then(Value::as_str) {
            query = query.eq(column, value);
        }
    }
    if let Some(from) = filters.get("date_from").and_then(Value::as_str) {
        query = query.gte("created_at", from);
    }
    if let Some(to) = filters.get("date_to").and_then(Value::as_str) {
        query = query.lt("created_at", to);
    }
    let min = filters.get("min_amount").and_then(Value::as_f64);
    let max = filters.get("max_amount").and_then(Value::as_f64);

    let rows = tables
        .select(&query)?
        .into_iter()
        .filter(|row| {
            text_matches(
                row,
                &["customer_name", "phone", "address", "notes"],
                &needle,
            )
        })
        .filter(|row| min.map_or(true, |m| amount_of(row) >= m))
        .filter(|row| max.map_or(true, |m| amount_of(row) <= m))
        .collect();
    Ok(Value::Array(rows))
}

/// Drop old performance samples and expired rate-limit windows.
pub fn daily_cleanup(tables: &mut Tables, _args: &Value, now: Timestamp) -> StoreResult<Value> {
    let metric_cutoff = now - Duration::days(METRIC_RETENTION_DAYS);
    let window_cutoff = now - Duration::hours(RATE_LIMIT_RETENTION_HOURS);

    let metrics = tables.rows_mut("performance_metrics")?;
    let before = metrics.len();
    metrics.retain(|row| timestamp_of(row, "recorded_at").map_or(true, |t| t >= metric_cutoff));
    let metrics_removed = before - metrics.len();

    let windows = tables.rows_mut("rate_limits")?;
    let before = windows.len();
    windows.retain(|row| timestamp_of(row, "window_start").map_or(true, |t| t >= window_cutoff));
    let rate_limits_removed = before - windows.len();

    Ok(json!({
        "metrics_removed": metrics_removed,
        "rate_limits_removed": rate_limits_removed,
    }))
}
