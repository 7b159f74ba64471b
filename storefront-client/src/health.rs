//! Backend health checks and reports.

use crate::constants::{
    HEALTHY_RESPONSE_MS, METRIC_ARCHIVE_THRESHOLD, RECENT_ERROR_THRESHOLD, SLOW_RESPONSE_MS,
    TABLE_ORDERS, TABLE_PERFORMANCE_METRICS, TABLE_PRODUCTS, TABLE_RATE_LIMITS,
    TABLE_SITE_SETTINGS,
};
use crate::optimizer::DatabaseOptimizer;
use chrono::Duration as ChronoDuration;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use storefront_core::{PerformanceMetric, Timestamp};
use storefront_storage::{Filter, FilterOp, Query, Row};

const ERROR_METRIC_SUFFIX: &str = "_error";

const MONITORED_TABLES: [&str; 5] = [
    TABLE_ORDERS,
    TABLE_PRODUCTS,
    TABLE_SITE_SETTINGS,
    TABLE_PERFORMANCE_METRICS,
    TABLE_RATE_LIMITS,
];

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HealthCheck {
    pub connectivity: bool,
    pub response_time_ms: f64,
    /// Storefront tables that answered a probe.
    pub table_count: usize,
    /// Connectivity probe answered under the healthy threshold.
    pub index_health: bool,
    /// `*_error` metrics recorded over the last 24 hours.
    pub recent_errors: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSummary {
    pub total_queries: usize,
    pub average_response_time_ms: f64,
    /// Percentage of metrics that are error markers.
    pub error_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub timestamp: Timestamp,
    pub health: HealthCheck,
    pub metrics: MetricsSummary,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct HealthMonitor {
    optimizer: Arc<DatabaseOptimizer>,
}

impl HealthMonitor {
    pub fn new(optimizer: Arc<DatabaseOptimizer>) -> Self {
        Self { optimizer }
    }

    /// Probe the backend. Never fails; unanswered probes leave their field
    /// at its default.
    pub async fn check(&self) -> HealthCheck {
        let store = self.optimizer.store();
        let mut health = HealthCheck::default();

        let started = Instant::now();
        match store
            .select(&Query::table(TABLE_PRODUCTS).select("id").limit(1))
            .await
        {
            Ok(_) => {
                health.connectivity = true;
                health.response_time_ms = started.elapsed().as_secs_f64() * 1000.0;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Health connectivity probe failed");
                return health;
            }
        }

        for table in MONITORED_TABLES {
            if store
                .select(&Query::table(table).select("id").limit(1))
                .await
                .is_ok()
            {
                health.table_count += 1;
            }
        }

        let since = self.optimizer.clock().now() - ChronoDuration::hours(24);
        // `_` is a LIKE wildcard, so the suffix is checked exactly below.
        let errors = Query::table(TABLE_PERFORMANCE_METRICS)
            .select("metric_name")
            .filter(Filter::new("metric_name", FilterOp::Like, "%error"))
            .gte(
                "recorded_at",
                since.to_rfc3339_opts(chrono::SecondsFormat::Micros, true),
            );
        match store.select(&errors).await {
            Ok(rows) => health.recent_errors = count_error_metrics(&rows),
            Err(e) => tracing::warn!(error = %e, "Failed to count recent errors"),
        }

        health.index_health = health.response_time_ms < HEALTHY_RESPONSE_MS;
        health
    }

    pub async fn report(&self) -> HealthReport {
        let health = self.check().await;
        let metrics = self.optimizer.performance_metrics(None, 24).await;
        let summary = summarize(&metrics);
        let recommendations = recommendations(&health, metrics.len());

        tracing::info!(
            connectivity = health.connectivity,
            response_time_ms = health.response_time_ms,
            recent_errors = health.recent_errors,
            total_queries = summary.total_queries,
            "Health report generated"
        );

        HealthReport {
            timestamp: self.optimizer.clock().now(),
            health,
            metrics: summary,
            recommendations,
        }
    }
}

fn count_error_metrics(rows: &[Row]) -> usize {
    rows.iter()
        .filter_map(|row| row.get("metric_name").and_then(Value::as_str))
        .filter(|name| name.ends_with(ERROR_METRIC_SUFFIX))
        .count()
}

pub fn summarize(metrics: &[PerformanceMetric]) -> MetricsSummary {
    let timings: Vec<f64> = metrics
        .iter()
        .filter(|m| m.metric_name.contains("_time"))
        .map(|m| m.metric_value)
        .collect();
    let errors = metrics
        .iter()
        .filter(|m| m.metric_name.contains("_error"))
        .count();

    MetricsSummary {
        total_queries: metrics.len(),
        average_response_time_ms: timings.iter().sum::<f64>() / timings.len().max(1) as f64,
        error_rate: errors as f64 / metrics.len().max(1) as f64 * 100.0,
    }
}

pub fn recommendations(health: &HealthCheck, metric_count: usize) -> Vec<String> {
    let mut out = Vec::new();
    if health.response_time_ms > SLOW_RESPONSE_MS {
        out.push("Optimize indexes to reduce response time".to_string());
    }
    if health.recent_errors > RECENT_ERROR_THRESHOLD {
        out.push("Review and fix recent errors".to_string());
    }
    if metric_count > METRIC_ARCHIVE_THRESHOLD {
        out.push("Clean up old performance metrics".to_string());
    }
    out
}
