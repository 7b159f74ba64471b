//! Rate Limiting
//!
//! Fixed-window limiter keyed by `(identifier, endpoint)`. Each key moves
//! through a small state machine:
//!
//! - **Open**: requests are admitted and counted until the window's quota
//!   is used up.
//! - **Blocked**: the request after the last admitted one is denied and the
//!   key is blocked for the policy's block duration.
//! - After the block (or the window) runs out, the next request opens a
//!   fresh window with a count of one.
//!
//! Local state answers repeat requests without a round-trip. The remote
//! `rate_limits` table is consulted when there is no live local window so
//! that counts survive restarts. If that read fails the limiter admits the
//! request: availability wins over enforcement.

use crate::constants::{MAX_LOOKBACK_HOURS, TABLE_RATE_LIMITS};
use chrono::Duration as ChronoDuration;
use dashmap::DashMap;
use serde::Serialize;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use storefront_core::{Clock, RateLimitConfig, RateLimitRow, StorefrontError, StorefrontResult, Timestamp};
use storefront_storage::{decode_rows, encode_row, Filter, Query, RemoteStore, Row};

// ============================================================================
// TYPES
// ============================================================================

/// Key for rate limiting.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct RateLimitKey {
    pub identifier: String,
    pub endpoint: String,
}

impl RateLimitKey {
    pub fn new(identifier: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            endpoint: endpoint.into(),
        }
    }
}

/// Local mirror of one key's window.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalWindow {
    pub count: u32,
    pub window_start: Timestamp,
    pub resets_at: Timestamp,
    pub blocked_until: Option<Timestamp>,
}

impl LocalWindow {
    fn fresh(now: Timestamp, window: Duration) -> Self {
        Self {
            count: 1,
            window_start: now,
            resets_at: now + to_chrono(window),
            blocked_until: None,
        }
    }

    /// When this entry stops mattering.
    fn expires_at(&self) -> Timestamp {
        self.blocked_until.unwrap_or(self.resets_at)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at: Option<Timestamp>,
    pub blocked: bool,
}

impl RateLimitDecision {
    fn admit(remaining: u32, reset_at: Option<Timestamp>) -> Self {
        Self {
            allowed: true,
            remaining,
            reset_at,
            blocked: false,
        }
    }

    fn block(until: Timestamp) -> Self {
        Self {
            allowed: false,
            remaining: 0,
            reset_at: Some(until),
            blocked: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointCount {
    pub endpoint: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimitStats {
    pub total_requests: u64,
    pub unique_identifiers: usize,
    /// Busiest endpoints, at most five.
    pub top_endpoints: Vec<EndpointCount>,
    /// One bucket per hour, oldest first; the last bucket is the current hour.
    pub requests_per_hour: Vec<u64>,
}

fn to_chrono(d: Duration) -> ChronoDuration {
    ChronoDuration::from_std(d).unwrap_or(ChronoDuration::MAX)
}

fn rfc3339(ts: Timestamp) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

enum LocalOutcome {
    Decided(RateLimitDecision),
    BlockExpired,
    Miss,
}

// ============================================================================
// LIMITER
// ============================================================================

pub struct RateLimiter {
    store: Arc<dyn RemoteStore>,
    clock: Arc<dyn Clock>,
    local: DashMap<RateLimitKey, LocalWindow>,
    enabled: bool,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("local_entries", &self.local.len())
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RemoteStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            local: DashMap::new(),
            enabled: true,
        }
    }

    /// A disabled limiter admits everything without touching the store.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Current local state for a key.
    pub fn local_window(&self, identifier: &str, endpoint: &str) -> Option<LocalWindow> {
        self.local
            .get(&RateLimitKey::new(identifier, endpoint))
            .map(|w| w.clone())
    }

    pub fn local_len(&self) -> usize {
        self.local.len()
    }

    /// Count one request against `(identifier, endpoint)`.
    pub async fn check(
        &self,
        identifier: &str,
        endpoint: &str,
        config: &RateLimitConfig,
    ) -> RateLimitDecision {
        if !self.enabled {
            return RateLimitDecision::admit(config.max_requests, None);
        }

        let key = RateLimitKey::new(identifier, endpoint);
        let now = self.clock.now();

        match self.check_local(&key, config, now) {
            LocalOutcome::Decided(decision) => decision,
            LocalOutcome::BlockExpired => self.open_after_block(key, config, now).await,
            LocalOutcome::Miss => self.check_remote(key, config, now).await,
        }
    }

    fn check_local(&self, key: &RateLimitKey, config: &RateLimitConfig, now: Timestamp) -> LocalOutcome {
        let Some(mut entry) = self.local.get_mut(key) else {
            return LocalOutcome::Miss;
        };

        if let Some(until) = entry.blocked_until {
            if now < until {
                return LocalOutcome::Decided(RateLimitDecision::block(until));
            }
            return LocalOutcome::BlockExpired;
        }

        if now > entry.resets_at {
            return LocalOutcome::Miss;
        }

        if entry.count >= config.max_requests {
            let until = now + to_chrono(config.block_duration);
            entry.blocked_until = Some(until);
            tracing::warn!(
                identifier = %key.identifier,
                endpoint = %key.endpoint,
                count = entry.count,
                blocked_until = %until,
                "Rate limit exceeded, blocking"
            );
            return LocalOutcome::Decided(RateLimitDecision::block(until));
        }

        entry.count += 1;
        LocalOutcome::Decided(RateLimitDecision::admit(
            config.max_requests - entry.count,
            Some(entry.resets_at),
        ))
    }

    async fn open_after_block(
        &self,
        key: RateLimitKey,
        config: &RateLimitConfig,
        now: Timestamp,
    ) -> RateLimitDecision {
        self.insert_window(&key, now).await;
        let window = LocalWindow::fresh(now, config.window);
        let resets_at = window.resets_at;
        self.local.insert(key, window);
        RateLimitDecision::admit(config.max_requests.saturating_sub(1), Some(resets_at))
    }

    async fn check_remote(
        &self,
        key: RateLimitKey,
        config: &RateLimitConfig,
        now: Timestamp,
    ) -> RateLimitDecision {
        let since = now - to_chrono(config.window);
        let query = Query::table(TABLE_RATE_LIMITS)
            .eq("ip_address", key.identifier.as_str())
            .eq("endpoint", key.endpoint.as_str())
            .gte("window_start", rfc3339(since))
            .order_desc("window_start")
            .limit(1);

        let latest = match self.store.select(&query).await {
            Ok(rows) => rows.into_iter().next(),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    identifier = %key.identifier,
                    endpoint = %key.endpoint,
                    "Rate limit check failed, allowing request"
                );
                return RateLimitDecision::admit(config.max_requests, None);
            }
        };

        let (current, window_start) = match &latest {
            Some(row) => {
                let count = row
                    .get("request_count")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0)
                    .min(u64::from(u32::MAX)) as u32;
                let start = row
                    .get("window_start")
                    .and_then(|v| v.as_str())
                    .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
                    .map(|dt| dt.with_timezone(&chrono::Utc))
                    .unwrap_or(now);
                (count, start)
            }
            None => (0, now),
        };

        if current >= config.max_requests {
            let until = now + to_chrono(config.block_duration);
            self.local.insert(
                key.clone(),
                LocalWindow {
                    count: current,
                    window_start,
                    resets_at: window_start + to_chrono(config.window),
                    blocked_until: Some(until),
                },
            );
            tracing::warn!(
                identifier = %key.identifier,
                endpoint = %key.endpoint,
                count = current,
                blocked_until = %until,
                "Rate limit exceeded, blocking"
            );
            return RateLimitDecision::block(until);
        }

        match &latest {
            Some(row) => self.bump_window(&key, row, current + 1).await,
            None => self.insert_window(&key, now).await,
        }

        let resets_at = window_start + to_chrono(config.window);
        self.local.insert(
            key,
            LocalWindow {
                count: current + 1,
                window_start,
                resets_at,
                blocked_until: None,
            },
        );
        RateLimitDecision::admit(config.max_requests - current - 1, Some(resets_at))
    }

    async fn insert_window(&self, key: &RateLimitKey, now: Timestamp) {
        let row = RateLimitRow {
            id: None,
            ip_address: key.identifier.clone(),
            endpoint: key.endpoint.clone(),
            request_count: 1,
            window_start: now,
        };
        let result = match encode_row(&row) {
            Ok(row) => self.store.insert(TABLE_RATE_LIMITS, vec![row]).await.map(|_| ()),
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            tracing::warn!(
                error = %e,
                identifier = %key.identifier,
                endpoint = %key.endpoint,
                "Failed to record rate limit window"
            );
        }
    }

    async fn bump_window(&self, key: &RateLimitKey, row: &Row, count: u32) {
        let filters = match row.get("id").filter(|v| !v.is_null()) {
            Some(id) => vec![Filter::eq("id", id.clone())],
            None => vec![
                Filter::eq("ip_address", key.identifier.as_str()),
                Filter::eq("endpoint", key.endpoint.as_str()),
                Filter::eq(
                    "window_start",
                    row.get("window_start").cloned().unwrap_or_default(),
                ),
            ],
        };
        if let Err(e) = self
            .store
            .update(TABLE_RATE_LIMITS, json!({ "request_count": count }), &filters)
            .await
        {
            tracing::warn!(
                error = %e,
                identifier = %key.identifier,
                endpoint = %key.endpoint,
                "Failed to update rate limit window"
            );
        }
    }

    /// Run `operation` only if the request is admitted.
    pub async fn guard<T, F, Fut>(
        &self,
        identifier: &str,
        endpoint: &str,
        config: &RateLimitConfig,
        operation: F,
    ) -> StorefrontResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = StorefrontResult<T>>,
    {
        let decision = self.check(identifier, endpoint, config).await;
        if !decision.allowed {
            return Err(StorefrontError::RateLimited {
                endpoint: endpoint.to_string(),
                reset_at: decision.reset_at.unwrap_or_else(|| self.clock.now()),
                blocked: decision.blocked,
            });
        }
        operation().await
    }

    /// Drop local entries whose window or block has run out.
    pub fn cleanup_local_cache(&self) -> usize {
        let now = self.clock.now();
        let before = self.local.len();
        self.local.retain(|_, w| w.expires_at() > now);
        let removed = before.saturating_sub(self.local.len());
        if removed > 0 {
            tracing::debug!(removed, "Cleaned up local rate limit entries");
        }
        removed
    }

    /// Forget all local state.
    pub fn reset(&self) {
        self.local.clear();
    }

    /// Aggregate the remote table over the trailing `hours`, clamped to
    /// [`MAX_LOOKBACK_HOURS`].
    ///
    /// `None` when the table cannot be read.
    pub async fn stats(&self, hours: u32) -> Option<RateLimitStats> {
        let hours = hours.min(MAX_LOOKBACK_HOURS);
        let now = self.clock.now();
        let since = now - ChronoDuration::hours(i64::from(hours));
        let query = Query::table(TABLE_RATE_LIMITS)
            .select("endpoint, request_count, ip_address, window_start")
            .gte("window_start", rfc3339(since));

        let rows = match self.store.select(&query).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to fetch rate limit stats");
                return None;
            }
        };
        let rows: Vec<RateLimitRow> = match decode_rows(rows) {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to decode rate limit rows");
                return None;
            }
        };

        Some(aggregate(&rows, hours, now))
    }
}

fn aggregate(rows: &[RateLimitRow], hours: u32, now: Timestamp) -> RateLimitStats {
    let mut total_requests = 0u64;
    let mut identifiers = HashSet::new();
    let mut per_endpoint: HashMap<&str, u64> = HashMap::new();
    let mut requests_per_hour = vec![0u64; hours as usize];

    for row in rows {
        let count = u64::from(row.request_count);
        total_requests += count;
        identifiers.insert(row.ip_address.as_str());
        *per_endpoint.entry(row.endpoint.as_str()).or_default() += count;

        // Windows stamped in the future have no bucket yet.
        if row.window_start > now {
            continue;
        }
        let hours_ago = (now - row.window_start).num_hours();
        if hours_ago < i64::from(hours) {
            let bucket = hours as usize - 1 - hours_ago as usize;
            requests_per_hour[bucket] += count;
        }
    }

    let mut top_endpoints: Vec<EndpointCount> = per_endpoint
        .into_iter()
        .map(|(endpoint, count)| EndpointCount {
            endpoint: endpoint.to_string(),
            count,
        })
        .collect();
    top_endpoints.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.endpoint.cmp(&b.endpoint)));
    top_endpoints.truncate(5);

    RateLimitStats {
        total_requests,
        unique_identifiers: identifiers.len(),
        top_endpoints,
        requests_per_hour,
    }
}
