//! Configuration types shared by the cache, the rate limiter and the image
//! sweep.

use serde::{Deserialize, Serialize};
use std::time::Duration;

const MINUTE: u64 = 60;

// ============================================================================
// CACHE TTLS
// ============================================================================

/// Time-to-live per cached read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheTtls {
    /// Fallback when a caller stores without an explicit TTL.
    pub default: Duration,
    pub products: Duration,
    pub orders: Duration,
    pub site_settings: Duration,
    pub dashboard_stats: Duration,
    pub search: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            default: Duration::from_secs(5 * MINUTE),
            products: Duration::from_secs(3 * MINUTE),
            orders: Duration::from_secs(2 * MINUTE),
            site_settings: Duration::from_secs(10 * MINUTE),
            dashboard_stats: Duration::from_secs(5 * MINUTE),
            search: Duration::from_secs(MINUTE),
        }
    }
}

// ============================================================================
// RATE LIMITS
// ============================================================================

/// Quota for one endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Requests permitted per window.
    pub max_requests: u32,
    /// Window length.
    pub window: Duration,
    /// How long an identifier stays blocked after exhausting the window.
    pub block_duration: Duration,
}

impl RateLimitConfig {
    pub const DEFAULT_BLOCK_MINUTES: u64 = 60;

    /// Build a quota from minute counts. A missing block duration falls back
    /// to one hour.
    pub const fn per_minutes(
        max_requests: u32,
        window_minutes: u64,
        block_minutes: Option<u64>,
    ) -> Self {
        let block = match block_minutes {
            Some(m) => m,
            None => Self::DEFAULT_BLOCK_MINUTES,
        };
        Self {
            max_requests,
            window: Duration::from_secs(window_minutes * MINUTE),
            block_duration: Duration::from_secs(block * MINUTE),
        }
    }

    pub const ORDER_CREATION: Self = Self::per_minutes(10, 60, Some(30));
    pub const PRODUCT_UPDATE: Self = Self::per_minutes(50, 60, Some(15));
    pub const DATA_FETCH: Self = Self::per_minutes(200, 60, Some(5));
    pub const SEARCH_QUERIES: Self = Self::per_minutes(100, 60, Some(10));
    pub const FORM_SUBMISSIONS: Self = Self::per_minutes(20, 60, Some(30));
    pub const ADMIN_OPERATIONS: Self = Self::per_minutes(200, 60, Some(15));
    pub const IMAGE_UPLOAD: Self = Self::per_minutes(20, 60, Some(60));
}

// ============================================================================
// IMAGE SWEEP
// ============================================================================

/// How the image-link sweep treats probe failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepPolicy {
    /// Maximum probes in flight at once.
    pub max_concurrency: usize,
    /// Per-probe timeout.
    pub probe_timeout: Duration,
    /// Extra attempts for a probe that timed out.
    pub timeout_retries: u32,
    /// Extra attempts for a probe that got a definite failure.
    pub failure_retries: u32,
}

impl Default for SweepPolicy {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            probe_timeout: Duration::from_secs(5),
            timeout_retries: 1,
            failure_retries: 0,
        }
    }
}
