//! Client Configuration Module
//!
//! Configuration is loaded from environment variables with defaults that
//! suit local development. Only the backend URL and key have no default;
//! [`ClientConfig::rest_config`] reports them as missing.

use crate::constants::{DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SEARCH_DEBOUNCE_MS};
use std::time::Duration;
use storefront_core::{CacheTtls, ConfigError, ShippingConfig, SweepPolicy};
use storefront_storage::RestConfig;

// ============================================================================
// CLIENT CONFIGURATION
// ============================================================================

#[derive(Debug, Clone)]
pub struct ClientConfig {
    // ========================================================================
    // Backend
    // ========================================================================
    /// Project URL of the hosted backend.
    pub rest_url: Option<String>,

    /// Anonymous API key.
    pub anon_key: Option<String>,

    /// Timeout applied to every HTTP request.
    pub request_timeout: Duration,

    /// Deployment environment, attached to error reports.
    pub environment: String,

    // ========================================================================
    // Behaviour
    // ========================================================================
    /// Whether the rate limiter is consulted at all.
    pub rate_limit_enabled: bool,

    pub cache_ttls: CacheTtls,

    pub shipping: ShippingConfig,

    pub sweep: SweepPolicy,

    /// Debounce applied to search-as-you-type.
    pub search_debounce: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            rest_url: None,
            anon_key: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            environment: "development".to_string(),
            rate_limit_enabled: true,
            cache_ttls: CacheTtls::default(),
            shipping: ShippingConfig::default(),
            sweep: SweepPolicy::default(),
            search_debounce: Duration::from_millis(DEFAULT_SEARCH_DEBOUNCE_MS),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name)
        .ok()
        .map(|s| {
            let s = s.to_lowercase();
            s == "true" || s == "1"
        })
        .unwrap_or(default)
}

impl ClientConfig {
    /// Create ClientConfig from environment variables.
    ///
    /// Environment variables:
    /// - `STOREFRONT_REST_URL`: Backend project URL
    /// - `STOREFRONT_ANON_KEY`: Anonymous API key
    /// - `STOREFRONT_REQUEST_TIMEOUT_SECS`: HTTP timeout (default: 10)
    /// - `STOREFRONT_ENVIRONMENT`: Environment name (default: development)
    /// - `STOREFRONT_RATE_LIMIT_ENABLED`: "true" or "false" (default: true)
    /// - `STOREFRONT_SWEEP_CONCURRENCY`: Image probes in flight (default: 8)
    /// - `STOREFRONT_SWEEP_PROBE_TIMEOUT_SECS`: Per-probe timeout (default: 5)
    /// - `STOREFRONT_SWEEP_TIMEOUT_RETRIES`: Retries after a timeout (default: 1)
    /// - `STOREFRONT_SWEEP_FAILURE_RETRIES`: Retries after a failure (default: 0)
    /// - `STOREFRONT_FREE_SHIPPING_THRESHOLD`: Subtotal for free shipping (default: 500)
    /// - `STOREFRONT_SEARCH_DEBOUNCE_MS`: Search debounce (default: 300)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let sweep = SweepPolicy {
            max_concurrency: env_parse::<usize>("STOREFRONT_SWEEP_CONCURRENCY")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.sweep.max_concurrency),
            probe_timeout: env_parse("STOREFRONT_SWEEP_PROBE_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.sweep.probe_timeout),
            timeout_retries: env_parse("STOREFRONT_SWEEP_TIMEOUT_RETRIES")
                .unwrap_or(defaults.sweep.timeout_retries),
            failure_retries: env_parse("STOREFRONT_SWEEP_FAILURE_RETRIES")
                .unwrap_or(defaults.sweep.failure_retries),
        };

        let shipping = ShippingConfig {
            free_shipping_threshold: env_parse("STOREFRONT_FREE_SHIPPING_THRESHOLD")
                .unwrap_or(defaults.shipping.free_shipping_threshold),
            ..defaults.shipping
        };

        Self {
            rest_url: std::env::var("STOREFRONT_REST_URL")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            anon_key: std::env::var("STOREFRONT_ANON_KEY")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            request_timeout: env_parse("STOREFRONT_REQUEST_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            environment: std::env::var("STOREFRONT_ENVIRONMENT")
                .unwrap_or(defaults.environment),
            rate_limit_enabled: env_flag("STOREFRONT_RATE_LIMIT_ENABLED", true),
            cache_ttls: defaults.cache_ttls,
            shipping,
            sweep,
            search_debounce: env_parse("STOREFRONT_SEARCH_DEBOUNCE_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.search_debounce),
        }
    }

    /// Connection settings for [`storefront_storage::RestStore`].
    pub fn rest_config(&self) -> Result<RestConfig, ConfigError> {
        let base_url = self
            .rest_url
            .clone()
            .ok_or_else(|| ConfigError::MissingRequired {
                field: "STOREFRONT_REST_URL".to_string(),
            })?;
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                field: "STOREFRONT_REST_URL".to_string(),
                value: base_url,
                reason: "must be an http(s) URL".to_string(),
            });
        }
        let api_key = self
            .anon_key
            .clone()
            .ok_or_else(|| ConfigError::MissingRequired {
                field: "STOREFRONT_ANON_KEY".to_string(),
            })?;
        Ok(RestConfig {
            base_url,
            api_key,
            timeout: self.request_timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert!(config.rate_limit_enabled);
        assert_eq!(config.search_debounce, Duration::from_millis(300));
        assert_eq!(config.sweep.max_concurrency, 8);
        assert_eq!(config.shipping.free_shipping_threshold, 500.0);
    }

    #[test]
    fn test_rest_config_requires_url_and_key() {
        let mut config = ClientConfig::default();
        assert_eq!(
            config.rest_config().unwrap_err(),
            ConfigError::MissingRequired {
                field: "STOREFRONT_REST_URL".to_string()
            }
        );

        config.rest_url = Some("ftp://nope".to_string());
        assert!(matches!(
            config.rest_config().unwrap_err(),
            ConfigError::InvalidValue { .. }
        ));

        config.rest_url = Some("https://abc.supabase.co".to_string());
        assert_eq!(
            config.rest_config().unwrap_err(),
            ConfigError::MissingRequired {
                field: "STOREFRONT_ANON_KEY".to_string()
            }
        );

        config.anon_key = Some("anon".to_string());
        let rest = config.rest_config().unwrap();
        assert_eq!(rest.base_url, "https://abc.supabase.co");
        assert_eq!(rest.timeout, Duration::from_secs(10));
    }
}
