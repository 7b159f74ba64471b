//! Tracing subscriber initialization.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Telemetry configuration from environment variables.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to every log line.
    pub service_name: String,
    /// Environment (production, staging, development).
    pub environment: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
    /// Filter used when `RUST_LOG` is unset.
    pub default_filter: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "storefront".to_string(),
            environment: "development".to_string(),
            json: false,
            default_filter: "storefront_client=info,storefront_storage=info,warn".to_string(),
        }
    }
}

impl TelemetryConfig {
    /// Environment variables:
    /// - `STOREFRONT_SERVICE_NAME` (default: storefront)
    /// - `STOREFRONT_ENVIRONMENT` (default: development)
    /// - `STOREFRONT_LOG_JSON`: "true" or "1" for JSON output (default: false)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            service_name: std::env::var("STOREFRONT_SERVICE_NAME")
                .unwrap_or(defaults.service_name),
            environment: std::env::var("STOREFRONT_ENVIRONMENT").unwrap_or(defaults.environment),
            json: std::env::var("STOREFRONT_LOG_JSON")
                .map(|s| s == "true" || s == "1")
                .unwrap_or(false),
            default_filter: defaults.default_filter,
        }
    }
}

/// Install the global subscriber. Returns `false` if one was already set.
pub fn init_tracing(config: &TelemetryConfig) -> bool {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    let registry = tracing_subscriber::registry().with(env_filter);
    let installed = if config.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .try_init()
            .is_ok()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()
            .is_ok()
    };

    if installed {
        tracing::info!(
            service = %config.service_name,
            environment = %config.environment,
            json = config.json,
            "Tracing initialized"
        );
    }
    installed
}
