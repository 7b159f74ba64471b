//! Error classification and reporting
//!
//! Every failure the client can see (store errors, HTTP errors, validation
//! errors, raw JSON error payloads) is reduced to a [`ClassifiedError`]
//! carrying one of four kinds and a user-facing message.

use crate::constants::{DEFAULT_ERROR_NOTICE_MS, NETWORK_ERROR_NOTICE_MS};
use crate::notify::{Notification, Notifier};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use storefront_core::{StoreError, StorefrontError, ValidationError};

// ============================================================================
// TAXONOMY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Network,
    Validation,
    Database { code: String },
    Unknown,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network => f.write_str("NETWORK"),
            Self::Validation => f.write_str("VALIDATION"),
            Self::Database { .. } => f.write_str("DATABASE"),
            Self::Unknown => f.write_str("UNKNOWN"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    /// Short message suitable for an end user.
    pub message: String,
    /// Underlying error text.
    pub detail: String,
    pub code: Option<String>,
}

pub const NETWORK_MESSAGE: &str = "Network connection problem";
pub const NETWORK_RETRY_HINT: &str = "Check your internet connection and try again";
pub const VALIDATION_MESSAGE: &str = "Invalid data";
pub const UNKNOWN_MESSAGE: &str = "An unexpected error occurred";
pub const UNKNOWN_DETAIL: &str = "Unknown error";
pub const RATE_LIMITED_MESSAGE: &str = "Request limit exceeded";

/// User-facing message for a database error code.
pub fn database_message(code: &str) -> &'static str {
    match code {
        "23505" => "Duplicate data",
        "23503" => "Invalid reference",
        "23502" => "Required field missing",
        "42P01" => "Table not found",
        "PGRST116" => "No data found",
        "PGRST301" => "Insufficient privileges",
        _ => "Database error",
    }
}

impl ClassifiedError {
    pub fn network(detail: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Network,
            message: NETWORK_MESSAGE.to_string(),
            detail: detail.into(),
            code: None,
        }
    }

    pub fn validation(detail: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Validation,
            message: VALIDATION_MESSAGE.to_string(),
            detail: detail.into(),
            code: None,
        }
    }

    pub fn database(code: impl Into<String>, detail: impl Into<String>) -> Self {
        let code = code.into();
        Self {
            message: database_message(&code).to_string(),
            kind: ErrorKind::Database { code: code.clone() },
            detail: detail.into(),
            code: Some(code),
        }
    }

    pub fn unknown(detail: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Unknown,
            message: UNKNOWN_MESSAGE.to_string(),
            detail: detail.into(),
            code: None,
        }
    }

    pub fn is_network(&self) -> bool {
        self.kind == ErrorKind::Network
    }
}

// ============================================================================
// CLASSIFY TRAIT
// ============================================================================

/// Anything that can be reduced to a [`ClassifiedError`].
pub trait Classify {
    fn classify(&self) -> ClassifiedError;
}

pub fn classify<E: Classify + ?Sized>(raw: &E) -> ClassifiedError {
    raw.classify()
}

impl Classify for StoreError {
    fn classify(&self) -> ClassifiedError {
        match self {
            StoreError::Remote {
                code,
                message,
                details,
            } => {
                let detail = match details {
                    Some(details) => format!("{message} ({details})"),
                    None => message.clone(),
                };
                ClassifiedError::database(code.clone(), detail)
            }
            StoreError::ProcedureNotFound { .. } => {
                ClassifiedError::database("PGRST202", self.to_string())
            }
            StoreError::Network { message } => ClassifiedError::network(message.clone()),
            StoreError::Decode { .. } | StoreError::LockPoisoned => {
                ClassifiedError::unknown(self.to_string())
            }
        }
    }
}

impl Classify for ValidationError {
    fn classify(&self) -> ClassifiedError {
        ClassifiedError::validation(self.to_string())
    }
}

impl Classify for StorefrontError {
    fn classify(&self) -> ClassifiedError {
        match self {
            StorefrontError::Store(e) => e.classify(),
            StorefrontError::Validation(e) => e.classify(),
            StorefrontError::RateLimited { .. } => ClassifiedError {
                kind: ErrorKind::Unknown,
                message: RATE_LIMITED_MESSAGE.to_string(),
                detail: self.to_string(),
                code: None,
            },
            StorefrontError::Config(_) | StorefrontError::NotLoaded { .. } => {
                ClassifiedError::unknown(self.to_string())
            }
        }
    }
}

impl Classify for reqwest::Error {
    fn classify(&self) -> ClassifiedError {
        if self.is_decode() {
            ClassifiedError::unknown(self.to_string())
        } else {
            ClassifiedError::network(self.to_string())
        }
    }
}

/// Raw error payloads as a backend or script would produce them.
///
/// Rules, first match wins: a `code` field means a database error; a `name`
/// containing `NetworkError` or a `message` mentioning `fetch` means a
/// network error; a `name` of `ValidationError` or an `issues` array means a
/// validation error.
impl Classify for Value {
    fn classify(&self) -> ClassifiedError {
        let Some(obj) = self.as_object() else {
            return match self {
                Value::String(s) if !s.is_empty() => ClassifiedError::unknown(s.clone()),
                _ => ClassifiedError::unknown(UNKNOWN_DETAIL),
            };
        };

        let message = obj.get("message").and_then(Value::as_str);
        let name = obj.get("name").and_then(Value::as_str).unwrap_or("");
        let detail = message.unwrap_or(UNKNOWN_DETAIL).to_string();

        let code = match obj.get("code") {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };
        if let Some(code) = code {
            return ClassifiedError::database(code, detail);
        }

        if name.contains("NetworkError") || message.is_some_and(|m| m.contains("fetch")) {
            return ClassifiedError::network(detail);
        }

        if name == "ValidationError" || obj.get("issues").is_some_and(Value::is_array) {
            return ClassifiedError::validation(detail);
        }

        ClassifiedError::unknown(detail)
    }
}

// ============================================================================
// REPORTER
// ============================================================================

/// Classifies, logs and notifies. Never fails.
#[derive(Clone)]
pub struct ErrorReporter {
    notifier: Arc<dyn Notifier>,
    environment: String,
}

impl fmt::Debug for ErrorReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorReporter")
            .field("environment", &self.environment)
            .finish_non_exhaustive()
    }
}

impl ErrorReporter {
    pub fn new(notifier: Arc<dyn Notifier>, environment: impl Into<String>) -> Self {
        Self {
            notifier,
            environment: environment.into(),
        }
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Confirm a completed mutation to the user.
    pub fn success(&self, title: impl Into<String>) {
        self.notifier.notify(Notification::success(title));
    }

    pub fn report<E: Classify + ?Sized>(&self, raw: &E, operation: &str) -> ClassifiedError {
        let classified = raw.classify();

        tracing::error!(
            timestamp = %Utc::now().to_rfc3339(),
            kind = %classified.kind,
            message = %classified.message,
            detail = %classified.detail,
            code = classified.code.as_deref().unwrap_or(""),
            operation,
            environment = %self.environment,
            "Application error"
        );

        let notification = if classified.is_network() {
            Notification::error(
                classified.message.clone(),
                Some(NETWORK_RETRY_HINT.to_string()),
                Duration::from_millis(NETWORK_ERROR_NOTICE_MS),
            )
        } else {
            Notification::error(
                classified.message.clone(),
                Some(classified.detail.clone()),
                Duration::from_millis(DEFAULT_ERROR_NOTICE_MS),
            )
        };
        self.notifier.notify(notification);

        classified
    }
}

/// Await `fut`, reporting any error. `None` means the error was reported.
pub async fn with_error_handling<T, E, F>(
    reporter: &ErrorReporter,
    operation: &str,
    fut: F,
) -> Option<T>
where
    F: Future<Output = Result<T, E>>,
    E: Classify,
{
    match fut.await {
        Ok(value) => Some(value),
        Err(e) => {
            reporter.report(&e, operation);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::RecordingNotifier;
    use serde_json::json;

    #[test]
    fn test_database_codes_map_to_messages() {
        let cases = [
            ("23505", "Duplicate data"),
            ("23503", "Invalid reference"),
            ("23502", "Required field missing"),
            ("42P01", "Table not found"),
            ("PGRST116", "No data found"),
            ("PGRST301", "Insufficient privileges"),
            ("XX000", "Database error"),
        ];
        for (code, message) in cases {
            let c = StoreError::remote(code, "boom").classify();
            assert_eq!(c.kind, ErrorKind::Database { code: code.to_string() });
            assert_eq!(c.message, message);
            assert_eq!(c.code.as_deref(), Some(code));
            assert_eq!(c.detail, "boom");
        }
    }

    #[test]
    fn test_json_rules_in_order() {
        let db = json!({"code": "23505", "name": "NetworkError", "message": "dup"});
        assert_eq!(db.classify().kind, ErrorKind::Database { code: "23505".into() });

        let net = json!({"name": "TypeError: NetworkError when attempting", "message": "x"});
        assert_eq!(net.classify().kind, ErrorKind::Network);

        let fetch = json!({"message": "Failed to fetch"});
        assert_eq!(fetch.classify().kind, ErrorKind::Network);
        assert_eq!(fetch.classify().detail, "Failed to fetch");

        let issues = json!({"issues": [], "message": "bad"});
        assert_eq!(issues.classify().kind, ErrorKind::Validation);

        let named = json!({"name": "ValidationError"});
        assert_eq!(named.classify().kind, ErrorKind::Validation);
        assert_eq!(named.classify().detail, UNKNOWN_DETAIL);

        let other = json!({"message": "weird"});
        assert_eq!(other.classify().kind, ErrorKind::Unknown);
        assert_eq!(other.classify().message, UNKNOWN_MESSAGE);

        assert_eq!(json!(null).classify().kind, ErrorKind::Unknown);
        assert_eq!(json!("plain").classify().detail, "plain");
    }

    #[test]
    fn test_empty_code_is_not_database() {
        let v = json!({"code": "", "message": "Failed to fetch"});
        assert_eq!(v.classify().kind, ErrorKind::Network);
    }

    #[test]
    fn test_storefront_errors() {
        let e = StorefrontError::from(StoreError::Network {
            message: "connection refused".into(),
        });
        assert_eq!(e.classify().kind, ErrorKind::Network);

        let e = StorefrontError::from(ValidationError::RequiredFieldMissing {
            field: "phone".into(),
        });
        assert_eq!(e.classify().kind, ErrorKind::Validation);

        let e = StorefrontError::RateLimited {
            endpoint: "order_creation".into(),
            reset_at: Utc::now(),
            blocked: true,
        };
        let c = e.classify();
        assert_eq!(c.kind, ErrorKind::Unknown);
        assert_eq!(c.message, RATE_LIMITED_MESSAGE);
    }

    #[test]
    fn test_report_notification_durations() {
        let notifier = Arc::new(RecordingNotifier::new());
        let reporter = ErrorReporter::new(notifier.clone(), "test");

        let c = reporter.report(
            &StoreError::Network {
                message: "offline".into(),
            },
            "load_orders",
        );
        assert!(c.is_network());
        let n = notifier.last().unwrap();
        assert_eq!(n.duration, Duration::from_millis(6000));
        assert_eq!(n.description.as_deref(), Some(NETWORK_RETRY_HINT));

        reporter.report(&StoreError::remote("23505", "dup key"), "add_order");
        let n = notifier.last().unwrap();
        assert_eq!(n.duration, Duration::from_millis(4000));
        assert_eq!(n.title, "Duplicate data");
        assert_eq!(n.description.as_deref(), Some("dup key"));
    }

    #[tokio::test]
    async fn test_with_error_handling() {
        let notifier = Arc::new(RecordingNotifier::new());
        let reporter = ErrorReporter::new(notifier.clone(), "test");

        let ok = with_error_handling(&reporter, "ok", async { Ok::<_, StoreError>(5) }).await;
        assert_eq!(ok, Some(5));
        assert!(notifier.notifications().is_empty());

        let failed: Option<u32> = with_error_handling(&reporter, "fail", async {
            Err(StoreError::remote("42P01", "missing"))
        })
        .await;
        assert_eq!(failed, None);
        assert_eq!(notifier.notifications().len(), 1);
    }
}
