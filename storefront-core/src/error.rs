//! Error types for storefront operations

use crate::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Remote store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The backend answered with an error payload carrying a store code
    /// (Postgres SQLSTATE or PostgREST `PGRSTxxx`).
    #[error("Remote error {code}: {message}")]
    Remote {
        code: String,
        message: String,
        details: Option<String>,
    },

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Failed to decode response: {reason}")]
    Decode { reason: String },

    #[error("Remote procedure not found: {name}")]
    ProcedureNotFound { name: String },

    #[error("Store lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    pub fn remote(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Remote {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    /// The store code, if the backend supplied one.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Remote { code, .. } => Some(code.as_str()),
            Self::ProcedureNotFound { .. } => Some("PGRST202"),
            _ => None,
        }
    }
}

/// One failed field check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldIssue {
    pub field: String,
    pub message: String,
}

impl FieldIssue {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Validation failed with {} issue(s): {}", .issues.len(), join_issues(.issues))]
    Issues { issues: Vec<FieldIssue> },
}

impl ValidationError {
    /// Flatten into a list of field issues.
    pub fn issues(&self) -> Vec<FieldIssue> {
        match self {
            Self::RequiredFieldMissing { field } => {
                vec![FieldIssue::new(field.clone(), "required")]
            }
            Self::InvalidValue { field, reason } => {
                vec![FieldIssue::new(field.clone(), reason.clone())]
            }
            Self::Issues { issues } => issues.clone(),
        }
    }
}

fn join_issues(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all storefront errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StorefrontError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Rate limited on {endpoint} until {reset_at} (blocked: {blocked})")]
    RateLimited {
        endpoint: String,
        reset_at: Timestamp,
        blocked: bool,
    },

    #[error("{resource} has not been loaded yet")]
    NotLoaded { resource: String },
}

/// Result type alias for storefront operations.
pub type StorefrontResult<T> = Result<T, StorefrontError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_store_error_display_remote() {
        let err = StoreError::remote("23505", "duplicate key value");
        let msg = format!("{}", err);
        assert!(msg.contains("23505"));
        assert!(msg.contains("duplicate key value"));
    }

    #[test]
    fn test_store_error_code() {
        assert_eq!(StoreError::remote("42P01", "x").code(), Some("42P01"));
        assert_eq!(
            StoreError::Network {
                message: "down".to_string()
            }
            .code(),
            None
        );
        assert_eq!(
            StoreError::ProcedureNotFound {
                name: "nope".to_string()
            }
            .code(),
            Some("PGRST202")
        );
    }

    #[test]
    fn test_validation_error_display_issues() {
        let err = ValidationError::Issues {
            issues: vec![
                FieldIssue::new("phone", "must start with 01"),
                FieldIssue::new("address", "too short"),
            ],
        };
        let msg = format!("{}", err);
        assert!(msg.contains("2 issue(s)"));
        assert!(msg.contains("phone: must start with 01"));
        assert!(msg.contains("address: too short"));
    }

    #[test]
    fn test_validation_error_issues_flatten() {
        let err = ValidationError::RequiredFieldMissing {
            field: "governorate".to_string(),
        };
        assert_eq!(err.issues().len(), 1);
        assert_eq!(err.issues()[0].field, "governorate");
    }

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "rest_url".to_string(),
            value: "bad".to_string(),
            reason: "must be url".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("rest_url"));
        assert!(msg.contains("bad"));
        assert!(msg.contains("must be url"));
    }

    #[test]
    fn test_rate_limited_display() {
        let err = StorefrontError::RateLimited {
            endpoint: "order_creation".to_string(),
            reset_at: Utc::now(),
            blocked: true,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("order_creation"));
        assert!(msg.contains("blocked: true"));
    }

    #[test]
    fn test_storefront_error_from_variants() {
        let store = StorefrontError::from(StoreError::LockPoisoned);
        assert!(matches!(store, StorefrontError::Store(_)));

        let validation = StorefrontError::from(ValidationError::RequiredFieldMissing {
            field: "name".to_string(),
        });
        assert!(matches!(validation, StorefrontError::Validation(_)));

        let config = StorefrontError::from(ConfigError::MissingRequired {
            field: "anon_key".to_string(),
        });
        assert!(matches!(config, StorefrontError::Config(_)));
    }
}
