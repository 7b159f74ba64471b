//! Storefront Core - Domain Rows and Rules
//!
//! This crate holds the pieces every other storefront crate agrees on:
//!
//! - Row types for the remote tables (orders, products, site settings,
//!   performance metrics, rate-limit windows)
//! - Order status labels and the governorate list
//! - Shipping rules and order totals
//! - Input validation for the order form, product editor and settings page
//! - The error taxonomy (`StorefrontError`) and configuration types
//! - A `Clock` abstraction so time-dependent components can be tested

pub mod clock;
pub mod config;
pub mod entities;
pub mod error;
pub mod governorate;
pub mod shipping;
pub mod validation;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CacheTtls, RateLimitConfig, SweepPolicy};
pub use entities::{
    DashboardStats, NewOrder, NewProduct, Order, OrderStats, OrderStatus, PerformanceMetric, Product,
    ProductPatch, RateLimitRow, SettingsPatch, SiteSettings,
};
pub use error::{
    ConfigError, FieldIssue, StoreError, StorefrontError, StorefrontResult, ValidationError,
};
pub use governorate::{is_cairo_giza, is_valid_governorate, GOVERNORATES};
pub use shipping::{calculate_order_total, OrderTotal, ShippingConfig};
pub use validation::{
    validate_order_form, validate_product, validate_settings, OrderForm, ValidatedOrder,
};

/// Timestamp type used across all rows.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
