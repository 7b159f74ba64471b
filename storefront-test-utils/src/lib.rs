//! Storefront Test Utilities
//!
//! Centralized test infrastructure for the storefront workspace:
//! - A fully wired in-memory backend (`storefront_store`) with the
//!   storefront's tables, views and procedures
//! - Store doubles that count calls or fail on demand
//! - Fixtures for products, orders and settings
//! - Proptest generators for domain values

pub mod doubles;
pub mod fixtures;
pub mod generators;
pub mod procedures;

pub use doubles::{CountingStore, FailingStore, Operation};
pub use fixtures::{
    order_row, product_row, sample_new_order, sample_new_product, sample_order_form,
    settings_row,
};
pub use procedures::{install_procedures, storefront_store, STOREFRONT_TABLES};

// Re-export core types for convenience
pub use storefront_core::{
    Clock, ManualClock, NewOrder, NewProduct, Order, OrderStatus, Product, SiteSettings,
    StoreError, StorefrontError, StorefrontResult,
};
pub use storefront_storage::{InMemoryStore, RemoteStore};
