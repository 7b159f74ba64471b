//! Row types for the remote tables.
//!
//! Field names match the column names so rows can be decoded straight from
//! the store's JSON. Optional columns carry `#[serde(default)]` because lean
//! projections leave them out.

use crate::Timestamp;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

fn default_true() -> bool {
    true
}

// ============================================================================
// ORDERS
// ============================================================================

/// Order lifecycle. Serialized with the labels the admin dashboard shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    #[default]
    #[serde(rename = "جديد")]
    New,
    #[serde(rename = "قيد التجهيز")]
    Processing,
    #[serde(rename = "تم الشحن")]
    Shipped,
    #[serde(rename = "تم التوصيل")]
    Delivered,
    #[serde(rename = "ملغي")]
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::New,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    /// Wire label.
    pub fn label(&self) -> &'static str {
        match self {
            OrderStatus::New => "جديد",
            OrderStatus::Processing => "قيد التجهيز",
            OrderStatus::Shipped => "تم الشحن",
            OrderStatus::Delivered => "تم التوصيل",
            OrderStatus::Cancelled => "ملغي",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.label() == label)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub customer_name: String,
    pub phone: String,
    pub address: String,
    #[serde(default)]
    pub governorate: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub total_amount: f64,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub order_date: Option<NaiveDate>,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
    #[serde(default)]
    pub updated_at: Option<Timestamp>,
}

/// Insert payload for `orders`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrder {
    pub customer_name: String,
    pub phone: String,
    pub address: String,
    pub governorate: Option<String>,
    pub notes: Option<String>,
    pub total_amount: f64,
    pub status: OrderStatus,
    pub order_date: Option<NaiveDate>,
}

/// Aggregate view over a list of orders.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderStats {
    pub total: usize,
    pub by_status: BTreeMap<OrderStatus, usize>,
    pub total_revenue: f64,
    pub average_order_value: f64,
}

impl OrderStats {
    pub fn from_orders(orders: &[Order]) -> Self {
        let mut by_status = BTreeMap::new();
        let mut total_revenue = 0.0;
        for order in orders {
            *by_status.entry(order.status).or_insert(0) += 1;
            total_revenue += order.total_amount;
        }
        let total = orders.len();
        let average_order_value = if total == 0 {
            0.0
        } else {
            total_revenue / total as f64
        };
        Self {
            total,
            by_status,
            total_revenue,
            average_order_value,
        }
    }

    pub fn count(&self, status: OrderStatus) -> usize {
        self.by_status.get(&status).copied().unwrap_or(0)
    }
}

/// Headline numbers for the admin dashboard, computed by the
/// `get_dashboard_stats` procedure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    #[serde(default)]
    pub total_orders: u64,
    /// New plus in-preparation orders.
    #[serde(default)]
    pub pending_orders: u64,
    #[serde(default)]
    pub completed_orders: u64,
    #[serde(default)]
    pub cancelled_orders: u64,
    #[serde(default)]
    pub total_revenue: f64,
    #[serde(default)]
    pub average_order_value: f64,
    #[serde(default)]
    pub active_products: u64,
    /// Orders created in the last seven days.
    #[serde(default)]
    pub recent_orders: u64,
}

// ============================================================================
// PRODUCTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub brand: String,
    pub price: f64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub whatsapp_number: Option<String>,
    #[serde(default)]
    pub benefits: Vec<String>,
    #[serde(default)]
    pub usage_instructions: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
    #[serde(default)]
    pub updated_at: Option<Timestamp>,
}

/// Insert payload for `products`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub brand: String,
    pub price: f64,
    pub description: Option<String>,
    pub whatsapp_number: Option<String>,
    #[serde(default)]
    pub benefits: Vec<String>,
    #[serde(default)]
    pub usage_instructions: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Partial update for `products`. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whatsapp_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub benefits: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_instructions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

impl ProductPatch {
    /// Patch that only replaces the image list.
    pub fn images(images: Vec<String>) -> Self {
        Self {
            images: Some(images),
            ..Self::default()
        }
    }
}

// ============================================================================
// SITE SETTINGS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteSettings {
    pub id: Uuid,
    #[serde(default)]
    pub site_name: Option<String>,
    #[serde(default)]
    pub support_phone: Option<String>,
    #[serde(default)]
    pub support_email: Option<String>,
    #[serde(default)]
    pub facebook_url: Option<String>,
    #[serde(default)]
    pub instagram_url: Option<String>,
    #[serde(default)]
    pub whatsapp_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
    #[serde(default)]
    pub updated_at: Option<Timestamp>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub support_phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub support_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facebook_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instagram_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whatsapp_url: Option<String>,
}

impl SiteSettings {
    /// Apply a patch locally, mirroring what the remote update does.
    pub fn apply(&mut self, patch: &SettingsPatch) {
        let fields = [
            (&mut self.site_name, &patch.site_name),
            (&mut self.support_phone, &patch.support_phone),
            (&mut self.support_email, &patch.support_email),
            (&mut self.facebook_url, &patch.facebook_url),
            (&mut self.instagram_url, &patch.instagram_url),
            (&mut self.whatsapp_url, &patch.whatsapp_url),
        ];
        for (slot, value) in fields {
            if value.is_some() {
                *slot = value.clone();
            }
        }
    }
}

// ============================================================================
// OPERATIONAL ROWS
// ============================================================================

/// Append-only performance sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetric {
    pub metric_name: String,
    pub metric_value: f64,
    pub metric_unit: String,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    pub recorded_at: Timestamp,
}

impl PerformanceMetric {
    pub fn millis(name: impl Into<String>, value: f64, recorded_at: Timestamp) -> Self {
        Self {
            metric_name: name.into(),
            metric_value: value,
            metric_unit: "ms".to_string(),
            metadata: None,
            recorded_at,
        }
    }

    /// A 0/1 flag sample (`unit = "boolean"`).
    pub fn flag(name: impl Into<String>, recorded_at: Timestamp) -> Self {
        Self {
            metric_name: name.into(),
            metric_value: 1.0,
            metric_unit: "boolean".to_string(),
            metadata: None,
            recorded_at,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Remote mirror of one rate-limit window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub ip_address: String,
    pub endpoint: String,
    pub request_count: u32,
    pub window_start: Timestamp,
}
