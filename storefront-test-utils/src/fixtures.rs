//! Fixtures for common scenarios.

use chrono::Utc;
use serde_json::{json, Value};
use storefront_core::validation::OrderForm;
use storefront_core::{NewOrder, NewProduct, OrderStatus};
use uuid::Uuid;

/// An `orders` row as the backend would return it.
pub fn order_row(customer_name: &str, status: OrderStatus, total_amount: f64) -> Value {
    let now = Utc::now();
    json!({
        "id": Uuid::now_v7(),
        "customer_name": customer_name,
        "phone": "01012345678",
        "address": "15 Nile Street, Maadi, Cairo",
        "governorate": "القاهرة",
        "notes": null,
        "total_amount": total_amount,
        "status": status,
        "order_date": now.date_naive(),
        "created_at": now,
        "updated_at": now,
    })
}

/// A `products` row with the given images.
pub fn product_row(name: &str, is_active: bool, images: &[&str]) -> Value {
    let now = Utc::now();
    json!({
        "id": Uuid::now_v7(),
        "name": name,
        "brand": "Sandreen",
        "price": 350.0,
        "description": "Vitamin C serum",
        "whatsapp_number": "01123456789",
        "benefits": ["Brightens skin", "Evens tone"],
        "usage_instructions": ["Cleanse", "Apply three drops"],
        "images": images,
        "is_active": is_active,
        "created_at": now,
        "updated_at": now,
    })
}

pub fn settings_row() -> Value {
    json!({
        "id": Uuid::now_v7(),
        "site_name": "Sandreen Beauty",
        "support_phone": "01012345678",
        "support_email": "help@sandreen.shop",
        "facebook_url": null,
        "instagram_url": null,
        "whatsapp_url": "https://wa.me/201012345678",
        "created_at": Utc::now(),
        "updated_at": Utc::now(),
    })
}

pub fn sample_new_order() -> NewOrder {
    NewOrder {
        customer_name: "منى أحمد".to_string(),
        phone: "01012345678".to_string(),
        address: "15 شارع النيل، المعادي".to_string(),
        governorate: Some("القاهرة".to_string()),
        notes: None,
        total_amount: 350.0,
        status: OrderStatus::New,
        order_date: Some(Utc::now().date_naive()),
    }
}

pub fn sample_new_product() -> NewProduct {
    NewProduct {
        name: "Keke Serum".to_string(),
        brand: "Sandreen".to_string(),
        price: 350.0,
        description: Some("Vitamin C serum".to_string()),
        whatsapp_number: Some("01123456789".to_string()),
        benefits: vec!["Brightens skin".to_string()],
        usage_instructions: vec!["Apply twice daily".to_string()],
        images: vec!["https://cdn.example.com/serum-1.jpg".to_string()],
        is_active: true,
    }
}

pub fn sample_order_form(governorate: &str) -> OrderForm {
    OrderForm {
        customer_name: "Mona Ahmed".to_string(),
        phone: "010 1234 5678".to_string(),
        address: "15 Nile Street, Maadi".to_string(),
        governorate: governorate.to_string(),
        notes: Some("Call before delivery".to_string()),
    }
}
