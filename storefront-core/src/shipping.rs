//! Shipping rules and order totals.

use crate::governorate::is_cairo_giza;
use serde::{Deserialize, Serialize};

/// Shipping rates, in the store's currency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShippingConfig {
    /// Subtotals at or above this ship free everywhere.
    pub free_shipping_threshold: f64,
    pub cairo_giza_cost: f64,
    pub other_governorates_cost: f64,
}

impl Default for ShippingConfig {
    fn default() -> Self {
        Self {
            free_shipping_threshold: 500.0,
            cairo_giza_cost: 0.0,
            other_governorates_cost: 50.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderTotal {
    pub subtotal: f64,
    pub shipping: f64,
    pub total: f64,
    pub free_shipping: bool,
}

/// Price a single-product order.
pub fn calculate_order_total(
    config: &ShippingConfig,
    price: f64,
    quantity: u32,
    governorate: &str,
) -> OrderTotal {
    let subtotal = price * f64::from(quantity);
    let free_shipping = subtotal >= config.free_shipping_threshold;
    let shipping = if free_shipping {
        0.0
    } else if is_cairo_giza(governorate) {
        config.cairo_giza_cost
    } else {
        config.other_governorates_cost
    };

    OrderTotal {
        subtotal,
        shipping,
        total: subtotal + shipping,
        free_shipping,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_cairo_at_threshold() {
        let total = calculate_order_total(&ShippingConfig::default(), 500.0, 1, "القاهرة");
        assert_eq!(total.shipping, 0.0);
        assert_eq!(total.total, 500.0);
        assert!(total.free_shipping);
    }

    #[test]
    fn test_aswan_below_threshold() {
        let total = calculate_order_total(&ShippingConfig::default(), 100.0, 1, "أسوان");
        assert_eq!(total.shipping, 50.0);
        assert_eq!(total.total, 150.0);
        assert!(!total.free_shipping);
    }

    #[test]
    fn test_giza_below_threshold_still_free() {
        let total = calculate_order_total(&ShippingConfig::default(), 120.0, 2, "الجيزة");
        assert_eq!(total.subtotal, 240.0);
        assert_eq!(total.shipping, 0.0);
        assert!(!total.free_shipping);
    }

    #[test]
    fn test_quantity_crosses_threshold() {
        let total = calculate_order_total(&ShippingConfig::default(), 250.0, 2, "سوهاج");
        assert_eq!(total.shipping, 0.0);
        assert!(total.free_shipping);
    }

    proptest! {
        #[test]
        fn prop_total_is_subtotal_plus_shipping(
            price in 0.0f64..10_000.0,
            quantity in 1u32..20,
            idx in 0usize..crate::GOVERNORATES.len(),
        ) {
            let gov = crate::GOVERNORATES[idx];
            let t = calculate_order_total(&ShippingConfig::default(), price, quantity, gov);
            prop_assert!((t.total - (t.subtotal + t.shipping)).abs() < 1e-9);
            if t.subtotal >= 500.0 {
                prop_assert_eq!(t.shipping, 0.0);
            }
            prop_assert!(t.shipping == 0.0 || t.shipping == 50.0);
        }
    }
}
