//! Checkout flow: pricing, persistence and order-creation limits.

#[path = "support/harness.rs"]
mod harness;

use harness::Harness;
use storefront_client::classify::{RATE_LIMITED_MESSAGE, VALIDATION_MESSAGE};
use storefront_client::NotificationKind;
use storefront_core::{Clock, OrderForm, OrderStatus, StorefrontError};
use storefront_test_utils::sample_order_form;

const CUSTOMER_IP: &str = "41.33.10.2";

// ============================================================================
// PRICING
// ============================================================================

#[tokio::test]
async fn test_cairo_order_at_threshold_ships_free() {
    let h = Harness::new();

    let receipt = h
        .storefront
        .checkout
        .submit(CUSTOMER_IP, &sample_order_form("القاهرة"), 500.0)
        .await
        .unwrap();

    assert_eq!(receipt.total.subtotal, 500.0);
    assert_eq!(receipt.total.shipping, 0.0);
    assert_eq!(receipt.total.total, 500.0);
    assert!(receipt.total.free_shipping);
    assert_eq!(receipt.order.total_amount, 500.0);
}

#[tokio::test]
async fn test_aswan_order_pays_standard_shipping() {
    let h = Harness::new();

    let receipt = h
        .storefront
        .checkout
        .submit(CUSTOMER_IP, &sample_order_form("أسوان"), 100.0)
        .await
        .unwrap();

    assert_eq!(receipt.total.shipping, 50.0);
    assert_eq!(receipt.total.total, 150.0);
    assert!(!receipt.total.free_shipping);
    assert_eq!(receipt.order.total_amount, 150.0);
}

#[test]
fn test_quote_below_threshold_in_giza() {
    let h = Harness::new();
    let total = h.storefront.checkout.quote(100.0, "الجيزة");
    assert_eq!(total.shipping, 0.0);
    assert_eq!(total.total, 100.0);
}

// ============================================================================
// PERSISTENCE
// ============================================================================

#[tokio::test]
async fn test_order_is_stored_normalised_and_listed() {
    let h = Harness::new();

    let receipt = h
        .storefront
        .checkout
        .submit(CUSTOMER_IP, &sample_order_form("أسوان"), 100.0)
        .await
        .unwrap();
    let order = &receipt.order;

    assert_eq!(order.status, OrderStatus::New);
    assert_eq!(order.phone, "01012345678");
    assert_eq!(order.governorate.as_deref(), Some("أسوان"));
    assert_eq!(order.order_date, Some(h.clock.now().date_naive()));

    let rows = h.backend.rows("orders").unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["status"], "جديد");

    assert_eq!(h.storefront.orders.orders(), vec![order.clone()]);
    let last = h.notifier.last().unwrap();
    assert_eq!(last.kind, NotificationKind::Success);
}

#[tokio::test]
async fn test_invalid_form_is_rejected_before_insert() {
    let h = Harness::new();
    let form = OrderForm {
        phone: "12345".to_string(),
        ..sample_order_form("القاهرة")
    };

    let err = h
        .storefront
        .checkout
        .submit(CUSTOMER_IP, &form, 350.0)
        .await
        .unwrap_err();

    match err {
        StorefrontError::Validation(e) => {
            assert!(e.issues().iter().any(|issue| issue.field == "phone"));
        }
        other => panic!("expected validation error, got {other:?}"),
    }
    assert!(h.backend.rows("orders").unwrap().is_empty());

    let last = h.notifier.last().unwrap();
    assert_eq!(last.kind, NotificationKind::Error);
    assert_eq!(last.title, VALIDATION_MESSAGE);
}

// ============================================================================
// RATE LIMITING
// ============================================================================

#[tokio::test]
async fn test_eleventh_order_in_an_hour_is_refused() {
    let h = Harness::new();
    let form = sample_order_form("القاهرة");

    for _ in 0..10 {
        h.storefront
            .checkout
            .submit(CUSTOMER_IP, &form, 350.0)
            .await
            .unwrap();
        h.clock.advance(std::time::Duration::from_secs(5 * 60));
    }

    let eleventh = h.storefront.checkout.submit(CUSTOMER_IP, &form, 350.0).await;
    assert!(matches!(
        eleventh,
        Err(StorefrontError::RateLimited { blocked: true, .. })
    ));
    let last = h.notifier.last().unwrap();
    assert_eq!(last.title, RATE_LIMITED_MESSAGE);

    h.clock.advance(std::time::Duration::from_secs(60));
    let twelfth = h.storefront.checkout.submit(CUSTOMER_IP, &form, 350.0).await;
    assert!(matches!(twelfth, Err(StorefrontError::RateLimited { .. })));

    assert_eq!(h.backend.rows("orders").unwrap().len(), 10);

    // Another customer is unaffected.
    assert!(h
        .storefront
        .checkout
        .submit("41.33.10.3", &form, 350.0)
        .await
        .is_ok());
}
