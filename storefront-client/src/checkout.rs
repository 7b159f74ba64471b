//! Checkout
//!
//! Turns the customer's order form into a stored order: rate limit, then
//! validation, then pricing, then insert through the orders view so the
//! admin list and dashboard caches stay coherent.

use crate::classify::ErrorReporter;
use crate::constants::ENDPOINT_ORDER_CREATION;
use crate::rate_limit::RateLimiter;
use crate::views::OrdersView;
use std::sync::Arc;
use storefront_core::{
    calculate_order_total, validate_order_form, Clock, NewOrder, Order, OrderForm, OrderStatus,
    OrderTotal, RateLimitConfig, ShippingConfig, StorefrontError, StorefrontResult,
};

/// A stored order together with how it was priced.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutReceipt {
    pub order: Order,
    pub total: OrderTotal,
}

pub struct Checkout {
    limiter: Arc<RateLimiter>,
    orders: Arc<OrdersView>,
    shipping: ShippingConfig,
    policy: RateLimitConfig,
    clock: Arc<dyn Clock>,
    reporter: ErrorReporter,
}

impl std::fmt::Debug for Checkout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Checkout")
            .field("shipping", &self.shipping)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Checkout {
    pub fn new(
        limiter: Arc<RateLimiter>,
        orders: Arc<OrdersView>,
        shipping: ShippingConfig,
        clock: Arc<dyn Clock>,
        reporter: ErrorReporter,
    ) -> Self {
        Self {
            limiter,
            orders,
            shipping,
            policy: RateLimitConfig::ORDER_CREATION,
            clock,
            reporter,
        }
    }

    pub fn with_policy(mut self, policy: RateLimitConfig) -> Self {
        self.policy = policy;
        self
    }

    pub fn shipping(&self) -> &ShippingConfig {
        &self.shipping
    }

    /// Price a single unit for the given governorate.
    pub fn quote(&self, product_price: f64, governorate: &str) -> OrderTotal {
        calculate_order_total(&self.shipping, product_price, 1, governorate)
    }

    /// Place an order for one unit of the product.
    ///
    /// `identifier` is whatever the caller uses to tell customers apart
    /// (an IP address for anonymous visitors).
    pub async fn submit(
        &self,
        identifier: &str,
        form: &OrderForm,
        product_price: f64,
    ) -> StorefrontResult<CheckoutReceipt> {
        let result = self
            .limiter
            .guard(identifier, ENDPOINT_ORDER_CREATION, &self.policy, || {
                self.place(form, product_price)
            })
            .await;

        if let Err(e @ StorefrontError::RateLimited { .. }) = &result {
            self.reporter.report(e, "submit_order");
        }
        result
    }

    async fn place(&self, form: &OrderForm, product_price: f64) -> StorefrontResult<CheckoutReceipt> {
        let validated = match validate_order_form(form) {
            Ok(validated) => validated,
            Err(e) => {
                self.reporter.report(&e, "submit_order");
                return Err(e.into());
            }
        };

        let total = self.quote(product_price, &validated.governorate);
        let new_order = NewOrder {
            customer_name: validated.customer_name,
            phone: validated.phone,
            address: validated.address,
            governorate: Some(validated.governorate),
            notes: validated.notes,
            total_amount: total.total,
            status: OrderStatus::New,
            order_date: Some(self.clock.now().date_naive()),
        };

        // OrdersView::add reports its own failures.
        let order = self.orders.add(new_order).await?;
        tracing::info!(
            order_id = %order.id,
            subtotal = total.subtotal,
            shipping = total.shipping,
            total = total.total,
            "Order placed"
        );
        self.reporter.success("Order placed");
        Ok(CheckoutReceipt { order, total })
    }
}
