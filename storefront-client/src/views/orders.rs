//! Orders view.

use super::{finish_fetch, snapshot_channel, spawn_watch, ViewSnapshot, WatchHandle};
use crate::classify::ErrorReporter;
use crate::constants::TABLE_ORDERS;
use crate::optimizer::{DatabaseOptimizer, OrderQuery};
use serde_json::json;
use std::sync::{Arc, Mutex};
use storefront_core::{NewOrder, Order, OrderStats, OrderStatus, StoreError, StorefrontResult};
use storefront_storage::{decode_row, encode_row, Filter, Namespace, Row};
use tokio::sync::watch;
use uuid::Uuid;

/// Namespaces whose cached results change when any order changes.
pub const ORDER_NAMESPACES: [Namespace; 3] = [
    Namespace::Orders,
    Namespace::OrderStats,
    Namespace::DashboardStats,
];

pub struct OrdersView {
    optimizer: Arc<DatabaseOptimizer>,
    reporter: ErrorReporter,
    query: Mutex<OrderQuery>,
    state: watch::Sender<ViewSnapshot<Vec<Order>>>,
}

impl std::fmt::Debug for OrdersView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrdersView")
            .field("query", &self.query())
            .finish_non_exhaustive()
    }
}

fn first_row(rows: Vec<Row>, what: &str) -> Result<Row, StoreError> {
    rows.into_iter()
        .next()
        .ok_or_else(|| StoreError::remote("PGRST116", format!("{what} returned no rows")))
}

impl OrdersView {
    pub fn new(optimizer: Arc<DatabaseOptimizer>, reporter: ErrorReporter) -> Self {
        Self {
            optimizer,
            reporter,
            query: Mutex::new(OrderQuery::default()),
            state: snapshot_channel(),
        }
    }

    pub fn snapshot(&self) -> ViewSnapshot<Vec<Order>> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewSnapshot<Vec<Order>>> {
        self.state.subscribe()
    }

    pub fn orders(&self) -> Vec<Order> {
        self.state.borrow().data.clone()
    }

    pub fn query(&self) -> OrderQuery {
        self.query.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn set_query(&self, query: OrderQuery) {
        *self.query.lock().unwrap_or_else(|e| e.into_inner()) = query;
    }

    /// Load the current page. Returns whether fresh data arrived.
    pub async fn fetch(&self) -> bool {
        let query = self.query();
        let result = self
            .optimizer
            .measure_query("optimized_orders_fetch", self.optimizer.orders(&query))
            .await;
        match result {
            Ok(orders) => {
                finish_fetch(&self.state, Ok(orders));
                true
            }
            Err(e) => {
                let classified = self.reporter.report(&e, "fetch_orders");
                finish_fetch(&self.state, Err(classified));
                false
            }
        }
    }

    /// Drop cached order data and fetch again.
    pub async fn refresh(&self) -> bool {
        self.optimizer.invalidate_namespaces(&ORDER_NAMESPACES);
        self.fetch().await
    }

    pub async fn update_status(&self, id: Uuid, status: OrderStatus) -> StorefrontResult<Order> {
        let result = async {
            let rows = self
                .optimizer
                .store()
                .update(
                    TABLE_ORDERS,
                    json!({ "status": status }),
                    &[Filter::eq("id", id.to_string())],
                )
                .await?;
            let order: Order = decode_row(first_row(rows, "order status update")?)?;
            Ok::<_, StoreError>(order)
        }
        .await;

        let order = match result {
            Ok(order) => order,
            Err(e) => {
                self.reporter.report(&e, "update_order_status");
                return Err(e.into());
            }
        };

        self.state.send_modify(|snap| {
            for existing in snap.data.iter_mut().filter(|o| o.id == id) {
                *existing = order.clone();
            }
        });
        self.optimizer.invalidate_namespaces(&ORDER_NAMESPACES);
        tracing::info!(order_id = %id, status = %status, "Order status updated");
        self.reporter.success(format!("Order status changed to {status}"));
        Ok(order)
    }

    /// Insert a new order and put it at the top of the list.
    pub async fn add(&self, order: NewOrder) -> StorefrontResult<Order> {
        let result = async {
            let row = encode_row(&order)?;
            let rows = self.optimizer.store().insert(TABLE_ORDERS, vec![row]).await?;
            let created: Order = decode_row(first_row(rows, "order insert")?)?;
            Ok::<_, StoreError>(created)
        }
        .await;

        let created = match result {
            Ok(created) => created,
            Err(e) => {
                self.reporter.report(&e, "add_order");
                return Err(e.into());
            }
        };

        self.state.send_modify(|snap| snap.data.insert(0, created.clone()));
        self.optimizer.invalidate_namespaces(&ORDER_NAMESPACES);
        tracing::info!(order_id = %created.id, total = created.total_amount, "Order created");
        Ok(created)
    }

    /// Counts by status, revenue and average order value over the loaded
    /// orders.
    pub fn statistics(&self) -> OrderStats {
        OrderStats::from_orders(&self.state.borrow().data)
    }

    /// Refetch whenever any client changes an order.
    pub fn watch(self: &Arc<Self>) -> WatchHandle {
        let stream = self.optimizer.store().subscribe(TABLE_ORDERS);
        let view = Arc::clone(self);
        spawn_watch(stream, move |_event| {
            let view = Arc::clone(&view);
            async move {
                view.optimizer.invalidate_namespaces(&ORDER_NAMESPACES);
                view.fetch().await;
            }
        })
    }
}
