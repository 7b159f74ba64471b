//! Products view.

use super::{finish_fetch, snapshot_channel, spawn_watch, ViewSnapshot, WatchHandle};
use crate::classify::ErrorReporter;
use crate::constants::TABLE_PRODUCTS;
use crate::optimizer::{DatabaseOptimizer, ProductQuery};
use std::sync::Arc;
use storefront_core::{
    validate_product, NewProduct, Product, ProductPatch, StoreError, StorefrontError,
    StorefrontResult,
};
use storefront_storage::{decode_row, encode_row, Filter, Namespace};
use tokio::sync::watch;
use uuid::Uuid;

pub struct ProductsView {
    optimizer: Arc<DatabaseOptimizer>,
    reporter: ErrorReporter,
    query: ProductQuery,
    state: watch::Sender<ViewSnapshot<Vec<Product>>>,
}

impl std::fmt::Debug for ProductsView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProductsView")
            .field("query", &self.query)
            .finish_non_exhaustive()
    }
}

impl ProductsView {
    pub fn new(optimizer: Arc<DatabaseOptimizer>, reporter: ErrorReporter) -> Self {
        Self::with_query(optimizer, reporter, ProductQuery::default())
    }

    /// The admin editor lists inactive products too.
    pub fn with_query(
        optimizer: Arc<DatabaseOptimizer>,
        reporter: ErrorReporter,
        query: ProductQuery,
    ) -> Self {
        Self {
            optimizer,
            reporter,
            query,
            state: snapshot_channel(),
        }
    }

    pub fn snapshot(&self) -> ViewSnapshot<Vec<Product>> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewSnapshot<Vec<Product>>> {
        self.state.subscribe()
    }

    pub fn products(&self) -> Vec<Product> {
        self.state.borrow().data.clone()
    }

    pub async fn fetch(&self) -> bool {
        match self.optimizer.products(self.query).await {
            Ok(products) => {
                finish_fetch(&self.state, Ok(products));
                true
            }
            Err(e) => {
                let classified = self.reporter.report(&e, "fetch_products");
                finish_fetch(&self.state, Err(classified));
                false
            }
        }
    }

    pub async fn update(&self, id: Uuid, patch: ProductPatch) -> StorefrontResult<Product> {
        let result = async {
            let row = encode_row(&patch)?;
            let rows = self
                .optimizer
                .store()
                .update(TABLE_PRODUCTS, row, &[Filter::eq("id", id.to_string())])
                .await?;
            let row = rows.into_iter().next().ok_or_else(|| {
                StoreError::remote("PGRST116", "product update returned no rows")
            })?;
            decode_row::<Product>(row)
        }
        .await;

        let product = match result {
            Ok(product) => product,
            Err(e) => {
                self.reporter.report(&e, "update_product");
                return Err(e.into());
            }
        };

        self.state.send_modify(|snap| {
            for existing in snap.data.iter_mut().filter(|p| p.id == id) {
                *existing = product.clone();
            }
        });
        self.optimizer.invalidate_namespace(&Namespace::Products);
        tracing::info!(product_id = %id, "Product updated");
        self.reporter.success("Product saved");
        Ok(product)
    }

    pub async fn add(&self, product: NewProduct) -> StorefrontResult<Product> {
        if let Err(e) = validate_product(&product) {
            self.reporter.report(&e, "add_product");
            return Err(StorefrontError::Validation(e));
        }

        let result = async {
            let row = encode_row(&product)?;
            let rows = self.optimizer.store().insert(TABLE_PRODUCTS, vec![row]).await?;
            let row = rows.into_iter().next().ok_or_else(|| {
                StoreError::remote("PGRST116", "product insert returned no rows")
            })?;
            decode_row::<Product>(row)
        }
        .await;

        let created = match result {
            Ok(created) => created,
            Err(e) => {
                self.reporter.report(&e, "add_product");
                return Err(e.into());
            }
        };

        self.state.send_modify(|snap| snap.data.insert(0, created.clone()));
        self.optimizer.invalidate_namespace(&Namespace::Products);
        tracing::info!(product_id = %created.id, "Product created");
        self.reporter.success("Product added");
        Ok(created)
    }

    pub fn watch(self: &Arc<Self>) -> WatchHandle {
        let stream = self.optimizer.store().subscribe(TABLE_PRODUCTS);
        let view = Arc::clone(self);
        spawn_watch(stream, move |_event| {
            let view = Arc::clone(&view);
            async move {
                view.optimizer.invalidate_namespace(&Namespace::Products);
                view.fetch().await;
            }
        })
    }
}
