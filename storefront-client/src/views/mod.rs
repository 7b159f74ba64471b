//! Domain views
//!
//! A view owns the client-side copy of one resource (orders, products, site
//! settings), exposes it as a [`ViewSnapshot`] on a `watch` channel, and
//! turns user mutations into store writes plus cache invalidation.
//!
//! Views start `Loading` and become `Ready` after their first fetch. A failed
//! fetch is reported and leaves the previous data in place; there is no
//! terminal error state.

pub mod orders;
pub mod products;
pub mod search;
pub mod settings;

pub use orders::OrdersView;
pub use products::ProductsView;
pub use search::OrderSearch;
pub use settings::SettingsView;

use crate::classify::ClassifiedError;
use std::future::Future;
use storefront_storage::{ChangeEvent, ChangeStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Loading,
    Ready,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewSnapshot<T> {
    pub state: LoadState,
    pub data: T,
    /// Most recent fetch failure, cleared by the next successful fetch.
    pub error: Option<ClassifiedError>,
    /// Completed fetches, successful or not.
    pub generation: u64,
}

impl<T: Default> Default for ViewSnapshot<T> {
    fn default() -> Self {
        Self {
            state: LoadState::Loading,
            data: T::default(),
            error: None,
            generation: 0,
        }
    }
}

impl<T> ViewSnapshot<T> {
    pub fn is_loading(&self) -> bool {
        self.state == LoadState::Loading
    }
}

pub(crate) fn snapshot_channel<T: Default>() -> watch::Sender<ViewSnapshot<T>> {
    let (tx, _rx) = watch::channel(ViewSnapshot::default());
    tx
}

pub(crate) fn finish_fetch<T>(
    tx: &watch::Sender<ViewSnapshot<T>>,
    outcome: Result<T, ClassifiedError>,
) {
    tx.send_modify(|snap| {
        snap.state = LoadState::Ready;
        snap.generation += 1;
        match outcome {
            Ok(data) => {
                snap.data = data;
                snap.error = None;
            }
            Err(e) => snap.error = Some(e),
        }
    });
}

/// Background subscription to a table's change feed. Dropping the handle
/// unsubscribes.
#[derive(Debug)]
pub struct WatchHandle {
    table: String,
    task: JoinHandle<()>,
}

impl WatchHandle {
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub(crate) fn spawn_watch<F, Fut>(mut stream: ChangeStream, mut on_change: F) -> WatchHandle
where
    F: FnMut(ChangeEvent) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let table = stream.table().to_string();
    let task = tokio::spawn(async move {
        while let Some(event) = stream.recv().await {
            tracing::debug!(table = %event.table, kind = ?event.kind, "Change received");
            on_change(event).await;
        }
        tracing::debug!(table = %stream.table(), "Change stream closed");
    });
    WatchHandle { table, task }
}
