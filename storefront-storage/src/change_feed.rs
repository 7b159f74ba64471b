//! Row change notifications.
//!
//! Every store owns a [`ChangeFeed`]. Writes publish a [`ChangeEvent`];
//! subscribers receive the events for one table through a [`ChangeStream`].
//! Dropping the stream unsubscribes.

use crate::remote::Row;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
    /// The subscriber fell behind and events were dropped; treat as "refetch
    /// everything".
    Resync,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: String,
    pub kind: ChangeKind,
    pub new: Option<Row>,
    pub old: Option<Row>,
}

impl ChangeEvent {
    pub fn insert(table: impl Into<String>, new: Row) -> Self {
        Self {
            table: table.into(),
            kind: ChangeKind::Insert,
            new: Some(new),
            old: None,
        }
    }

    pub fn update(table: impl Into<String>, old: Row, new: Row) -> Self {
        Self {
            table: table.into(),
            kind: ChangeKind::Update,
            new: Some(new),
            old: Some(old),
        }
    }

    pub fn delete(table: impl Into<String>, old: Row) -> Self {
        Self {
            table: table.into(),
            kind: ChangeKind::Delete,
            new: None,
            old: Some(old),
        }
    }

    fn resync(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            kind: ChangeKind::Resync,
            new: None,
            old: None,
        }
    }
}

/// Broadcast hub for change events.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeEvent>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, event: ChangeEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self, table: &str) -> ChangeStream {
        ChangeStream {
            table: table.to_string(),
            rx: self.tx.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Events for a single table.
#[derive(Debug)]
pub struct ChangeStream {
    table: String,
    rx: broadcast::Receiver<ChangeEvent>,
}

impl ChangeStream {
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Next event for this table, or `None` once the feed is gone.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.table == self.table => return Some(event),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(table = %self.table, skipped, "Change stream lagged");
                    return Some(ChangeEvent::resync(self.table.clone()));
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_stream_filters_by_table() {
        let feed = ChangeFeed::default();
        let mut orders = feed.subscribe("orders");

        feed.publish(ChangeEvent::insert("products", json!({"id": 1})));
        feed.publish(ChangeEvent::insert("orders", json!({"id": 2})));

        let event = orders.recv().await.unwrap();
        assert_eq!(event.table, "orders");
        assert_eq!(event.kind, ChangeKind::Insert);
        assert_eq!(event.new, Some(json!({"id": 2})));
    }

    #[tokio::test]
    async fn test_lagged_stream_yields_resync() {
        let feed = ChangeFeed::new(2);
        let mut orders = feed.subscribe("orders");
        for i in 0..5 {
            feed.publish(ChangeEvent::insert("orders", json!({ "id": i })));
        }
        let event = orders.recv().await.unwrap();
        assert_eq!(event.kind, ChangeKind::Resync);
    }

    #[tokio::test]
    async fn test_closed_feed_ends_stream() {
        let feed = ChangeFeed::default();
        let mut stream = feed.subscribe("orders");
        drop(feed);
        assert!(stream.recv().await.is_none());
    }

    #[test]
    fn test_drop_unsubscribes() {
        let feed = ChangeFeed::default();
        let stream = feed.subscribe("orders");
        assert_eq!(feed.subscriber_count(), 1);
        drop(stream);
        assert_eq!(feed.subscriber_count(), 0);
    }
}
