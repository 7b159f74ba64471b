//! Debounced order search.
//!
//! Keystrokes go into a `watch` channel. A background task waits until the
//! text has been quiet for the debounce period, then moves the orders view
//! back to page 1 with the new search term and fetches once.

use super::OrdersView;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub struct OrderSearch {
    text: watch::Sender<String>,
    debounce: Duration,
    task: JoinHandle<()>,
}

impl std::fmt::Debug for OrderSearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderSearch")
            .field("text", &*self.text.borrow())
            .field("debounce", &self.debounce)
            .finish_non_exhaustive()
    }
}

impl OrderSearch {
    pub fn spawn(view: Arc<OrdersView>, debounce: Duration) -> Self {
        let initial = view.query().search;
        let (text, rx) = watch::channel(initial);
        let task = tokio::spawn(debounce_loop(view, rx, debounce));
        Self {
            text,
            debounce,
            task,
        }
    }

    pub fn set_text(&self, text: impl Into<String>) {
        let text = text.into();
        self.text.send_if_modified(|current| {
            if *current == text {
                false
            } else {
                *current = text;
                true
            }
        });
    }

    pub fn text(&self) -> String {
        self.text.borrow().clone()
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }
}

impl Drop for OrderSearch {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn debounce_loop(view: Arc<OrdersView>, mut rx: watch::Receiver<String>, debounce: Duration) {
    while rx.changed().await.is_ok() {
        // Restart the quiet period on every keystroke.
        loop {
            tokio::select! {
                changed = rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
                _ = tokio::time::sleep(debounce) => break,
            }
        }

        let search = rx.borrow_and_update().clone();
        if view.query().search == search {
            continue;
        }
        tracing::debug!(search = %search, "Search settled");
        view.set_query(view.query().search(search).page(1));
        view.fetch().await;
    }
}
