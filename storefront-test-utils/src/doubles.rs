//! Store doubles.
//!
//! Both wrap any [`RemoteStore`] and forward to it:
//! - [`CountingStore`] records every call so tests can assert "zero remote
//!   calls on a cache hit".
//! - [`FailingStore`] fails selected operations on demand.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use storefront_core::StoreError;
use storefront_storage::{ChangeStream, Filter, Query, RemoteStore, Row, RpcCall, StoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Select,
    Insert,
    Update,
    Rpc,
}

// ============================================================================
// COUNTING STORE
// ============================================================================

/// Records `(operation, table-or-procedure)` for every call.
#[derive(Debug)]
pub struct CountingStore<S> {
    inner: Arc<S>,
    calls: Mutex<Vec<(Operation, String)>>,
}

impl<S: RemoteStore> CountingStore<S> {
    pub fn new(inner: Arc<S>) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn inner(&self) -> &Arc<S> {
        &self.inner
    }

    fn record(&self, op: Operation, target: &str) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((op, target.to_string()));
        }
    }

    pub fn calls(&self) -> Vec<(Operation, String)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn total(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// Calls of `op` against `target`.
    pub fn count(&self, op: Operation, target: &str) -> usize {
        self.calls()
            .iter()
            .filter(|(o, t)| *o == op && t == target)
            .count()
    }

    pub fn reset(&self) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.clear();
        }
    }
}

#[async_trait]
impl<S: RemoteStore> RemoteStore for CountingStore<S> {
    async fn select(&self, query: &Query) -> StoreResult<Vec<Row>> {
        self.record(Operation::Select, &query.table);
        self.inner.select(query).await
    }

    async fn insert(&self, table: &str, rows: Vec<Row>) -> StoreResult<Vec<Row>> {
        self.record(Operation::Insert, table);
        self.inner.insert(table, rows).await
    }

    async fn update(&self, table: &str, patch: Row, filters: &[Filter]) -> StoreResult<Vec<Row>> {
        self.record(Operation::Update, table);
        self.inner.update(table, patch, filters).await
    }

    async fn rpc(&self, call: &RpcCall) -> StoreResult<Value> {
        self.record(Operation::Rpc, &call.name);
        self.inner.rpc(call).await
    }

    fn subscribe(&self, table: &str) -> ChangeStream {
        self.inner.subscribe(table)
    }
}

// ============================================================================
// FAILING STORE
// ============================================================================

#[derive(Debug, Clone)]
struct FailureRule {
    op: Operation,
    /// Table or procedure; `None` matches every target.
    target: Option<String>,
    error: StoreError,
    /// Remaining failures; `None` fails forever.
    remaining: Option<usize>,
}

/// Fails calls matching registered rules, forwards everything else.
#[derive(Debug)]
pub struct FailingStore<S> {
    inner: Arc<S>,
    rules: Mutex<Vec<FailureRule>>,
    failures: AtomicUsize,
}

impl<S: RemoteStore> FailingStore<S> {
    pub fn new(inner: Arc<S>) -> Self {
        Self {
            inner,
            rules: Mutex::new(Vec::new()),
            failures: AtomicUsize::new(0),
        }
    }

    pub fn inner(&self) -> &Arc<S> {
        &self.inner
    }

    /// Fail every `op` against `target` (or any target) with `error`.
    pub fn fail(&self, op: Operation, target: Option<&str>, error: StoreError) {
        self.push_rule(op, target, error, None);
    }

    /// Fail the next `times` matching calls, then recover.
    pub fn fail_times(&self, op: Operation, target: Option<&str>, error: StoreError, times: usize) {
        self.push_rule(op, target, error, Some(times));
    }

    fn push_rule(&self, op: Operation, target: Option<&str>, error: StoreError, remaining: Option<usize>) {
        if let Ok(mut rules) = self.rules.lock() {
            rules.push(FailureRule {
                op,
                target: target.map(str::to_string),
                error,
                remaining,
            });
        }
    }

    /// Remove every rule.
    pub fn heal(&self) {
        if let Ok(mut rules) = self.rules.lock() {
            rules.clear();
        }
    }

    /// How many calls were failed so far.
    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::Relaxed)
    }

    fn check(&self, op: Operation, target: &str) -> StoreResult<()> {
        let Ok(mut rules) = self.rules.lock() else {
            return Err(StoreError::LockPoisoned);
        };
        let hit = rules.iter_mut().find(|rule| {
            rule.op == op
                && rule.target.as_deref().map_or(true, |t| t == target)
                && rule.remaining != Some(0)
        });
        match hit {
            Some(rule) => {
                if let Some(remaining) = rule.remaining.as_mut() {
                    *remaining -= 1;
                }
                self.failures.fetch_add(1, Ordering::Relaxed);
                Err(rule.error.clone())
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl<S: RemoteStore> RemoteStore for FailingStore<S> {
    async fn select(&self, query: &Query) -> StoreResult<Vec<Row>> {
        self.check(Operation::Select, &query.table)?;
        self.inner.select(query).await
    }

    async fn insert(&self, table: &str, rows: Vec<Row>) -> StoreResult<Vec<Row>> {
        self.check(Operation::Insert, table)?;
        self.inner.insert(table, rows).await
    }

    async fn update(&self, table: &str, patch: Row, filters: &[Filter]) -> StoreResult<Vec<Row>> {
        self.check(Operation::Update, table)?;
        self.inner.update(table, patch, filters).await
    }

    async fn rpc(&self, call: &RpcCall) -> StoreResult<Value> {
        self.check(Operation::Rpc, &call.name)?;
        self.inner.rpc(call).await
    }

    fn subscribe(&self, table: &str) -> ChangeStream {
        self.inner.subscribe(table)
    }
}
