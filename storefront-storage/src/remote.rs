//! The remote store interface.
//!
//! [`RemoteStore`] is the seam between the storefront and its hosted
//! backend: table reads with filters/ordering/ranges, inserts, updates,
//! remote procedure calls, and change subscriptions. Rows travel as JSON
//! objects; typed callers decode them with [`decode_rows`].

use crate::change_feed::ChangeStream;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use storefront_core::StoreError;

/// A row as returned by the store: a JSON object keyed by column.
pub type Row = Value;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

// ============================================================================
// QUERY MODEL
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    ILike,
    NotNull,
}

impl FilterOp {
    /// PostgREST operator name.
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::Neq => "neq",
            FilterOp::Gt => "gt",
            FilterOp::Gte => "gte",
            FilterOp::Lt => "lt",
            FilterOp::Lte => "lte",
            FilterOp::Like => "like",
            FilterOp::ILike => "ilike",
            FilterOp::NotNull => "not.is",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn new(column: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, FilterOp::Eq, value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOrder {
    pub column: String,
    pub ascending: bool,
}

/// Inclusive row range `[from, to]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowRange {
    pub from: usize,
    pub to: usize,
}

impl RowRange {
    /// Range for a 1-based page.
    pub fn page(page: usize, page_size: usize) -> Self {
        let page = page.max(1);
        let size = page_size.max(1);
        Self {
            from: (page - 1) * size,
            to: page * size - 1,
        }
    }

    pub fn len(&self) -> usize {
        self.to.saturating_sub(self.from) + 1
    }

    pub fn is_empty(&self) -> bool {
        self.to < self.from
    }

    /// Apply to an in-memory list.
    pub fn slice<T: Clone>(&self, items: &[T]) -> Vec<T> {
        if self.from >= items.len() || self.is_empty() {
            return Vec::new();
        }
        let end = (self.to + 1).min(items.len());
        items[self.from..end].to_vec()
    }
}

/// A table read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub table: String,
    /// Comma-separated projection; `None` selects every column.
    pub columns: Option<String>,
    pub filters: Vec<Filter>,
    pub order: Vec<SortOrder>,
    pub range: Option<RowRange>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: None,
            filters: Vec::new(),
            order: Vec::new(),
            range: None,
            limit: None,
        }
    }

    pub fn select(mut self, columns: impl Into<String>) -> Self {
        self.columns = Some(columns.into());
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Filter::new(column, FilterOp::Eq, value))
    }

    pub fn gte(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Filter::new(column, FilterOp::Gte, value))
    }

    pub fn lt(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Filter::new(column, FilterOp::Lt, value))
    }

    pub fn ilike(self, column: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.filter(Filter::new(column, FilterOp::ILike, pattern.into()))
    }

    pub fn not_null(self, column: impl Into<String>) -> Self {
        self.filter(Filter::new(column, FilterOp::NotNull, Value::Null))
    }

    pub fn order_by(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.order.push(SortOrder {
            column: column.into(),
            ascending,
        });
        self
    }

    pub fn order_desc(self, column: impl Into<String>) -> Self {
        self.order_by(column, false)
    }

    pub fn range(mut self, range: RowRange) -> Self {
        self.range = Some(range);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// A remote procedure invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcCall {
    pub name: String,
    pub args: Value,
    /// Row range applied to a set-returning procedure.
    pub range: Option<RowRange>,
}

impl RpcCall {
    pub fn new(name: impl Into<String>, args: Value) -> Self {
        Self {
            name: name.into(),
            args,
            range: None,
        }
    }

    pub fn with_range(mut self, range: RowRange) -> Self {
        self.range = Some(range);
        self
    }
}

// ============================================================================
// STORE TRAIT
// ============================================================================

/// Hosted backend as seen by the storefront.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn select(&self, query: &Query) -> StoreResult<Vec<Row>>;

    /// Insert rows; returns them as stored (with generated ids/timestamps).
    async fn insert(&self, table: &str, rows: Vec<Row>) -> StoreResult<Vec<Row>>;

    /// Merge `patch` into every row matching all `filters`; returns the
    /// updated rows.
    async fn update(&self, table: &str, patch: Row, filters: &[Filter]) -> StoreResult<Vec<Row>>;

    async fn rpc(&self, call: &RpcCall) -> StoreResult<Value>;

    /// Subscribe to change notifications for `table`.
    fn subscribe(&self, table: &str) -> ChangeStream;
}

// ============================================================================
// ROW CODEC
// ============================================================================

pub fn decode_row<T: DeserializeOwned>(row: Row) -> StoreResult<T> {
    serde_json::from_value(row).map_err(|e| StoreError::Decode {
        reason: e.to_string(),
    })
}

pub fn decode_rows<T: DeserializeOwned>(rows: Vec<Row>) -> StoreResult<Vec<T>> {
    rows.into_iter().map(decode_row).collect()
}

pub fn encode_row<T: Serialize>(value: &T) -> StoreResult<Row> {
    serde_json::to_value(value).map_err(|e| StoreError::Decode {
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_page_range() {
        assert_eq!(RowRange::page(1, 50), RowRange { from: 0, to: 49 });
        assert_eq!(RowRange::page(3, 20), RowRange { from: 40, to: 59 });
        assert_eq!(RowRange::page(0, 10), RowRange { from: 0, to: 9 });
        assert_eq!(RowRange::page(2, 25).len(), 25);
    }

    #[test]
    fn test_range_slice() {
        let items: Vec<u32> = (0..10).collect();
        assert_eq!(RowRange { from: 2, to: 4 }.slice(&items), vec![2, 3, 4]);
        assert_eq!(RowRange { from: 8, to: 20 }.slice(&items), vec![8, 9]);
        assert!(RowRange { from: 10, to: 12 }.slice(&items).is_empty());
    }

    #[test]
    fn test_query_builder() {
        let query = Query::table("rate_limits")
            .eq("ip_address", "1.2.3.4")
            .gte("window_start", "2026-01-01T00:00:00Z")
            .order_desc("window_start")
            .limit(1);
        assert_eq!(query.filters.len(), 2);
        assert_eq!(query.filters[1].op, FilterOp::Gte);
        assert!(!query.order[0].ascending);
        assert_eq!(query.limit, Some(1));
    }

    #[test]
    fn test_decode_error_maps_to_store_error() {
        #[derive(Debug, Deserialize)]
        struct Named {
            #[allow(dead_code)]
            name: String,
        }
        let err = decode_row::<Named>(json!({"id": 1})).unwrap_err();
        assert!(matches!(err, StoreError::Decode { .. }));
    }
}
