//! In-memory remote store.
//!
//! Behaves like the hosted backend closely enough for the facade and the
//! views to run against it: unknown tables fail with `42P01`, views are
//! filtered projections of a source table, procedures are registered
//! closures over the table set, and every insert/update/delete is published
//! on the change feed.

use crate::change_feed::{ChangeEvent, ChangeFeed, ChangeStream};
use crate::remote::{Filter, FilterOp, Query, RemoteStore, Row, RpcCall, SortOrder, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::RegexBuilder;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, RwLock};
use storefront_core::{Clock, StoreError, SystemClock, Timestamp};
use uuid::Uuid;

/// A stored procedure: receives the tables, its JSON arguments and the
/// store's current time.
pub type Procedure =
    Arc<dyn Fn(&mut Tables, &Value, Timestamp) -> StoreResult<Value> + Send + Sync>;

#[derive(Debug, Clone)]
struct View {
    source: String,
    filters: Vec<Filter>,
}

/// The table set procedures operate on.
#[derive(Debug, Default)]
pub struct Tables {
    tables: HashMap<String, Vec<Row>>,
    views: HashMap<String, View>,
}

fn relation_missing(name: &str) -> StoreError {
    StoreError::remote("42P01", format!("relation \"{name}\" does not exist"))
}

impl Tables {
    pub fn create(&mut self, name: &str) {
        self.tables.entry(name.to_string()).or_default();
    }

    pub fn rows(&self, table: &str) -> StoreResult<&Vec<Row>> {
        self.tables.get(table).ok_or_else(|| relation_missing(table))
    }

    pub fn rows_mut(&mut self, table: &str) -> StoreResult<&mut Vec<Row>> {
        self.tables
            .get_mut(table)
            .ok_or_else(|| relation_missing(table))
    }

    /// Run a read against a table or view.
    pub fn select(&self, query: &Query) -> StoreResult<Vec<Row>> {
        let (source, view_filters) = match self.views.get(&query.table) {
            Some(view) => (view.source.as_str(), view.filters.as_slice()),
            None => (query.table.as_str(), &[][..]),
        };

        let mut rows: Vec<Row> = self
            .rows(source)?
            .iter()
            .filter(|row| matches_all(row, view_filters) && matches_all(row, &query.filters))
            .cloned()
            .collect();

        if !query.order.is_empty() {
            rows.sort_by(|a, b| compare_rows(a, b, &query.order));
        }
        if let Some(range) = query.range {
            rows = range.slice(&rows);
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        if let Some(columns) = &query.columns {
            rows = rows.iter().map(|row| project(row, columns)).collect();
        }
        Ok(rows)
    }
}

// ============================================================================
// ROW MATCHING
// ============================================================================

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Order two column values the way Postgres would for the types the
/// storefront uses. `None` when the values are not comparable (including
/// any comparison with null).
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => match (parse_timestamp(x), parse_timestamp(y)) {
            (Some(p), Some(q)) => Some(p.cmp(&q)),
            _ => Some(x.cmp(y)),
        },
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Number(x), Value::String(y)) => x.as_f64()?.partial_cmp(&y.parse::<f64>().ok()?),
        (Value::String(x), Value::Number(y)) => x.parse::<f64>().ok()?.partial_cmp(&y.as_f64()?),
        (Value::Bool(x), Value::String(y)) => Some(x.cmp(&y.parse::<bool>().ok()?)),
        _ => None,
    }
}

fn like(value: &Value, pattern: &Value, case_insensitive: bool) -> bool {
    let (Some(value), Some(pattern)) = (value.as_str(), pattern.as_str()) else {
        return false;
    };
    let mut re = String::from("^");
    for c in pattern.chars() {
        match c {
            '%' => re.push_str(".*"),
            '_' => re.push('.'),
            other => re.push_str(&regex::escape(&other.to_string())),
        }
    }
    re.push('$');
    RegexBuilder::new(&re)
        .case_insensitive(case_insensitive)
        .build()
        .map(|re| re.is_match(value))
        .unwrap_or(false)
}

pub fn matches_filter(row: &Row, filter: &Filter) -> bool {
    let value = row.get(&filter.column).unwrap_or(&Value::Null);
    let ord = || compare_values(value, &filter.value);
    match filter.op {
        FilterOp::Eq => value == &filter.value || ord() == Some(Ordering::Equal),
        FilterOp::Neq => !value.is_null() && value != &filter.value && ord() != Some(Ordering::Equal),
        FilterOp::Gt => ord() == Some(Ordering::Greater),
        FilterOp::Gte => matches!(ord(), Some(Ordering::Greater | Ordering::Equal)),
        FilterOp::Lt => ord() == Some(Ordering::Less),
        FilterOp::Lte => matches!(ord(), Some(Ordering::Less | Ordering::Equal)),
        FilterOp::Like => like(value, &filter.value, false),
        FilterOp::ILike => like(value, &filter.value, true),
        FilterOp::NotNull => !value.is_null(),
    }
}

fn matches_all(row: &Row, filters: &[Filter]) -> bool {
    filters.iter().all(|f| matches_filter(row, f))
}

/// Nulls sort last in either direction.
fn compare_rows(a: &Row, b: &Row, order: &[SortOrder]) -> Ordering {
    for sort in order {
        let x = a.get(&sort.column).unwrap_or(&Value::Null);
        let y = b.get(&sort.column).unwrap_or(&Value::Null);
        let ord = match (x.is_null(), y.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => return Ordering::Greater,
            (false, true) => return Ordering::Less,
            (false, false) => compare_values(x, y).unwrap_or(Ordering::Equal),
        };
        let ord = if sort.ascending { ord } else { ord.reverse() };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn project(row: &Row, columns: &str) -> Row {
    let wanted: Vec<&str> = columns.split(',').map(str::trim).collect();
    if wanted.contains(&"*") {
        return row.clone();
    }
    let mut out = Map::new();
    if let Some(obj) = row.as_object() {
        for column in wanted {
            if let Some(v) = obj.get(column) {
                out.insert(column.to_string(), v.clone());
            }
        }
    }
    Value::Object(out)
}

// ============================================================================
// STORE
// ============================================================================

pub struct InMemoryStore {
    tables: Mutex<Tables>,
    procedures: RwLock<HashMap<String, Procedure>>,
    feed: ChangeFeed,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let procedures: Vec<String> = self
            .procedures
            .read()
            .map(|p| p.keys().cloned().collect())
            .unwrap_or_default();
        f.debug_struct("InMemoryStore")
            .field("procedures", &procedures)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            procedures: RwLock::new(HashMap::new()),
            feed: ChangeFeed::default(),
            clock,
        }
    }

    fn lock(&self) -> StoreResult<std::sync::MutexGuard<'_, Tables>> {
        self.tables.lock().map_err(|_| StoreError::LockPoisoned)
    }

    pub fn create_table(&self, name: &str) -> StoreResult<()> {
        self.lock()?.create(name);
        Ok(())
    }

    /// Register a read-only view over `source` restricted by `filters`.
    pub fn create_view(&self, name: &str, source: &str, filters: Vec<Filter>) -> StoreResult<()> {
        self.lock()?.views.insert(
            name.to_string(),
            View {
                source: source.to_string(),
                filters,
            },
        );
        Ok(())
    }

    pub fn register_procedure<F>(&self, name: &str, procedure: F) -> StoreResult<()>
    where
        F: Fn(&mut Tables, &Value, Timestamp) -> StoreResult<Value> + Send + Sync + 'static,
    {
        self.procedures
            .write()
            .map_err(|_| StoreError::LockPoisoned)?
            .insert(name.to_string(), Arc::new(procedure));
        Ok(())
    }

    /// Load rows as-is, without publishing change events.
    pub fn seed(&self, table: &str, rows: Vec<Row>) -> StoreResult<()> {
        let mut tables = self.lock()?;
        tables.create(table);
        tables.rows_mut(table)?.extend(rows);
        Ok(())
    }

    /// Snapshot of a table.
    pub fn rows(&self, table: &str) -> StoreResult<Vec<Row>> {
        Ok(self.lock()?.rows(table)?.clone())
    }

    /// Remove matching rows and publish a delete event for each.
    pub fn delete(&self, table: &str, filters: &[Filter]) -> StoreResult<Vec<Row>> {
        let removed: Vec<Row> = {
            let mut tables = self.lock()?;
            let rows = tables.rows_mut(table)?;
            let (removed, kept): (Vec<Row>, Vec<Row>) =
                rows.drain(..).partition(|row| matches_all(row, filters));
            *rows = kept;
            removed
        };
        for row in &removed {
            self.feed.publish(ChangeEvent::delete(table, row.clone()));
        }
        Ok(removed)
    }

    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    fn now_value(&self) -> Value {
        Value::String(
            self.clock
                .now()
                .to_rfc3339_opts(chrono::SecondsFormat::Micros, true),
        )
    }
}

fn as_object(row: Row) -> StoreResult<Map<String, Value>> {
    match row {
        Value::Object(obj) => Ok(obj),
        other => Err(StoreError::Decode {
            reason: format!("row must be a JSON object, got {other}"),
        }),
    }
}

#[async_trait]
impl RemoteStore for InMemoryStore {
    async fn select(&self, query: &Query) -> StoreResult<Vec<Row>> {
        self.lock()?.select(query)
    }

    async fn insert(&self, table: &str, rows: Vec<Row>) -> StoreResult<Vec<Row>> {
        let now = self.now_value();
        let mut prepared = Vec::with_capacity(rows.len());
        for row in rows {
            let mut obj = as_object(row)?;
            if obj.get("id").map_or(true, Value::is_null) {
                obj.insert("id".to_string(), Value::String(Uuid::now_v7().to_string()));
            }
            obj.entry("created_at").or_insert_with(|| now.clone());
            obj.entry("updated_at").or_insert_with(|| now.clone());
            prepared.push(Value::Object(obj));
        }

        self.lock()?.rows_mut(table)?.extend(prepared.iter().cloned());

        for row in &prepared {
            self.feed.publish(ChangeEvent::insert(table, row.clone()));
        }
        Ok(prepared)
    }

    async fn update(&self, table: &str, patch: Row, filters: &[Filter]) -> StoreResult<Vec<Row>> {
        let patch = as_object(patch)?;
        let now = self.now_value();

        let changes: Vec<(Row, Row)> = {
            let mut tables = self.lock()?;
            let mut changes = Vec::new();
            for row in tables.rows_mut(table)?.iter_mut() {
                if !matches_all(row, filters) {
                    continue;
                }
                let old = row.clone();
                if let Some(obj) = row.as_object_mut() {
                    for (k, v) in &patch {
                        obj.insert(k.clone(), v.clone());
                    }
                    obj.insert("updated_at".to_string(), now.clone());
                }
                changes.push((old, row.clone()));
            }
            changes
        };

        let mut updated = Vec::with_capacity(changes.len());
        for (old, new) in changes {
            self.feed
                .publish(ChangeEvent::update(table, old, new.clone()));
            updated.push(new);
        }
        Ok(updated)
    }

    async fn rpc(&self, call: &RpcCall) -> StoreResult<Value> {
        let procedure = self
            .procedures
            .read()
            .map_err(|_| StoreError::LockPoisoned)?
            .get(&call.name)
            .cloned()
            .ok_or_else(|| StoreError::ProcedureNotFound {
                name: call.name.clone(),
            })?;

        let now = self.clock.now();
        let result = {
            let mut tables = self.lock()?;
            procedure(&mut tables, &call.args, now)?
        };

        Ok(match (result, call.range) {
            (Value::Array(items), Some(range)) => Value::Array(range.slice(&items)),
            (other, _) => other,
        })
    }

    fn subscribe(&self, table: &str) -> ChangeStream {
        self.feed.subscribe(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change_feed::ChangeKind;
    use crate::remote::RowRange;
    use serde_json::json;

    fn store() -> InMemoryStore {
        let store = InMemoryStore::new();
        store.create_table("products").unwrap();
        store
            .create_view("active_products", "products", vec![Filter::eq("is_active", true)])
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_insert_assigns_id_and_timestamps() {
        let store = store();
        let rows = store
            .insert("products", vec![json!({"name": "Serum", "is_active": true})])
            .await
            .unwrap();
        let row = &rows[0];
        assert!(row["id"].as_str().is_some());
        assert!(row["created_at"].as_str().is_some());
        assert_eq!(store.rows("products").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_table_is_42p01() {
        let store = store();
        let err = store.select(&Query::table("nope")).await.unwrap_err();
        assert_eq!(err.code(), Some("42P01"));
        let err = store.insert("nope", vec![json!({})]).await.unwrap_err();
        assert_eq!(err.code(), Some("42P01"));
    }

    #[tokio::test]
    async fn test_view_filters_source() {
        let store = store();
        store
            .seed(
                "products",
                vec![
                    json!({"id": "a", "is_active": true}),
                    json!({"id": "b", "is_active": false}),
                ],
            )
            .unwrap();
        let rows = store.select(&Query::table("active_products")).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], "a");
    }

    #[tokio::test]
    async fn test_order_range_and_projection() {
        let store = store();
        store
            .seed(
                "products",
                vec![
                    json!({"id": "a", "price": 10, "created_at": "2026-01-01T00:00:00Z"}),
                    json!({"id": "b", "price": 20, "created_at": "2026-03-01T00:00:00Z"}),
                    json!({"id": "c", "price": 30, "created_at": "2026-02-01T00:00:00Z"}),
                ],
            )
            .unwrap();
        let rows = store
            .select(
                &Query::table("products")
                    .select("id, price")
                    .order_desc("created_at")
                    .range(RowRange { from: 0, to: 1 }),
            )
            .await
            .unwrap();
        assert_eq!(rows, vec![json!({"id": "b", "price": 20}), json!({"id": "c", "price": 30})]);
    }

    #[tokio::test]
    async fn test_timestamp_comparison_filters() {
        let store = store();
        store
            .seed(
                "products",
                vec![
                    json!({"id": "old", "created_at": "2026-01-01T00:00:00Z"}),
                    json!({"id": "new", "created_at": "2026-01-01T02:00:00+01:00"}),
                ],
            )
            .unwrap();
        let rows = store
            .select(&Query::table("products").gte("created_at", "2026-01-01T00:30:00Z"))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], "new");
    }

    #[test]
    fn test_like_patterns() {
        let row = json!({"name": "Mona Ahmed"});
        assert!(matches_filter(&row, &Filter::new("name", FilterOp::ILike, "%mona%")));
        assert!(!matches_filter(&row, &Filter::new("name", FilterOp::Like, "%mona%")));
        assert!(matches_filter(&row, &Filter::new("name", FilterOp::Like, "Mona _hmed")));
        assert!(!matches_filter(&json!({}), &Filter::new("name", FilterOp::ILike, "%")));
    }

    #[test]
    fn test_not_null_and_neq() {
        let row = json!({"notes": null, "status": "جديد"});
        assert!(!matches_filter(&row, &Filter::new("notes", FilterOp::NotNull, Value::Null)));
        assert!(matches_filter(&row, &Filter::new("status", FilterOp::NotNull, Value::Null)));
        assert!(matches_filter(&row, &Filter::new("status", FilterOp::Neq, "ملغي")));
        assert!(!matches_filter(&row, &Filter::new("notes", FilterOp::Neq, "x")));
    }

    #[tokio::test]
    async fn test_update_merges_and_publishes() {
        let store = store();
        store
            .seed("products", vec![json!({"id": "a", "price": 10})])
            .unwrap();
        let mut stream = store.subscribe("products");

        let updated = store
            .update("products", json!({"price": 15}), &[Filter::eq("id", "a")])
            .await
            .unwrap();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0]["price"], 15);

        let event = stream.recv().await.unwrap();
        assert_eq!(event.kind, ChangeKind::Update);
        assert_eq!(event.old.unwrap()["price"], 10);
    }

    #[tokio::test]
    async fn test_delete_publishes() {
        let store = store();
        store
            .seed("products", vec![json!({"id": "a"}), json!({"id": "b"})])
            .unwrap();
        let mut stream = store.subscribe("products");
        let removed = store.delete("products", &[Filter::eq("id", "a")]).unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(store.rows("products").unwrap().len(), 1);
        assert_eq!(stream.recv().await.unwrap().kind, ChangeKind::Delete);
    }

    #[tokio::test]
    async fn test_rpc_dispatch_and_range() {
        let store = store();
        store
            .register_procedure("numbers", |_, args, _| {
                let n = args["n"].as_u64().unwrap_or(0);
                Ok(Value::Array((0..n).map(Value::from).collect()))
            })
            .unwrap();
        let result = store
            .rpc(&RpcCall::new("numbers", json!({"n": 10})).with_range(RowRange::page(2, 3)))
            .await
            .unwrap();
        assert_eq!(result, json!([3, 4, 5]));

        let err = store.rpc(&RpcCall::new("missing", json!({}))).await.unwrap_err();
        assert!(matches!(err, StoreError::ProcedureNotFound { .. }));
    }
}
