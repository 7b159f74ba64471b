//! PostgREST client.
//!
//! Maps [`RemoteStore`] onto the hosted backend's REST surface:
//!
//! - `GET  /rest/v1/{table}?select=..&{col}={op}.{value}&order={col}.desc`
//! - `POST /rest/v1/{table}` (insert, `Prefer: return=representation`)
//! - `PATCH /rest/v1/{table}?{filters}` (update, `Prefer: return=representation`)
//! - `POST /rest/v1/rpc/{name}`
//!
//! Row ranges travel in the `Range` header. Error bodies of the form
//! `{code, message, details, hint}` become [`StoreError::Remote`].
//!
//! Change notifications are published on a local [`ChangeFeed`] for this
//! client's own writes; the realtime socket is not part of this crate.

use crate::change_feed::{ChangeEvent, ChangeFeed, ChangeStream};
use crate::remote::{Filter, FilterOp, Query, RemoteStore, Row, RowRange, RpcCall, StoreResult};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use storefront_core::StoreError;

const REST_PREFIX: &str = "/rest/v1";

/// Connection settings.
#[derive(Debug, Clone)]
pub struct RestConfig {
    /// Project URL, e.g. `https://abc.supabase.co`.
    pub base_url: String,
    /// Anonymous API key, sent as `apikey` and bearer token.
    pub api_key: String,
    pub timeout: Duration,
}

/// Error body returned by PostgREST.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
    hint: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RestStore {
    http: Client,
    base_url: String,
    api_key: String,
    feed: ChangeFeed,
}

impl RestStore {
    pub fn new(config: RestConfig) -> StoreResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StoreError::Network {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
            feed: ChangeFeed::default(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}/{}", self.base_url, REST_PREFIX, path)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn send(&self, builder: RequestBuilder, context: &str) -> StoreResult<Value> {
        let response = builder.send().await.map_err(|e| StoreError::Network {
            message: e.to_string(),
        })?;
        let status = response.status();
        let body = response.text().await.map_err(|e| StoreError::Network {
            message: e.to_string(),
        })?;

        if !status.is_success() {
            return Err(error_from_body(status, &body, context));
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| StoreError::Decode {
            reason: e.to_string(),
        })
    }

    fn publish_all(&self, table: &str, rows: &[Row], make: impl Fn(&str, Row) -> ChangeEvent) {
        for row in rows {
            self.feed.publish(make(table, row.clone()));
        }
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Query-string pairs for a filter list.
pub fn filter_params(filters: &[Filter]) -> Vec<(String, String)> {
    filters
        .iter()
        .map(|f| {
            let rhs = match f.op {
                FilterOp::NotNull => "not.is.null".to_string(),
                op => format!("{}.{}", op.as_str(), render_value(&f.value)),
            };
            (f.column.clone(), rhs)
        })
        .collect()
}

/// Query-string pairs for a read.
pub fn query_params(query: &Query) -> Vec<(String, String)> {
    let mut params = vec![(
        "select".to_string(),
        query
            .columns
            .as_deref()
            .map(|c| c.split(',').map(str::trim).collect::<Vec<_>>().join(","))
            .unwrap_or_else(|| "*".to_string()),
    )];
    params.extend(filter_params(&query.filters));
    if !query.order.is_empty() {
        let order = query
            .order
            .iter()
            .map(|o| format!("{}.{}", o.column, if o.ascending { "asc" } else { "desc" }))
            .collect::<Vec<_>>()
            .join(",");
        params.push(("order".to_string(), order));
    }
    if let Some(limit) = query.limit {
        params.push(("limit".to_string(), limit.to_string()));
    }
    params
}

fn range_header(range: RowRange) -> String {
    format!("{}-{}", range.from, range.to)
}

fn error_from_body(status: StatusCode, body: &str, context: &str) -> StoreError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => {
            let code = parsed.code.unwrap_or_else(|| status.as_u16().to_string());
            if code == "PGRST202" {
                return StoreError::ProcedureNotFound {
                    name: context.to_string(),
                };
            }
            let details = match (parsed.details, parsed.hint) {
                (Some(d), Some(h)) => Some(format!("{d} (hint: {h})")),
                (d, h) => d.or(h),
            };
            StoreError::Remote {
                code,
                message: parsed.message.unwrap_or_else(|| status.to_string()),
                details,
            }
        }
        Err(_) => StoreError::Remote {
            code: status.as_u16().to_string(),
            message: if body.is_empty() {
                status.to_string()
            } else {
                body.to_string()
            },
            details: None,
        },
    }
}

fn into_rows(value: Value) -> Vec<Row> {
    match value {
        Value::Array(rows) => rows,
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

#[async_trait]
impl RemoteStore for RestStore {
    async fn select(&self, query: &Query) -> StoreResult<Vec<Row>> {
        let mut builder = self
            .authorized(self.http.get(self.url(&query.table)))
            .query(&query_params(query));
        if let Some(range) = query.range {
            builder = builder
                .header("Range-Unit", "items")
                .header("Range", range_header(range));
        }
        let value = self.send(builder, &query.table).await?;
        Ok(into_rows(value))
    }

    async fn insert(&self, table: &str, rows: Vec<Row>) -> StoreResult<Vec<Row>> {
        let builder = self
            .authorized(self.http.post(self.url(table)))
            .header("Prefer", "return=representation")
            .json(&rows);
        let inserted = into_rows(self.send(builder, table).await?);
        self.publish_all(table, &inserted, |t, row| ChangeEvent::insert(t, row));
        Ok(inserted)
    }

    async fn update(&self, table: &str, patch: Row, filters: &[Filter]) -> StoreResult<Vec<Row>> {
        let builder = self
            .authorized(self.http.patch(self.url(table)))
            .query(&filter_params(filters))
            .header("Prefer", "return=representation")
            .json(&patch);
        let updated = into_rows(self.send(builder, table).await?);
        // The old row is not returned by PATCH; the event carries the patch.
        self.publish_all(table, &updated, |t, row| {
            ChangeEvent::update(t, patch.clone(), row)
        });
        Ok(updated)
    }

    async fn rpc(&self, call: &RpcCall) -> StoreResult<Value> {
        let mut builder = self
            .authorized(self.http.post(self.url(&format!("rpc/{}", call.name))))
            .json(&call.args);
        if let Some(range) = call.range {
            builder = builder
                .header("Range-Unit", "items")
                .header("Range", range_header(range));
        }
        self.send(builder, &call.name).await
    }

    fn subscribe(&self, table: &str) -> ChangeStream {
        self.feed.subscribe(table)
    }
}
