//! Product image link sweep.
//!
//! Probes every image URL on every product and rewrites products whose
//! image list lost entries. Probes run with bounded concurrency, and a probe
//! that timed out is tried again before the image is given up on.

use crate::constants::TABLE_PRODUCTS;
use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use storefront_core::{StoreError, SweepPolicy};
use storefront_storage::{Filter, Query, RemoteStore, StoreResult};

// ============================================================================
// PROBES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProbeOutcome {
    Reachable,
    /// Definite failure (non-2xx status, refused connection, bad URL).
    Unreachable,
    TimedOut,
}

#[async_trait]
pub trait LinkProbe: Send + Sync {
    async fn probe(&self, url: &str) -> ProbeOutcome;
}

/// Issues `HEAD` requests.
#[derive(Debug, Clone)]
pub struct HttpLinkProbe {
    client: reqwest::Client,
}

impl HttpLinkProbe {
    pub fn new(timeout: Duration) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Network {
                message: e.to_string(),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl LinkProbe for HttpLinkProbe {
    async fn probe(&self, url: &str) -> ProbeOutcome {
        match self.client.head(url).send().await {
            Ok(resp) if resp.status().is_success() => ProbeOutcome::Reachable,
            Ok(resp) => {
                tracing::debug!(url, status = resp.status().as_u16(), "Image probe failed");
                ProbeOutcome::Unreachable
            }
            Err(e) if e.is_timeout() => ProbeOutcome::TimedOut,
            Err(e) => {
                tracing::debug!(url, error = %e, "Image probe failed");
                ProbeOutcome::Unreachable
            }
        }
    }
}

/// Probe `url`, retrying according to `policy`. `true` keeps the image.
pub async fn probe_with_retry(probe: &dyn LinkProbe, url: &str, policy: &SweepPolicy) -> bool {
    let mut timeouts = 0u32;
    let mut failures = 0u32;
    loop {
        let outcome = match tokio::time::timeout(policy.probe_timeout, probe.probe(url)).await {
            Ok(outcome) => outcome,
            Err(_) => ProbeOutcome::TimedOut,
        };
        match outcome {
            ProbeOutcome::Reachable => return true,
            ProbeOutcome::TimedOut if timeouts < policy.timeout_retries => timeouts += 1,
            ProbeOutcome::Unreachable if failures < policy.failure_retries => failures += 1,
            ProbeOutcome::TimedOut | ProbeOutcome::Unreachable => {
                tracing::debug!(url, ?outcome, timeouts, failures, "Dropping image");
                return false;
            }
        }
    }
}

// ============================================================================
// SWEEP
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SweepReport {
    pub products_modified: usize,
    pub images_checked: usize,
    pub images_removed: usize,
    /// Products whose rewrite failed; their images are left as they were.
    pub update_failures: usize,
    pub elapsed_ms: f64,
}

struct ProductImages {
    id: Value,
    images: Vec<String>,
}

fn image_list(row: &Value) -> Vec<String> {
    row.get("images")
        .and_then(Value::as_array)
        .map(|images| {
            images
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Run the sweep against `store`. `elapsed_ms` is left at zero for the
/// caller to fill in.
///
/// Only the initial product read can fail the sweep. A failed rewrite is
/// logged, counted in `update_failures` and skipped.
pub async fn sweep_images(
    store: &dyn RemoteStore,
    probe: &dyn LinkProbe,
    policy: &SweepPolicy,
) -> StoreResult<SweepReport> {
    let query = Query::table(TABLE_PRODUCTS)
        .select("id, images")
        .not_null("images");
    let products: Vec<ProductImages> = store
        .select(&query)
        .await?
        .into_iter()
        .filter_map(|row| {
            let images = image_list(&row);
            let id = row.get("id").cloned()?;
            (!images.is_empty()).then_some(ProductImages { id, images })
        })
        .collect();

    let jobs: Vec<(usize, usize, &str)> = products
        .iter()
        .enumerate()
        .flat_map(|(p, product)| {
            product
                .images
                .iter()
                .enumerate()
                .map(move |(i, url)| (p, i, url.as_str()))
        })
        .collect();
    let images_checked = jobs.len();

    let results: Vec<(usize, usize, bool)> = stream::iter(jobs)
        .map(|(p, i, url)| async move { (p, i, probe_with_retry(probe, url, policy).await) })
        .buffer_unordered(policy.max_concurrency.max(1))
        .collect()
        .await;

    let mut keep: BTreeMap<usize, BTreeMap<usize, bool>> = BTreeMap::new();
    for (p, i, ok) in results {
        keep.entry(p).or_default().insert(i, ok);
    }

    let mut report = SweepReport {
        images_checked,
        ..SweepReport::default()
    };

    for (p, product) in products.iter().enumerate() {
        let verdicts = keep.get(&p);
        let surviving: Vec<&String> = product
            .images
            .iter()
            .enumerate()
            .filter(|(i, _)| verdicts.and_then(|v| v.get(i)).copied().unwrap_or(false))
            .map(|(_, url)| url)
            .collect();

        if surviving.len() == product.images.len() {
            continue;
        }

        let updated = store
            .update(
                TABLE_PRODUCTS,
                json!({ "images": surviving }),
                &[Filter::eq("id", product.id.clone())],
            )
            .await;
        if let Err(e) = updated {
            tracing::warn!(
                product_id = %product.id,
                error = %e,
                "Failed to rewrite product images, continuing"
            );
            report.update_failures += 1;
            continue;
        }
        report.products_modified += 1;
        report.images_removed += product.images.len() - surviving.len();
        tracing::info!(
            product_id = %product.id,
            removed = product.images.len() - surviving.len(),
            "Removed broken product images"
        );
    }

    Ok(report)
}
