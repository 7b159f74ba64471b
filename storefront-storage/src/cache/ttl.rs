//! TTL cache implementation.

use super::key::{CacheKey, Namespace};
use super::stats::CacheStats;
use dashmap::DashMap;
use regex::Regex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use storefront_core::{Clock, SystemClock, Timestamp};

/// One cached value.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub stored_at: Timestamp,
    pub ttl: Duration,
}

impl<V> CacheEntry<V> {
    /// Valid iff `now - stored_at <= ttl`. An entry stored "in the future"
    /// (clock moved backwards) counts as fresh.
    pub fn is_valid(&self, now: Timestamp) -> bool {
        match (now - self.stored_at).to_std() {
            Ok(age) => age <= self.ttl,
            Err(_) => true,
        }
    }
}

/// Namespaced TTL cache.
///
/// Each namespace is its own `DashMap` slot, so invalidating a namespace is
/// a single removal and never touches unrelated entries. All operations are
/// synchronous and never fail.
#[derive(Debug)]
pub struct TtlCache<V> {
    entries: DashMap<Namespace, HashMap<String, CacheEntry<V>>>,
    default_ttl: Duration,
    clock: Arc<dyn Clock>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(default_ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            default_ttl,
            clock,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Cache on the system clock.
    pub fn with_default_ttl(default_ttl: Duration) -> Self {
        Self::new(default_ttl, Arc::new(SystemClock))
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Store with the default TTL, replacing any previous value.
    pub fn set(&self, key: &CacheKey, value: V) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    pub fn set_with_ttl(&self, key: &CacheKey, value: V, ttl: Duration) {
        let entry = CacheEntry {
            value,
            stored_at: self.clock.now(),
            ttl,
        };
        self.entries
            .entry(key.namespace().clone())
            .or_default()
            .insert(key.params().to_string(), entry);
        tracing::trace!(key = %key.fingerprint(), ttl_secs = ttl.as_secs(), "Cache set");
    }

    /// Value if present and unexpired. Expired entries are removed here.
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        let now = self.clock.now();

        if let Some(mut slot) = self.entries.get_mut(key.namespace()) {
            let fresh = slot.get(key.params()).map(|e| e.is_valid(now));
            match fresh {
                Some(true) => {
                    let value = slot.get(key.params()).map(|e| e.value.clone());
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return value;
                }
                Some(false) => {
                    slot.remove(key.params());
                    self.evictions.fetch_add(1, Ordering::Relaxed);
                    tracing::trace!(key = %key.fingerprint(), "Cache entry expired");
                }
                None => {}
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Remove one entry. No-op if absent.
    pub fn invalidate(&self, key: &CacheKey) {
        if let Some(mut slot) = self.entries.get_mut(key.namespace()) {
            slot.remove(key.params());
        }
    }

    /// Remove every entry in a namespace. Returns how many were removed.
    pub fn invalidate_namespace(&self, namespace: &Namespace) -> usize {
        let removed = self
            .entries
            .remove(namespace)
            .map(|(_, slot)| slot.len())
            .unwrap_or(0);
        if removed > 0 {
            tracing::debug!(namespace = %namespace, removed, "Cache namespace invalidated");
        }
        removed
    }

    /// Remove every entry whose rendered key matches `pattern`.
    pub fn invalidate_pattern(&self, pattern: &Regex) -> usize {
        let mut removed = 0;
        for mut slot in self.entries.iter_mut() {
            let namespace = slot.key().clone();
            let before = slot.len();
            slot.retain(|params, _| {
                !pattern.is_match(&CacheKey::raw(namespace.clone(), params.as_str()).render())
            });
            removed += before - slot.len();
        }
        self.entries.retain(|_, slot| !slot.is_empty());
        if removed > 0 {
            tracing::debug!(pattern = %pattern, removed, "Cache entries invalidated by pattern");
        }
        removed
    }

    /// Remove all entries.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Remove all entries and zero the counters.
    pub fn reset(&self) {
        self.clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
    }

    pub fn len(&self) -> usize {
        self.entries.iter().map(|slot| slot.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .flat_map(|slot| {
                let namespace = slot.key().clone();
                slot.value()
                    .keys()
                    .map(|params| CacheKey::raw(namespace.clone(), params.as_str()).render())
                    .collect::<Vec<_>>()
            })
            .collect();
        keys.sort();

        CacheStats {
            size: keys.len(),
            keys,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}
