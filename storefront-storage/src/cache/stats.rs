//! Cache statistics.

use serde::Serialize;

/// Point-in-time view of a cache, for debugging and the admin dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Number of entries currently stored (expired ones included until read).
    pub size: usize,
    /// Rendered keys, sorted.
    pub keys: Vec<String>,
    pub hits: u64,
    pub misses: u64,
    /// Entries dropped because they had expired.
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
