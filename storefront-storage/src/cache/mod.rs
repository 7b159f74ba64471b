//! In-process query cache.
//!
//! Entries live under a [`Namespace`] and are addressed by the canonical
//! rendering of the query parameters that produced them. A stale entry is
//! never served: validity is checked on every read against the injected
//! clock, and expired entries are dropped on the spot.
//!
//! ```ignore
//! let cache: TtlCache<Value> = TtlCache::new(Duration::from_secs(300), clock);
//! let key = CacheKey::new(Namespace::Orders, &params);
//! if let Some(hit) = cache.get(&key) {
//!     return Ok(hit);
//! }
//! ```

pub mod key;
pub mod stats;
pub mod ttl;

pub use key::{CacheKey, Namespace};
pub use stats::CacheStats;
pub use ttl::{CacheEntry, TtlCache};
