//! Storefront Storage
//!
//! Two halves:
//!
//! - [`cache`]: the in-process TTL cache that fronts every read, keyed by
//!   namespace and canonical query parameters.
//! - [`remote`]: the [`RemoteStore`] trait the rest of the workspace talks
//!   to, with an in-memory implementation ([`InMemoryStore`]) and a
//!   PostgREST client ([`RestStore`]). Both publish row changes on a
//!   [`ChangeFeed`].

pub mod cache;
pub mod change_feed;
pub mod memory;
pub mod postgrest;
pub mod remote;

pub use cache::{CacheEntry, CacheKey, CacheStats, Namespace, TtlCache};
pub use change_feed::{ChangeEvent, ChangeFeed, ChangeKind, ChangeStream};
pub use memory::{InMemoryStore, Procedure, Tables};
pub use postgrest::{RestConfig, RestStore};
pub use remote::{
    decode_row, decode_rows, encode_row, Filter, FilterOp, Query, RemoteStore, Row, RowRange,
    RpcCall, SortOrder, StoreResult,
};
