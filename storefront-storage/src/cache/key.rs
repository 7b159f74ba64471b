//! Structured cache keys.
//!
//! A key is a namespace plus the canonical rendering of the parameters of
//! the read that produced the value. Parameters are rendered with
//! `serde_json`, so a struct with fixed field order (or a `BTreeMap`) always
//! renders the same way, and two calls with identical parameters always hit
//! the same entry.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;

/// Family of cached reads. Invalidation by namespace is a direct lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Namespace {
    Orders,
    OrderStats,
    DashboardStats,
    AdvancedSearch,
    Products,
    SiteSettings,
    Custom(String),
}

/// Rendered prefix for [`Namespace::Custom`], keeping custom names out of the
/// built-in key space.
pub const CUSTOM_PREFIX: &str = "custom:";

impl Namespace {
    /// Bare name. Custom namespaces render with [`CUSTOM_PREFIX`] in keys.
    pub fn as_str(&self) -> &str {
        match self {
            Namespace::Orders => "orders",
            Namespace::OrderStats => "order_stats",
            Namespace::DashboardStats => "dashboard_stats",
            Namespace::AdvancedSearch => "advanced_search",
            Namespace::Products => "products",
            Namespace::SiteSettings => "site_settings",
            Namespace::Custom(name) => name.as_str(),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Namespace::Custom(name) = self {
            write!(f, "{CUSTOM_PREFIX}{name}")
        } else {
            f.write_str(self.as_str())
        }
    }
}

/// A cache key. Only constructible from a namespace and parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    namespace: Namespace,
    params: String,
}

impl CacheKey {
    /// Key for a read with serializable parameters.
    ///
    /// Parameters that cannot be rendered as JSON (maps with non-string
    /// keys) fall back to their error text, which is still deterministic.
    pub fn new<P: Serialize + ?Sized>(namespace: Namespace, params: &P) -> Self {
        let params = serde_json::to_string(params).unwrap_or_else(|e| format!("!{e}"));
        Self { namespace, params }
    }

    /// Key with an already-rendered parameter string.
    pub fn raw(namespace: Namespace, params: impl Into<String>) -> Self {
        Self {
            namespace,
            params: params.into(),
        }
    }

    /// Key for a parameterless read.
    pub fn unit(namespace: Namespace) -> Self {
        Self::raw(namespace, "")
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn params(&self) -> &str {
        &self.params
    }

    /// `{namespace}_{params}`; what pattern invalidation matches against.
    pub fn render(&self) -> String {
        format!("{}_{}", self.namespace, self.params)
    }

    /// Short stable digest of the rendered key, used in logs.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.render().as_bytes());
        hex::encode(&digest[..8])
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.namespace, self.params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    #[derive(Serialize)]
    struct Params<'a> {
        search: &'a str,
        status: &'a str,
        page: u32,
    }

    #[test]
    fn test_render() {
        let key = CacheKey::raw(Namespace::Orders, "a");
        assert_eq!(key.render(), "orders_a");
        assert_eq!(key.to_string(), "orders_a");
        assert_eq!(CacheKey::unit(Namespace::DashboardStats).render(), "dashboard_stats_");
    }

    #[test]
    fn test_custom_namespace() {
        let key = CacheKey::raw(Namespace::Custom("reports".to_string()), "weekly");
        assert_eq!(key.render(), "custom:reports_weekly");
    }

    #[test]
    fn test_custom_namespace_cannot_shadow_builtin() {
        let custom = CacheKey::raw(Namespace::Custom("orders".to_string()), "a");
        let builtin = CacheKey::raw(Namespace::Orders, "a");
        assert_ne!(custom.render(), builtin.render());
        assert_ne!(custom.fingerprint(), builtin.fingerprint());
        assert_eq!(custom.namespace().as_str(), "orders");
    }

    #[test]
    fn test_struct_params_render_in_field_order() {
        let key = CacheKey::new(
            Namespace::Orders,
            &Params {
                search: "mona",
                status: "all",
                page: 1,
            },
        );
        assert_eq!(
            key.params(),
            r#"{"search":"mona","status":"all","page":1}"#
        );
    }

    #[test]
    fn test_map_params_are_order_independent() {
        let mut a = BTreeMap::new();
        a.insert("governorate", "أسوان");
        a.insert("status", "جديد");
        let mut b = BTreeMap::new();
        b.insert("status", "جديد");
        b.insert("governorate", "أسوان");
        assert_eq!(
            CacheKey::new(Namespace::AdvancedSearch, &a),
            CacheKey::new(Namespace::AdvancedSearch, &b)
        );
    }

    #[test]
    fn test_fingerprint_is_short_hex() {
        let fp = CacheKey::raw(Namespace::Products, "x").fingerprint();
        assert_eq!(fp.len(), 16);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }

    proptest! {
        #[test]
        fn prop_identical_params_identical_keys(
            search in ".{0,20}",
            status in "[a-z]{0,10}",
            page in 1u32..100,
        ) {
            let a = CacheKey::new(Namespace::Orders, &Params { search: &search, status: &status, page });
            let b = CacheKey::new(Namespace::Orders, &Params { search: &search, status: &status, page });
            prop_assert_eq!(a.fingerprint(), b.fingerprint());
            prop_assert_eq!(a, b);
        }

        #[test]
        fn prop_different_pages_different_keys(page in 1u32..100) {
            let a = CacheKey::new(Namespace::Orders, &Params { search: "", status: "all", page });
            let b = CacheKey::new(Namespace::Orders, &Params { search: "", status: "all", page: page + 1 });
            prop_assert_ne!(a, b);
        }
    }
}
