//! Exclusion checks that gate what gets fetched
//!
//! Two independent mechanisms are consulted before a fetch is dispatched:
//!
//! - persisted module-path prefixes (see [`ExclusionStore`]), seeded at startup by
//!   [`seed::populate_excluded`]
//! - the [`ProxyRemoved`] snapshot of exact `module@version` pairs that the proxy
//!   can no longer serve
//!
//! # Modules
//!
//! - [`proxy_removed`]: Loading the exact-version skip list
//! - [`seed`]: Permanent exclusion table and startup seeding

pub mod proxy_removed;
pub mod seed;

use std::sync::Arc;

#[cfg(test)]
use mockall::automock;
use tracing::info;

use crate::error::StoreError;

pub use proxy_removed::ProxyRemoved;
pub use seed::{EXCLUDED_PREFIXES, populate_excluded};

/// Persisted store of excluded module-path prefixes
#[cfg_attr(test, automock)]
pub trait ExclusionStore: Send + Sync {
    /// Whether `path` equals, or lies beneath, a stored prefix
    fn is_excluded(&self, path: &str) -> Result<bool, StoreError>;

    /// Record `prefix` as excluded. Inserting an existing prefix is a no-op.
    fn insert_excluded_prefix(
        &self,
        prefix: &str,
        submitted_by: &str,
        reason: &str,
    ) -> Result<(), StoreError>;
}

/// Whether `path` is `prefix` itself or nested under it.
///
/// Matching respects path boundaries: `foo` covers `foo/bar` but not `foobar`.
/// A prefix written with a trailing `/` covers everything beneath it.
pub fn has_path_prefix(path: &str, prefix: &str) -> bool {
    if prefix.is_empty() {
        return false;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || prefix.ends_with('/'),
        None => false,
    }
}

/// Both exclusion mechanisms behind one check
pub struct ExclusionRegistry {
    store: Arc<dyn ExclusionStore>,
    proxy_removed: Arc<ProxyRemoved>,
}

impl ExclusionRegistry {
    pub fn new(store: Arc<dyn ExclusionStore>, proxy_removed: Arc<ProxyRemoved>) -> Self {
        Self {
            store,
            proxy_removed,
        }
    }

    /// Whether `module_path@version` must not be fetched
    pub fn is_excluded(&self, module_path: &str, version: &str) -> Result<bool, StoreError> {
        if self.proxy_removed.contains(module_path, version) {
            info!(
                "Skipping {}@{}: removed from the proxy",
                module_path, version
            );
            return Ok(true);
        }

        if self.store.is_excluded(module_path)? {
            info!("Skipping {}@{}: excluded prefix", module_path, version);
            return Ok(true);
        }

        Ok(false)
    }
}
