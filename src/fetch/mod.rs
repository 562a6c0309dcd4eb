//! Fetching module versions and indexing them
//!
//! # Modules
//!
//! - [`proxy`]: HTTP client for the module proxy
//! - [`handler`]: Shared fetch-and-index step run by every queue variant

pub mod handler;
pub mod proxy;

#[cfg(test)]
use mockall::automock;

use crate::error::{FetchError, StoreError};
use crate::store::Store;
use crate::types::Version;

pub use handler::FetchHandler;
pub use proxy::ProxyClient;

/// Source of module version contents
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait ModuleSource: Send + Sync {
    /// Fetches one version of a module with its packages
    ///
    /// # Returns
    /// * `Err(FetchError::NotFound)` - If the version does not exist upstream
    async fn fetch_version(&self, module_path: &str, version: &str)
    -> Result<Version, FetchError>;
}

/// Storage the fetch handler writes into
#[cfg_attr(test, automock)]
pub trait VersionStore: Send + Sync {
    fn insert_version(&self, version: &Version) -> Result<(), StoreError>;

    fn insert_documents(&self, version: &Version) -> Result<(), StoreError>;
}

impl VersionStore for Store {
    fn insert_version(&self, version: &Version) -> Result<(), StoreError> {
        Store::insert_version(self, version)
    }

    fn insert_documents(&self, version: &Version) -> Result<(), StoreError> {
        Store::insert_documents(self, version)
    }
}
