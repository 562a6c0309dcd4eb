//! Fetch-and-index step shared by the local worker pool and the managed callback

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::error::FetchError;
use crate::exclusion::ExclusionRegistry;
use crate::fetch::{ModuleSource, VersionStore};

/// What a call to [`FetchHandler::handle`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The version is excluded and was not fetched
    Excluded,
    /// The version was fetched and indexed
    Indexed { packages: usize },
}

/// Fetches a module version from the source and writes it to the store
#[derive(Clone)]
pub struct FetchHandler {
    source: Arc<dyn ModuleSource>,
    store: Arc<dyn VersionStore>,
    exclusions: Arc<ExclusionRegistry>,
    timeout: Duration,
}

impl FetchHandler {
    pub fn new(
        source: Arc<dyn ModuleSource>,
        store: Arc<dyn VersionStore>,
        exclusions: Arc<ExclusionRegistry>,
        timeout: Duration,
    ) -> Self {
        Self {
            source,
            store,
            exclusions,
            timeout,
        }
    }

    pub fn exclusions(&self) -> Arc<ExclusionRegistry> {
        self.exclusions.clone()
    }

    /// Fetch and index `module_path@version` within the configured deadline.
    ///
    /// Excluded versions are skipped. Indexing an already stored version is a no-op.
    pub async fn handle(
        &self,
        module_path: &str,
        version: &str,
    ) -> Result<FetchOutcome, FetchError> {
        if self.exclusions.is_excluded(module_path, version)? {
            return Ok(FetchOutcome::Excluded);
        }

        let result = tokio::time::timeout(self.timeout, self.fetch_and_index(module_path, version))
            .await
            .unwrap_or_else(|_| {
                Err(FetchError::Timeout {
                    module_path: module_path.to_string(),
                    version: version.to_string(),
                    timeout: self.timeout,
                })
            });

        match &result {
            Ok(FetchOutcome::Indexed { packages }) => {
                info!("Indexed {}@{} ({} packages)", module_path, version, packages)
            }
            Ok(FetchOutcome::Excluded) => {}
            Err(e) => error!(
                "Failed to fetch {}@{} ({:?}): {}",
                module_path,
                version,
                e.kind(),
                e
            ),
        }
        result
    }

    async fn fetch_and_index(
        &self,
        module_path: &str,
        version: &str,
    ) -> Result<FetchOutcome, FetchError> {
        let fetched = self
            .source
            .fetch_version(module_path, version)
            .await?
            .with_series_path();

        self.store.insert_version(&fetched)?;
        self.store.insert_documents(&fetched)?;

        Ok(FetchOutcome::Indexed {
            packages: fetched.packages.len(),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::{ErrorKind, StoreError};
    use crate::exclusion::{MockExclusionStore, ProxyRemoved};
    use crate::fetch::{MockModuleSource, MockVersionStore};
    use crate::store::tests::{create_test_store, package, version};

    pub(crate) fn open_registry() -> Arc<ExclusionRegistry> {
        let mut store = MockExclusionStore::new();
        store.expect_is_excluded().returning(|_| Ok(false));
        Arc::new(ExclusionRegistry::new(
            Arc::new(store),
            Arc::new(ProxyRemoved::default()),
        ))
    }

    fn source_returning(module_path: &'static str, v: &'static str) -> MockModuleSource {
        let mut source = MockModuleSource::new();
        source
            .expect_fetch_version()
            .withf(move |m, ver| m == module_path && ver == v)
            .returning(move |m, ver| {
                let mut fetched = version(m, ver, vec![package(m, "", "Package m.")]);
                fetched.series_path = String::new();
                Ok(fetched)
            });
        source
    }

    #[tokio::test]
    async fn handle_indexes_fetched_version() {
        let (_temp_dir, store) = create_test_store();
        let store = Arc::new(store);
        let handler = FetchHandler::new(
            Arc::new(source_returning("example.com/m", "v1.0.0")),
            store.clone(),
            open_registry(),
            Duration::from_secs(5),
        );

        let outcome = handler.handle("example.com/m", "v1.0.0").await.unwrap();

        assert_eq!(outcome, FetchOutcome::Indexed { packages: 1 });
        assert_eq!(store.document_count(Some("example.com/m")).unwrap(), 1);
    }

    #[tokio::test]
    async fn handle_twice_is_idempotent() {
        let (_temp_dir, store) = create_test_store();
        let store = Arc::new(store);
        let handler = FetchHandler::new(
            Arc::new(source_returning("example.com/m", "v1.0.0")),
            store.clone(),
            open_registry(),
            Duration::from_secs(5),
        );

        handler.handle("example.com/m", "v1.0.0").await.unwrap();
        handler.handle("example.com/m", "v1.0.0").await.unwrap();

        assert_eq!(store.document_count(None).unwrap(), 1);
    }

    #[tokio::test]
    async fn handle_fills_series_path_before_storing() {
        let mut store = MockVersionStore::new();
        store
            .expect_insert_version()
            .withf(|v| v.series_path == "example.com/m")
            .times(1)
            .returning(|_| Ok(()));
        store
            .expect_insert_documents()
            .times(1)
            .returning(|_| Ok(()));
        let handler = FetchHandler::new(
            Arc::new(source_returning("example.com/m/v2", "v2.0.0")),
            Arc::new(store),
            open_registry(),
            Duration::from_secs(5),
        );

        handler.handle("example.com/m/v2", "v2.0.0").await.unwrap();
    }

    #[tokio::test]
    async fn handle_skips_excluded_versions_without_fetching() {
        let mut source = MockModuleSource::new();
        source.expect_fetch_version().times(0);
        let mut store = MockVersionStore::new();
        store.expect_insert_version().times(0);
        store.expect_insert_documents().times(0);
        let exclusions = Arc::new(ExclusionRegistry::new(
            Arc::new(MockExclusionStore::new()),
            Arc::new(ProxyRemoved::from_lines(["example.com/m@v1.0.0"])),
        ));
        let handler = FetchHandler::new(
            Arc::new(source),
            Arc::new(store),
            exclusions,
            Duration::from_secs(5),
        );

        let outcome = handler.handle("example.com/m", "v1.0.0").await.unwrap();

        assert_eq!(outcome, FetchOutcome::Excluded);
    }

    #[tokio::test]
    async fn handle_propagates_not_found() {
        let mut source = MockModuleSource::new();
        source
            .expect_fetch_version()
            .returning(|m, v| Err(FetchError::NotFound(format!("{m}@{v}"))));
        let mut store = MockVersionStore::new();
        store.expect_insert_version().times(0);
        let handler = FetchHandler::new(
            Arc::new(source),
            Arc::new(store),
            open_registry(),
            Duration::from_secs(5),
        );

        let err = handler.handle("example.com/m", "v9.9.9").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn handle_does_not_index_documents_when_version_insert_fails() {
        let mut store = MockVersionStore::new();
        store
            .expect_insert_version()
            .returning(|_| Err(StoreError::LockPoisoned));
        store.expect_insert_documents().times(0);
        let handler = FetchHandler::new(
            Arc::new(source_returning("example.com/m", "v1.0.0")),
            Arc::new(store),
            open_registry(),
            Duration::from_secs(5),
        );

        let err = handler.handle("example.com/m", "v1.0.0").await.unwrap_err();

        assert!(matches!(err, FetchError::Store(StoreError::LockPoisoned)));
        assert_eq!(err.kind(), ErrorKind::Transient);
    }

    struct SlowSource;

    #[async_trait::async_trait]
    impl ModuleSource for SlowSource {
        async fn fetch_version(
            &self,
            _module_path: &str,
            _version: &str,
        ) -> Result<crate::types::Version, FetchError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Err(FetchError::NotFound("unreachable".to_string()))
        }
    }

    #[tokio::test]
    async fn handle_times_out_slow_fetches() {
        let mut store = MockVersionStore::new();
        store.expect_insert_version().times(0);
        let handler = FetchHandler::new(
            Arc::new(SlowSource),
            Arc::new(store),
            open_registry(),
            Duration::from_millis(100),
        );

        let err = handler.handle("example.com/m", "v1.0.0").await.unwrap_err();

        assert!(matches!(err, FetchError::Timeout { .. }));
        assert_eq!(err.kind(), ErrorKind::Transient);
    }
}
