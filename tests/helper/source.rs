//! Module source serving versions from memory

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use modsearch::error::FetchError;
use modsearch::fetch::ModuleSource;
use modsearch::types::Version;

/// Serves registered versions and records every request
#[derive(Default)]
pub struct InMemorySource {
    versions: HashMap<String, Version>,
    requests: Mutex<Vec<String>>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_version(mut self, version: Version) -> Self {
        self.versions.insert(
            format!("{}@{}", version.module_path, version.version),
            version,
        );
        self
    }

    /// `module@version` strings requested so far, in order
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModuleSource for InMemorySource {
    async fn fetch_version(
        &self,
        module_path: &str,
        version: &str,
    ) -> Result<Version, FetchError> {
        let key = format!("{module_path}@{version}");
        self.requests.lock().unwrap().push(key.clone());
        self.versions
            .get(&key)
            .cloned()
            .ok_or(FetchError::NotFound(key))
    }
}
