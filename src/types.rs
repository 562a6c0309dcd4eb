//! Common types shared by the store, fetch handler and search

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Trailing major-version element of a module path (e.g. `/v2`)
static MAJOR_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/v([2-9]|[1-9][0-9]+)$").expect("valid major suffix pattern"));

/// A license file detected in a package
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct License {
    pub types: Vec<String>,
    pub file_path: String,
}

/// One importable package within a module version
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Package {
    pub path: String,
    /// Path relative to the module root; empty for the root package
    pub suffix: String,
    pub name: String,
    pub synopsis: String,
    pub licenses: Vec<License>,
    /// Import paths this package depends on
    pub imports: Vec<String>,
}

/// One released version of a module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Version {
    pub module_path: String,
    pub version: String,
    #[serde(default)]
    pub series_path: String,
    pub commit_time: DateTime<Utc>,
    #[serde(default)]
    pub readme_contents: String,
    #[serde(default)]
    pub packages: Vec<Package>,
}

impl Version {
    /// Fills in the series path from the module path when the source left it empty
    pub fn with_series_path(mut self) -> Self {
        if self.series_path.is_empty() {
            self.series_path = series_path(&self.module_path);
        }
        self
    }
}

/// Package data as it existed at a particular module version
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionedPackage {
    pub path: String,
    pub name: String,
    pub synopsis: String,
    pub licenses: Vec<License>,
    pub module_path: String,
    pub version: String,
    pub commit_time: DateTime<Utc>,
}

/// A single ranked hit returned by [`crate::store::Store::search`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// Combined relevance and popularity score, higher first
    pub rank: f64,
    /// Number of distinct packages importing this package
    pub num_imported_by: u64,
    /// Total number of matching packages before pagination
    pub num_results: u64,
    pub package: VersionedPackage,
}

/// Returns the version-independent series path of a module.
///
/// The series path drops a trailing major-version element, so
/// `github.com/a/b/v3` and `github.com/a/b` share the series `github.com/a/b`.
pub fn series_path(module_path: &str) -> String {
    MAJOR_SUFFIX.replace(module_path, "").into_owned()
}
