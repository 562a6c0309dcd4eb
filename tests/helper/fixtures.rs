//! Store and version builders

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use tempfile::TempDir;

use modsearch::store::Store;
use modsearch::types::{Package, Version, series_path};

/// Create a store backed by a temporary database
pub fn create_test_store() -> (TempDir, Arc<Store>) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let store = Store::open(&db_path).unwrap();
    (temp_dir, Arc::new(store))
}

/// Package `suffix` of `module_path`; an empty suffix is the module root
pub fn package(module_path: &str, suffix: &str, synopsis: &str) -> Package {
    let path = if suffix.is_empty() {
        module_path.to_string()
    } else {
        format!("{module_path}/{suffix}")
    };
    let name = path.rsplit('/').next().unwrap_or_default().to_string();
    Package {
        path,
        suffix: suffix.to_string(),
        name,
        synopsis: synopsis.to_string(),
        ..Package::default()
    }
}

pub fn version(module_path: &str, version: &str, packages: Vec<Package>) -> Version {
    Version {
        module_path: module_path.to_string(),
        version: version.to_string(),
        series_path: series_path(module_path),
        commit_time: Utc.with_ymd_and_hms(2019, 6, 1, 0, 0, 0).unwrap(),
        readme_contents: String::new(),
        packages,
    }
}
