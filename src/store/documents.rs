//! Weighted search documents for the packages of a version

use tracing::{debug, info};

use crate::error::StoreError;
use crate::search::ranking::VersionKey;
use crate::store::Store;
use crate::types::Version;

/// Check the fields every stored version and document depend on.
///
/// Returns all problems found, joined, so that a bad fetch can be diagnosed in one pass.
pub fn validate_version(version: &Version) -> Result<(), String> {
    let mut reasons = Vec::new();

    if version.module_path.is_empty() {
        reasons.push("empty module path".to_string());
    }
    if version.version.is_empty() {
        reasons.push("empty version".to_string());
    } else if VersionKey::parse(&version.version).is_none() {
        reasons.push(format!("invalid version {:?}", version.version));
    }

    for package in &version.packages {
        if package.path.is_empty() {
            reasons.push(format!("package {:?} has an empty path", package.name));
            continue;
        }
        let expected = if package.suffix.is_empty() {
            version.module_path.clone()
        } else {
            format!("{}/{}", version.module_path, package.suffix)
        };
        if package.path != expected {
            reasons.push(format!(
                "package path {:?} does not match suffix {:?}",
                package.path, package.suffix
            ));
        }
    }

    if reasons.is_empty() {
        Ok(())
    } else {
        Err(reasons.join("; "))
    }
}

/// Tokens that let a query match fragments of the package, module and series paths
fn path_tokens(package_path: &str, version: &Version) -> String {
    [
        package_path,
        version.module_path.as_str(),
        version.series_path.as_str(),
    ]
    .join(" ")
}

impl Store {
    /// Insert one search document per package in `version`.
    ///
    /// The version is validated first; an invalid version yields
    /// [`StoreError::InvalidArgument`] without touching the database. All documents
    /// are written in a single transaction. A document that already exists for the
    /// same package path and version is left unchanged.
    pub fn insert_documents(&self, version: &Version) -> Result<(), StoreError> {
        validate_version(version).map_err(|reason| {
            StoreError::InvalidArgument(format!(
                "validate_version({}@{}): {}",
                version.module_path, version.version, reason
            ))
        })?;

        let now = Self::current_timestamp_ms();
        let mut inserted = 0usize;

        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        {
            let mut insert_document = tx.prepare(
                r#"
                INSERT INTO documents (
                    package_path, package_suffix, module_path, series_path, version, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(package_path, version) DO NOTHING
                "#,
            )?;
            let mut insert_tokens = tx.prepare(
                r#"
                INSERT INTO documents_fts (
                    rowid, package_path, module_path, name, path_tokens, synopsis, readme
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )?;

            for package in &version.packages {
                let context = format!("inserting document for package {}", package.path);

                let rows = insert_document
                    .execute((
                        &package.path,
                        &package.suffix,
                        &version.module_path,
                        &version.series_path,
                        &version.version,
                        now,
                    ))
                    .map_err(StoreError::query(context.clone()))?;

                if rows == 0 {
                    debug!(
                        "Document for {}@{} already exists",
                        package.path, version.version
                    );
                    continue;
                }

                let id = tx.last_insert_rowid();
                insert_tokens
                    .execute((
                        id,
                        &package.path,
                        &version.module_path,
                        &package.name,
                        path_tokens(&package.path, version),
                        &package.synopsis,
                        &version.readme_contents,
                    ))
                    .map_err(StoreError::query(context))?;
                inserted += 1;
            }
        }

        tx.commit()?;

        info!(
            "Indexed {} of {} packages for {}@{}",
            inserted,
            version.packages.len(),
            version.module_path,
            version.version
        );
        Ok(())
    }
}
