//! Ranked package search over indexed documents

use std::collections::{HashMap, HashSet};

use chrono::DateTime;
use rusqlite::{Connection, ToSql};
use tracing::debug;

use crate::error::StoreError;
use crate::search::query::match_expression;
use crate::search::ranking::{
    Candidate, VersionKey, latest_versions, max_relevance, paginate, rank_candidates,
};
use crate::store::{Store, placeholders};
use crate::types::{License, SearchResult, VersionedPackage};

/// bm25 column weights for `documents_fts`.
/// Unindexed key columns first, then name and path tokens (tier A),
/// synopsis (tier B) and readme (tier C).
const COLUMN_WEIGHTS: [f64; 6] = [0.0, 0.0, 1.0, 1.0, 0.4, 0.2];

/// Upper bound on bound parameters per `IN (...)` query
const MAX_IN_PARAMS: usize = 500;

impl Store {
    /// Search indexed packages for `terms` and return one page of ranked results.
    ///
    /// Only the latest version of each module is considered. Every result carries
    /// the total number of matching packages, independent of `limit` and `offset`.
    pub fn search(
        &self,
        terms: &[String],
        limit: usize,
        offset: usize,
    ) -> Result<Vec<SearchResult>, StoreError> {
        if limit == 0 {
            return Err(StoreError::InvalidArgument(
                "cannot search: limit cannot be 0".to_string(),
            ));
        }
        let Some(expression) = match_expression(terms) else {
            return Err(StoreError::InvalidArgument(
                "cannot search: no terms".to_string(),
            ));
        };

        let describe = |stage: &str| {
            format!("search({terms:?}, limit={limit}, offset={offset}): {stage}")
        };

        let conn = self.lock_conn()?;

        let matches = document_relevance(&conn, &expression)
            .map_err(|e| e.context(describe("scoring documents")))?;
        let modules: HashSet<String> = matches.iter().map(|(_, module, _)| module.clone()).collect();
        let relevance = max_relevance(
            matches
                .into_iter()
                .map(|(package_path, _, relevance)| (package_path, relevance)),
        );
        if relevance.is_empty() {
            debug!("No documents matched {:?}", expression);
            return Ok(Vec::new());
        }

        let latest = module_latest_versions(&conn, &modules)
            .map_err(|e| e.context(describe("selecting latest versions")))?;

        let packages = latest_packages(&conn, &latest, &relevance)
            .map_err(|e| e.context(describe("loading packages")))?;

        let paths: Vec<String> = packages.iter().map(|p| p.path.clone()).collect();
        let imported_by = imported_by_counts(&conn, &paths)
            .map_err(|e| e.context(describe("counting importers")))?;

        let candidates = packages
            .into_iter()
            .map(|package| Candidate {
                relevance: relevance[&package.path],
                num_imported_by: imported_by.get(&package.path).copied().unwrap_or(0),
                package,
            })
            .collect();

        let ranked = rank_candidates(candidates);
        debug!("Search {:?} matched {} packages", expression, ranked.len());

        Ok(paginate(ranked, limit, offset))
    }
}

/// `(package_path, module_path, relevance)` for every document matching `expression`
fn document_relevance(
    conn: &Connection,
    expression: &str,
) -> Result<Vec<(String, String, f64)>, StoreError> {
    let weights = COLUMN_WEIGHTS
        .iter()
        .map(|w| format!("{w:.1}"))
        .collect::<Vec<_>>()
        .join(", ");
    // bm25 is negative, more negative is a better match
    let query = format!(
        "SELECT package_path, module_path, -bm25(documents_fts, {weights}) \
         FROM documents_fts WHERE documents_fts MATCH ?1"
    );

    let mut stmt = conn.prepare(&query)?;
    let rows = stmt
        .query_map([expression], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Latest stored version of each module in `modules`
fn module_latest_versions(
    conn: &Connection,
    modules: &HashSet<String>,
) -> Result<HashMap<String, String>, StoreError> {
    let modules: Vec<&String> = modules.iter().collect();
    let mut rows = Vec::new();

    for chunk in modules.chunks(MAX_IN_PARAMS) {
        let query = format!(
            "SELECT module_path, version, major, minor, patch, prerelease \
             FROM versions WHERE module_path IN ({})",
            placeholders(chunk.len(), 1)
        );
        let mut stmt = conn.prepare(&query)?;
        let params: Vec<&dyn ToSql> = chunk.iter().map(|m| *m as &dyn ToSql).collect();
        let chunk_rows = stmt
            .query_map(params.as_slice(), |row| {
                let key = VersionKey {
                    major: row.get::<_, i64>(2)? as u64,
                    minor: row.get::<_, i64>(3)? as u64,
                    patch: row.get::<_, i64>(4)? as u64,
                    prerelease: row.get(5)?,
                };
                Ok((row.get(0)?, row.get(1)?, key))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.extend(chunk_rows);
    }

    Ok(latest_versions(rows))
}

/// Packages that exist at the latest version of their module and matched the query
fn latest_packages(
    conn: &Connection,
    latest: &HashMap<String, String>,
    relevance: &HashMap<String, f64>,
) -> Result<Vec<VersionedPackage>, StoreError> {
    let mut stmt = conn.prepare(
        r#"
        SELECT p.path, p.name, p.synopsis, p.licenses, v.commit_time
        FROM packages p
        JOIN versions v ON v.module_path = p.module_path AND v.version = p.version
        WHERE p.module_path = ?1 AND p.version = ?2
        "#,
    )?;

    let mut packages = Vec::new();
    for (module_path, version) in latest {
        let rows = stmt
            .query_map((module_path, version), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        for (path, name, synopsis, licenses, commit_time) in rows {
            if !relevance.contains_key(&path) {
                continue;
            }
            let licenses: Vec<License> = serde_json::from_str(&licenses)?;
            packages.push(VersionedPackage {
                path,
                name,
                synopsis,
                licenses,
                module_path: module_path.clone(),
                version: version.clone(),
                commit_time: DateTime::from_timestamp_millis(commit_time).unwrap_or_default(),
            });
        }
    }

    Ok(packages)
}

/// Number of distinct importing packages per imported path
fn imported_by_counts(
    conn: &Connection,
    paths: &[String],
) -> Result<HashMap<String, u64>, StoreError> {
    let mut counts = HashMap::new();

    for chunk in paths.chunks(MAX_IN_PARAMS) {
        let query = format!(
            "SELECT to_path, COUNT(DISTINCT from_path) FROM imports \
             WHERE to_path IN ({}) GROUP BY to_path",
            placeholders(chunk.len(), 1)
        );
        let mut stmt = conn.prepare(&query)?;
        let params: Vec<&dyn ToSql> = chunk.iter().map(|p| p as &dyn ToSql).collect();
        let rows = stmt
            .query_map(params.as_slice(), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        counts.extend(rows);
    }

    Ok(counts)
}
