//! Relevance/popularity ranking of search candidates

use std::cmp::Ordering;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::f64::consts::E;

use crate::types::{SearchResult, VersionedPackage};

/// Relevance at or below this value is treated as no match
pub const RELEVANCE_FLOOR: f64 = 1e-10;

/// Prerelease key stored for release versions.
/// `~` sorts above every identifier character, so a release outranks its prereleases.
pub const RELEASE_PRERELEASE: &str = "~";

/// Ordering key used to pick the latest version of a module.
///
/// Field order is the comparison priority; every component prefers higher values.
/// The prerelease component compares byte-wise.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct VersionKey {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub prerelease: String,
}

impl VersionKey {
    /// Parse a module version such as `v1.2.3`, `v0.0.0-20190101000000-abcdef123456`
    /// or `v2.0.0+incompatible`.
    pub fn parse(version: &str) -> Option<Self> {
        let version = version.strip_prefix('v').unwrap_or(version);
        let version = version.strip_suffix("+incompatible").unwrap_or(version);
        let parsed = semver::Version::parse(version).ok()?;

        let prerelease = if parsed.pre.is_empty() {
            RELEASE_PRERELEASE.to_string()
        } else {
            parsed.pre.as_str().to_string()
        };

        Some(Self {
            major: parsed.major,
            minor: parsed.minor,
            patch: parsed.patch,
            prerelease,
        })
    }
}

/// A package at the latest version of its module that matched the query
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub package: VersionedPackage,
    pub relevance: f64,
    pub num_imported_by: u64,
}

/// Combine textual relevance with popularity.
///
/// `ln(e + 0) == 1`, so a package nobody imports ranks by relevance alone.
pub fn combined_rank(relevance: f64, num_imported_by: u64) -> f64 {
    relevance * (E + num_imported_by as f64).ln()
}

/// Reduce per-document relevance rows to the best score per package path,
/// dropping packages whose best score does not exceed [`RELEVANCE_FLOOR`].
pub fn max_relevance<I>(rows: I) -> HashMap<String, f64>
where
    I: IntoIterator<Item = (String, f64)>,
{
    let mut best: HashMap<String, f64> = HashMap::new();
    for (package_path, relevance) in rows {
        if relevance <= RELEVANCE_FLOOR {
            continue;
        }
        best.entry(package_path)
            .and_modify(|current| *current = current.max(relevance))
            .or_insert(relevance);
    }
    best
}

/// Select the latest version of each module from `(module_path, version, key)` rows.
///
/// Returns a map of module path to version string.
pub fn latest_versions<I>(rows: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = (String, String, VersionKey)>,
{
    let mut latest: HashMap<String, (String, VersionKey)> = HashMap::new();
    for (module_path, version, key) in rows {
        match latest.entry(module_path) {
            Entry::Occupied(mut entry) => {
                if key > entry.get().1 {
                    entry.insert((version, key));
                }
            }
            Entry::Vacant(entry) => {
                entry.insert((version, key));
            }
        }
    }

    latest
        .into_iter()
        .map(|(module_path, (version, _))| (module_path, version))
        .collect()
}

/// Rank candidates and attach the total match count to every result.
///
/// Results are ordered by combined rank descending; equal ranks fall back to
/// package path so that consecutive pages never overlap.
pub fn rank_candidates(candidates: Vec<Candidate>) -> Vec<SearchResult> {
    let num_results = candidates.len() as u64;

    let mut results: Vec<SearchResult> = candidates
        .into_iter()
        .map(|candidate| SearchResult {
            rank: combined_rank(candidate.relevance, candidate.num_imported_by),
            num_imported_by: candidate.num_imported_by,
            num_results,
            package: candidate.package,
        })
        .collect();

    results.sort_by(|a, b| match b.rank.total_cmp(&a.rank) {
        Ordering::Equal => a.package.path.cmp(&b.package.path),
        ordering => ordering,
    });

    results
}

/// Apply offset/limit to ranked results
pub fn paginate(results: Vec<SearchResult>, limit: usize, offset: usize) -> Vec<SearchResult> {
    results.into_iter().skip(offset).take(limit).collect()
}
