//! Permanent record of excluded prefixes, seeded into the store at startup

use tracing::{debug, info};

use crate::error::StoreError;
use crate::exclusion::ExclusionStore;

/// Submitter recorded when `$USER` is not set
pub const DEFAULT_SUBMITTER: &str = "etl";

/// Excluded prefixes and the reasons for exclusion.
/// Kept in code so the exclusions survive the database being wiped.
pub const EXCLUDED_PREFIXES: &[(&str, &str)] = &[
    (
        "github.com/xvrzhao/site-monitor",
        "author requested https://groups.google.com/a/google.com/d/msg/go-discovery-feedback/oYtPw2Ob0fY/xxGikZK1AQAJ",
    ),
    (
        "gioui.org/ui",
        "author requested https://groups.google.com/a/google.com/d/msg/go-discovery-feedback/CeMEn2E1zwo/q5S8HPn6BgAJ",
    ),
    (
        "github.com/kortschak/unlicensable",
        "https://groups.google.com/g/golang-dev/c/mfiPCtJ1BGU/m/HDb3--vMEwAJk",
    ),
    (
        "github.com/clevergo/clevergo",
        "https://groups.google.com/a/google.com/g/go-discovery-feedback/c/IAHYXlstv-g/m/muE06-ECFgAJ",
    ),
];

/// Identity recorded as the submitter of seeded exclusions
pub fn submitter() -> String {
    submitter_from_env(std::env::var("USER").ok())
}

fn submitter_from_env(user: Option<String>) -> String {
    user.filter(|user| !user.is_empty())
        .unwrap_or_else(|| DEFAULT_SUBMITTER.to_string())
}

/// Insert every entry of [`EXCLUDED_PREFIXES`] that the store does not already exclude.
///
/// Safe to run on every startup. Returns the number of prefixes inserted.
pub fn populate_excluded(store: &dyn ExclusionStore, submitted_by: &str) -> Result<usize, StoreError> {
    let mut inserted = 0;
    for (prefix, reason) in EXCLUDED_PREFIXES {
        if store.is_excluded(prefix)? {
            debug!("Prefix {} already excluded", prefix);
            continue;
        }
        store.insert_excluded_prefix(prefix, submitted_by, reason)?;
        inserted += 1;
    }

    if inserted > 0 {
        info!("Seeded {} excluded prefixes as {}", inserted, submitted_by);
    }
    Ok(inserted)
}
