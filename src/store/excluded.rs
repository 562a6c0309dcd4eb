//! Persisted excluded module-path prefixes

use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::StoreError;
use crate::exclusion::{ExclusionStore, has_path_prefix};
use crate::store::Store;

/// A stored exclusion with its audit metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcludedPrefix {
    pub prefix: String,
    pub created_by: String,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl Store {
    /// All stored exclusions, oldest first
    pub fn excluded_prefixes(&self) -> Result<Vec<ExcludedPrefix>, StoreError> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            "SELECT prefix, created_by, reason, created_at FROM excluded_prefixes ORDER BY created_at, prefix",
        )?;

        let prefixes = stmt
            .query_map([], |row| {
                let created_at: i64 = row.get(3)?;
                Ok(ExcludedPrefix {
                    prefix: row.get(0)?,
                    created_by: row.get(1)?,
                    reason: row.get(2)?,
                    created_at: DateTime::from_timestamp_millis(created_at).unwrap_or_default(),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(prefixes)
    }
}

impl ExclusionStore for Store {
    fn is_excluded(&self, path: &str) -> Result<bool, StoreError> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare("SELECT prefix FROM excluded_prefixes")?;

        let prefixes = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(StoreError::query(format!("checking exclusion of {path}")))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(prefixes
            .iter()
            .any(|prefix| has_path_prefix(path, prefix)))
    }

    fn insert_excluded_prefix(
        &self,
        prefix: &str,
        submitted_by: &str,
        reason: &str,
    ) -> Result<(), StoreError> {
        let conn = self.lock_conn()?;
        let inserted = conn
            .execute(
                r#"
                INSERT INTO excluded_prefixes (prefix, created_by, reason, created_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(prefix) DO NOTHING
                "#,
                (prefix, submitted_by, reason, Self::current_timestamp_ms()),
            )
            .map_err(StoreError::query(format!("inserting excluded prefix {prefix}")))?;

        if inserted > 0 {
            info!("Excluded prefix {} (by {}): {}", prefix, submitted_by, reason);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::create_test_store;
    use rstest::rstest;

    #[rstest]
    #[case("github.com/x/y", true)]
    #[case("github.com/x/y/z", true)]
    #[case("github.com/x/y/v2", true)]
    #[case("github.com/x/yz", false)]
    #[case("github.com/x", false)]
    #[case("github.com/other", false)]
    fn is_excluded_respects_path_boundaries(#[case] path: &str, #[case] expected: bool) {
        let (_temp_dir, store) = create_test_store();
        store
            .insert_excluded_prefix("github.com/x/y", "tester", "requested")
            .unwrap();

        assert_eq!(store.is_excluded(path).unwrap(), expected);
    }

    #[test]
    fn is_excluded_is_false_on_empty_table() {
        let (_temp_dir, store) = create_test_store();
        assert!(!store.is_excluded("github.com/x/y").unwrap());
    }

    #[test]
    fn insert_excluded_prefix_keeps_first_record() {
        let (_temp_dir, store) = create_test_store();

        store
            .insert_excluded_prefix("gioui.org/ui", "alice", "first")
            .unwrap();
        store
            .insert_excluded_prefix("gioui.org/ui", "bob", "second")
            .unwrap();

        let prefixes = store.excluded_prefixes().unwrap();
        assert_eq!(prefixes.len(), 1);
        assert_eq!(prefixes[0].created_by, "alice");
        assert_eq!(prefixes[0].reason, "first");
    }
}
