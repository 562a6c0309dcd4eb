//! SQLite-backed persistence for versions, documents and exclusions
//!
//! # Modules
//!
//! - [`documents`]: Version validation and weighted document indexing
//! - [`excluded`]: Persisted excluded module-path prefixes
//! - [`search`]: Candidate retrieval for ranked search

pub mod documents;
pub mod excluded;
pub mod search;

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::search::ranking::VersionKey;
use crate::store::documents::validate_version;
use crate::types::Version;

/// Schema migrations
/// Each version contains a list of SQL statements to execute
const MIGRATIONS: &[&[&str]] = &[
    // v1: popularity lookups by imported path
    &["CREATE INDEX IF NOT EXISTS idx_imports_to_path ON imports(to_path)"],
    // v2: package lookups for the latest version of a module
    &["CREATE INDEX IF NOT EXISTS idx_packages_module_version ON packages(module_path, version)"],
];

pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        info!("Opening index database at {:?}", db_path);

        let conn = Connection::open(db_path).map_err(|source| StoreError::Open {
            path: db_path.to_path_buf(),
            source,
        })?;

        // Enable WAL mode for better concurrency
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        debug!("Database connection established");

        let store = Self {
            conn: Mutex::new(conn),
        };

        store.create_schema()?;
        info!("Index database ready");

        Ok(store)
    }

    /// Acquire database connection lock with proper error handling
    fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// Get current timestamp in milliseconds since UNIX epoch
    fn current_timestamp_ms() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    fn create_schema(&self) -> Result<(), StoreError> {
        debug!("Creating database schema");

        let conn = self.lock_conn()?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS versions (
                module_path TEXT NOT NULL,
                version TEXT NOT NULL,
                series_path TEXT NOT NULL,
                commit_time INTEGER NOT NULL,
                readme_contents TEXT NOT NULL DEFAULT '',
                major INTEGER NOT NULL,
                minor INTEGER NOT NULL,
                patch INTEGER NOT NULL,
                prerelease TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                PRIMARY KEY (module_path, version)
            );

            CREATE TABLE IF NOT EXISTS packages (
                path TEXT NOT NULL,
                module_path TEXT NOT NULL,
                version TEXT NOT NULL,
                suffix TEXT NOT NULL,
                name TEXT NOT NULL,
                synopsis TEXT NOT NULL DEFAULT '',
                licenses TEXT NOT NULL DEFAULT '[]',
                PRIMARY KEY (path, module_path, version),
                FOREIGN KEY (module_path, version)
                    REFERENCES versions(module_path, version) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS imports (
                from_path TEXT NOT NULL,
                from_module_path TEXT NOT NULL,
                from_version TEXT NOT NULL,
                to_path TEXT NOT NULL,
                PRIMARY KEY (from_path, from_module_path, from_version, to_path)
            );

            CREATE TABLE IF NOT EXISTS documents (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                package_path TEXT NOT NULL,
                package_suffix TEXT NOT NULL,
                module_path TEXT NOT NULL,
                series_path TEXT NOT NULL,
                version TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                UNIQUE (package_path, version)
            );

            CREATE VIRTUAL TABLE IF NOT EXISTS documents_fts USING fts5(
                package_path UNINDEXED,
                module_path UNINDEXED,
                name,
                path_tokens,
                synopsis,
                readme,
                tokenize = 'porter unicode61'
            );

            CREATE TABLE IF NOT EXISTS excluded_prefixes (
                prefix TEXT PRIMARY KEY,
                created_by TEXT NOT NULL,
                reason TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );
            "#,
        )?;

        // Apply migrations
        Self::apply_migrations(&conn)?;

        debug!("Database schema created successfully");
        Ok(())
    }

    /// Apply pending migrations based on user_version pragma
    fn apply_migrations(conn: &Connection) -> Result<(), StoreError> {
        let current_version: i32 =
            conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

        for (i, statements) in MIGRATIONS.iter().enumerate() {
            let version = (i + 1) as i32;
            if version > current_version {
                for sql in *statements {
                    conn.execute(sql, [])
                        .map_err(StoreError::query(format!("applying migration v{version}")))?;
                }
                debug!("Applied migration v{}", version);
            }
        }

        let target_version = MIGRATIONS.len() as i32;
        if target_version > current_version {
            conn.pragma_update(None, "user_version", target_version)?;
            debug!("Updated schema version to v{}", target_version);
        }

        Ok(())
    }

    /// Persist a fetched version with its packages and import edges.
    ///
    /// A version that is already stored is left untouched.
    pub fn insert_version(&self, version: &Version) -> Result<(), StoreError> {
        validate_version(version).map_err(|reason| {
            StoreError::InvalidArgument(format!(
                "validate_version({}@{}): {}",
                version.module_path, version.version, reason
            ))
        })?;
        // validate_version guarantees the key parses
        let key = VersionKey::parse(&version.version).ok_or_else(|| {
            StoreError::InvalidArgument(format!("unparseable version {:?}", version.version))
        })?;

        let module_path = version.module_path.as_str();
        let now = Self::current_timestamp_ms();

        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        let inserted = tx
            .execute(
                r#"
                INSERT INTO versions (
                    module_path, version, series_path, commit_time, readme_contents,
                    major, minor, patch, prerelease, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                ON CONFLICT(module_path, version) DO NOTHING
                "#,
                rusqlite::params![
                    module_path,
                    version.version,
                    version.series_path,
                    version.commit_time.timestamp_millis(),
                    version.readme_contents,
                    key.major as i64,
                    key.minor as i64,
                    key.patch as i64,
                    key.prerelease,
                    now,
                ],
            )
            .map_err(StoreError::query(format!(
                "inserting version {}@{}",
                module_path, version.version
            )))?;

        if inserted == 0 {
            debug!(
                "Version {}@{} already stored, skipping",
                module_path, version.version
            );
            return Ok(());
        }

        {
            let mut insert_package = tx.prepare(
                r#"
                INSERT OR IGNORE INTO packages (
                    path, module_path, version, suffix, name, synopsis, licenses
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )?;
            let mut insert_import = tx.prepare(
                r#"
                INSERT OR IGNORE INTO imports (from_path, from_module_path, from_version, to_path)
                VALUES (?1, ?2, ?3, ?4)
                "#,
            )?;

            for package in &version.packages {
                let licenses = serde_json::to_string(&package.licenses)?;
                insert_package
                    .execute((
                        &package.path,
                        module_path,
                        &version.version,
                        &package.suffix,
                        &package.name,
                        &package.synopsis,
                        &licenses,
                    ))
                    .map_err(StoreError::query(format!(
                        "inserting package {}",
                        package.path
                    )))?;

                let imports: BTreeSet<&str> = package.imports.iter().map(String::as_str).collect();
                for to_path in imports {
                    insert_import
                        .execute((&package.path, module_path, &version.version, to_path))
                        .map_err(StoreError::query(format!(
                            "inserting import {} -> {}",
                            package.path, to_path
                        )))?;
                }
            }
        }

        tx.commit()?;

        info!(
            "Stored {}@{} with {} packages",
            module_path,
            version.version,
            version.packages.len()
        );
        Ok(())
    }

    /// Number of indexed documents, optionally restricted to one package path
    pub fn document_count(&self, package_path: Option<&str>) -> Result<u64, StoreError> {
        let conn = self.lock_conn()?;
        let count: i64 = match package_path {
            Some(path) => conn.query_row(
                "SELECT COUNT(*) FROM documents WHERE package_path = ?1",
                [path],
                |row| row.get(0),
            )?,
            None => conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?,
        };
        Ok(count as u64)
    }
}

/// Build `?{start}, ?{start+1}, ...` for a `WHERE ... IN (...)` clause
pub(crate) fn placeholders(count: usize, start: usize) -> String {
    (0..count)
        .map(|i| format!("?{}", i + start))
        .collect::<Vec<_>>()
        .join(", ")
}
