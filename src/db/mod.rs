//! SQLite storage for job postings and worker profiles.
//!
//! Live worker locations deliberately do not live here — they are held by
//! the in-memory [`crate::geoindex::GeoIndex`] and never persisted.

pub mod queries;

use std::path::Path;
use std::time::Duration;

use rusqlite::{Connection, OpenFlags};

use crate::error::{Result, RozgarError};

/// Timeout for SQLite's busy handler. When the database is locked, SQLite
/// retries for this long before returning SQLITE_BUSY.
const DEFAULT_BUSY_TIMEOUT_SECS: u64 = 5;

/// Current schema version.
const SCHEMA_VERSION: u32 = 1;

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create a database at the given path.
    ///
    /// WAL mode keeps concurrent readers off the writer's back; the schema
    /// is created on first open.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() && path.is_dir() {
            return Err(RozgarError::InvalidPath(format!(
                "'{}' is a directory, not a file. Expected a path like '{}/rozgar.db'",
                path.display(),
                path.display().to_string().trim_end_matches('/'),
            )));
        }
        let conn = Connection::open(path)?;

        conn.busy_timeout(Duration::from_secs(DEFAULT_BUSY_TIMEOUT_SECS))?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = -16000;
            PRAGMA temp_store = MEMORY;
            PRAGMA foreign_keys = ON;
            "#,
        )?;

        let db = Self { conn };
        db.init_schema()?;
        db.migrate_if_needed()?;
        Ok(db)
    }

    /// Open a database in read-only mode.
    ///
    /// Validates that the schema is compatible with this build.
    pub fn open_readonly<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(RozgarError::NoDatabase);
        }
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        conn.busy_timeout(Duration::from_secs(DEFAULT_BUSY_TIMEOUT_SECS))?;

        let db = Self { conn };
        db.validate_schema_version()?;
        Ok(db)
    }

    fn validate_schema_version(&self) -> Result<()> {
        let has_meta: bool = self.conn.query_row(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='meta'",
            [],
            |row| row.get(0),
        )?;
        if !has_meta {
            return Err(RozgarError::CorruptDatabase("missing meta table".to_string()));
        }

        let version_str = self.get_meta("schema_version")?;
        let version_str = version_str.as_deref().unwrap_or("0");
        let db_version: u32 = version_str.parse().map_err(|_| {
            RozgarError::CorruptDatabase(format!(
                "invalid schema_version '{version_str}': expected integer"
            ))
        })?;

        if db_version > SCHEMA_VERSION {
            return Err(RozgarError::SchemaTooNew {
                db_version,
                supported_version: SCHEMA_VERSION,
            });
        }
        Ok(())
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            -- Service metadata and schema versioning
            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            -- Job postings. Coordinates are optional: postings without them
            -- are listable but never matched by radius queries or dispatch.
            CREATE TABLE IF NOT EXISTS jobs (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                employer_id TEXT,
                employer_name TEXT NOT NULL,
                phone TEXT NOT NULL,
                location TEXT NOT NULL,
                latitude REAL,
                longitude REAL,
                salary_per_day REAL NOT NULL,
                job_type TEXT NOT NULL DEFAULT 'daily',
                category TEXT NOT NULL DEFAULT 'labor',
                description TEXT,
                status TEXT NOT NULL DEFAULT 'open',
                created_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_jobs_status_created
                ON jobs(status, created_at DESC);
            CREATE INDEX IF NOT EXISTS idx_jobs_category ON jobs(category);
            CREATE INDEX IF NOT EXISTS idx_jobs_coords
                ON jobs(latitude, longitude) WHERE latitude IS NOT NULL;

            -- Worker profiles. Written by the onboarding/billing flows;
            -- read-only to this service.
            CREATE TABLE IF NOT EXISTS worker_profiles (
                id TEXT PRIMARY KEY,
                phone TEXT UNIQUE,
                display_name TEXT,
                subscriber_tier TEXT NOT NULL DEFAULT 'free',
                rating REAL,
                api_token TEXT UNIQUE
            );

            CREATE INDEX IF NOT EXISTS idx_profiles_phone ON worker_profiles(phone);
            "#,
        )?;

        let version = self.get_meta("schema_version")?;
        if version.is_none() {
            self.set_meta("schema_version", &SCHEMA_VERSION.to_string())?;
        }
        Ok(())
    }

    fn migrate_if_needed(&self) -> Result<()> {
        let version_str = self.get_meta("schema_version")?;
        let current_version: u32 = version_str.as_deref().unwrap_or("0").parse().unwrap_or(0);

        // No migrations yet; bump the recorded version forward if an old
        // file predates the meta row.
        if current_version < SCHEMA_VERSION {
            self.set_meta("schema_version", &SCHEMA_VERSION.to_string())?;
        }
        Ok(())
    }

    /// Get a metadata value by key.
    pub fn get_meta(&self, key: &str) -> Result<Option<String>> {
        let result = self
            .conn
            .query_row("SELECT value FROM meta WHERE key = ?", [key], |row| {
                row.get(0)
            });

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Set a metadata value.
    pub fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES (?, ?)",
            [key, value],
        )?;
        Ok(())
    }

    /// Get the underlying connection for query operations.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_database_open_creates_schema() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(&db_path).unwrap();

        let table_count: i32 = db
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN ('meta', 'jobs', 'worker_profiles')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(table_count, 3);
    }

    #[test]
    fn test_database_meta_operations() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("test.db")).unwrap();

        assert!(db.get_meta("test_key").unwrap().is_none());
        db.set_meta("test_key", "test_value").unwrap();
        assert_eq!(db.get_meta("test_key").unwrap(), Some("test_value".to_string()));
        db.set_meta("test_key", "new_value").unwrap();
        assert_eq!(db.get_meta("test_key").unwrap(), Some("new_value".to_string()));
    }

    #[test]
    fn test_open_readonly_missing_file() {
        let dir = tempdir().unwrap();
        let result = Database::open_readonly(dir.path().join("nonexistent.db"));
        assert!(matches!(result, Err(RozgarError::NoDatabase)));
    }

    #[test]
    fn test_schema_versioning() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("test.db")).unwrap();
        assert_eq!(
            db.get_meta("schema_version").unwrap(),
            Some(SCHEMA_VERSION.to_string())
        );
    }

    #[test]
    fn test_readonly_rejects_newer_schema() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        {
            let db = Database::open(&db_path).unwrap();
            db.set_meta("schema_version", "99").unwrap();
        }
        let result = Database::open_readonly(&db_path);
        assert!(matches!(result, Err(RozgarError::SchemaTooNew { db_version: 99, .. })));
    }

    #[test]
    fn test_open_rejects_directory_path() {
        let dir = tempdir().unwrap();
        let result = Database::open(dir.path());
        assert!(matches!(result, Err(RozgarError::InvalidPath(_))));
    }
}
