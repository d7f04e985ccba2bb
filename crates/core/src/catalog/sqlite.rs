//! SQLite-backed release catalog and capability cache.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::{CatalogError, CatalogStats, ReleaseCatalog};
use crate::searcher::{CapabilityCache, Release};

/// SQLite-backed catalog.
pub struct SqliteCatalog {
    conn: Mutex<Connection>,
}

impl SqliteCatalog {
    /// Create a new SQLite catalog, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, CatalogError> {
        let conn = Connection::open(path)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite catalog (useful for testing).
    pub fn in_memory() -> Result<Self, CatalogError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), CatalogError> {
        conn.execute_batch(
            r#"
            -- One row per discovered release guid
            CREATE TABLE IF NOT EXISTS releases (
                guid TEXT PRIMARY KEY,
                indexer TEXT NOT NULL,
                title TEXT NOT NULL,
                imdb_id TEXT,
                payload TEXT NOT NULL,
                first_seen_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_releases_indexer ON releases(indexer);
            CREATE INDEX IF NOT EXISTS idx_releases_imdb ON releases(imdb_id);

            -- Negotiated query parameters per indexer base URL
            CREATE TABLE IF NOT EXISTS capabilities (
                base_url TEXT PRIMARY KEY,
                params TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )?;

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, CatalogError> {
        self.conn
            .lock()
            .map_err(|e| CatalogError::Internal(format!("catalog lock poisoned: {}", e)))
    }

    fn parse_timestamp(value: Option<String>) -> Option<DateTime<Utc>> {
        value
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }
}

#[async_trait]
impl ReleaseCatalog for SqliteCatalog {
    async fn contains_guid(&self, guid: &str) -> Result<bool, CatalogError> {
        let conn = self.lock()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM releases WHERE guid = ?",
                params![guid],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    async fn store_releases(&self, releases: &[Release]) -> Result<usize, CatalogError> {
        let mut conn = self.lock()?;
        let now = Utc::now().to_rfc3339();
        let tx = conn.transaction()?;
        let mut new_count = 0;

        for release in releases {
            if release.guid.is_empty() {
                continue;
            }
            let payload = serde_json::to_string(release)
                .map_err(|e| CatalogError::Internal(e.to_string()))?;
            new_count += tx.execute(
                "INSERT OR IGNORE INTO releases (guid, indexer, title, imdb_id, payload, first_seen_at)
                 VALUES (?, ?, ?, ?, ?, ?)",
                params![
                    release.guid,
                    release.indexer,
                    release.title,
                    release.imdb_id,
                    payload,
                    now
                ],
            )?;
        }

        tx.commit()?;
        debug!(
            offered = releases.len(),
            added = new_count,
            "Stored releases in catalog"
        );
        Ok(new_count)
    }

    async fn get(&self, guid: &str) -> Result<Release, CatalogError> {
        let conn = self.lock()?;
        let payload: Option<String> = conn
            .query_row(
                "SELECT payload FROM releases WHERE guid = ?",
                params![guid],
                |row| row.get(0),
            )
            .optional()?;

        let payload = payload.ok_or_else(|| CatalogError::NotFound(guid.to_string()))?;
        serde_json::from_str(&payload).map_err(|e| CatalogError::Internal(e.to_string()))
    }

    async fn stats(&self) -> Result<CatalogStats, CatalogError> {
        let conn = self.lock()?;

        let (total_releases, unique_indexers, oldest, newest): (
            i64,
            i64,
            Option<String>,
            Option<String>,
        ) = conn.query_row(
            "SELECT COUNT(*), COUNT(DISTINCT indexer), MIN(first_seen_at), MAX(first_seen_at)
             FROM releases",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )?;

        let cached_capabilities: i64 =
            conn.query_row("SELECT COUNT(*) FROM capabilities", [], |row| row.get(0))?;

        Ok(CatalogStats {
            total_releases: total_releases as u64,
            unique_indexers: unique_indexers as u32,
            cached_capabilities: cached_capabilities as u32,
            oldest_entry: Self::parse_timestamp(oldest),
            newest_entry: Self::parse_timestamp(newest),
        })
    }
}

#[async_trait]
impl CapabilityCache for SqliteCatalog {
    async fn read(&self, base_url: &str) -> Result<Option<BTreeSet<String>>, CatalogError> {
        let conn = self.lock()?;
        let params_json: Option<String> = conn
            .query_row(
                "SELECT params FROM capabilities WHERE base_url = ?",
                params![base_url],
                |row| row.get(0),
            )
            .optional()?;

        params_json
            .map(|json| {
                serde_json::from_str(&json).map_err(|e| CatalogError::Internal(e.to_string()))
            })
            .transpose()
    }

    async fn write(&self, base_url: &str, params: &BTreeSet<String>) -> Result<(), CatalogError> {
        let conn = self.lock()?;
        let json =
            serde_json::to_string(params).map_err(|e| CatalogError::Internal(e.to_string()))?;
        conn.execute(
            "INSERT INTO capabilities (base_url, params, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(base_url) DO UPDATE SET params = excluded.params, updated_at = excluded.updated_at",
            params![base_url, json, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}
