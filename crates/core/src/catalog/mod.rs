//! Release catalog - the record of every release already discovered.
//!
//! RSS sync consults the catalog to drop releases it has seen before, and the
//! same database keeps negotiated indexer capabilities between runs.

mod sqlite;
mod types;

pub use sqlite::SqliteCatalog;
pub use types::*;

use async_trait::async_trait;

use crate::searcher::Release;

/// Read/write contract for discovered releases.
#[async_trait]
pub trait ReleaseCatalog: Send + Sync {
    /// Whether a release with this guid was stored before.
    async fn contains_guid(&self, guid: &str) -> Result<bool, CatalogError>;

    /// Store releases, ignoring guids that are already known.
    ///
    /// Returns the number of new releases added.
    async fn store_releases(&self, releases: &[Release]) -> Result<usize, CatalogError>;

    /// Get a stored release by guid.
    async fn get(&self, guid: &str) -> Result<Release, CatalogError>;

    /// Get catalog statistics.
    async fn stats(&self) -> Result<CatalogStats, CatalogError>;
}
