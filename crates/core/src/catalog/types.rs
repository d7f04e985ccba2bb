//! Types for the release catalog.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Catalog statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogStats {
    /// Total stored releases.
    pub total_releases: u64,
    /// Number of distinct indexers that contributed releases.
    pub unique_indexers: u32,
    /// Indexers with a cached capability set.
    pub cached_capabilities: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest_entry: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newest_entry: Option<DateTime<Utc>>,
}

/// Errors for catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<rusqlite::Error> for CatalogError {
    fn from(e: rusqlite::Error) -> Self {
        CatalogError::Database(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_stats_serialization() {
        let stats = CatalogStats {
            total_releases: 12,
            unique_indexers: 3,
            cached_capabilities: 1,
            oldest_entry: None,
            newest_entry: Some(Utc::now()),
        };

        let json = serde_json::to_string(&stats).unwrap();
        assert!(!json.contains("oldest_entry"));
        assert!(json.contains("newest_entry"));
        assert!(json.contains("\"total_releases\":12"));
    }

    #[test]
    fn test_error_display() {
        let err = CatalogError::NotFound("guid-1".to_string());
        assert_eq!(err.to_string(), "Not found: guid-1");
    }
}
