//! In-memory release catalog for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::catalog::{CatalogError, CatalogStats, ReleaseCatalog};
use crate::searcher::Release;

/// Mock implementation of the ReleaseCatalog trait.
#[derive(Debug, Default)]
pub struct MockReleaseCatalog {
    releases: Arc<RwLock<HashMap<String, Release>>>,
    /// Guids known without a stored release.
    known: Arc<RwLock<HashSet<String>>>,
    /// If set, the next operation will fail with this error.
    next_error: Arc<RwLock<Option<CatalogError>>>,
}

impl MockReleaseCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a guid as already known.
    pub async fn add_known_guid(&self, guid: &str) {
        self.known.write().await.insert(guid.to_string());
    }

    /// Configure the next operation to fail with the given error.
    pub async fn set_next_error(&self, error: CatalogError) {
        *self.next_error.write().await = Some(error);
    }

    /// Get all stored releases.
    pub async fn stored(&self) -> Vec<Release> {
        self.releases.read().await.values().cloned().collect()
    }

    async fn take_error(&self) -> Result<(), CatalogError> {
        match self.next_error.write().await.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ReleaseCatalog for MockReleaseCatalog {
    async fn contains_guid(&self, guid: &str) -> Result<bool, CatalogError> {
        self.take_error().await?;
        Ok(self.known.read().await.contains(guid) || self.releases.read().await.contains_key(guid))
    }

    async fn store_releases(&self, releases: &[Release]) -> Result<usize, CatalogError> {
        self.take_error().await?;
        let mut stored = self.releases.write().await;
        let mut added = 0;
        for release in releases {
            if !stored.contains_key(&release.guid) {
                stored.insert(release.guid.clone(), release.clone());
                added += 1;
            }
        }
        Ok(added)
    }

    async fn get(&self, guid: &str) -> Result<Release, CatalogError> {
        self.take_error().await?;
        self.releases
            .read()
            .await
            .get(guid)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(guid.to_string()))
    }

    async fn stats(&self) -> Result<CatalogStats, CatalogError> {
        self.take_error().await?;
        let releases = self.releases.read().await;
        let indexers: HashSet<&str> = releases.values().map(|r| r.indexer.as_str()).collect();
        Ok(CatalogStats {
            total_releases: releases.len() as u64,
            unique_indexers: indexers.len() as u32,
            cached_capabilities: 0,
            oldest_entry: None,
            newest_entry: None,
        })
    }
}
