//! Passive discovery through each indexer's latest-releases feed.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::catalog::ReleaseCatalog;

use super::capabilities::CapabilityNegotiator;
use super::registry::IndexerSet;
use super::types::latest_or_empty;
use super::Release;

/// Per-source sync progress.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncCursor {
    /// When the source was last polled.
    pub last_sync: Option<DateTime<Utc>>,
    /// Newest guid seen in the source's feed.
    pub last_guid: Option<String>,
    /// Releases the last poll contributed.
    pub new_items: usize,
}

/// Polls every enabled indexer's latest feed and keeps only unknown releases.
pub struct RssSyncEngine {
    indexers: IndexerSet,
    negotiator: Arc<CapabilityNegotiator>,
    catalog: Arc<dyn ReleaseCatalog>,
    max_concurrency: usize,
    cursors: RwLock<HashMap<String, SyncCursor>>,
}

impl RssSyncEngine {
    pub fn new(
        indexers: IndexerSet,
        negotiator: Arc<CapabilityNegotiator>,
        catalog: Arc<dyn ReleaseCatalog>,
        max_concurrency: usize,
    ) -> Self {
        Self {
            indexers,
            negotiator,
            catalog,
            max_concurrency: max_concurrency.max(1),
            cursors: RwLock::new(HashMap::new()),
        }
    }

    /// Run one sync cycle and return the releases not yet in the catalog.
    ///
    /// Releases are not persisted here; storing them is the caller's job.
    pub async fn sync_all(&self) -> Vec<Release> {
        // Failed capability negotiations get one retry per cycle.
        self.negotiator.reset_failures();

        let indexers = self.indexers.all();
        info!(sources = indexers.len(), "Starting RSS sync");

        let feeds: Vec<(String, Vec<Release>)> = stream::iter(indexers.iter())
            .map(|indexer| async move {
                let releases = latest_or_empty(indexer.as_ref()).await;
                (indexer.name().to_string(), releases)
            })
            .buffered(self.max_concurrency)
            .collect()
            .await;

        let mut seen: HashSet<String> = HashSet::new();
        let mut fresh = Vec::new();
        let now = Utc::now();

        for (name, releases) in feeds {
            let newest_guid = releases.first().map(|r| r.guid.clone());
            let mut new_items = 0;

            for release in releases {
                if !seen.insert(release.guid.clone()) {
                    continue;
                }
                if self.is_known(&release.guid).await {
                    continue;
                }
                new_items += 1;
                fresh.push(release);
            }

            crate::metrics::RSS_NEW_RELEASES
                .with_label_values(&[&name])
                .inc_by(new_items as u64);
            debug!(indexer = %name, new_items = new_items, "RSS source synced");

            let mut cursors = self.cursors.write().await;
            let cursor = cursors.entry(name).or_default();
            cursor.last_sync = Some(now);
            if newest_guid.is_some() {
                cursor.last_guid = newest_guid;
            }
            cursor.new_items = new_items;
        }

        info!(count = fresh.len(), "RSS sync complete");
        fresh
    }

    /// Cursor for one source, if it has been synced.
    pub async fn cursor(&self, indexer: &str) -> Option<SyncCursor> {
        self.cursors.read().await.get(indexer).cloned()
    }

    /// Cursors for every synced source.
    pub async fn cursors(&self) -> HashMap<String, SyncCursor> {
        self.cursors.read().await.clone()
    }

    async fn is_known(&self, guid: &str) -> bool {
        match self.catalog.contains_guid(guid).await {
            Ok(known) => known,
            Err(e) => {
                // Treat as new; the catalog rejects duplicates on insert.
                warn!(guid = %guid, error = %e, "Catalog lookup failed during RSS sync");
                false
            }
        }
    }
}
