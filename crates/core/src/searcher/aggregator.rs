//! Backlog search across every enabled indexer.

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use super::capabilities::CapabilityLookup;
use super::dedup::merge_unique;
use super::registry::IndexerSet;
use super::types::flatten;
use super::{ErrorKind, Indexer, IndexerError, Release, SearchRequest};

/// Fans a search out to capability-based indexers, then specialized adapters.
///
/// Always returns a list: a failing indexer contributes nothing and is only
/// visible in logs and metrics, so callers cannot tell "no matches" from
/// "unreachable" for a single source.
pub struct SearchAggregator {
    indexers: IndexerSet,
    max_concurrency: usize,
}

impl SearchAggregator {
    pub fn new(indexers: IndexerSet, max_concurrency: usize) -> Self {
        Self {
            indexers,
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub fn indexers(&self) -> &IndexerSet {
        &self.indexers
    }

    /// Search every enabled indexer and merge the results by guid.
    pub async fn search(&self, request: &SearchRequest) -> Vec<Release> {
        info!(
            title = %request.title,
            imdb_id = ?request.imdb_id,
            year = ?request.year,
            probe = request.skip_if_identifier_capable,
            "Starting backlog search"
        );

        let capability = &self.indexers.capability;
        let caps = self.resolve_capabilities(request).await;

        // In probe mode, the first identifier-capable indexer ends the search.
        let cutoff = if request.skip_if_identifier_capable {
            caps.iter().position(CapabilityLookup::supports_imdb_id)
        } else {
            None
        };
        let queried = cutoff.unwrap_or(caps.len());

        let mut outcomes: Vec<(String, Result<Vec<Release>, IndexerError>)> =
            stream::iter(capability[..queried].iter().zip(caps.iter()))
                .map(|(indexer, caps)| async move {
                    let outcome = indexer.search_with(caps, request).await;
                    (indexer.name().to_string(), outcome)
                })
                .buffered(self.max_concurrency)
                .collect()
                .await;

        if let Some(position) = cutoff {
            debug!(
                indexer = %capability[position].name(),
                "Indexer supports imdb id search, stopping probe"
            );
        } else {
            let specialized: Vec<_> = stream::iter(self.indexers.specialized.iter())
                .map(|indexer| async move {
                    let outcome = indexer.search(request).await;
                    (indexer.name().to_string(), outcome)
                })
                .buffered(self.max_concurrency)
                .collect()
                .await;
            outcomes.extend(specialized);
        }

        let releases = self.merge(outcomes);
        crate::metrics::SEARCH_RESULTS
            .with_label_values(&[])
            .observe(releases.len() as f64);
        info!(count = releases.len(), "Backlog search complete");
        releases
    }

    /// Capabilities of the capability-based indexers, in order.
    ///
    /// Probe mode negotiates one indexer at a time and stops at the first
    /// identifier-capable one, so later indexers are never contacted.
    async fn resolve_capabilities(&self, request: &SearchRequest) -> Vec<CapabilityLookup> {
        let capability = &self.indexers.capability;
        if !request.skip_if_identifier_capable {
            return stream::iter(capability.iter())
                .map(|indexer| indexer.capabilities())
                .buffered(self.max_concurrency)
                .collect()
                .await;
        }

        let mut caps = Vec::with_capacity(capability.len());
        for indexer in capability {
            let lookup = indexer.capabilities().await;
            let stop = lookup.supports_imdb_id();
            caps.push(lookup);
            if stop {
                break;
            }
        }
        caps
    }

    fn merge(&self, outcomes: Vec<(String, Result<Vec<Release>, IndexerError>)>) -> Vec<Release> {
        let total = outcomes.len();
        let failed: Vec<String> = outcomes
            .iter()
            .filter(|(_, outcome)| outcome.is_err())
            .map(|(name, _)| name.clone())
            .collect();

        if !failed.is_empty() && failed.len() < total {
            crate::metrics::PARTIAL_FAILURES.inc();
            warn!(
                kind = ErrorKind::PartialFailure.as_str(),
                failed = ?failed,
                total = total,
                "Some indexers failed during search"
            );
        }

        merge_unique(
            outcomes
                .into_iter()
                .map(|(name, outcome)| flatten(&name, "search", outcome)),
        )
    }
}
