//! Mock indexer for testing.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::searcher::{Indexer, IndexerError, Release, SearchRequest};

/// A recorded search for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedSearch {
    /// The request that was searched.
    pub request: SearchRequest,
    /// When the search was made.
    pub timestamp: Instant,
}

/// Mock implementation of the Indexer trait.
///
/// Provides controllable behavior for testing:
/// - Return configurable search and latest-feed results
/// - Track search requests for assertions
/// - Simulate failures and latency
///
/// # Example
///
/// ```rust,ignore
/// use reelfetch_core::testing::{MockIndexer, fixtures};
///
/// let indexer = MockIndexer::new("Mock");
/// indexer.set_search_results(vec![fixtures::release("Mock", "guid-1")]).await;
/// indexer.set_next_error(IndexerError::Connectivity("down".into())).await;
///
/// // First call fails, second returns the release
/// assert!(indexer.search(&request).await.is_err());
/// assert_eq!(indexer.search(&request).await?.len(), 1);
/// ```
#[derive(Debug)]
pub struct MockIndexer {
    name: String,
    requires_imdb_id: bool,
    delay: Option<Duration>,
    /// Configured search results.
    results: Arc<RwLock<Vec<Release>>>,
    /// Configured latest-feed results.
    latest: Arc<RwLock<Vec<Release>>>,
    /// Recorded search requests.
    searches: Arc<RwLock<Vec<RecordedSearch>>>,
    /// Number of latest-feed polls.
    latest_calls: Arc<RwLock<usize>>,
    /// If set, the next call will fail with this error.
    next_error: Arc<RwLock<Option<IndexerError>>>,
}

impl MockIndexer {
    /// Create a new mock indexer with empty results.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            requires_imdb_id: false,
            delay: None,
            results: Arc::new(RwLock::new(Vec::new())),
            latest: Arc::new(RwLock::new(Vec::new())),
            searches: Arc::new(RwLock::new(Vec::new())),
            latest_calls: Arc::new(RwLock::new(0)),
            next_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Behave like an adapter that only searches by IMDb id.
    pub fn requiring_imdb_id(mut self) -> Self {
        self.requires_imdb_id = true;
        self
    }

    /// Sleep before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Set the results to return for subsequent searches.
    pub async fn set_search_results(&self, results: Vec<Release>) {
        *self.results.write().await = results;
    }

    /// Set the results to return for subsequent latest-feed polls.
    pub async fn set_latest_results(&self, results: Vec<Release>) {
        *self.latest.write().await = results;
    }

    /// Configure the next call to fail with the given error.
    pub async fn set_next_error(&self, error: IndexerError) {
        *self.next_error.write().await = Some(error);
    }

    /// Get recorded search requests.
    pub async fn recorded_searches(&self) -> Vec<RecordedSearch> {
        self.searches.read().await.clone()
    }

    /// Get the number of latest-feed polls.
    pub async fn latest_count(&self) -> usize {
        *self.latest_calls.read().await
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }

    /// Take the next error if set.
    async fn take_error(&self) -> Option<IndexerError> {
        self.next_error.write().await.take()
    }
}

#[async_trait]
impl Indexer for MockIndexer {
    fn name(&self) -> &str {
        &self.name
    }

    fn requires_imdb_id(&self) -> bool {
        self.requires_imdb_id
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<Release>, IndexerError> {
        self.pause().await;

        // Record before failing so tests can see attempted searches
        self.searches.write().await.push(RecordedSearch {
            request: request.clone(),
            timestamp: Instant::now(),
        });

        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        if self.requires_imdb_id && request.imdb_id.is_none() {
            return Ok(Vec::new());
        }

        Ok(self.results.read().await.clone())
    }

    async fn latest(&self) -> Result<Vec<Release>, IndexerError> {
        self.pause().await;
        *self.latest_calls.write().await += 1;

        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        Ok(self.latest.read().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    fn request(imdb_id: Option<&str>) -> SearchRequest {
        SearchRequest {
            imdb_id: imdb_id.map(String::from),
            title: "Movie".to_string(),
            year: Some(2020),
            skip_if_identifier_capable: false,
        }
    }

    #[tokio::test]
    async fn test_error_injection_is_consumed() {
        let indexer = MockIndexer::new("Mock");
        indexer
            .set_search_results(vec![fixtures::release("Mock", "a")])
            .await;
        indexer
            .set_next_error(IndexerError::Protocol("bad".into()))
            .await;

        assert!(indexer.search(&request(None)).await.is_err());
        assert_eq!(indexer.search(&request(None)).await.unwrap().len(), 1);
        assert_eq!(indexer.recorded_searches().await.len(), 2);
    }

    #[tokio::test]
    async fn test_requires_imdb_id() {
        let indexer = MockIndexer::new("Ids").requiring_imdb_id();
        indexer
            .set_search_results(vec![fixtures::release("Ids", "a")])
            .await;

        assert!(indexer.search(&request(None)).await.unwrap().is_empty());
        assert_eq!(
            indexer.search(&request(Some("tt0111161"))).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn test_latest_counts_polls() {
        let indexer = MockIndexer::new("Feed");
        indexer
            .set_latest_results(vec![fixtures::release("Feed", "x")])
            .await;
        indexer.latest().await.unwrap();
        indexer.latest().await.unwrap();
        assert_eq!(indexer.latest_count().await, 2);
    }
}
