//! Mock download client for testing.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::download_client::{CancelOutcome, DownloadClient, DownloadClientError};
use crate::searcher::{Release, ReleaseKind};

/// A recorded submission for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedSubmission {
    /// The release that was submitted.
    pub release: Release,
    /// The id handed back.
    pub download_id: String,
    /// When the submission was made.
    pub timestamp: chrono::DateTime<Utc>,
}

/// Mock implementation of the DownloadClient trait.
///
/// Active downloads are tracked so a second cancel reports `NotFound`,
/// like a real backend.
#[derive(Debug)]
pub struct MockDownloadClient {
    name: String,
    kinds: Vec<ReleaseKind>,
    submitted: Arc<RwLock<Vec<RecordedSubmission>>>,
    active: Arc<RwLock<HashSet<String>>>,
    /// If set, the next operation will fail with this error.
    next_error: Arc<RwLock<Option<DownloadClientError>>>,
}

impl MockDownloadClient {
    /// Create a mock backend accepting the given kinds.
    pub fn new(name: impl Into<String>, kinds: &[ReleaseKind]) -> Self {
        Self {
            name: name.into(),
            kinds: kinds.to_vec(),
            submitted: Arc::new(RwLock::new(Vec::new())),
            active: Arc::new(RwLock::new(HashSet::new())),
            next_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Get all recorded submissions.
    pub async fn submitted(&self) -> Vec<RecordedSubmission> {
        self.submitted.read().await.clone()
    }

    /// Whether a download is still active.
    pub async fn is_active(&self, download_id: &str) -> bool {
        self.active.read().await.contains(download_id)
    }

    /// Configure the next operation to fail with the given error.
    pub async fn set_next_error(&self, error: DownloadClientError) {
        *self.next_error.write().await = Some(error);
    }

    async fn take_error(&self) -> Result<(), DownloadClientError> {
        match self.next_error.write().await.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DownloadClient for MockDownloadClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn backend(&self) -> &'static str {
        "mock"
    }

    fn accepts(&self, kind: ReleaseKind) -> bool {
        self.kinds.contains(&kind)
    }

    async fn test_connection(&self) -> Result<(), DownloadClientError> {
        self.take_error().await
    }

    async fn submit(&self, release: &Release) -> Result<String, DownloadClientError> {
        self.take_error().await?;

        let mut submitted = self.submitted.write().await;
        let download_id = format!("{}-{}", self.name, submitted.len() + 1);
        submitted.push(RecordedSubmission {
            release: release.clone(),
            download_id: download_id.clone(),
            timestamp: Utc::now(),
        });
        self.active.write().await.insert(download_id.clone());
        Ok(download_id)
    }

    async fn cancel(&self, download_id: &str) -> Result<CancelOutcome, DownloadClientError> {
        self.take_error().await?;
        if self.active.write().await.remove(download_id) {
            Ok(CancelOutcome::Removed)
        } else {
            Ok(CancelOutcome::NotFound(format!("{} is not active", download_id)))
        }
    }
}
