//! Types for the release search system.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Status every release carries when it is first discovered.
pub const STATUS_AVAILABLE: &str = "Available";

/// How a release's locator is fetched by a download client.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseKind {
    /// Direct `.torrent` file URL.
    Torrent,
    /// Magnet URI.
    Magnet,
    /// Usenet NZB locator.
    Nzb,
}

impl ReleaseKind {
    /// Returns the string representation for logs and API responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseKind::Torrent => "torrent",
            ReleaseKind::Magnet => "magnet",
            ReleaseKind::Nzb => "nzb",
        }
    }

    /// Derive the kind of a torrent-family locator from its shape.
    pub fn from_locator(locator: &str) -> Self {
        if locator.trim_start().starts_with("magnet:") {
            ReleaseKind::Magnet
        } else {
            ReleaseKind::Torrent
        }
    }

    /// Whether this kind is handled by torrent clients.
    pub fn is_torrent_family(&self) -> bool {
        matches!(self, ReleaseKind::Torrent | ReleaseKind::Magnet)
    }
}

/// Source-specific bonus indicator.
///
/// Indexers disagree on what "freeleech" means, so the value is kept in the
/// shape the source reported it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Freeleech {
    /// Yes/no flag (public trackers report `false`).
    Flag(bool),
    /// Numeric credit or download-volume factor.
    Factor(f64),
}

/// A normalized release, the common output of every indexer adapter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Release {
    /// Indexer display name.
    pub indexer: String,
    /// Source-scoped unique id, used for de-duplication.
    pub guid: String,
    pub title: String,
    /// Human-facing details page.
    pub info_link: String,
    /// `.torrent` URL, magnet URI or NZB locator.
    pub locator: String,
    pub kind: ReleaseKind,
    pub size_bytes: u64,
    /// Always 0 for usenet.
    pub seeders: u32,
    /// Always 0 for usenet.
    pub leechers: u32,
    /// `None` when the source does not report it at all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub freeleech: Option<Freeleech>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imdb_id: Option<String>,
    /// Publish date as reported by the source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_date: Option<String>,
    pub status: String,
    /// Filled by the ranking stage.
    pub score: i64,
    #[serde(default)]
    pub download_client: Option<String>,
    #[serde(default)]
    pub download_id: Option<String>,
}

impl Release {
    /// Create a release with the discovery-time defaults.
    pub fn new(
        indexer: impl Into<String>,
        guid: impl Into<String>,
        title: impl Into<String>,
        locator: impl Into<String>,
        kind: ReleaseKind,
    ) -> Self {
        Self {
            indexer: indexer.into(),
            guid: guid.into(),
            title: title.into(),
            info_link: String::new(),
            locator: locator.into(),
            kind,
            size_bytes: 0,
            seeders: 0,
            leechers: 0,
            freeleech: None,
            imdb_id: None,
            publish_date: None,
            status: STATUS_AVAILABLE.to_string(),
            score: 0,
            download_client: None,
            download_id: None,
        }
    }
}

/// A backlog search for one movie.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchRequest {
    /// IMDb id including the `tt` prefix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imdb_id: Option<String>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<u16>,
    /// Capability probe mode: never query identifier-capable sources.
    #[serde(default)]
    pub skip_if_identifier_capable: bool,
}

impl SearchRequest {
    /// Free-text term, `"{title} {year}"` when the year is known.
    pub fn term(&self) -> String {
        match self.year {
            Some(year) => format!("{} {}", self.title.trim(), year),
            None => self.title.trim().to_string(),
        }
    }
}

/// Error categories carried in structured logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Timeout, DNS failure, connection refused.
    Connectivity,
    /// Response does not match the expected schema.
    Protocol,
    /// Bad credentials or an expired session.
    Auth,
    /// Source reachable but had nothing.
    EmptyResult,
    /// Some sources failed while others succeeded.
    PartialFailure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Connectivity => "connectivity",
            ErrorKind::Protocol => "protocol",
            ErrorKind::Auth => "auth",
            ErrorKind::EmptyResult => "empty_result",
            ErrorKind::PartialFailure => "partial_failure",
        }
    }
}

/// Errors an indexer adapter can report.
#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("Indexer connection failed: {0}")]
    Connectivity(String),

    #[error("Unexpected indexer response: {0}")]
    Protocol(String),

    #[error("Indexer rejected credentials: {0}")]
    Auth(String),
}

impl IndexerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IndexerError::Connectivity(_) => ErrorKind::Connectivity,
            IndexerError::Protocol(_) => ErrorKind::Protocol,
            IndexerError::Auth(_) => ErrorKind::Auth,
        }
    }

    /// Classify a transport error.
    pub fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() || e.is_request() {
            IndexerError::Connectivity(e.to_string())
        } else if e.is_decode() {
            IndexerError::Protocol(e.to_string())
        } else {
            IndexerError::Connectivity(e.to_string())
        }
    }
}

/// An indexer adapter.
///
/// Adapters report failures as typed errors; the aggregator and RSS sync
/// flatten them to empty lists.
#[async_trait]
pub trait Indexer: Send + Sync {
    /// Display name, used as `Release::indexer` and in logs.
    fn name(&self) -> &str;

    /// Whether this adapter can only search by IMDb id.
    fn requires_imdb_id(&self) -> bool {
        false
    }

    /// Backlog search.
    async fn search(&self, request: &SearchRequest) -> Result<Vec<Release>, IndexerError>;

    /// Latest releases feed. Sources without a feed return an empty list.
    async fn latest(&self) -> Result<Vec<Release>, IndexerError>;
}

/// Fetch the latest feed, logging and flattening any failure to an empty list.
pub async fn latest_or_empty(indexer: &dyn Indexer) -> Vec<Release> {
    let outcome = indexer.latest().await;
    flatten(indexer.name(), "latest", outcome)
}

/// Record an adapter outcome in metrics and logs, flattening errors to an empty list.
pub(crate) fn flatten(
    indexer: &str,
    operation: &str,
    outcome: Result<Vec<Release>, IndexerError>,
) -> Vec<Release> {
    match outcome {
        Ok(releases) => {
            let status = if releases.is_empty() {
                ErrorKind::EmptyResult.as_str()
            } else {
                "success"
            };
            crate::metrics::INDEXER_REQUESTS
                .with_label_values(&[indexer, operation, status])
                .inc();
            releases
        }
        Err(e) => {
            crate::metrics::INDEXER_REQUESTS
                .with_label_values(&[indexer, operation, e.kind().as_str()])
                .inc();
            tracing::warn!(
                indexer = %indexer,
                operation = operation,
                kind = e.kind().as_str(),
                error = %e,
                "Indexer request failed"
            );
            Vec::new()
        }
    }
}
