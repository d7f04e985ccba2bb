//! Types for download client operations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::searcher::{ErrorKind, Release, ReleaseKind};

/// Errors that can occur during download client operations.
#[derive(Debug, Error)]
pub enum DownloadClientError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The backend answered with an error code or message.
    #[error("{0}")]
    Backend(String),

    #[error("Unexpected response: {0}")]
    Protocol(String),

    #[error("Download not found: {0}")]
    NotFound(String),

    #[error("Release not supported: {0}")]
    Unsupported(String),

    #[error("Torrent hash ({0}) not found in client after {1} attempts, cannot apply label")]
    LabelTimeout(String, u32),

    #[error("Request timeout")]
    Timeout,

    #[error("Shutting down")]
    Cancelled,
}

impl DownloadClientError {
    /// Error category for structured logs.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DownloadClientError::ConnectionFailed(_) | DownloadClientError::Timeout => {
                ErrorKind::Connectivity
            }
            DownloadClientError::AuthenticationFailed(_) => ErrorKind::Auth,
            _ => ErrorKind::Protocol,
        }
    }

    /// Classify a transport error.
    pub fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            DownloadClientError::Timeout
        } else if e.is_connect() || e.is_request() {
            DownloadClientError::ConnectionFailed(e.to_string())
        } else {
            DownloadClientError::Protocol(e.to_string())
        }
    }
}

/// Authentication state of one backend instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    NotConnected,
    Authenticated,
}

/// Outcome of a submission, consumed immediately by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionResult {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SubmissionResult {
    pub fn submitted(download_id: impl Into<String>) -> Self {
        Self {
            ok: true,
            download_id: Some(download_id.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            download_id: None,
            error: Some(error.into()),
        }
    }
}

/// What a cancel actually did on the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
    Removed,
    /// Already gone or never known; carries the backend's reason.
    NotFound(String),
}

/// Outcome of a cancellation as seen by the caller.
///
/// An unknown download still reports `ok`, cancelling twice is not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelResult {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Trait for download client backends.
#[async_trait]
pub trait DownloadClient: Send + Sync {
    /// Configured instance name.
    fn name(&self) -> &str;

    /// Backend type for logs and metrics.
    fn backend(&self) -> &'static str;

    /// Whether this backend can fetch releases of the given kind.
    fn accepts(&self, kind: ReleaseKind) -> bool;

    /// Current authentication state. Stateless backends are always authenticated.
    async fn session_state(&self) -> SessionState {
        SessionState::Authenticated
    }

    /// Check connectivity and credentials.
    async fn test_connection(&self) -> Result<(), DownloadClientError>;

    /// Submit a release and return its durable download id.
    async fn submit(&self, release: &Release) -> Result<String, DownloadClientError>;

    /// Remove a submitted download.
    async fn cancel(&self, download_id: &str) -> Result<CancelOutcome, DownloadClientError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            DownloadClientError::Timeout.kind(),
            ErrorKind::Connectivity
        );
        assert_eq!(
            DownloadClientError::AuthenticationFailed("bad".into()).kind(),
            ErrorKind::Auth
        );
        assert_eq!(
            DownloadClientError::Backend("Invalid parameter".into()).kind(),
            ErrorKind::Protocol
        );
    }

    #[test]
    fn test_label_timeout_message() {
        let err = DownloadClientError::LabelTimeout("ABCDEF".into(), 10);
        assert_eq!(
            err.to_string(),
            "Torrent hash (ABCDEF) not found in client after 10 attempts, cannot apply label"
        );
    }

    #[test]
    fn test_submission_result_serialization() {
        let ok = serde_json::to_string(&SubmissionResult::submitted("SABnzbd_nzo_1")).unwrap();
        assert_eq!(ok, r#"{"ok":true,"download_id":"SABnzbd_nzo_1"}"#);

        let failed = serde_json::to_string(&SubmissionResult::failed("Session timeout")).unwrap();
        assert_eq!(failed, r#"{"ok":false,"error":"Session timeout"}"#);
    }

    #[test]
    fn test_session_state_serialization() {
        assert_eq!(
            serde_json::to_string(&SessionState::NotConnected).unwrap(),
            "\"not_connected\""
        );
    }
}
