//! SABnzbd usenet backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::{sabnzbd_priority, SabnzbdConfig};
use crate::searcher::{Release, ReleaseKind};

use super::{CancelOutcome, DownloadClient, DownloadClientError};

/// SABnzbd client. Every call carries the API key, so there is no session.
pub struct SabnzbdClient {
    client: Client,
    config: SabnzbdConfig,
}

/// `mode=addurl` and `mode=queue&name=delete` response.
#[derive(Debug, Deserialize)]
struct QueueResponse {
    #[serde(default)]
    status: bool,
    #[serde(default)]
    nzo_ids: Option<Vec<String>>,
    #[serde(default)]
    error: Option<String>,
}

impl SabnzbdClient {
    pub fn new(config: SabnzbdConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Failed to build SABnzbd HTTP client, using defaults");
                Client::new()
            });
        Self { client, config }
    }

    /// `http://{host}:{port}/sabnzbd/api?apikey={key}`
    fn api_url(&self) -> String {
        let host = self.config.host.trim_end_matches('/');
        let host = if host.contains("://") {
            host.to_string()
        } else {
            format!("http://{}", host)
        };
        format!(
            "{}:{}/sabnzbd/api?apikey={}",
            host, self.config.port, self.config.api_key
        )
    }

    fn priority(&self) -> Result<i8, DownloadClientError> {
        sabnzbd_priority(&self.config.priority).ok_or_else(|| {
            DownloadClientError::Unsupported(format!(
                "unknown SABnzbd priority '{}'",
                self.config.priority
            ))
        })
    }

    async fn get_text(&self, url: &str) -> Result<String, DownloadClientError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(DownloadClientError::from_reqwest)?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(DownloadClientError::AuthenticationFailed(format!(
                "HTTP {}",
                status
            )));
        }
        if !status.is_success() {
            return Err(DownloadClientError::Backend(format!("HTTP {}", status)));
        }

        response
            .text()
            .await
            .map_err(DownloadClientError::from_reqwest)
    }

    async fn get_queue_response(&self, url: &str) -> Result<QueueResponse, DownloadClientError> {
        let body = self.get_text(url).await?;
        serde_json::from_str(&body).map_err(|e| {
            DownloadClientError::Protocol(format!("Failed to parse response: {}", e))
        })
    }
}

#[async_trait]
impl DownloadClient for SabnzbdClient {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn backend(&self) -> &'static str {
        "sabnzbd"
    }

    fn accepts(&self, kind: ReleaseKind) -> bool {
        kind == ReleaseKind::Nzb
    }

    async fn test_connection(&self) -> Result<(), DownloadClientError> {
        info!(client = %self.config.name, "Testing connection to SABnzbd");
        let url = format!("{}&mode=server_stats", self.api_url());
        let body = self.get_text(&url).await?;
        if body.contains("error") {
            return Err(DownloadClientError::Backend(body));
        }
        Ok(())
    }

    /// `name=` carries the release's download URL, not its guid: Newznab feeds
    /// use an opaque guid while the locator is the fetchable NZB link.
    async fn submit(&self, release: &Release) -> Result<String, DownloadClientError> {
        if !self.accepts(release.kind) {
            return Err(DownloadClientError::Unsupported(format!(
                "SABnzbd cannot fetch {} releases",
                release.kind.as_str()
            )));
        }
        let priority = self.priority()?;

        info!(client = %self.config.name, title = %release.title, "Sending NZB to SABnzbd");

        let url = format!(
            "{}&mode=addurl&name={}&nzbname={}&cat={}&priority={}&output=json",
            self.api_url(),
            urlencoding::encode(&release.locator),
            urlencoding::encode(&release.title),
            urlencoding::encode(&self.config.category),
            priority
        );

        let response = self.get_queue_response(&url).await?;
        match response.nzo_ids.unwrap_or_default().into_iter().next() {
            Some(id) if response.status => {
                debug!(download_id = %id, "NZB accepted by SABnzbd");
                Ok(id)
            }
            _ => Err(DownloadClientError::Backend(
                response
                    .error
                    .unwrap_or_else(|| "Unable to add NZB.".to_string()),
            )),
        }
    }

    async fn cancel(&self, download_id: &str) -> Result<CancelOutcome, DownloadClientError> {
        info!(
            client = %self.config.name,
            download_id = %download_id,
            "Cancelling download in SABnzbd"
        );

        let url = format!(
            "{}&mode=queue&name=delete&value={}&output=json",
            self.api_url(),
            urlencoding::encode(download_id)
        );

        let response = self.get_queue_response(&url).await?;
        if !response.status {
            let reason = response
                .error
                .unwrap_or_else(|| "queue delete returned false".to_string());
            if reason.to_lowercase().contains("not found") {
                return Ok(CancelOutcome::NotFound(reason));
            }
            return Err(DownloadClientError::Backend(reason));
        }

        // Older releases omit nzo_ids; only an explicit empty list means nothing was removed.
        match response.nzo_ids {
            Some(ids) if ids.is_empty() => Ok(CancelOutcome::NotFound(format!(
                "{} not in queue",
                download_id
            ))),
            _ => Ok(CancelOutcome::Removed),
        }
    }
}
