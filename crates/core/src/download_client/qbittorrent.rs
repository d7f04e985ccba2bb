//! qBittorrent Web API v2 backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{multipart, Client, RequestBuilder};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::QBittorrentConfig;
use crate::searcher::{Release, ReleaseKind};

use super::hash::{magnet_info_hash, torrent_info_hash};
use super::session::Session;
use super::{CancelOutcome, DownloadClient, DownloadClientError, SessionState};

/// qBittorrent client. The SID cookie lives in the client's cookie jar.
pub struct QBittorrentClient {
    client: Client,
    config: QBittorrentConfig,
    session: Session<()>,
}

#[derive(Debug, Deserialize)]
struct QBTorrentInfo {
    hash: String,
}

impl QBittorrentClient {
    pub fn new(config: QBittorrentConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .cookie_store(true)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Failed to build qBittorrent HTTP client, using defaults");
                Client::new()
            });

        Self {
            client,
            config,
            session: Session::new(),
        }
    }

    /// Get the base URL without trailing slash.
    fn base_url(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }

    async fn login(&self) -> Result<(), DownloadClientError> {
        let url = format!("{}/api/v2/auth/login", self.base_url());
        let params = [
            ("username", self.config.username.as_str()),
            ("password", self.config.password.as_str()),
        ];

        let response = self
            .client
            .post(&url)
            .form(&params)
            .send()
            .await
            .map_err(DownloadClientError::from_reqwest)?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if body.contains("Ok.") {
            debug!("qBittorrent login successful");
            Ok(())
        } else if body.contains("Fails.") || status.as_u16() == 403 {
            Err(DownloadClientError::AuthenticationFailed(
                "Invalid credentials".to_string(),
            ))
        } else {
            Err(DownloadClientError::AuthenticationFailed(format!(
                "Unexpected response: {}",
                body.chars().take(100).collect::<String>()
            )))
        }
    }

    /// Send an authenticated request.
    ///
    /// A 403 drops the session; the next call logs in again.
    async fn send(&self, request: RequestBuilder) -> Result<String, DownloadClientError> {
        self.session.get_or_login(|| self.login()).await?;

        let response = request
            .send()
            .await
            .map_err(DownloadClientError::from_reqwest)?;

        let status = response.status();
        if status.as_u16() == 403 {
            warn!(client = %self.config.name, "qBittorrent session expired");
            self.session.invalidate().await;
            return Err(DownloadClientError::AuthenticationFailed(
                "session expired".to_string(),
            ));
        }
        if !status.is_success() {
            return Err(DownloadClientError::Backend(format!("HTTP {}", status)));
        }

        response
            .text()
            .await
            .map_err(DownloadClientError::from_reqwest)
    }

    async fn fetch_torrent(&self, url: &str) -> Result<Vec<u8>, DownloadClientError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(DownloadClientError::from_reqwest)?;
        if !response.status().is_success() {
            return Err(DownloadClientError::Backend(format!(
                "torrent download failed: HTTP {}",
                response.status()
            )));
        }
        Ok(response
            .bytes()
            .await
            .map_err(DownloadClientError::from_reqwest)?
            .to_vec())
    }

    fn add_options(&self, mut form: multipart::Form) -> multipart::Form {
        if !self.config.category.is_empty() {
            form = form.text("category", self.config.category.clone());
        }
        if self.config.add_paused {
            form = form.text("paused", "true");
        }
        form
    }
}

#[async_trait]
impl DownloadClient for QBittorrentClient {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn backend(&self) -> &'static str {
        "qbittorrent"
    }

    fn accepts(&self, kind: ReleaseKind) -> bool {
        kind.is_torrent_family()
    }

    async fn session_state(&self) -> SessionState {
        self.session.state().await
    }

    async fn test_connection(&self) -> Result<(), DownloadClientError> {
        info!(client = %self.config.name, "Testing connection to qBittorrent");
        self.session.invalidate().await;
        self.session.get_or_login(|| self.login()).await
    }

    async fn submit(&self, release: &Release) -> Result<String, DownloadClientError> {
        info!(client = %self.config.name, title = %release.title, "Sending torrent to qBittorrent");

        let url = format!("{}/api/v2/torrents/add", self.base_url());
        let (hash, form) = match release.kind {
            ReleaseKind::Magnet => {
                let hash = magnet_info_hash(&release.locator).ok_or_else(|| {
                    DownloadClientError::Unsupported("magnet URI has no btih hash".to_string())
                })?;
                let form = multipart::Form::new().text("urls", release.locator.clone());
                (hash, form)
            }
            ReleaseKind::Torrent => {
                let data = self.fetch_torrent(&release.locator).await?;
                let hash = torrent_info_hash(&data)?;
                let part = multipart::Part::bytes(data)
                    .file_name(format!("{}.torrent", hash))
                    .mime_str("application/x-bittorrent")
                    .map_err(|e| DownloadClientError::Unsupported(e.to_string()))?;
                (hash, multipart::Form::new().part("torrents", part))
            }
            ReleaseKind::Nzb => {
                return Err(DownloadClientError::Unsupported(
                    "qBittorrent cannot fetch nzb releases".to_string(),
                ))
            }
        };

        let body = self
            .send(self.client.post(&url).multipart(self.add_options(form)))
            .await?;
        if body.contains("Fails.") {
            return Err(DownloadClientError::Backend(
                "qBittorrent rejected the torrent".to_string(),
            ));
        }

        // qBittorrent reports hashes in lowercase
        Ok(hash.to_lowercase())
    }

    async fn cancel(&self, download_id: &str) -> Result<CancelOutcome, DownloadClientError> {
        info!(
            client = %self.config.name,
            download_id = %download_id,
            "Cancelling download in qBittorrent"
        );
        let hash = download_id.to_lowercase();

        let info_url = format!(
            "{}/api/v2/torrents/info?hashes={}",
            self.base_url(),
            hash
        );
        let body = self.send(self.client.get(&info_url)).await?;
        let torrents: Vec<QBTorrentInfo> = serde_json::from_str(&body).map_err(|e| {
            DownloadClientError::Protocol(format!("Failed to parse response: {}", e))
        })?;
        if !torrents.iter().any(|t| t.hash.eq_ignore_ascii_case(&hash)) {
            return Ok(CancelOutcome::NotFound(format!(
                "torrent {} not in qBittorrent",
                hash
            )));
        }

        let delete_url = format!("{}/api/v2/torrents/delete", self.base_url());
        self.send(
            self.client
                .post(&delete_url)
                .form(&[("hashes", hash.as_str()), ("deleteFiles", "true")]),
        )
        .await?;
        Ok(CancelOutcome::Removed)
    }
}
