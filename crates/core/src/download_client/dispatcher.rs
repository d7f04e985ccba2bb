//! Routes releases to download client backends.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::DownloadClientConfig;
use crate::searcher::{Release, ReleaseKind};

use super::{
    CancelOutcome, CancelResult, DownloadClient, DownloadClientError, DownloadStationClient,
    QBittorrentClient, RtorrentClient, SabnzbdClient, SubmissionResult,
};

/// Owns the enabled backends and the shutdown signal their retry loops watch.
pub struct DownloadDispatcher {
    clients: Vec<Arc<dyn DownloadClient>>,
    shutdown: watch::Sender<bool>,
}

impl Default for DownloadDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl DownloadDispatcher {
    /// Create a dispatcher with no backends.
    pub fn new() -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            clients: Vec::new(),
            shutdown,
        }
    }

    /// Build every enabled backend, in configuration order.
    pub fn from_config(configs: &[DownloadClientConfig]) -> Self {
        let mut dispatcher = Self::new();
        for config in configs.iter().filter(|c| c.enabled()) {
            let client: Arc<dyn DownloadClient> = match config {
                DownloadClientConfig::Sabnzbd(c) => Arc::new(SabnzbdClient::new(c.clone())),
                DownloadClientConfig::DownloadStation(c) => {
                    Arc::new(DownloadStationClient::new(c.clone()))
                }
                DownloadClientConfig::Rtorrent(c) => Arc::new(RtorrentClient::new(
                    c.clone(),
                    dispatcher.shutdown_signal(),
                )),
                DownloadClientConfig::Qbittorrent(c) => {
                    Arc::new(QBittorrentClient::new(c.clone()))
                }
            };
            dispatcher.register(client);
        }
        debug!(clients = dispatcher.clients.len(), "Built download clients");
        dispatcher
    }

    /// Add a backend after the configured ones.
    pub fn register(&mut self, client: Arc<dyn DownloadClient>) {
        self.clients.push(client);
    }

    pub fn clients(&self) -> &[Arc<dyn DownloadClient>] {
        &self.clients
    }

    /// Receiver for backends that wait on eventual consistency.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    /// Interrupt any pending retry loop.
    pub fn shutdown(&self) {
        info!("Download dispatcher shutting down");
        self.shutdown.send_replace(true);
    }

    pub fn client(&self, name: &str) -> Option<&Arc<dyn DownloadClient>> {
        self.clients.iter().find(|c| c.name() == name)
    }

    /// The named backend, or the first one that accepts this kind.
    pub fn route(
        &self,
        kind: ReleaseKind,
        preferred: Option<&str>,
    ) -> Result<&Arc<dyn DownloadClient>, DownloadClientError> {
        match preferred {
            Some(name) => {
                let client = self.client(name).ok_or_else(|| {
                    DownloadClientError::Unsupported(format!("unknown download client '{}'", name))
                })?;
                if client.accepts(kind) {
                    Ok(client)
                } else {
                    Err(DownloadClientError::Unsupported(format!(
                        "download client '{}' does not accept {} releases",
                        name,
                        kind.as_str()
                    )))
                }
            }
            None => self.clients.iter().find(|c| c.accepts(kind)).ok_or_else(|| {
                DownloadClientError::Unsupported(format!(
                    "no download client accepts {} releases",
                    kind.as_str()
                ))
            }),
        }
    }

    /// Submit a release and record the chosen backend and id on it.
    pub async fn submit(&self, release: &mut Release, preferred: Option<&str>) -> SubmissionResult {
        let client = match self.route(release.kind, preferred) {
            Ok(client) => client,
            Err(e) => {
                warn!(guid = %release.guid, error = %e, "No download client for release");
                return SubmissionResult::failed(e.to_string());
            }
        };

        match client.submit(release).await {
            Ok(download_id) => {
                crate::metrics::SUBMISSIONS
                    .with_label_values(&[client.name(), "success"])
                    .inc();
                info!(
                    client = %client.name(),
                    title = %release.title,
                    download_id = %download_id,
                    "Release submitted"
                );
                release.download_client = Some(client.name().to_string());
                release.download_id = Some(download_id.clone());
                SubmissionResult::submitted(download_id)
            }
            Err(e) => {
                crate::metrics::SUBMISSIONS
                    .with_label_values(&[client.name(), "failed"])
                    .inc();
                error!(
                    client = %client.name(),
                    title = %release.title,
                    kind = e.kind().as_str(),
                    error = %e,
                    "Release submission failed"
                );
                SubmissionResult::failed(e.to_string())
            }
        }
    }

    /// Cancel a download. Unknown or already removed downloads report `ok`.
    pub async fn cancel(&self, client_name: &str, download_id: &str) -> CancelResult {
        let Some(client) = self.client(client_name) else {
            return CancelResult {
                ok: false,
                error: Some(format!("unknown download client '{}'", client_name)),
            };
        };

        let (ok, error, label) = match client.cancel(download_id).await {
            Ok(CancelOutcome::Removed) => {
                info!(client = %client_name, download_id = %download_id, "Download cancelled");
                (true, None, "success")
            }
            Ok(CancelOutcome::NotFound(reason)) => {
                warn!(
                    client = %client_name,
                    download_id = %download_id,
                    reason = %reason,
                    "Download already gone, treating cancel as done"
                );
                (true, None, "not_found")
            }
            Err(e) => {
                error!(
                    client = %client_name,
                    download_id = %download_id,
                    kind = e.kind().as_str(),
                    error = %e,
                    "Download cancel failed"
                );
                (false, Some(e.to_string()), "failed")
            }
        };

        crate::metrics::CANCELLATIONS
            .with_label_values(&[client_name, label])
            .inc();
        CancelResult { ok, error }
    }

    /// Check one backend's connectivity and credentials.
    pub async fn test_connection(&self, client_name: &str) -> Result<(), DownloadClientError> {
        let client = self.client(client_name).ok_or_else(|| {
            DownloadClientError::Unsupported(format!("unknown download client '{}'", client_name))
        })?;
        client.test_connection().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;
    use crate::testing::{fixtures, MockDownloadClient};

    fn dispatcher(clients: Vec<Arc<MockDownloadClient>>) -> DownloadDispatcher {
        let mut dispatcher = DownloadDispatcher::new();
        for client in clients {
            dispatcher.register(client);
        }
        dispatcher
    }

    #[tokio::test]
    async fn test_routes_by_kind() {
        let usenet = Arc::new(MockDownloadClient::new("sab", &[ReleaseKind::Nzb]));
        let torrent = Arc::new(MockDownloadClient::new(
            "rtorrent",
            &[ReleaseKind::Torrent, ReleaseKind::Magnet],
        ));
        let dispatcher = dispatcher(vec![usenet.clone(), torrent.clone()]);

        let mut release = fixtures::release("Jackett", "guid-1");
        let result = dispatcher.submit(&mut release, None).await;

        assert!(result.ok);
        assert_eq!(release.download_client.as_deref(), Some("rtorrent"));
        assert_eq!(release.download_id, result.download_id);
        assert!(usenet.submitted().await.is_empty());
        assert_eq!(torrent.submitted().await.len(), 1);
    }

    #[tokio::test]
    async fn test_preferred_client_must_accept_kind() {
        let usenet = Arc::new(MockDownloadClient::new("sab", &[ReleaseKind::Nzb]));
        let dispatcher = dispatcher(vec![usenet]);

        let mut release = fixtures::release("Jackett", "guid-1");
        let result = dispatcher.submit(&mut release, Some("sab")).await;
        assert!(!result.ok);
        assert!(result.error.unwrap().contains("does not accept magnet"));
        assert!(release.download_client.is_none());

        let result = dispatcher.submit(&mut release, Some("missing")).await;
        assert!(result.error.unwrap().contains("unknown download client"));
    }

    #[tokio::test]
    async fn test_backend_error_becomes_failed_result() {
        let client = Arc::new(MockDownloadClient::new("ds", &[ReleaseKind::Magnet]));
        client
            .set_next_error(DownloadClientError::Backend("Invalid parameter".into()))
            .await;
        let dispatcher = dispatcher(vec![client]);

        let mut release = fixtures::release("Jackett", "guid-1");
        let result = dispatcher.submit(&mut release, None).await;
        assert_eq!(result, SubmissionResult::failed("Invalid parameter"));
    }

    #[tokio::test]
    async fn test_cancel_twice_is_ok() {
        let client = Arc::new(MockDownloadClient::new("ds", &[ReleaseKind::Magnet]));
        let dispatcher = dispatcher(vec![client]);

        let mut release = fixtures::release("Jackett", "guid-1");
        let id = dispatcher.submit(&mut release, None).await.download_id.unwrap();

        assert!(dispatcher.cancel("ds", &id).await.ok);
        let second = dispatcher.cancel("ds", &id).await;
        assert!(second.ok);
        assert!(second.error.is_none());
    }

    #[tokio::test]
    async fn test_cancel_unknown_client() {
        let result = DownloadDispatcher::new().cancel("nope", "id").await;
        assert!(!result.ok);
    }

    #[tokio::test]
    async fn test_shutdown_signal() {
        let dispatcher = DownloadDispatcher::new();
        let rx = dispatcher.shutdown_signal();
        assert!(!*rx.borrow());
        dispatcher.shutdown();
        assert!(*rx.borrow());
    }

    #[test]
    fn test_from_config_skips_disabled() {
        let config = load_config_from_str(
            r#"
[[download_clients]]
backend = "sabnzbd"
host = "localhost"
api_key = "abc"

[[download_clients]]
backend = "rtorrent"
host = "localhost"
enabled = false

[[download_clients]]
backend = "qbittorrent"
url = "http://localhost:8081"
username = "admin"
"#,
        )
        .unwrap();

        let dispatcher = DownloadDispatcher::from_config(&config.download_clients);
        let names: Vec<&str> = dispatcher.clients().iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["sabnzbd", "qbittorrent"]);
        assert_eq!(
            dispatcher.route(ReleaseKind::Nzb, None).unwrap().backend(),
            "sabnzbd"
        );
    }
}
