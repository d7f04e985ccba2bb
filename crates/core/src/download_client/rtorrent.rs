//! rTorrent backend over XML-RPC/SCGI.
//!
//! rTorrent's `load` calls return nothing useful, so the download id is the
//! info hash computed before submission: taken from the magnet URI, or from
//! the downloaded `.torrent` file.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::RtorrentConfig;
use crate::searcher::{Release, ReleaseKind};

use super::hash::{magnet_info_hash, torrent_info_hash};
use super::retry::{poll_until, RetryError, RetryPolicy};
use super::scgi::ScgiTransport;
use super::xmlrpc::{fault_error, multicall_entry, XmlRpcError, XmlRpcValue};
use super::{CancelOutcome, DownloadClient, DownloadClientError};

/// Fault text rTorrent uses for hashes it does not know.
const UNKNOWN_HASH: &str = "Could not find info-hash";

pub struct RtorrentClient {
    config: RtorrentConfig,
    transport: ScgiTransport,
    http: Client,
    label_retry: RetryPolicy,
    shutdown: watch::Receiver<bool>,
}

impl RtorrentClient {
    pub fn new(config: RtorrentConfig, shutdown: watch::Receiver<bool>) -> Self {
        let timeout = Duration::from_secs(config.timeout_secs as u64);
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Failed to build rTorrent HTTP client, using defaults");
                Client::new()
            });
        Self {
            transport: ScgiTransport::new(&config.host, config.port, timeout),
            config,
            http,
            label_retry: RetryPolicy::default(),
            shutdown,
        }
    }

    /// Override how long to wait for a new torrent before labelling it.
    pub fn with_label_retry(mut self, policy: RetryPolicy) -> Self {
        self.label_retry = policy;
        self
    }

    /// Uppercase info hash for a torrent-family release.
    async fn info_hash(&self, release: &Release) -> Result<String, DownloadClientError> {
        if release.kind == ReleaseKind::Magnet {
            return magnet_info_hash(&release.locator).ok_or_else(|| {
                DownloadClientError::Unsupported("magnet URI has no btih hash".to_string())
            });
        }

        let response = self
            .http
            .get(&release.locator)
            .send()
            .await
            .map_err(DownloadClientError::from_reqwest)?;
        if !response.status().is_success() {
            return Err(DownloadClientError::Backend(format!(
                "torrent download failed: HTTP {}",
                response.status()
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(DownloadClientError::from_reqwest)?;
        torrent_info_hash(&bytes)
    }

    async fn is_listed(&self, hash: &str) -> Result<bool, DownloadClientError> {
        let list = self.transport.call("download_list", &[]).await?;
        Ok(list
            .as_array()
            .unwrap_or_default()
            .iter()
            .filter_map(XmlRpcValue::as_str)
            .any(|listed| listed.eq_ignore_ascii_case(hash)))
    }

    /// Wait for the torrent to show up, then set its label.
    async fn apply_label(&self, hash: &str) -> Result<(), DownloadClientError> {
        let mut shutdown = self.shutdown.clone();
        let waited = poll_until(self.label_retry, &mut shutdown, || self.is_listed(hash)).await;

        match waited {
            Ok(attempts) => {
                debug!(hash = %hash, attempts = attempts, "Torrent visible in rTorrent");
            }
            Err(RetryError::Exhausted(attempts)) => {
                crate::metrics::LABEL_TIMEOUTS.inc();
                error!(
                    hash = %hash,
                    attempts = attempts,
                    "Torrent hash not found in rTorrent, cannot apply label"
                );
                return Err(DownloadClientError::LabelTimeout(hash.to_string(), attempts));
            }
            Err(RetryError::Cancelled) => return Err(DownloadClientError::Cancelled),
            Err(RetryError::Inner(e)) => return Err(e),
        }

        self.transport
            .call(
                "d.set_custom1",
                &[XmlRpcValue::from(hash), XmlRpcValue::from(self.config.label.as_str())],
            )
            .await?;
        Ok(())
    }
}

/// Faults reported inside a `system.multicall` result.
fn multicall_faults(result: &XmlRpcValue) -> Vec<String> {
    result
        .as_array()
        .unwrap_or_default()
        .iter()
        .filter(|entry| matches!(entry, XmlRpcValue::Struct(_)))
        .map(|fault| match fault_error(fault) {
            XmlRpcError::Fault { message, .. } => message,
            other => other.to_string(),
        })
        .collect()
}

#[async_trait]
impl DownloadClient for RtorrentClient {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn backend(&self) -> &'static str {
        "rtorrent"
    }

    fn accepts(&self, kind: ReleaseKind) -> bool {
        kind.is_torrent_family()
    }

    async fn test_connection(&self) -> Result<(), DownloadClientError> {
        info!(
            client = %self.config.name,
            address = %self.transport.address(),
            "Testing connection to rTorrent SCGI"
        );
        self.transport.call("system.time", &[]).await.map(|_| ())
    }

    async fn submit(&self, release: &Release) -> Result<String, DownloadClientError> {
        if !self.accepts(release.kind) {
            return Err(DownloadClientError::Unsupported(format!(
                "rTorrent cannot fetch {} releases",
                release.kind.as_str()
            )));
        }
        info!(
            client = %self.config.name,
            title = %release.title,
            "Sending torrent to rTorrent SCGI"
        );

        let hash = self.info_hash(release).await?;
        let method = if self.config.add_paused {
            "load"
        } else {
            "load_start"
        };
        self.transport
            .call(method, &[XmlRpcValue::from(release.locator.as_str())])
            .await?;

        if !self.config.label.is_empty() {
            self.apply_label(&hash).await?;
        }
        Ok(hash)
    }

    async fn cancel(&self, download_id: &str) -> Result<CancelOutcome, DownloadClientError> {
        info!(
            client = %self.config.name,
            download_id = %download_id,
            "Cancelling download in rTorrent SCGI"
        );

        let id = || XmlRpcValue::from(download_id);
        let calls = XmlRpcValue::Array(vec![
            multicall_entry("d.custom5.set", vec![id(), XmlRpcValue::from("1")]),
            multicall_entry("d.delete_tied", vec![id()]),
            multicall_entry("d.erase", vec![id()]),
        ]);

        let result = match self.transport.call("system.multicall", &[calls]).await {
            Ok(result) => result,
            Err(DownloadClientError::Backend(reason)) if reason.contains(UNKNOWN_HASH) => {
                return Ok(CancelOutcome::NotFound(reason));
            }
            Err(e) => return Err(e),
        };

        let faults = multicall_faults(&result);
        match faults.first() {
            None => Ok(CancelOutcome::Removed),
            Some(reason) if faults.iter().all(|f| f.contains(UNKNOWN_HASH)) => {
                Ok(CancelOutcome::NotFound(reason.clone()))
            }
            Some(_) => Err(DownloadClientError::Backend(faults.join("; "))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn fault(message: &str) -> XmlRpcValue {
        let mut fields = BTreeMap::new();
        fields.insert("faultCode".to_string(), XmlRpcValue::Int(-501));
        fields.insert("faultString".to_string(), XmlRpcValue::from(message));
        XmlRpcValue::Struct(fields)
    }

    #[test]
    fn test_multicall_faults() {
        let ok = XmlRpcValue::Array(vec![
            XmlRpcValue::Array(vec![XmlRpcValue::Int(0)]),
            XmlRpcValue::Array(vec![XmlRpcValue::Int(0)]),
        ]);
        assert!(multicall_faults(&ok).is_empty());

        let missing = XmlRpcValue::Array(vec![
            fault("Could not find info-hash."),
            fault("Could not find info-hash."),
        ]);
        assert_eq!(multicall_faults(&missing).len(), 2);
    }

    #[tokio::test]
    async fn test_magnet_hash_without_network() {
        let (_tx, rx) = watch::channel(false);
        let client = RtorrentClient::new(
            RtorrentConfig {
                name: "rtorrent".to_string(),
                enabled: true,
                host: "127.0.0.1".to_string(),
                port: 1,
                label: String::new(),
                add_paused: false,
                timeout_secs: 1,
            },
            rx,
        );
        let release = Release::new(
            "Zooqle",
            "g",
            "Movie",
            "magnet:?xt=urn:btih:c9e15763f722f23e98a29decdfae341b98d53056&dn=Movie",
            ReleaseKind::Magnet,
        );
        assert_eq!(
            client.info_hash(&release).await.unwrap(),
            "C9E15763F722F23E98A29DECDFAE341B98D53056"
        );

        let nzb = Release::new("Nzb", "g", "Movie", "http://x/a.nzb", ReleaseKind::Nzb);
        assert!(matches!(
            client.submit(&nzb).await,
            Err(DownloadClientError::Unsupported(_))
        ));
    }
}
