use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub indexers: IndexersConfig,
    #[serde(default)]
    pub download_clients: Vec<DownloadClientConfig>,
    #[serde(default)]
    pub database: DatabaseConfig,
}

/// Shared settings for every indexer request.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    /// Per-request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
    /// Maximum number of indexers queried at the same time (default: 4)
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// User agent sent to indexers
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            max_concurrency: default_max_concurrency(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_timeout() -> u32 {
    30
}

fn default_max_concurrency() -> usize {
    4
}

fn default_user_agent() -> String {
    format!("reelfetch/{}", env!("CARGO_PKG_VERSION"))
}

fn default_true() -> bool {
    true
}

/// Indexer configuration, in fan-out order.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct IndexersConfig {
    /// Torznab/Newznab indexers that describe themselves via `t=caps`.
    #[serde(default)]
    pub capability: Vec<CapabilityIndexerConfig>,
    /// Hard-coded adapters, looked up by name in the registry.
    #[serde(default)]
    pub specialized: Vec<SpecializedIndexerConfig>,
}

/// Which download family a capability-based feed produces.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FeedType {
    #[default]
    Torrent,
    Usenet,
}

/// A Torznab/Newznab indexer.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CapabilityIndexerConfig {
    /// Display name used in releases and logs
    pub name: String,
    /// Base URL (e.g., "http://localhost:9117/api/v2.0/indexers/all/results/torznab/")
    pub url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub feed: FeedType,
    /// Retry free-text searches without the year when nothing is found
    #[serde(default)]
    pub year_sensitive: bool,
}

/// A specialized adapter (public or private tracker).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SpecializedIndexerConfig {
    /// Registry name (e.g., "yts", "danishbits")
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Mirror override; the adapter's default is used when unset
    #[serde(default)]
    pub url: Option<String>,
    /// Account name for private trackers
    #[serde(default)]
    pub username: Option<String>,
    /// Access key for private trackers
    #[serde(default)]
    pub passkey: Option<String>,
}

/// A download client backend, tagged by `backend`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum DownloadClientConfig {
    Sabnzbd(SabnzbdConfig),
    DownloadStation(DownloadStationConfig),
    Rtorrent(RtorrentConfig),
    Qbittorrent(QBittorrentConfig),
}

impl DownloadClientConfig {
    /// Name used for routing and in `Release::download_client`.
    pub fn name(&self) -> &str {
        match self {
            DownloadClientConfig::Sabnzbd(c) => &c.name,
            DownloadClientConfig::DownloadStation(c) => &c.name,
            DownloadClientConfig::Rtorrent(c) => &c.name,
            DownloadClientConfig::Qbittorrent(c) => &c.name,
        }
    }

    pub fn enabled(&self) -> bool {
        match self {
            DownloadClientConfig::Sabnzbd(c) => c.enabled,
            DownloadClientConfig::DownloadStation(c) => c.enabled,
            DownloadClientConfig::Rtorrent(c) => c.enabled,
            DownloadClientConfig::Qbittorrent(c) => c.enabled,
        }
    }

    pub fn backend(&self) -> &'static str {
        match self {
            DownloadClientConfig::Sabnzbd(_) => "sabnzbd",
            DownloadClientConfig::DownloadStation(_) => "download_station",
            DownloadClientConfig::Rtorrent(_) => "rtorrent",
            DownloadClientConfig::Qbittorrent(_) => "qbittorrent",
        }
    }
}

/// SABnzbd usenet backend configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SabnzbdConfig {
    #[serde(default = "default_sabnzbd_name")]
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Host without scheme (e.g., "localhost")
    pub host: String,
    #[serde(default = "default_sabnzbd_port")]
    pub port: u16,
    pub api_key: String,
    #[serde(default)]
    pub category: String,
    /// One of Paused, Low, Normal, High, Forced
    #[serde(default = "default_sabnzbd_priority")]
    pub priority: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

fn default_sabnzbd_name() -> String {
    "sabnzbd".to_string()
}

fn default_sabnzbd_port() -> u16 {
    8080
}

fn default_sabnzbd_priority() -> String {
    "Normal".to_string()
}

/// Synology DownloadStation configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloadStationConfig {
    #[serde(default = "default_download_station_name")]
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Host including scheme (e.g., "http://192.168.1.10")
    pub host: String,
    #[serde(default = "default_download_station_port")]
    pub port: u16,
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Shared folder the tasks are saved to
    #[serde(default)]
    pub destination: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

fn default_download_station_name() -> String {
    "download_station".to_string()
}

fn default_download_station_port() -> u16 {
    5000
}

/// rTorrent SCGI configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RtorrentConfig {
    #[serde(default = "default_rtorrent_name")]
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub host: String,
    #[serde(default = "default_rtorrent_port")]
    pub port: u16,
    /// Applied via `d.set_custom1` once the torrent shows up; empty disables it
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub add_paused: bool,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

fn default_rtorrent_name() -> String {
    "rtorrent".to_string()
}

fn default_rtorrent_port() -> u16 {
    5000
}

/// qBittorrent Web API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QBittorrentConfig {
    #[serde(default = "default_qbittorrent_name")]
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Web UI URL (e.g., "http://localhost:8080")
    pub url: String,
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub add_paused: bool,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

fn default_qbittorrent_name() -> String {
    "qbittorrent".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("reelfetch.db")
}

/// Sanitized config for logs and status output (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub search: SearchConfig,
    pub capability_indexers: Vec<SanitizedCapabilityIndexer>,
    pub specialized_indexers: Vec<SanitizedSpecializedIndexer>,
    pub download_clients: Vec<SanitizedDownloadClient>,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedCapabilityIndexer {
    pub name: String,
    pub url: String,
    pub enabled: bool,
    pub api_key_configured: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedSpecializedIndexer {
    pub name: String,
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub credentials_configured: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedDownloadClient {
    pub name: String,
    pub backend: String,
    pub enabled: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            search: config.search.clone(),
            capability_indexers: config
                .indexers
                .capability
                .iter()
                .map(|i| SanitizedCapabilityIndexer {
                    name: i.name.clone(),
                    url: i.url.clone(),
                    enabled: i.enabled,
                    api_key_configured: !i.api_key.is_empty(),
                })
                .collect(),
            specialized_indexers: config
                .indexers
                .specialized
                .iter()
                .map(|i| SanitizedSpecializedIndexer {
                    name: i.name.clone(),
                    enabled: i.enabled,
                    url: i.url.clone(),
                    credentials_configured: i.username.is_some() && i.passkey.is_some(),
                })
                .collect(),
            download_clients: config
                .download_clients
                .iter()
                .map(|c| SanitizedDownloadClient {
                    name: c.name().to_string(),
                    backend: c.backend().to_string(),
                    enabled: c.enabled(),
                })
                .collect(),
            database: config.database.clone(),
        }
    }
}
