//! TorrentDownloads RSS adapter.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::SpecializedIndexerConfig;
use crate::searcher::normalize::{base_url, magnet_uri, repair_ampersands, TextField};
use crate::searcher::xml_tree;
use crate::searcher::{Freeleech, Indexer, IndexerError, Release, ReleaseKind, SearchRequest};

use super::fetch_text;

const NAME: &str = "TorrentDownloads";
const DEFAULT_URL: &str = "https://www.torrentdownloads.me";

#[derive(Debug, Deserialize)]
struct TorrentDownloadsItem {
    title: TextField,
    link: String,
    size: String,
    info_hash: String,
    seeders: String,
    leechers: String,
}

pub struct TorrentDownloads {
    client: Client,
    base_url: String,
}

impl TorrentDownloads {
    pub fn new(client: Client, config: &SpecializedIndexerConfig) -> Self {
        Self::with_base_url(client, &base_url(config.url.as_deref(), DEFAULT_URL))
    }

    pub fn with_base_url(client: Client, url: &str) -> Self {
        Self {
            client,
            base_url: url.trim_end_matches('/').to_string(),
        }
    }

    fn parse(&self, xml: &str, imdb_id: Option<&str>) -> Result<Vec<Release>, IndexerError> {
        let repaired = repair_ampersands(xml);
        let doc = xml_tree::parse(&repaired).map_err(|e| IndexerError::Protocol(e.to_string()))?;
        let items =
            xml_tree::channel_items(&doc).map_err(|e| IndexerError::Protocol(e.to_string()))?;

        let mut releases = Vec::new();
        for item in items {
            let parsed = serde_json::from_value::<TorrentDownloadsItem>(item.clone())
                .map_err(|e| e.to_string())
                .and_then(|item| self.to_release(item, imdb_id));
            match parsed {
                Ok(release) => releases.push(release),
                Err(e) => warn!(indexer = NAME, error = %e, "Skipping malformed item"),
            }
        }
        Ok(releases)
    }

    fn to_release(
        &self,
        item: TorrentDownloadsItem,
        imdb_id: Option<&str>,
    ) -> Result<Release, String> {
        fn parse_int<T: std::str::FromStr>(field: &str, value: &str) -> Result<T, String>
        where
            T::Err: std::fmt::Display,
        {
            value
                .trim()
                .parse::<T>()
                .map_err(|e| format!("{}: {}", field, e))
        }

        let title = item.title.into_string();
        let locator = magnet_uri(&item.info_hash, &title);

        let mut release = Release::new(NAME, item.info_hash, title, locator, ReleaseKind::Magnet);
        release.info_link = format!("{}{}", self.base_url, item.link);
        release.size_bytes = parse_int("size", &item.size)?;
        release.seeders = parse_int("seeders", &item.seeders)?;
        release.leechers = parse_int("leechers", &item.leechers)?;
        release.imdb_id = imdb_id.map(String::from);
        release.freeleech = Some(Freeleech::Flag(false));
        Ok(release)
    }
}

#[async_trait]
impl Indexer for TorrentDownloads {
    fn name(&self) -> &str {
        NAME
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<Release>, IndexerError> {
        let term = request.term();
        info!(indexer = NAME, term = %term, "Performing backlog search");

        let url = format!(
            "{}/rss.xml?type=search&search={}",
            self.base_url,
            urlencoding::encode(&term)
        );
        let body = fetch_text(&self.client, NAME, &url).await?;
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }

        let releases = self.parse(&body, request.imdb_id.as_deref())?;
        info!(indexer = NAME, count = releases.len(), "Search complete");
        Ok(releases)
    }

    async fn latest(&self) -> Result<Vec<Release>, IndexerError> {
        info!(indexer = NAME, "Fetching latest RSS");
        let url = format!("{}/rss2/last/4", self.base_url);
        let body = fetch_text(&self.client, NAME, &url).await?;
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        self.parse(&body, None)
    }
}
