//! Zooqle RSS search adapter. Zooqle has no latest feed.

use async_trait::async_trait;
use chrono::DateTime;
use reqwest::Client;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::SpecializedIndexerConfig;
use crate::searcher::normalize::{base_url, parse_human_size};
use crate::searcher::xml_tree;
use crate::searcher::{Freeleech, Indexer, IndexerError, Release, ReleaseKind, SearchRequest};

use super::fetch_text;

const NAME: &str = "Zooqle";
const DEFAULT_URL: &str = "https://zooqle.com";

pub struct Zooqle {
    client: Client,
    base_url: String,
}

impl Zooqle {
    pub fn new(client: Client, config: &SpecializedIndexerConfig) -> Self {
        Self::with_base_url(client, &base_url(config.url.as_deref(), DEFAULT_URL))
    }

    pub fn with_base_url(client: Client, url: &str) -> Self {
        Self {
            client,
            base_url: url.trim_end_matches('/').to_string(),
        }
    }
}

fn parse(xml: &str, imdb_id: Option<&str>) -> Result<Vec<Release>, IndexerError> {
    let doc = xml_tree::parse(xml).map_err(|e| IndexerError::Protocol(e.to_string()))?;
    let items = xml_tree::channel_items(&doc).map_err(|e| IndexerError::Protocol(e.to_string()))?;

    let mut releases = Vec::new();
    for item in items {
        match parse_item(item, imdb_id) {
            Some(release) => releases.push(release),
            None => warn!(indexer = NAME, "Skipping malformed item"),
        }
    }
    Ok(releases)
}

fn parse_item(item: &Value, imdb_id: Option<&str>) -> Option<Release> {
    let title = xml_tree::child_text(item, "title").filter(|t| !t.is_empty())?;
    let locator = xml_tree::child_text(item, "torrent:magnetURI")?;
    let guid = xml_tree::child_text(item, "torrent:infoHash")?.to_lowercase();

    // Description ends with ", 1.2 GB".
    let description = xml_tree::child_text(item, "description")?;
    let size_bytes = parse_human_size(description.trim().rsplit(", ").next()?)?;

    let count = |key: &str| {
        xml_tree::child_text(item, key).and_then(|v| v.trim().parse::<u32>().ok())
    };

    let mut release = Release::new(NAME, guid, title, locator, ReleaseKind::Magnet);
    release.info_link = xml_tree::child_text(item, "guid").unwrap_or_default();
    release.size_bytes = size_bytes;
    release.seeders = count("torrent:seeds")?;
    release.leechers = count("torrent:peers")?;
    release.publish_date = xml_tree::child_text(item, "pubDate")
        .and_then(|d| DateTime::parse_from_rfc2822(d.trim()).ok())
        .map(|d| d.format("%d %b %Y").to_string());
    release.imdb_id = imdb_id.map(String::from);
    release.freeleech = Some(Freeleech::Flag(false));
    Some(release)
}

#[async_trait]
impl Indexer for Zooqle {
    fn name(&self) -> &str {
        NAME
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<Release>, IndexerError> {
        let term = request.term();
        info!(indexer = NAME, term = %term, "Performing backlog search");

        let url = format!(
            "{}/search?q={}&fmt=rss",
            self.base_url,
            urlencoding::encode(&term)
        );
        let body = fetch_text(&self.client, NAME, &url).await?;
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }

        let releases = parse(&body, request.imdb_id.as_deref())?;
        info!(indexer = NAME, count = releases.len(), "Search complete");
        Ok(releases)
    }

    async fn latest(&self) -> Result<Vec<Release>, IndexerError> {
        Ok(Vec::new())
    }
}
