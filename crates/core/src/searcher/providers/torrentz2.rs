//! Torrentz2 RSS adapter. Size, swarm and hash live in the description.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::SpecializedIndexerConfig;
use crate::searcher::normalize::{base_url, magnet_uri, unit_multiplier};
use crate::searcher::xml_tree;
use crate::searcher::{Freeleech, Indexer, IndexerError, Release, ReleaseKind, SearchRequest};

use super::fetch_text;

const NAME: &str = "Torrentz2";
const DEFAULT_URL: &str = "https://torrentz2.is";

pub struct Torrentz2 {
    client: Client,
    base_url: String,
}

impl Torrentz2 {
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
        let title = xml_tree::child_text(item, "title").unwrap_or_default();
        if title.is_empty() {
            continue;
        }
        match parse_item(item, title, imdb_id) {
            Some(release) => releases.push(release),
            None => warn!(indexer = NAME, "Skipping malformed item"),
        }
    }
    Ok(releases)
}

/// Description reads `Size: 1234 MB Seeds: 10 Peers: 5 Hash: <hash>`.
fn parse_item(item: &Value, title: String, imdb_id: Option<&str>) -> Option<Release> {
    let description = xml_tree::child_text(item, "description")?;
    let tokens: Vec<&str> = description.split(' ').collect();
    if tokens.len() < 7 {
        return None;
    }

    let hash = tokens.last()?.to_string();
    let size: f64 = tokens[1].replace(',', "").parse().ok()?;
    let seeders: u32 = tokens[4].replace(',', "").parse().ok()?;
    let leechers: u32 = tokens[6].replace(',', "").parse().ok()?;

    let locator = magnet_uri(&hash, &title);
    let mut release = Release::new(NAME, hash, title, locator, ReleaseKind::Magnet);
    release.info_link = xml_tree::child_text(item, "link").unwrap_or_default();
    release.size_bytes = (size * unit_multiplier(tokens[2]) as f64) as u64;
    release.seeders = seeders;
    release.leechers = leechers;
    release.imdb_id = imdb_id.map(String::from);
    release.freeleech = Some(Freeleech::Flag(false));
    Some(release)
}

#[async_trait]
impl Indexer for Torrentz2 {
    fn name(&self) -> &str {
        NAME
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<Release>, IndexerError> {
        let term = request.term();
        info!(indexer = NAME, term = %term, "Performing backlog search");

        let url = format!("{}/feed?f={}", self.base_url, urlencoding::encode(&term));
        let body = fetch_text(&self.client, NAME, &url).await?;
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }

        let releases = parse(&body, request.imdb_id.as_deref())?;
        info!(indexer = NAME, count = releases.len(), "Search complete");
        Ok(releases)
    }

    async fn latest(&self) -> Result<Vec<Release>, IndexerError> {
        info!(indexer = NAME, "Fetching latest RSS");
        let url = format!("{}/feed?f=movies", self.base_url);
        let body = fetch_text(&self.client, NAME, &url).await?;
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        parse(&body, None)
    }
}
