//! YTS: JSON search by imdb id, RSS latest feed.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::SpecializedIndexerConfig;
use crate::searcher::normalize::{base_url, magnet_uri, parse_human_size};
use crate::searcher::xml_tree;
use crate::searcher::{Freeleech, Indexer, IndexerError, Release, ReleaseKind, SearchRequest};

use super::fetch_text;

const NAME: &str = "YTS";
const DEFAULT_URL: &str = "https://yts.mx";

/// The RSS feed carries no swarm data; new YTS uploads are assumed seeded.
const RSS_SEEDERS: u32 = 5;

#[derive(Debug, Deserialize)]
struct ListMoviesResponse {
    data: ListMoviesData,
}

#[derive(Debug, Deserialize)]
struct ListMoviesData {
    #[serde(default)]
    movie_count: u64,
    #[serde(default)]
    movies: Vec<YtsMovie>,
}

#[derive(Debug, Deserialize)]
struct YtsMovie {
    #[serde(default)]
    torrents: Vec<YtsTorrent>,
}

#[derive(Debug, Deserialize)]
struct YtsTorrent {
    hash: String,
    quality: String,
    #[serde(default)]
    size_bytes: u64,
    #[serde(default)]
    date_uploaded: Option<String>,
    #[serde(default)]
    seeds: u32,
    #[serde(default)]
    peers: u32,
}

pub struct Yts {
    client: Client,
    base_url: String,
}

impl Yts {
    pub fn new(client: Client, config: &SpecializedIndexerConfig) -> Self {
        Self::with_base_url(client, &base_url(config.url.as_deref(), DEFAULT_URL))
    }

    pub fn with_base_url(client: Client, url: &str) -> Self {
        Self {
            client,
            base_url: url.trim_end_matches('/').to_string(),
        }
    }

    fn parse_search(
        &self,
        body: &str,
        imdb_id: &str,
        term: &str,
    ) -> Result<Vec<Release>, IndexerError> {
        let response: ListMoviesResponse = serde_json::from_str(body)
            .map_err(|e| IndexerError::Protocol(format!("Failed to parse response: {}", e)))?;

        if response.data.movie_count < 1 {
            return Ok(Vec::new());
        }
        let Some(movie) = response.data.movies.into_iter().next() else {
            return Ok(Vec::new());
        };

        let info_link = format!("{}/movie/{}", self.base_url, term.replace(' ', "-"));

        Ok(movie
            .torrents
            .into_iter()
            .map(|torrent| {
                let quality = if torrent.quality == "3D" {
                    "1080P.3D".to_string()
                } else {
                    torrent.quality
                };
                let title = format!("{}.Bluray.{}.YTS", term, quality);
                let locator = magnet_uri(&torrent.hash, &title);

                let mut release =
                    Release::new(NAME, torrent.hash, title, locator, ReleaseKind::Magnet);
                release.info_link = info_link.clone();
                release.size_bytes = torrent.size_bytes;
                release.seeders = torrent.seeds;
                release.leechers = torrent.peers;
                release.publish_date = torrent.date_uploaded;
                release.imdb_id = Some(imdb_id.to_string());
                release.freeleech = Some(Freeleech::Flag(false));
                release
            })
            .collect())
    }
}

/// Parse the YTS RSS feed.
fn parse_rss(xml: &str) -> Result<Vec<Release>, IndexerError> {
    let doc = xml_tree::parse(xml).map_err(|e| IndexerError::Protocol(e.to_string()))?;
    let items = xml_tree::channel_items(&doc).map_err(|e| IndexerError::Protocol(e.to_string()))?;

    let mut releases = Vec::new();
    for item in items {
        match parse_rss_item(item) {
            Some(release) => releases.push(release),
            None => warn!(indexer = NAME, "Skipping malformed RSS item"),
        }
    }
    Ok(releases)
}

fn parse_rss_item(item: &Value) -> Option<Release> {
    let raw_title = xml_tree::child_text(item, "title")?;
    let description = xml_tree::child_text(item, "description").unwrap_or_default();
    let enclosure_url = item.get("enclosure").and_then(|e| xml_tree::attr(e, "url"))?;

    let human_size = description.split("Size: ").nth(1)?.split('<').next()?;
    let size_bytes = parse_human_size(human_size.trim())?;

    let title = raw_title.split(" [").next().unwrap_or(&raw_title).to_string();
    let quality = rss_quality(item, &raw_title)?;
    let title = format!("{}.Bluray.{}.YTS", title, quality);

    let guid = enclosure_url.rsplit('/').next()?.to_string();
    if guid.is_empty() {
        return None;
    }
    let locator = magnet_uri(&guid, &title);

    let mut release = Release::new(NAME, guid, title, locator, ReleaseKind::Magnet);
    release.info_link = xml_tree::child_text(item, "link").unwrap_or_default();
    release.size_bytes = size_bytes;
    release.seeders = RSS_SEEDERS;
    release.leechers = 0;
    release.freeleech = Some(Freeleech::Flag(false));
    Some(release)
}

/// Quality from the guid fragment (`...#1080p`), else the title's `[1080p]` suffix.
fn rss_quality(item: &Value, raw_title: &str) -> Option<String> {
    xml_tree::child_text(item, "guid")
        .and_then(|guid| guid.rsplit_once('#').map(|(_, q)| q.to_string()))
        .filter(|q| !q.is_empty())
        .or_else(|| {
            raw_title
                .rsplit_once('[')
                .map(|(_, rest)| rest.trim_end_matches(']').to_string())
        })
}

#[async_trait]
impl Indexer for Yts {
    fn name(&self) -> &str {
        NAME
    }

    fn requires_imdb_id(&self) -> bool {
        true
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<Release>, IndexerError> {
        if request.skip_if_identifier_capable {
            return Ok(Vec::new());
        }
        let Some(imdb_id) = request.imdb_id.as_deref().filter(|id| !id.is_empty()) else {
            return Ok(Vec::new());
        };

        info!(indexer = NAME, imdb_id = %imdb_id, "Performing backlog search");
        let url = format!(
            "{}/api/v2/list_movies.json?limit=1&query_term={}",
            self.base_url,
            urlencoding::encode(imdb_id)
        );
        let body = fetch_text(&self.client, NAME, &url).await?;
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }

        let releases = self.parse_search(&body, imdb_id, &request.term())?;
        info!(indexer = NAME, count = releases.len(), "Search complete");
        Ok(releases)
    }

    async fn latest(&self) -> Result<Vec<Release>, IndexerError> {
        info!(indexer = NAME, "Fetching latest RSS");
        let url = format!("{}/rss/0/all/all/0", self.base_url);
        let body = fetch_text(&self.client, NAME, &url).await?;
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        parse_rss(&body)
    }
}
