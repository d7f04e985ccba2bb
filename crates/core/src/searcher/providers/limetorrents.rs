//! LimeTorrents RSS adapter.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::SpecializedIndexerConfig;
use crate::searcher::normalize::{
    base_url, leechers_from_text, magnet_uri, seeds_from_text, TextField,
};
use crate::searcher::xml_tree;
use crate::searcher::{Freeleech, Indexer, IndexerError, Release, ReleaseKind, SearchRequest};

use super::fetch_text;

const NAME: &str = "LimeTorrents";
const DEFAULT_URL: &str = "https://www.limetorrents.info";

#[derive(Debug, Deserialize)]
struct LimeItem {
    title: TextField,
    link: String,
    size: String,
    #[serde(default)]
    description: Option<TextField>,
    enclosure: LimeEnclosure,
}

#[derive(Debug, Deserialize)]
struct LimeEnclosure {
    url: String,
}

pub struct LimeTorrents {
    client: Client,
    base_url: String,
}

impl LimeTorrents {
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
        let doc = xml_tree::parse(xml).map_err(|e| IndexerError::Protocol(e.to_string()))?;
        let items =
            xml_tree::channel_items(&doc).map_err(|e| IndexerError::Protocol(e.to_string()))?;

        let mut releases = Vec::new();
        for item in items {
            let item: LimeItem = match serde_json::from_value(item.clone()) {
                Ok(item) => item,
                Err(e) => {
                    warn!(indexer = NAME, error = %e, "Skipping malformed item");
                    continue;
                }
            };
            match self.to_release(item, imdb_id) {
                Some(release) => releases.push(release),
                None => warn!(indexer = NAME, "Skipping item with unusable enclosure"),
            }
        }
        Ok(releases)
    }

    fn to_release(&self, item: LimeItem, imdb_id: Option<&str>) -> Option<Release> {
        let title = item.title.into_string();
        let guid = guid_from_enclosure(&item.enclosure.url)?;

        let (locator, kind) = if is_itorrents(&item.enclosure.url) {
            (magnet_uri(&guid, &title), ReleaseKind::Magnet)
        } else {
            (item.enclosure.url.clone(), ReleaseKind::Torrent)
        };

        let description = item.description.map(TextField::into_string).unwrap_or_default();

        let mut release = Release::new(NAME, guid, title, locator, kind);
        release.info_link = if item.link.starts_with('/') {
            format!("{}{}", self.base_url, item.link)
        } else {
            repair_scheme(&item.link)
        };
        release.size_bytes = item.size.trim().parse().ok()?;
        release.seeders = seeds_from_text(&description);
        release.leechers = leechers_from_text(&description);
        release.imdb_id = imdb_id.map(String::from);
        release.freeleech = Some(Freeleech::Flag(false));
        Some(release)
    }
}

/// `http://itorrents.org/torrent/ABCDEF.torrent?title=x` -> `abcdef`
fn guid_from_enclosure(url: &str) -> Option<String> {
    let mut parts = url.rsplit('.');
    parts.next()?;
    let stem = parts.next()?;
    let guid = stem.rsplit('/').next()?.to_lowercase();
    if guid.is_empty() {
        None
    } else {
        Some(guid)
    }
}

fn is_itorrents(url: &str) -> bool {
    url.starts_with("http://itorrents.org/") || url.starts_with("https://itorrents.org/")
}

/// Some mirrors emit links like `https:https://host/...`.
fn repair_scheme(link: &str) -> String {
    let mut rest = link;
    let mut stripped = false;
    while let Some(tail) = rest.strip_prefix("https:") {
        rest = tail;
        stripped = true;
    }
    if stripped && rest.starts_with("//") {
        format!("https:{}", rest)
    } else {
        link.to_string()
    }
}

#[async_trait]
impl Indexer for LimeTorrents {
    fn name(&self) -> &str {
        NAME
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<Release>, IndexerError> {
        let term = request.term();
        info!(indexer = NAME, term = %term, "Performing backlog search");

        let url = format!("{}/searchrss/{}", self.base_url, urlencoding::encode(&term));
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
        let url = format!("{}/rss/16/", self.base_url);
        let body = fetch_text(&self.client, NAME, &url).await?;
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        self.parse(&body, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>LimeTorrents</title>
    <item>
      <title>Movie Title 2019 1080p BluRay</title>
      <link>/Movie-Title-2019-torrent-123.html</link>
      <size>1610612736</size>
      <description>Seeds: 42 , Leechers 7</description>
      <enclosure url="http://itorrents.org/torrent/ABCDEF0123.torrent?title=Movie-Title" type="application/x-bittorrent"/>
    </item>
    <item>
      <title>Movie Title 2019 720p</title>
      <link>https:https://mirror.example/Movie-Title-720p.html</link>
      <size>734003200</size>
      <description><![CDATA[Seeds: 5<br />Leechers: 1<br />]]></description>
      <enclosure url="https://mirror.example/dl/FEDCBA.torrent" type="application/x-bittorrent"/>
    </item>
    <item>
      <title>Broken</title>
      <link>/broken.html</link>
    </item>
  </channel>
</rss>"#;

    fn lime() -> LimeTorrents {
        LimeTorrents::with_base_url(Client::new(), "https://www.limetorrents.info")
    }

    #[test]
    fn test_parse_feed() {
        let releases = lime().parse(FEED, Some("tt1234567")).unwrap();
        assert_eq!(releases.len(), 2);

        let first = &releases[0];
        assert_eq!(first.guid, "abcdef0123");
        assert_eq!(first.kind, ReleaseKind::Magnet);
        assert!(first.locator.starts_with("magnet:?xt=urn:btih:abcdef0123&dn=Movie Title 2019 1080p BluRay&tr="));
        assert_eq!(
            first.info_link,
            "https://www.limetorrents.info/Movie-Title-2019-torrent-123.html"
        );
        assert_eq!(first.size_bytes, 1_610_612_736);
        assert_eq!(first.seeders, 42);
        assert_eq!(first.leechers, 7);
        assert_eq!(first.imdb_id.as_deref(), Some("tt1234567"));

        let second = &releases[1];
        assert_eq!(second.guid, "fedcba");
        assert_eq!(second.kind, ReleaseKind::Torrent);
        assert_eq!(second.locator, "https://mirror.example/dl/FEDCBA.torrent");
        assert_eq!(second.info_link, "https://mirror.example/Movie-Title-720p.html");
        assert_eq!(second.seeders, 5);
        assert_eq!(second.leechers, 1);
    }

    #[test]
    fn test_parse_no_items() {
        let xml = "<rss><channel><title>LimeTorrents</title></channel></rss>";
        assert!(lime().parse(xml, None).unwrap().is_empty());
    }

    #[test]
    fn test_parse_malformed() {
        let err = lime().parse("<rss><channel>", None).unwrap_err();
        assert!(matches!(err, IndexerError::Protocol(_)));
    }

    #[test]
    fn test_repair_scheme() {
        assert_eq!(repair_scheme("https:https://x.org/a"), "https://x.org/a");
        assert_eq!(repair_scheme("https:https:https://x.org/a"), "https://x.org/a");
        assert_eq!(repair_scheme("https://x.org/a"), "https://x.org/a");
        assert_eq!(repair_scheme("http://x.org/a"), "http://x.org/a");
    }

    #[test]
    fn test_guid_from_enclosure() {
        assert_eq!(
            guid_from_enclosure("http://itorrents.org/torrent/ABC.torrent?title=x").as_deref(),
            Some("abc")
        );
        assert_eq!(guid_from_enclosure("no-dots"), None);
    }
}
