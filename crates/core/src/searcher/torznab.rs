//! Torznab/Newznab capability-based indexer.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::{CapabilityIndexerConfig, FeedType};

use super::capabilities::{normalize_base_url, CapabilityLookup, CapabilityNegotiator};
use super::normalize::{magnet_uri, repair_ampersands};
use super::xml_tree;
use super::{Freeleech, Indexer, IndexerError, Release, ReleaseKind, SearchRequest};

/// Newznab movie category.
const MOVIE_CATEGORY: &str = "2000";

/// How a capability-based indexer will be queried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryPlan {
    /// `t=movie&imdbid=` with the numeric part of the id.
    ImdbId(String),
    /// `t=search&q=`; `retry_without_year` holds the bare title when a retry applies.
    FreeText {
        term: String,
        retry_without_year: Option<String>,
    },
}

impl QueryPlan {
    pub fn choose(caps: &CapabilityLookup, request: &SearchRequest, year_sensitive: bool) -> Self {
        if caps.supports_imdb_id() {
            if let Some(imdb_id) = request.imdb_id.as_deref().filter(|id| !id.is_empty()) {
                return QueryPlan::ImdbId(imdb_id.trim_start_matches("tt").to_string());
            }
        }

        let retry_without_year = if year_sensitive && request.year.is_some() {
            Some(request.title.trim().to_string())
        } else {
            None
        };

        QueryPlan::FreeText {
            term: request.term(),
            retry_without_year,
        }
    }
}

/// A Torznab (torrent) or Newznab (usenet) indexer.
pub struct TorznabIndexer {
    client: Client,
    config: CapabilityIndexerConfig,
    base_url: String,
    negotiator: Arc<CapabilityNegotiator>,
}

impl TorznabIndexer {
    pub fn new(
        client: Client,
        config: CapabilityIndexerConfig,
        negotiator: Arc<CapabilityNegotiator>,
    ) -> Self {
        let base_url = normalize_base_url(&config.url);
        Self {
            client,
            config,
            base_url,
            negotiator,
        }
    }

    pub fn config(&self) -> &CapabilityIndexerConfig {
        &self.config
    }

    /// Resolve this indexer's capabilities through the shared negotiator.
    pub async fn capabilities(&self) -> CapabilityLookup {
        self.negotiator
            .get_capabilities(&self.base_url, &self.config.api_key)
            .await
    }

    /// Search with already-resolved capabilities.
    pub async fn search_with(
        &self,
        caps: &CapabilityLookup,
        request: &SearchRequest,
    ) -> Result<Vec<Release>, IndexerError> {
        match QueryPlan::choose(caps, request, self.config.year_sensitive) {
            QueryPlan::ImdbId(id) => {
                info!(indexer = %self.config.name, imdb_id = %id, "Searching by imdb id");
                let url = format!("{}&t=movie&imdbid={}", self.api_url(), id);
                self.fetch(&url, request.imdb_id.as_deref()).await
            }
            QueryPlan::FreeText {
                term,
                retry_without_year,
            } => {
                info!(indexer = %self.config.name, term = %term, "Searching by free text");
                let releases = self
                    .fetch(&self.free_text_url(&term), request.imdb_id.as_deref())
                    .await?;

                match retry_without_year {
                    Some(title) if releases.is_empty() => {
                        info!(
                            indexer = %self.config.name,
                            term = %title,
                            "Nothing found, retrying without year"
                        );
                        self.fetch(&self.free_text_url(&title), request.imdb_id.as_deref())
                            .await
                    }
                    _ => Ok(releases),
                }
            }
        }
    }

    fn api_url(&self) -> String {
        format!(
            "{}api?apikey={}&extended=1",
            self.base_url,
            urlencoding::encode(&self.config.api_key)
        )
    }

    fn free_text_url(&self, term: &str) -> String {
        format!(
            "{}&t=search&cat={}&q={}",
            self.api_url(),
            MOVIE_CATEGORY,
            urlencoding::encode(term)
        )
    }

    fn latest_url(&self) -> String {
        format!(
            "{}&t=search&cat={}&offset=0",
            self.api_url(),
            MOVIE_CATEGORY
        )
    }

    async fn fetch(
        &self,
        url: &str,
        imdb_id: Option<&str>,
    ) -> Result<Vec<Release>, IndexerError> {
        debug!(indexer = %self.config.name, "Querying indexer");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(IndexerError::from_reqwest)?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(IndexerError::Auth(format!("HTTP {}", status)));
        }
        if !status.is_success() {
            return Err(IndexerError::Protocol(format!("HTTP {}", status)));
        }

        let body = response.text().await.map_err(IndexerError::from_reqwest)?;
        let mut releases = parse_feed(&body, &self.config.name, self.config.feed)?;

        for release in releases.iter_mut() {
            if release.imdb_id.is_none() {
                release.imdb_id = imdb_id.map(String::from);
            }
        }

        debug!(
            indexer = %self.config.name,
            count = releases.len(),
            "Parsed indexer results"
        );
        Ok(releases)
    }
}

#[async_trait]
impl Indexer for TorznabIndexer {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<Release>, IndexerError> {
        let caps = self.capabilities().await;
        self.search_with(&caps, request).await
    }

    async fn latest(&self) -> Result<Vec<Release>, IndexerError> {
        info!(indexer = %self.config.name, "Fetching latest releases");
        self.fetch(&self.latest_url(), None).await
    }
}

/// Parse a Torznab/Newznab result feed.
pub fn parse_feed(xml: &str, indexer: &str, feed: FeedType) -> Result<Vec<Release>, IndexerError> {
    let doc = xml_tree::parse(&repair_ampersands(xml))
        .map_err(|e| IndexerError::Protocol(e.to_string()))?;

    if let Some(error) = doc.get("error") {
        let description = xml_tree::attr(error, "description").unwrap_or("unknown error");
        return Err(match xml_tree::attr(error, "code") {
            Some("100") | Some("101") | Some("102") => IndexerError::Auth(description.to_string()),
            _ => IndexerError::Protocol(description.to_string()),
        });
    }

    let items = xml_tree::channel_items(&doc).map_err(|e| IndexerError::Protocol(e.to_string()))?;

    Ok(items
        .into_iter()
        .filter_map(|item| parse_item(item, indexer, feed))
        .collect())
}

/// Collect `torznab:attr` / `newznab:attr` name/value pairs.
fn item_attrs(item: &Value) -> HashMap<String, String> {
    let mut attrs = HashMap::new();
    for key in ["torznab:attr", "newznab:attr"] {
        for attr in xml_tree::list(item.get(key)) {
            if let (Some(name), Some(value)) =
                (xml_tree::attr(attr, "name"), xml_tree::attr(attr, "value"))
            {
                attrs
                    .entry(name.to_lowercase())
                    .or_insert_with(|| value.to_string());
            }
        }
    }
    attrs
}

fn parse_item(item: &Value, indexer: &str, feed: FeedType) -> Option<Release> {
    let attrs = item_attrs(item);
    let title = xml_tree::child_text(item, "title").filter(|t| !t.is_empty())?;

    let enclosure_url = item
        .get("enclosure")
        .and_then(|e| xml_tree::attr(e, "url"))
        .map(String::from);
    let link = xml_tree::child_text(item, "link").filter(|l| !l.is_empty());
    let infohash = attrs.get("infohash").cloned();

    let locator = match feed {
        FeedType::Usenet => enclosure_url.or(link)?,
        FeedType::Torrent => enclosure_url
            .or(link)
            .or_else(|| attrs.get("magneturl").cloned())
            .or_else(|| infohash.as_deref().map(|h| magnet_uri(h, &title)))?,
    };

    let guid = xml_tree::child_text(item, "guid")
        .filter(|g| !g.is_empty())
        .or_else(|| infohash.clone())
        .unwrap_or_else(|| locator.clone());

    let kind = match feed {
        FeedType::Usenet => ReleaseKind::Nzb,
        FeedType::Torrent => ReleaseKind::from_locator(&locator),
    };

    let mut release = Release::new(indexer, guid.clone(), title, locator, kind);

    release.info_link = xml_tree::child_text(item, "comments")
        .filter(|c| !c.is_empty())
        .or_else(|| Some(guid).filter(|g| g.starts_with("http")))
        .unwrap_or_default();

    release.size_bytes = attrs
        .get("size")
        .cloned()
        .or_else(|| xml_tree::child_text(item, "size"))
        .or_else(|| {
            item.get("enclosure")
                .and_then(|e| xml_tree::attr(e, "length"))
                .map(String::from)
        })
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(0);

    if feed == FeedType::Torrent {
        let parse_count = |key: &str| attrs.get(key).and_then(|v| v.trim().parse::<u32>().ok());
        let seeders = parse_count("seeders").unwrap_or(0);
        release.seeders = seeders;
        release.leechers = parse_count("peers")
            .map(|peers| peers.saturating_sub(seeders))
            .or_else(|| parse_count("leechers"))
            .unwrap_or(0);
        release.freeleech = attrs
            .get("downloadvolumefactor")
            .and_then(|v| v.trim().parse::<f64>().ok())
            .map(Freeleech::Factor);
    }

    release.imdb_id = attrs
        .get("imdb")
        .or_else(|| attrs.get("imdbid"))
        .and_then(|id| format_imdb_id(id));
    release.publish_date = xml_tree::child_text(item, "pubDate").filter(|d| !d.is_empty());

    Some(release)
}

/// Newznab reports imdb ids without the `tt` prefix, sometimes unpadded.
fn format_imdb_id(raw: &str) -> Option<String> {
    let digits = raw.trim().trim_start_matches("tt");
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(format!("tt{:0>7}", digits))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    use crate::searcher::capabilities::CapabilityDescriptor;

    const TORZNAB_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:torznab="http://torznab.com/schemas/2015/feed">
  <channel>
    <title>Jackett</title>
    <item>
      <title>Movie.Title.2019.1080p.BluRay.x264</title>
      <guid>https://tracker.example/details/123</guid>
      <link>https://jackett.local/dl/123.torrent?jackett_apikey=abc&amp;file=x</link>
      <comments>https://tracker.example/details/123</comments>
      <pubDate>Tue, 03 Dec 2019 10:00:00 +0000</pubDate>
      <size>2147483648</size>
      <enclosure url="https://jackett.local/dl/123.torrent" length="2147483648" type="application/x-bittorrent"/>
      <torznab:attr name="seeders" value="40"/>
      <torznab:attr name="peers" value="55"/>
      <torznab:attr name="infohash" value="ABCDEF0123"/>
      <torznab:attr name="imdb" value="1234567"/>
      <torznab:attr name="downloadvolumefactor" value="0"/>
    </item>
    <item>
      <title>Movie.Title.2019.720p</title>
      <torznab:attr name="infohash" value="FEDCBA"/>
      <torznab:attr name="seeders" value="3"/>
    </item>
  </channel>
</rss>"#;

    const NEWZNAB_FEED: &str = r#"<rss version="2.0" xmlns:newznab="http://www.newznab.com/DTD/2010/feeds/attributes/">
  <channel>
    <item>
      <title>Movie.Title.2019.1080p.WEB-DL</title>
      <guid isPermaLink="true">https://nzb.example/details/abc</guid>
      <link>https://nzb.example/getnzb/abc.nzb&i=1&r=key</link>
      <enclosure url="https://nzb.example/getnzb/abc.nzb" length="1000" type="application/x-nzb"/>
      <newznab:attr name="size" value="5000"/>
      <newznab:attr name="imdb" value="0133093"/>
    </item>
  </channel>
</rss>"#;

    fn request(imdb: Option<&str>, year: Option<u16>) -> SearchRequest {
        SearchRequest {
            imdb_id: imdb.map(String::from),
            title: "Movie Title".to_string(),
            year,
            skip_if_identifier_capable: false,
        }
    }

    fn caps(params: &[&str]) -> CapabilityLookup {
        CapabilityLookup::Available(CapabilityDescriptor {
            base_url: "http://idx/".into(),
            supported_params: params.iter().map(|p| p.to_string()).collect::<BTreeSet<_>>(),
        })
    }

    #[test]
    fn test_parse_torznab_feed() {
        let releases = parse_feed(TORZNAB_FEED, "Jackett", FeedType::Torrent).unwrap();
        assert_eq!(releases.len(), 2);

        let first = &releases[0];
        assert_eq!(first.guid, "https://tracker.example/details/123");
        assert_eq!(first.locator, "https://jackett.local/dl/123.torrent");
        assert_eq!(first.kind, ReleaseKind::Torrent);
        assert_eq!(first.size_bytes, 2_147_483_648);
        assert_eq!(first.seeders, 40);
        assert_eq!(first.leechers, 15);
        assert_eq!(first.freeleech, Some(Freeleech::Factor(0.0)));
        assert_eq!(first.imdb_id.as_deref(), Some("tt1234567"));
        assert_eq!(first.info_link, "https://tracker.example/details/123");
        assert!(first.publish_date.is_some());

        let second = &releases[1];
        assert_eq!(second.guid, "FEDCBA");
        assert_eq!(second.kind, ReleaseKind::Magnet);
        assert!(second.locator.starts_with("magnet:?xt=urn:btih:FEDCBA&dn=Movie.Title.2019.720p&tr="));
        assert_eq!(second.freeleech, None);
    }

    #[test]
    fn test_parse_newznab_feed_with_bare_ampersands() {
        let releases = parse_feed(NEWZNAB_FEED, "Geek", FeedType::Usenet).unwrap();
        assert_eq!(releases.len(), 1);
        let release = &releases[0];
        assert_eq!(release.kind, ReleaseKind::Nzb);
        assert_eq!(release.locator, "https://nzb.example/getnzb/abc.nzb");
        assert_eq!(release.size_bytes, 5000);
        assert_eq!(release.seeders, 0);
        assert_eq!(release.leechers, 0);
        assert!(release.freeleech.is_none());
        assert_eq!(release.imdb_id.as_deref(), Some("tt0133093"));
    }

    #[test]
    fn test_parse_error_document() {
        let err = parse_feed(
            r#"<error code="100" description="Incorrect user credentials"/>"#,
            "Jackett",
            FeedType::Torrent,
        )
        .unwrap_err();
        assert!(matches!(err, IndexerError::Auth(_)));

        let err = parse_feed(
            r#"<error code="201" description="Incorrect parameter"/>"#,
            "Jackett",
            FeedType::Torrent,
        )
        .unwrap_err();
        assert!(matches!(err, IndexerError::Protocol(_)));
    }

    #[test]
    fn test_parse_empty_channel() {
        let xml = "<rss><channel><title>None</title></channel></rss>";
        assert!(parse_feed(xml, "Jackett", FeedType::Torrent).unwrap().is_empty());
    }

    #[test]
    fn test_query_plan_uses_imdb_id_when_supported() {
        let plan = QueryPlan::choose(
            &caps(&["q", "imdbid"]),
            &request(Some("tt0133093"), Some(1999)),
            true,
        );
        assert_eq!(plan, QueryPlan::ImdbId("0133093".to_string()));
    }

    #[test]
    fn test_query_plan_free_text_without_support() {
        let plan = QueryPlan::choose(&caps(&["q"]), &request(Some("tt0133093"), Some(1999)), false);
        assert_eq!(
            plan,
            QueryPlan::FreeText {
                term: "Movie Title 1999".to_string(),
                retry_without_year: None,
            }
        );
    }

    #[test]
    fn test_query_plan_year_sensitive_retry() {
        let plan = QueryPlan::choose(
            &CapabilityLookup::NotAvailable,
            &request(None, Some(1999)),
            true,
        );
        assert_eq!(
            plan,
            QueryPlan::FreeText {
                term: "Movie Title 1999".to_string(),
                retry_without_year: Some("Movie Title".to_string()),
            }
        );
    }

    #[test]
    fn test_query_plan_imdb_capable_without_id_falls_back() {
        let plan = QueryPlan::choose(&caps(&["imdbid"]), &request(None, None), true);
        assert!(matches!(plan, QueryPlan::FreeText { retry_without_year: None, .. }));
    }

    #[test]
    fn test_format_imdb_id() {
        assert_eq!(format_imdb_id("133093").as_deref(), Some("tt0133093"));
        assert_eq!(format_imdb_id("tt1234567").as_deref(), Some("tt1234567"));
        assert_eq!(format_imdb_id("n/a"), None);
    }
}
