//! DanishBits private tracker (couchpotato-compatible JSON API).

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::config::SpecializedIndexerConfig;
use crate::searcher::normalize::base_url;
use crate::searcher::{Freeleech, Indexer, IndexerError, Release, ReleaseKind, SearchRequest};

use super::fetch_text;

const NAME: &str = "DanishBits";
const DEFAULT_URL: &str = "https://danishbits.org";

/// The API reports sizes in decimal megabytes.
const SIZE_MULTIPLIER: u64 = 1_000_000;

#[derive(Debug, Deserialize)]
struct DanishBitsResponse {
    #[serde(default)]
    results: Option<Vec<DanishBitsResult>>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DanishBitsResult {
    release_name: String,
    torrent_id: Value,
    details_url: String,
    download_url: String,
    #[serde(default)]
    publish_date: Option<String>,
    #[serde(default)]
    seeders: u32,
    #[serde(default)]
    leechers: u32,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    imdb_id: Option<String>,
    #[serde(default)]
    freeleech: Option<Freeleech>,
}

pub struct DanishBits {
    client: Client,
    base_url: String,
    username: String,
    passkey: String,
}

impl DanishBits {
    pub fn new(client: Client, config: &SpecializedIndexerConfig) -> Self {
        Self::with_base_url(
            client,
            &base_url(config.url.as_deref(), DEFAULT_URL),
            config.username.as_deref().unwrap_or_default(),
            config.passkey.as_deref().unwrap_or_default(),
        )
    }

    pub fn with_base_url(client: Client, url: &str, username: &str, passkey: &str) -> Self {
        Self {
            client,
            base_url: url.trim_end_matches('/').to_string(),
            username: username.to_string(),
            passkey: passkey.to_string(),
        }
    }
}

fn parse(body: &str) -> Result<Vec<Release>, IndexerError> {
    let response: DanishBitsResponse = serde_json::from_str(body)
        .map_err(|e| IndexerError::Protocol(format!("Failed to parse response: {}", e)))?;

    let results = response.results.unwrap_or_default();
    if results.is_empty() {
        match response.error {
            Some(error) if error.to_lowercase().contains("passkey") => {
                return Err(IndexerError::Auth(error))
            }
            Some(error) => info!(indexer = NAME, error = %error, "Nothing found"),
            None => info!(indexer = NAME, "Nothing found"),
        }
        return Ok(Vec::new());
    }

    Ok(results.into_iter().map(to_release).collect())
}

fn to_release(result: DanishBitsResult) -> Release {
    let guid = match result.torrent_id {
        Value::String(s) => s,
        other => other.to_string(),
    };

    let mut release = Release::new(
        NAME,
        guid,
        result.release_name,
        result.download_url,
        ReleaseKind::Torrent,
    );
    release.info_link = result.details_url;
    release.size_bytes = result.size.saturating_mul(SIZE_MULTIPLIER);
    release.seeders = result.seeders;
    release.leechers = result.leechers;
    release.publish_date = result.publish_date;
    release.imdb_id = result.imdb_id;
    release.freeleech = result.freeleech;
    release
}

#[async_trait]
impl Indexer for DanishBits {
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
            "{}/couchpotato.php?user={}&passkey={}&imdbid={}",
            self.base_url,
            urlencoding::encode(&self.username),
            urlencoding::encode(&self.passkey),
            urlencoding::encode(imdb_id)
        );
        let body = fetch_text(&self.client, NAME, &url).await?;

        let releases = parse(&body)?;
        info!(indexer = NAME, count = releases.len(), "Search complete");
        Ok(releases)
    }

    async fn latest(&self) -> Result<Vec<Release>, IndexerError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESPONSE: &str = r#"{
  "results": [
    {
      "release_name": "Movie.Title.2019.1080p.BluRay.x264-DANISH",
      "torrent_id": 98765,
      "details_url": "https://danishbits.org/torrents.php?id=98765",
      "download_url": "https://danishbits.org/torrents.php?action=download&id=98765&passkey=secret",
      "publish_date": "2019-12-03T10:00:00+00:00",
      "seeders": 15,
      "leechers": 2,
      "size": 8500,
      "imdb_id": "tt1234567",
      "freeleech": true
    },
    {
      "release_name": "Movie.Title.2019.720p",
      "torrent_id": "12345",
      "details_url": "https://danishbits.org/torrents.php?id=12345",
      "download_url": "https://danishbits.org/dl/12345",
      "size": 700
    }
  ]
}"#;

    #[test]
    fn test_parse_scales_megabytes_by_a_million() {
        let releases = parse(RESPONSE).unwrap();
        assert_eq!(releases.len(), 2);

        let first = &releases[0];
        assert_eq!(first.guid, "98765");
        assert_eq!(first.size_bytes, 8_500_000_000);
        assert_eq!(first.kind, ReleaseKind::Torrent);
        assert_eq!(first.seeders, 15);
        assert_eq!(first.freeleech, Some(Freeleech::Flag(true)));
        assert_eq!(first.imdb_id.as_deref(), Some("tt1234567"));

        let second = &releases[1];
        assert_eq!(second.guid, "12345");
        assert_eq!(second.size_bytes, 700_000_000);
        assert!(second.freeleech.is_none());
        assert_eq!(second.seeders, 0);
    }

    #[test]
    fn test_parse_numeric_freeleech_passthrough() {
        let body = r#"{"results": [{"release_name": "x", "torrent_id": 1, "details_url": "d", "download_url": "u", "size": 1, "freeleech": 0.5}]}"#;
        let releases = parse(body).unwrap();
        assert_eq!(releases[0].freeleech, Some(Freeleech::Factor(0.5)));
    }

    #[test]
    fn test_parse_empty_with_error() {
        assert!(parse(r#"{"results": [], "error": "No results"}"#).unwrap().is_empty());
        let err = parse(r#"{"error": "Invalid passkey"}"#).unwrap_err();
        assert!(matches!(err, IndexerError::Auth(_)));
    }

    #[tokio::test]
    async fn test_search_without_imdb_id_is_empty() {
        let adapter =
            DanishBits::with_base_url(Client::new(), "http://unreachable.invalid", "u", "p");
        let request = SearchRequest {
            imdb_id: None,
            title: "Movie".into(),
            year: Some(2019),
            skip_if_identifier_capable: false,
        };
        assert!(adapter.search(&request).await.unwrap().is_empty());
    }
}
