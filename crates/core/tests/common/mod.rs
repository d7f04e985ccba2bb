//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use reelfetch_core::config::{CapabilityIndexerConfig, FeedType};
use reelfetch_core::searcher::{CapabilityNegotiator, TorznabIndexer};
use reelfetch_core::SqliteCatalog;
use reqwest::Client;

/// Route `RUST_LOG` output through the test writer.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub const EMPTY_FEED: &str = "<rss><channel><title>None</title></channel></rss>";

pub fn caps(params: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<caps>
  <searching>
    <search available="yes" supportedParams="q"/>
    <movie-search available="yes" supportedParams="{}"/>
  </searching>
</caps>"#,
        params
    )
}

/// A one-item Torznab feed.
pub fn torrent_feed(guid: &str, title: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:torznab="http://torznab.com/schemas/2015/feed">
  <channel>
    <item>
      <title>{title}</title>
      <guid>{guid}</guid>
      <enclosure url="http://tracker.local/dl/{guid}.torrent" length="1073741824" type="application/x-bittorrent"/>
      <torznab:attr name="seeders" value="12"/>
      <torznab:attr name="peers" value="20"/>
    </item>
  </channel>
</rss>"#
    )
}

pub fn indexer_config(name: &str, url: &str, year_sensitive: bool) -> CapabilityIndexerConfig {
    CapabilityIndexerConfig {
        name: name.to_string(),
        url: url.to_string(),
        api_key: "secret".to_string(),
        enabled: true,
        feed: FeedType::Torrent,
        year_sensitive,
    }
}

/// Negotiator backed by a fresh in-memory catalog.
pub fn negotiator() -> (Arc<CapabilityNegotiator>, Arc<SqliteCatalog>) {
    let catalog = Arc::new(SqliteCatalog::in_memory().expect("Failed to create catalog"));
    let negotiator = Arc::new(CapabilityNegotiator::new(Client::new(), catalog.clone()));
    (negotiator, catalog)
}

pub fn torznab(
    name: &str,
    url: &str,
    year_sensitive: bool,
    negotiator: &Arc<CapabilityNegotiator>,
) -> Arc<TorznabIndexer> {
    Arc::new(TorznabIndexer::new(
        Client::new(),
        indexer_config(name, url, year_sensitive),
        Arc::clone(negotiator),
    ))
}
