//! Search and RSS sync against a mocked Torznab endpoint.
//!
//! These tests drive the real HTTP stack:
//! - Capability negotiation and the persisted capability cache
//! - imdb id search versus free-text fallback
//! - Year retry for year-sensitive indexers
//! - RSS sync de-duplication against the SQLite catalog

mod common;

use std::sync::Arc;

use reqwest::Client;
use tokio_test::assert_ok;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use reelfetch_core::searcher::{
    CapabilityLookup, CapabilityNegotiator, Indexer, IndexerSet, RssSyncEngine, SearchAggregator,
    SearchRequest,
};
use reelfetch_core::testing::{fixtures, MockIndexer};
use reelfetch_core::{ReleaseCatalog, SqliteCatalog};

use common::{caps, init_tracing, negotiator, torrent_feed, torznab, EMPTY_FEED};

const API_PATH: &str = "/torznab/api";

fn request(imdb_id: Option<&str>, year: Option<u16>) -> SearchRequest {
    SearchRequest {
        imdb_id: imdb_id.map(String::from),
        title: "Movie Title".to_string(),
        year,
        skip_if_identifier_capable: false,
    }
}

async fn mount_caps(server: &MockServer, params: &str, expected: u64) {
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .and(query_param("t", "caps"))
        .respond_with(ResponseTemplate::new(200).set_body_string(caps(params)))
        .expect(expected)
        .mount(server)
        .await;
}

fn base_url(server: &MockServer) -> String {
    format!("{}/torznab/", server.uri())
}

#[tokio::test]
async fn test_imdb_capable_indexer_searches_by_id() {
    init_tracing();
    let server = MockServer::start().await;
    mount_caps(&server, "q,imdbid", 1).await;

    Mock::given(method("GET"))
        .and(path(API_PATH))
        .and(query_param("t", "movie"))
        .and(query_param("imdbid", "0133093"))
        .and(query_param("apikey", "secret"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(torrent_feed("g-1", "Movie.Title.1999.1080p")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (negotiator, _catalog) = negotiator();
    let indexer = torznab("Jackett", &base_url(&server), false, &negotiator);

    let releases = assert_ok!(indexer.search(&request(Some("tt0133093"), Some(1999))).await);
    assert_eq!(releases.len(), 1);
    assert_eq!(releases[0].indexer, "Jackett");
    assert_eq!(releases[0].seeders, 12);
    assert_eq!(releases[0].leechers, 8);
    // Filled from the request when the feed has none
    assert_eq!(releases[0].imdb_id.as_deref(), Some("tt0133093"));
}

#[tokio::test]
async fn test_falls_back_to_free_text_without_imdb_capability() {
    init_tracing();
    let server = MockServer::start().await;
    mount_caps(&server, "q", 1).await;

    Mock::given(method("GET"))
        .and(path(API_PATH))
        .and(query_param("t", "search"))
        .and(query_param("cat", "2000"))
        .and(query_param("q", "Movie Title 2019"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(torrent_feed("g-2", "Movie.Title.2019.720p")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (negotiator, _catalog) = negotiator();
    let indexer = torznab("Jackett", &base_url(&server), true, &negotiator);

    let releases = assert_ok!(indexer.search(&request(Some("tt1234567"), Some(2019))).await);
    assert_eq!(releases.len(), 1);
    assert_eq!(releases[0].guid, "g-2");
}

#[tokio::test]
async fn test_year_sensitive_indexer_retries_without_year() {
    init_tracing();
    let server = MockServer::start().await;
    mount_caps(&server, "q", 1).await;

    Mock::given(method("GET"))
        .and(path(API_PATH))
        .and(query_param("q", "Movie Title 2019"))
        .respond_with(ResponseTemplate::new(200).set_body_string(EMPTY_FEED))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .and(query_param("q", "Movie Title"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(torrent_feed("g-3", "Movie.Title.720p")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (negotiator, _catalog) = negotiator();
    let indexer = torznab("Jackett", &base_url(&server), true, &negotiator);

    let releases = assert_ok!(indexer.search(&request(None, Some(2019))).await);
    assert_eq!(releases.len(), 1);
    assert_eq!(releases[0].guid, "g-3");
}

#[tokio::test]
async fn test_no_year_retry_when_not_year_sensitive() {
    init_tracing();
    let server = MockServer::start().await;
    mount_caps(&server, "q", 1).await;

    Mock::given(method("GET"))
        .and(path(API_PATH))
        .and(query_param("q", "Movie Title 2019"))
        .respond_with(ResponseTemplate::new(200).set_body_string(EMPTY_FEED))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .and(query_param("q", "Movie Title"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(torrent_feed("g-4", "Movie.Title")),
        )
        .expect(0)
        .mount(&server)
        .await;

    let (negotiator, _catalog) = negotiator();
    let indexer = torznab("Jackett", &base_url(&server), false, &negotiator);

    let releases = assert_ok!(indexer.search(&request(None, Some(2019))).await);
    assert!(releases.is_empty());
}

#[tokio::test]
async fn test_unavailable_caps_use_free_text_and_are_not_renegotiated() {
    init_tracing();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(API_PATH))
        .and(query_param("t", "caps"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .and(query_param("t", "search"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(torrent_feed("g-5", "Movie.Title.2019")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (negotiator, _catalog) = negotiator();
    let indexer = torznab("Jackett", &base_url(&server), false, &negotiator);

    assert_eq!(indexer.capabilities().await, CapabilityLookup::NotAvailable);
    let releases = assert_ok!(indexer.search(&request(Some("tt1234567"), Some(2019))).await);
    assert_eq!(releases.len(), 1);
}

#[tokio::test]
async fn test_negotiated_caps_survive_in_catalog() {
    init_tracing();
    let server = MockServer::start().await;
    mount_caps(&server, "q,imdbid", 1).await;

    let catalog = Arc::new(SqliteCatalog::in_memory().expect("Failed to create catalog"));
    let first = CapabilityNegotiator::new(Client::new(), catalog.clone());
    assert!(first
        .get_capabilities(&base_url(&server), "secret")
        .await
        .supports_imdb_id());

    // A new negotiator over the same catalog reads the cached descriptor
    let second = CapabilityNegotiator::new(Client::new(), catalog.clone());
    assert!(second
        .get_capabilities(&base_url(&server), "secret")
        .await
        .supports_imdb_id());

    let stats = assert_ok!(catalog.stats().await);
    assert_eq!(stats.cached_capabilities, 1);
}

#[tokio::test]
async fn test_aggregator_isolates_unreachable_indexer() {
    init_tracing();
    let server = MockServer::start().await;
    mount_caps(&server, "q", 1).await;
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .and(query_param("t", "search"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(torrent_feed("g-6", "Movie.Title.2019")),
        )
        .mount(&server)
        .await;

    let (negotiator, _catalog) = negotiator();
    let indexers = IndexerSet {
        capability: vec![
            torznab("Down", "http://127.0.0.1:1/", false, &negotiator),
            torznab("Up", &base_url(&server), false, &negotiator),
        ],
        specialized: Vec::new(),
    };

    let releases = SearchAggregator::new(indexers, 4)
        .search(&request(None, Some(2019)))
        .await;
    assert_eq!(releases.len(), 1);
    assert_eq!(releases[0].indexer, "Up");
}

#[tokio::test]
async fn test_probe_stops_at_first_imdb_capable_indexer() {
    init_tracing();
    let before = MockServer::start().await;
    mount_caps(&before, "q", 1).await;
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .and(query_param("t", "search"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(torrent_feed("a", "Movie.Title.2019")),
        )
        .expect(1)
        .mount(&before)
        .await;

    // Negotiated but never searched
    let capable = MockServer::start().await;
    mount_caps(&capable, "q,imdbid", 1).await;
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .and(query_param("t", "movie"))
        .respond_with(ResponseTemplate::new(200).set_body_string(EMPTY_FEED))
        .expect(0)
        .mount(&capable)
        .await;

    // Never contacted, not even for capabilities
    let after = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(caps("q")))
        .expect(0)
        .mount(&after)
        .await;

    let specialized = Arc::new(MockIndexer::new("Specialized"));
    specialized
        .set_search_results(vec![fixtures::release("Specialized", "s")])
        .await;

    let (negotiator, catalog) = negotiator();
    let indexers = IndexerSet {
        capability: vec![
            torznab("Before", &base_url(&before), false, &negotiator),
            torznab("Capable", &base_url(&capable), false, &negotiator),
            torznab("After", &base_url(&after), false, &negotiator),
        ],
        specialized: vec![specialized.clone() as Arc<dyn Indexer>],
    };

    let probe = SearchRequest {
        skip_if_identifier_capable: true,
        ..request(Some("tt1234567"), Some(2019))
    };
    let releases = SearchAggregator::new(indexers, 4).search(&probe).await;

    let guids: Vec<&str> = releases.iter().map(|r| r.guid.as_str()).collect();
    assert_eq!(guids, vec!["a"]);
    assert!(specialized.recorded_searches().await.is_empty());
    let stats = assert_ok!(catalog.stats().await);
    assert_eq!(stats.cached_capabilities, 2);
}

#[tokio::test]
async fn test_rss_sync_only_returns_unseen_releases() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .and(query_param("t", "search"))
        .and(query_param("offset", "0"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(torrent_feed("latest-1", "New.Movie.2020")),
        )
        .expect(2)
        .mount(&server)
        .await;

    let (negotiator, catalog) = negotiator();
    let indexers = IndexerSet {
        capability: vec![torznab("Jackett", &base_url(&server), false, &negotiator)],
        specialized: Vec::new(),
    };
    let engine = RssSyncEngine::new(indexers, negotiator, catalog.clone(), 2);

    let fresh = engine.sync_all().await;
    assert_eq!(fresh.len(), 1);
    assert_eq!(assert_ok!(catalog.store_releases(&fresh).await), 1);

    assert!(engine.sync_all().await.is_empty());
    let cursor = engine.cursor("Jackett").await.expect("cursor recorded");
    assert_eq!(cursor.last_guid.as_deref(), Some("latest-1"));
    assert_eq!(cursor.new_items, 0);
}
