//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the indexer, catalog and
//! download client traits, allowing the search and dispatch layers to be
//! tested without real infrastructure.
//!
//! # Example
//!
//! ```rust,ignore
//! use reelfetch_core::testing::{fixtures, MockIndexer, MockReleaseCatalog};
//!
//! let indexer = MockIndexer::new("Mock");
//! indexer.set_latest_results(vec![fixtures::release("Mock", "guid-1")]).await;
//!
//! let catalog = MockReleaseCatalog::new();
//! catalog.add_known_guid("guid-0").await;
//! ```

mod mock_catalog;
mod mock_download_client;
mod mock_indexer;

pub use mock_catalog::MockReleaseCatalog;
pub use mock_download_client::{MockDownloadClient, RecordedSubmission};
pub use mock_indexer::{MockIndexer, RecordedSearch};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::searcher::{magnet_uri, Freeleech, Release, ReleaseKind, SearchRequest};

    /// Create a magnet release with reasonable defaults.
    pub fn release(indexer: &str, guid: &str) -> Release {
        let title = format!("Movie Title 2019 1080p {}", guid);
        let mut release = Release::new(
            indexer,
            guid,
            title.clone(),
            magnet_uri("C9E15763F722F23E98A29DECDFAE341B98D53056", &title),
            ReleaseKind::Magnet,
        );
        release.info_link = format!("https://{}.example/details/{}", indexer.to_lowercase(), guid);
        release.size_bytes = 1024 * 1024 * 1024 * 2; // 2 GB
        release.seeders = 50;
        release.leechers = 10;
        release.freeleech = Some(Freeleech::Flag(false));
        release.imdb_id = Some("tt1234567".to_string());
        release
    }

    /// Create a usenet release.
    pub fn nzb_release(indexer: &str, guid: &str) -> Release {
        let mut release = Release::new(
            indexer,
            guid,
            format!("Movie.Title.2019.1080p.{}", guid),
            format!("https://nzb.example/getnzb/{}.nzb", guid),
            ReleaseKind::Nzb,
        );
        release.size_bytes = 1024 * 1024 * 700;
        release.imdb_id = Some("tt1234567".to_string());
        release
    }

    /// Create a backlog search request.
    pub fn search_request(imdb_id: Option<&str>, title: &str, year: Option<u16>) -> SearchRequest {
        SearchRequest {
            imdb_id: imdb_id.map(String::from),
            title: title.to_string(),
            year,
            skip_if_identifier_capable: false,
        }
    }
}
