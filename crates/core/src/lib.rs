pub mod catalog;
pub mod config;
pub mod download_client;
pub mod metrics;
pub mod searcher;
pub mod testing;

pub use catalog::{CatalogError, ReleaseCatalog, SqliteCatalog};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use download_client::{
    CancelResult, DownloadClient, DownloadClientError, DownloadDispatcher, SubmissionResult,
};
pub use searcher::{
    CapabilityNegotiator, Indexer, IndexerError, IndexerSet, Release, ReleaseKind,
    RssSyncEngine, SearchAggregator, SearchRequest,
};
