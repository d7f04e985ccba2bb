//! Release search across heterogeneous indexers.
//!
//! Capability-based (Torznab/Newznab) indexers and specialized adapters all
//! implement [`Indexer`]; the [`SearchAggregator`] fans backlog searches out
//! to them and the [`RssSyncEngine`] polls their latest feeds.

mod aggregator;
mod capabilities;
mod dedup;
pub mod normalize;
pub mod providers;
pub mod registry;
mod rss_sync;
mod torznab;
mod types;
pub mod xml_tree;

pub use aggregator::SearchAggregator;
pub use capabilities::{
    normalize_base_url, parse_caps, CapabilityCache, CapabilityDescriptor, CapabilityLookup,
    CapabilityNegotiator, MemoryCapabilityCache, IMDB_ID_PARAM,
};
pub use dedup::merge_unique;
pub use normalize::{magnet_uri, parse_human_size, PUBLIC_TRACKERS};
pub use registry::IndexerSet;
pub use rss_sync::{RssSyncEngine, SyncCursor};
pub use torznab::{parse_feed, QueryPlan, TorznabIndexer};
pub use types::*;
