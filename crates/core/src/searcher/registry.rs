//! Name to adapter registry.
//!
//! Specialized adapters are looked up by their configured name here; an
//! unknown name is rejected by config validation before anything runs.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, warn};

use crate::config::{Config, ConfigError, SearchConfig, SpecializedIndexerConfig};

use super::capabilities::CapabilityNegotiator;
use super::providers::{DanishBits, LimeTorrents, TorrentDownloads, Torrentz2, Yts, Zooqle};
use super::torznab::TorznabIndexer;
use super::Indexer;

type Constructor = fn(Client, &SpecializedIndexerConfig) -> Arc<dyn Indexer>;

struct Entry {
    name: &'static str,
    /// Needs an account name and passkey.
    private: bool,
    build: Constructor,
}

const ENTRIES: &[Entry] = &[
    Entry {
        name: "yts",
        private: false,
        build: |client, config| Arc::new(Yts::new(client, config)) as Arc<dyn Indexer>,
    },
    Entry {
        name: "limetorrents",
        private: false,
        build: |client, config| Arc::new(LimeTorrents::new(client, config)) as Arc<dyn Indexer>,
    },
    Entry {
        name: "torrentdownloads",
        private: false,
        build: |client, config| Arc::new(TorrentDownloads::new(client, config)) as Arc<dyn Indexer>,
    },
    Entry {
        name: "torrentz2",
        private: false,
        build: |client, config| Arc::new(Torrentz2::new(client, config)) as Arc<dyn Indexer>,
    },
    Entry {
        name: "zooqle",
        private: false,
        build: |client, config| Arc::new(Zooqle::new(client, config)) as Arc<dyn Indexer>,
    },
    Entry {
        name: "danishbits",
        private: true,
        build: |client, config| Arc::new(DanishBits::new(client, config)) as Arc<dyn Indexer>,
    },
];

fn lookup(name: &str) -> Option<&'static Entry> {
    ENTRIES.iter().find(|e| e.name.eq_ignore_ascii_case(name))
}

/// Whether a specialized adapter with this name exists.
pub fn is_known(name: &str) -> bool {
    lookup(name).is_some()
}

/// Whether the adapter needs tracker credentials.
pub fn requires_credentials(name: &str) -> bool {
    lookup(name).is_some_and(|e| e.private)
}

/// All registered adapter names.
pub fn known_names() -> Vec<&'static str> {
    ENTRIES.iter().map(|e| e.name).collect()
}

/// Build one specialized adapter.
pub fn build(
    client: Client,
    config: &SpecializedIndexerConfig,
) -> Result<Arc<dyn Indexer>, ConfigError> {
    let entry = lookup(&config.name).ok_or_else(|| {
        ConfigError::ValidationError(format!("unknown indexer '{}'", config.name))
    })?;
    Ok((entry.build)(client, config))
}

/// HTTP client shared by every indexer.
pub fn http_client(search: &SearchConfig) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(search.timeout_secs as u64))
        .user_agent(search.user_agent.clone())
        .build()
        .unwrap_or_else(|e| {
            warn!(error = %e, "Failed to build indexer HTTP client, using defaults");
            Client::new()
        })
}

/// Enabled indexers in fan-out order.
#[derive(Clone, Default)]
pub struct IndexerSet {
    pub capability: Vec<Arc<TorznabIndexer>>,
    pub specialized: Vec<Arc<dyn Indexer>>,
}

impl IndexerSet {
    /// Build every enabled indexer from configuration.
    pub fn from_config(
        config: &Config,
        client: Client,
        negotiator: Arc<CapabilityNegotiator>,
    ) -> Result<Self, ConfigError> {
        let capability = config
            .indexers
            .capability
            .iter()
            .filter(|c| c.enabled)
            .map(|c| {
                Arc::new(TorznabIndexer::new(
                    client.clone(),
                    c.clone(),
                    Arc::clone(&negotiator),
                ))
            })
            .collect();

        let mut specialized = Vec::new();
        for indexer in config.indexers.specialized.iter().filter(|c| c.enabled) {
            specialized.push(build(client.clone(), indexer)?);
        }

        let set = Self {
            capability,
            specialized,
        };
        debug!(
            capability = set.capability.len(),
            specialized = set.specialized.len(),
            "Built indexers"
        );
        Ok(set)
    }

    pub fn is_empty(&self) -> bool {
        self.capability.is_empty() && self.specialized.is_empty()
    }

    /// Every indexer as a trait object, capability-based first.
    pub fn all(&self) -> Vec<Arc<dyn Indexer>> {
        self.capability
            .iter()
            .map(|i| Arc::clone(i) as Arc<dyn Indexer>)
            .chain(self.specialized.iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;
    use crate::searcher::MemoryCapabilityCache;

    fn specialized(name: &str) -> SpecializedIndexerConfig {
        SpecializedIndexerConfig {
            name: name.to_string(),
            enabled: true,
            url: None,
            username: None,
            passkey: None,
        }
    }

    #[test]
    fn test_known_names() {
        assert!(is_known("yts"));
        assert!(is_known("LimeTorrents"));
        assert!(!is_known("piratebay"));
        assert_eq!(known_names().len(), 6);
    }

    #[test]
    fn test_requires_credentials() {
        assert!(requires_credentials("danishbits"));
        assert!(!requires_credentials("yts"));
        assert!(!requires_credentials("unknown"));
    }

    #[test]
    fn test_build_adapter_by_name() {
        let adapter = build(Client::new(), &specialized("torrentz2")).unwrap();
        assert_eq!(adapter.name(), "Torrentz2");
        assert!(!adapter.requires_imdb_id());

        let adapter = build(Client::new(), &specialized("yts")).unwrap();
        assert!(adapter.requires_imdb_id());
    }

    #[test]
    fn test_build_unknown_fails() {
        let result = build(Client::new(), &specialized("piratebay"));
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_indexer_set_skips_disabled() {
        let config = load_config_from_str(
            r#"
[[indexers.capability]]
name = "Jackett"
url = "http://localhost:9117/"

[[indexers.capability]]
name = "Off"
url = "http://localhost:9118/"
enabled = false

[[indexers.specialized]]
name = "zooqle"

[[indexers.specialized]]
name = "yts"
enabled = false
"#,
        )
        .unwrap();

        let negotiator = Arc::new(CapabilityNegotiator::new(
            Client::new(),
            Arc::new(MemoryCapabilityCache::new()),
        ));
        let client = http_client(&config.search);
        let set = IndexerSet::from_config(&config, client, negotiator).unwrap();
        assert_eq!(set.capability.len(), 1);
        assert_eq!(set.specialized.len(), 1);

        let names: Vec<String> = set.all().iter().map(|i| i.name().to_string()).collect();
        assert_eq!(names, vec!["Jackett", "Zooqle"]);
    }
}
