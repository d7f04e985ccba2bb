use std::collections::HashSet;

use super::{types::Config, ConfigError, DownloadClientConfig};
use crate::searcher::registry;

/// SABnzbd's named priority levels.
const SABNZBD_PRIORITIES: &[(&str, i8)] = &[
    ("Paused", -2),
    ("Low", -1),
    ("Normal", 0),
    ("High", 1),
    ("Forced", 2),
];

/// Map a named SABnzbd priority level to its API value.
pub fn sabnzbd_priority(name: &str) -> Option<i8> {
    SABNZBD_PRIORITIES
        .iter()
        .find(|(level, _)| *level == name)
        .map(|(_, value)| *value)
}

/// Validate configuration
/// Currently validates:
/// - Concurrency and timeouts are non-zero
/// - Indexer names are unique and URLs are set
/// - Specialized adapter names exist in the registry
/// - Private adapters have credentials
/// - Download client names are unique and SABnzbd priorities are known
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.search.max_concurrency == 0 {
        return Err(ConfigError::ValidationError(
            "search.max_concurrency cannot be 0".to_string(),
        ));
    }
    if config.search.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "search.timeout_secs cannot be 0".to_string(),
        ));
    }

    let mut indexer_names = HashSet::new();

    for indexer in &config.indexers.capability {
        if indexer.url.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "indexer '{}' has an empty url",
                indexer.name
            )));
        }
        if !indexer_names.insert(indexer.name.to_lowercase()) {
            return Err(ConfigError::ValidationError(format!(
                "duplicate indexer name '{}'",
                indexer.name
            )));
        }
    }

    for indexer in &config.indexers.specialized {
        if !registry::is_known(&indexer.name) {
            return Err(ConfigError::ValidationError(format!(
                "unknown indexer '{}' (known: {})",
                indexer.name,
                registry::known_names().join(", ")
            )));
        }
        if !indexer_names.insert(indexer.name.to_lowercase()) {
            return Err(ConfigError::ValidationError(format!(
                "duplicate indexer name '{}'",
                indexer.name
            )));
        }
        if indexer.enabled && registry::requires_credentials(&indexer.name) {
            let has = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());
            if !has(&indexer.username) || !has(&indexer.passkey) {
                return Err(ConfigError::ValidationError(format!(
                    "indexer '{}' requires username and passkey",
                    indexer.name
                )));
            }
        }
    }

    let mut client_names = HashSet::new();
    for client in &config.download_clients {
        if !client_names.insert(client.name().to_string()) {
            return Err(ConfigError::ValidationError(format!(
                "duplicate download client name '{}'",
                client.name()
            )));
        }
        if let DownloadClientConfig::Sabnzbd(sab) = client {
            if sabnzbd_priority(&sab.priority).is_none() {
                return Err(ConfigError::ValidationError(format!(
                    "invalid sabnzbd priority '{}' (expected Paused, Low, Normal, High or Forced)",
                    sab.priority
                )));
            }
        }
    }

    Ok(())
}
