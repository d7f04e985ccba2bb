//! Capability negotiation for Torznab/Newznab indexers.
//!
//! Before the first query against a capability-based indexer we ask it which
//! movie-search parameters it understands (`t=caps`) and remember the answer
//! in a [`CapabilityCache`].

use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::catalog::CatalogError;

use super::xml_tree;
use super::IndexerError;

/// Parameter advertising identifier-based movie search.
pub const IMDB_ID_PARAM: &str = "imdbid";

/// What a capability-based indexer advertises.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityDescriptor {
    pub base_url: String,
    pub supported_params: BTreeSet<String>,
}

impl CapabilityDescriptor {
    pub fn supports(&self, param: &str) -> bool {
        self.supported_params.contains(param)
    }

    pub fn supports_imdb_id(&self) -> bool {
        self.supports(IMDB_ID_PARAM)
    }
}

/// Result of a capability lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapabilityLookup {
    Available(CapabilityDescriptor),
    /// Negotiation failed; fall back to free-text search.
    NotAvailable,
}

impl CapabilityLookup {
    pub fn supports_imdb_id(&self) -> bool {
        match self {
            CapabilityLookup::Available(caps) => caps.supports_imdb_id(),
            CapabilityLookup::NotAvailable => false,
        }
    }
}

/// Persistent store for negotiated capabilities, keyed by base URL.
#[async_trait]
pub trait CapabilityCache: Send + Sync {
    async fn read(&self, base_url: &str) -> Result<Option<BTreeSet<String>>, CatalogError>;

    async fn write(&self, base_url: &str, params: &BTreeSet<String>) -> Result<(), CatalogError>;
}

/// In-memory capability cache.
#[derive(Debug, Default)]
pub struct MemoryCapabilityCache {
    entries: RwLock<std::collections::HashMap<String, BTreeSet<String>>>,
}

impl MemoryCapabilityCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CapabilityCache for MemoryCapabilityCache {
    async fn read(&self, base_url: &str) -> Result<Option<BTreeSet<String>>, CatalogError> {
        let entries = self
            .entries
            .read()
            .map_err(|e| CatalogError::Internal(e.to_string()))?;
        Ok(entries.get(base_url).cloned())
    }

    async fn write(&self, base_url: &str, params: &BTreeSet<String>) -> Result<(), CatalogError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| CatalogError::Internal(e.to_string()))?;
        entries.insert(base_url.to_string(), params.clone());
        Ok(())
    }
}

/// Normalize a base URL to the cache key form (always ends with `/`).
pub fn normalize_base_url(url: &str) -> String {
    let trimmed = url.trim();
    if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    }
}

/// Parse the comma-separated `supportedParams` out of a caps document.
pub fn parse_caps(xml: &str) -> Result<BTreeSet<String>, IndexerError> {
    let doc = xml_tree::parse(xml).map_err(|e| IndexerError::Protocol(e.to_string()))?;

    if let Some(error) = doc.get("error") {
        let description = xml_tree::attr(error, "description").unwrap_or("unknown error");
        return Err(match xml_tree::attr(error, "code") {
            Some("100") | Some("101") | Some("102") => IndexerError::Auth(description.to_string()),
            _ => IndexerError::Protocol(description.to_string()),
        });
    }

    let movie_search = xml_tree::path(&doc, &["caps", "searching", "movie-search"])
        .ok_or_else(|| IndexerError::Protocol("caps/searching/movie-search missing".into()))?;

    let params = xml_tree::attr(movie_search, "supportedParams")
        .ok_or_else(|| IndexerError::Protocol("supportedParams missing".into()))?;

    Ok(params
        .split(',')
        .map(|p| p.trim().to_lowercase())
        .filter(|p| !p.is_empty())
        .collect())
}

/// Resolves and caches capability descriptors.
pub struct CapabilityNegotiator {
    client: Client,
    cache: Arc<dyn CapabilityCache>,
    /// Base URLs whose negotiation failed since the last sync cycle.
    failed: RwLock<HashSet<String>>,
}

impl CapabilityNegotiator {
    pub fn new(client: Client, cache: Arc<dyn CapabilityCache>) -> Self {
        Self {
            client,
            cache,
            failed: RwLock::new(HashSet::new()),
        }
    }

    /// Look up (negotiating on a cache miss) what `base_url` supports.
    ///
    /// Never fails: any problem yields [`CapabilityLookup::NotAvailable`].
    pub async fn get_capabilities(&self, base_url: &str, api_key: &str) -> CapabilityLookup {
        let base_url = normalize_base_url(base_url);

        match self.cache.read(&base_url).await {
            Ok(Some(params)) => {
                return CapabilityLookup::Available(CapabilityDescriptor {
                    base_url,
                    supported_params: params,
                })
            }
            Ok(None) => {}
            Err(e) => warn!(base_url = %base_url, error = %e, "Capability cache read failed"),
        }

        if self.has_failed(&base_url) {
            debug!(base_url = %base_url, "Skipping capability negotiation until next sync cycle");
            return CapabilityLookup::NotAvailable;
        }

        match self.negotiate(&base_url, api_key).await {
            Ok(params) => {
                crate::metrics::CAPABILITY_NEGOTIATIONS
                    .with_label_values(&["success"])
                    .inc();
                info!(base_url = %base_url, params = ?params, "Negotiated indexer capabilities");
                if let Err(e) = self.cache.write(&base_url, &params).await {
                    warn!(base_url = %base_url, error = %e, "Capability cache write failed");
                }
                CapabilityLookup::Available(CapabilityDescriptor {
                    base_url,
                    supported_params: params,
                })
            }
            Err(e) => {
                crate::metrics::CAPABILITY_NEGOTIATIONS
                    .with_label_values(&["failed"])
                    .inc();
                warn!(
                    base_url = %base_url,
                    kind = e.kind().as_str(),
                    error = %e,
                    "Unable to get indexer capabilities"
                );
                self.mark_failed(&base_url);
                CapabilityLookup::NotAvailable
            }
        }
    }

    /// Forget failed negotiations so the next lookup retries them.
    pub fn reset_failures(&self) {
        if let Ok(mut failed) = self.failed.write() {
            failed.clear();
        }
    }

    fn has_failed(&self, base_url: &str) -> bool {
        self.failed
            .read()
            .map(|f| f.contains(base_url))
            .unwrap_or(false)
    }

    fn mark_failed(&self, base_url: &str) {
        if let Ok(mut failed) = self.failed.write() {
            failed.insert(base_url.to_string());
        }
    }

    async fn negotiate(
        &self,
        base_url: &str,
        api_key: &str,
    ) -> Result<BTreeSet<String>, IndexerError> {
        let url = format!(
            "{}api?apikey={}&t=caps",
            base_url,
            urlencoding::encode(api_key)
        );
        debug!(base_url = %base_url, "Requesting indexer capabilities");

        let response = self
            .client
            .get(&url)
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
        parse_caps(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAPS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<caps>
  <server version="1.0" title="Indexer"/>
  <searching>
    <search available="yes" supportedParams="q"/>
    <movie-search available="yes" supportedParams="q,imdbid"/>
  </searching>
</caps>"#;

    #[test]
    fn test_parse_caps() {
        let params = parse_caps(CAPS).unwrap();
        assert!(params.contains("q"));
        assert!(params.contains("imdbid"));
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_parse_caps_missing_movie_search() {
        let xml = r#"<caps><searching><search available="yes" supportedParams="q"/></searching></caps>"#;
        let err = parse_caps(xml).unwrap_err();
        assert!(matches!(err, IndexerError::Protocol(_)));
    }

    #[test]
    fn test_parse_caps_error_document() {
        let xml = r#"<error code="100" description="Incorrect user credentials"/>"#;
        let err = parse_caps(xml).unwrap_err();
        assert!(matches!(err, IndexerError::Auth(_)));
    }

    #[test]
    fn test_parse_caps_garbage() {
        assert!(parse_caps("not xml at all <").is_err());
    }

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(normalize_base_url("http://idx"), "http://idx/");
        assert_eq!(normalize_base_url("http://idx/"), "http://idx/");
    }

    #[test]
    fn test_lookup_supports_imdb_id() {
        let caps = CapabilityDescriptor {
            base_url: "http://idx/".into(),
            supported_params: ["q".to_string(), "imdbid".to_string()].into(),
        };
        assert!(CapabilityLookup::Available(caps).supports_imdb_id());
        assert!(!CapabilityLookup::NotAvailable.supports_imdb_id());
    }

    #[tokio::test]
    async fn test_memory_cache_roundtrip() {
        let cache = MemoryCapabilityCache::new();
        assert!(cache.read("http://idx/").await.unwrap().is_none());

        let params: BTreeSet<String> = ["q".to_string()].into();
        cache.write("http://idx/", &params).await.unwrap();
        assert_eq!(cache.read("http://idx/").await.unwrap(), Some(params));
    }

    #[tokio::test]
    async fn test_negotiator_uses_cache_without_network() {
        let cache = Arc::new(MemoryCapabilityCache::new());
        let params: BTreeSet<String> = ["q".to_string(), "imdbid".to_string()].into();
        cache.write("http://unreachable.invalid/", &params).await.unwrap();

        let negotiator = CapabilityNegotiator::new(Client::new(), cache);
        let lookup = negotiator
            .get_capabilities("http://unreachable.invalid", "key")
            .await;
        assert!(lookup.supports_imdb_id());
    }

    #[tokio::test]
    async fn test_failed_negotiation_is_remembered_until_reset() {
        let negotiator = CapabilityNegotiator::new(
            Client::new(),
            Arc::new(MemoryCapabilityCache::new()),
        );
        let url = "http://127.0.0.1:1/";

        assert_eq!(
            negotiator.get_capabilities(url, "key").await,
            CapabilityLookup::NotAvailable
        );
        assert!(negotiator.has_failed(url));

        negotiator.reset_failures();
        assert!(!negotiator.has_failed(url));
    }
}
