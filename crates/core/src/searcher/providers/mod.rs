//! Specialized adapters, one per hard-coded indexer.

mod danishbits;
mod limetorrents;
mod torrentdownloads;
mod torrentz2;
mod yts;
mod zooqle;

pub use danishbits::DanishBits;
pub use limetorrents::LimeTorrents;
pub use torrentdownloads::TorrentDownloads;
pub use torrentz2::Torrentz2;
pub use yts::Yts;
pub use zooqle::Zooqle;

use reqwest::Client;
use tracing::debug;

use super::IndexerError;

/// GET a URL and return the body, mapping HTTP failures onto the error taxonomy.
pub(crate) async fn fetch_text(
    client: &Client,
    indexer: &str,
    url: &str,
) -> Result<String, IndexerError> {
    debug!(indexer = indexer, url = %url, "Fetching indexer page");

    let response = client
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

    response.text().await.map_err(IndexerError::from_reqwest)
}
