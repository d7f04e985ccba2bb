//! Info-hash derivation for torrent-family locators.

use librqbit_core::torrent_metainfo::{torrent_from_bytes, TorrentMetaV1Owned};

use super::DownloadClientError;

const BASE32_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// Info hash of a magnet URI as uppercase hex.
///
/// Accepts both hex and base32 `btih` values.
pub fn magnet_info_hash(magnet: &str) -> Option<String> {
    let (_, query) = magnet.split_once('?')?;
    let value = query
        .split('&')
        .find_map(|param| param.strip_prefix("xt=urn:btih:"))?;

    match value.len() {
        40 if value.chars().all(|c| c.is_ascii_hexdigit()) => Some(value.to_uppercase()),
        32 => base32_to_hex(value),
        _ => None,
    }
}

/// Info hash of `.torrent` file contents as uppercase hex.
pub fn torrent_info_hash(bytes: &[u8]) -> Result<String, DownloadClientError> {
    let torrent: TorrentMetaV1Owned = torrent_from_bytes(bytes)
        .map_err(|e| DownloadClientError::Unsupported(format!("invalid torrent file: {}", e)))?;
    Ok(torrent.info_hash.as_string().to_uppercase())
}

fn base32_to_hex(value: &str) -> Option<String> {
    let mut bits: u64 = 0;
    let mut bit_count = 0;
    let mut hex = String::with_capacity(40);

    for c in value.bytes() {
        let index = BASE32_ALPHABET
            .iter()
            .position(|&a| a == c.to_ascii_uppercase())?;
        bits = (bits << 5) | index as u64;
        bit_count += 5;
        if bit_count >= 8 {
            bit_count -= 8;
            hex.push_str(&format!("{:02X}", (bits >> bit_count) & 0xff));
        }
    }

    (hex.len() == 40).then_some(hex)
}
