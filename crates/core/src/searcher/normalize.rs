//! Shared normalization helpers for indexer responses.
//!
//! Every adapter funnels its source-specific fields through these so that
//! sizes, counts and magnet URIs come out identical regardless of source.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::Deserialize;

/// Public announce trackers appended to every constructed magnet URI.
///
/// Order is part of the output format; duplicates are intentional.
pub const PUBLIC_TRACKERS: &[&str] = &[
    "udp://tracker.leechers-paradise.org:6969",
    "udp://zer0day.ch:1337",
    "udp://tracker.coppersurfer.tk:6969",
    "udp://public.popcorn-tracker.org:6969",
    "udp://open.demonii.com:1337/announce",
    "udp://tracker.openbittorrent.com:80",
    "udp://tracker.coppersurfer.tk:6969",
    "udp://glotorrents.pw:6969/announce",
    "udp://tracker.opentrackr.org:1337/announce",
    "udp://torrent.gresille.org:80/announce",
    "udp://p4p.arenabg.com:1337",
    "udp://tracker.leechers-paradise.org:6969",
];

pub const MIB: u64 = 1024 * 1024;
pub const GIB: u64 = 1024 * 1024 * 1024;

static SEEDS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Seeds:? *([0-9]+)").unwrap());
static LEECHERS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Leechers:? *([0-9]+)").unwrap());

/// Build a magnet URI from a bare info hash.
///
/// The title is embedded verbatim, matching what download clients expect
/// from the indexers that only publish hashes.
pub fn magnet_uri(hash: &str, title: &str) -> String {
    format!(
        "magnet:?xt=urn:btih:{}&dn={}&tr={}",
        hash,
        title,
        PUBLIC_TRACKERS.join("&tr=")
    )
}

/// Multiplier for a unit suffix. Anything that is not `MB` counts as `GB`.
pub fn unit_multiplier(unit: &str) -> u64 {
    if unit.trim().eq_ignore_ascii_case("MB") {
        MIB
    } else {
        GIB
    }
}

/// Parse human readable sizes such as `"700 MB"` or `"1,234.5 GB"`.
///
/// The number is multiplied as a float and truncated afterwards.
pub fn parse_human_size(text: &str) -> Option<u64> {
    let mut parts = text.split_whitespace();
    let number = parts.next()?.replace(',', "");
    let unit = parts.next()?;
    let value: f64 = number.parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    Some((value * unit_multiplier(unit) as f64) as u64)
}

/// Extract the `Seeds: N` count from free text, 0 when absent.
pub fn seeds_from_text(text: &str) -> u32 {
    first_count(&SEEDS_RE, text)
}

/// Extract the `Leechers: N` count from free text, 0 when absent.
pub fn leechers_from_text(text: &str) -> u32 {
    first_count(&LEECHERS_RE, text)
}

fn first_count(re: &Regex, text: &str) -> u32 {
    re.captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

/// Escape bare `&` characters so strict XML parsers accept the document.
///
/// Existing entity and character references are left alone.
pub fn repair_ampersands(xml: &str) -> String {
    let mut out = String::with_capacity(xml.len());
    let mut rest = xml;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        if starts_with_reference(tail) {
            out.push('&');
        } else {
            out.push_str("&amp;");
        }
        rest = &tail[1..];
    }
    out.push_str(rest);
    out
}

fn starts_with_reference(tail: &str) -> bool {
    let body = &tail[1..];
    let end = match body.find(';') {
        Some(end) if end > 0 && end <= 10 => end,
        _ => return false,
    };
    let name = &body[..end];
    match name.strip_prefix('#') {
        Some(num) => match num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
            Some(hex) => !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit()),
            None => !num.is_empty() && num.chars().all(|c| c.is_ascii_digit()),
        },
        None => matches!(name, "amp" | "lt" | "gt" | "quot" | "apos"),
    }
}

/// A text field that some sources wrap in an object with a `content` key.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum TextField {
    Plain(String),
    Wrapped { content: String },
}

impl TextField {
    pub fn into_string(self) -> String {
        match self {
            TextField::Plain(s) => s,
            TextField::Wrapped { content } => content,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TextField::Plain(s) => s,
            TextField::Wrapped { content } => content,
        }
    }
}

/// Strip a trailing slash and fall back to `default` when unset.
pub fn base_url(configured: Option<&str>, default: &str) -> String {
    match configured.map(str::trim).filter(|s| !s.is_empty()) {
        Some(url) => url.trim_end_matches('/').to_string(),
        None => default.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magnet_uri_format() {
        let uri = magnet_uri("ABCDEF", "Movie Title");
        assert!(uri.starts_with("magnet:?xt=urn:btih:ABCDEF&dn=Movie Title&tr="));

        let expected_tail = PUBLIC_TRACKERS.join("&tr=");
        assert!(uri.ends_with(&expected_tail));
        assert!(!uri.ends_with('&'));
        assert!(!uri.contains("&tr=&tr="));
        assert_eq!(uri.matches("&tr=").count(), PUBLIC_TRACKERS.len());
    }

    #[test]
    fn test_parse_human_size() {
        assert_eq!(parse_human_size("700 MB"), Some(700 * 1024 * 1024));
        assert_eq!(
            parse_human_size("1.5 GB"),
            Some((1.5 * 1024f64.powi(3)).round() as u64)
        );
        assert_eq!(parse_human_size("1,234.5 MB"), Some((1234.5 * MIB as f64) as u64));
        assert_eq!(parse_human_size("garbage"), None);
        assert_eq!(parse_human_size("12"), None);
    }

    #[test]
    fn test_parse_human_size_truncates_after_multiplying() {
        // 0.3 MB = 314572.8 bytes; truncating first would give 0.
        assert_eq!(parse_human_size("0.3 MB"), Some(314_572));
    }

    #[test]
    fn test_unit_multiplier() {
        assert_eq!(unit_multiplier("MB"), MIB);
        assert_eq!(unit_multiplier("mb"), MIB);
        assert_eq!(unit_multiplier("GB"), GIB);
    }

    #[test]
    fn test_counts_from_text() {
        assert_eq!(seeds_from_text("Seeds: 12 , Leechers 3"), 12);
        assert_eq!(leechers_from_text("Seeds: 12 , Leechers 3"), 3);
        assert_eq!(seeds_from_text("Seeds: 7<br />Leechers: 2<br />"), 7);
        assert_eq!(leechers_from_text("Seeds: 7<br />Leechers: 2<br />"), 2);
        assert_eq!(seeds_from_text("no data"), 0);
        assert_eq!(leechers_from_text(""), 0);
    }

    #[test]
    fn test_repair_ampersands() {
        assert_eq!(repair_ampersands("a & b"), "a &amp; b");
        assert_eq!(repair_ampersands("a &amp; b"), "a &amp; b");
        assert_eq!(repair_ampersands("x=1&y=2"), "x=1&amp;y=2");
        assert_eq!(repair_ampersands("&lt;tag&gt;"), "&lt;tag&gt;");
        assert_eq!(repair_ampersands("&#38; &#x26;"), "&#38; &#x26;");
        assert_eq!(repair_ampersands("end&"), "end&amp;");
    }

    #[test]
    fn test_text_field_shapes() {
        let plain: TextField = serde_json::from_str(r#""Movie""#).unwrap();
        assert_eq!(plain.into_string(), "Movie");

        let wrapped: TextField =
            serde_json::from_str(r#"{"content": "Movie", "lang": "en"}"#).unwrap();
        assert_eq!(wrapped.as_str(), "Movie");
    }

    #[test]
    fn test_base_url() {
        assert_eq!(base_url(None, "https://yts.mx"), "https://yts.mx");
        assert_eq!(base_url(Some(""), "https://yts.mx"), "https://yts.mx");
        assert_eq!(
            base_url(Some("https://mirror.example/"), "https://yts.mx"),
            "https://mirror.example"
        );
    }
}
