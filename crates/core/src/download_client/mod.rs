//! Download client abstraction.
//!
//! This module provides a `DownloadClient` trait for handing releases to
//! various backends (SABnzbd, DownloadStation, rTorrent, qBittorrent) and a
//! `DownloadDispatcher` that routes releases between them.

mod dispatcher;
mod download_station;
pub mod hash;
mod qbittorrent;
pub mod retry;
mod rtorrent;
pub mod scgi;
mod sabnzbd;
mod session;
mod types;
pub mod xmlrpc;

pub use dispatcher::DownloadDispatcher;
pub use download_station::{error_message as download_station_error, DownloadStationClient};
pub use qbittorrent::QBittorrentClient;
pub use retry::{poll_until, RetryError, RetryPolicy};
pub use rtorrent::RtorrentClient;
pub use sabnzbd::SabnzbdClient;
pub use session::Session;
pub use types::*;
