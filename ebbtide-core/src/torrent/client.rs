//! Download-client adapter contract.
//!
//! Adapters own their wire protocols, sessions, and authentication; the core
//! only requires that each backend can produce a [`TorrentSnapshot`] and act
//! on a removal decision.

use async_trait::async_trait;

use super::{TorrentHash, TorrentSnapshot};

/// Errors surfaced by download-client adapters.
///
/// A torrent the client cannot locate is not an error; adapters report that
/// case as `Ok(None)` from [`DownloadClient::fetch_torrent`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP transport error: {reason}")]
    Http { reason: String },

    #[error("download client rejected authentication: {reason}")]
    Authentication { reason: String },

    #[error("unexpected download client response: {reason}")]
    Protocol { reason: String },

    #[error("URL parsing error")]
    UrlParsing(#[from] url::ParseError),
}

impl ClientError {
    /// Wraps a transport-level failure from the HTTP stack.
    pub fn http(error: impl std::fmt::Display) -> Self {
        ClientError::Http {
            reason: error.to_string(),
        }
    }

    /// Wraps a malformed or unexpected response body.
    pub fn protocol(error: impl std::fmt::Display) -> Self {
        ClientError::Protocol {
            reason: error.to_string(),
        }
    }
}

/// Capability contract satisfied by every download-client backend.
///
/// `fetch_torrent` builds a fresh snapshot for one torrent, returning `None`
/// when the client no longer tracks the hash. `remove_torrent` acts on a
/// removal decision; `delete_data` also removes downloaded payload files.
#[async_trait]
pub trait DownloadClient: Send + Sync {
    /// Builds a snapshot for the given hash, `None` if the client does not
    /// track it.
    async fn fetch_torrent(
        &self,
        hash: &TorrentHash,
    ) -> Result<Option<TorrentSnapshot>, ClientError>;

    /// Builds snapshots for every torrent the client currently tracks.
    async fn list_torrents(&self) -> Result<Vec<TorrentSnapshot>, ClientError>;

    /// Removes a torrent from the client, optionally deleting its data.
    async fn remove_torrent(
        &self,
        hash: &TorrentHash,
        delete_data: bool,
    ) -> Result<(), ClientError>;
}
