//! Client-agnostic torrent model shared by every download-client adapter.
//!
//! Defines the snapshot contract each backend must satisfy, the torrent
//! identity key, and the adapter trait the queue checker drives.

pub mod client;
pub mod snapshot;

use std::fmt;

pub use client::{ClientError, DownloadClient};
pub use snapshot::{TorrentSnapshot, TorrentState, tracker_hostnames};

use serde::{Deserialize, Serialize};

/// Case-insensitive torrent identity key.
///
/// Download clients report info hashes with inconsistent casing; the hash is
/// normalized to lowercase at construction so equality, hashing, and display
/// all agree regardless of source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String")]
pub struct TorrentHash(String);

impl TorrentHash {
    /// Creates a normalized hash from any client-reported representation.
    pub fn new(hash: impl AsRef<str>) -> Self {
        Self(hash.as_ref().trim().to_ascii_lowercase())
    }

    /// Returns the normalized lowercase hash string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for TorrentHash {
    fn from(hash: String) -> Self {
        Self::new(hash)
    }
}

impl From<&str> for TorrentHash {
    fn from(hash: &str) -> Self {
        Self::new(hash)
    }
}

impl fmt::Display for TorrentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_case_insensitive() {
        let upper = TorrentHash::new("ABCDEF0123456789ABCDEF0123456789ABCDEF01");
        let lower = TorrentHash::new("abcdef0123456789abcdef0123456789abcdef01");
        assert_eq!(upper, lower);
        assert_eq!(upper.as_str(), "abcdef0123456789abcdef0123456789abcdef01");
    }

    #[test]
    fn test_hash_trims_whitespace() {
        let padded = TorrentHash::new("  abc123  ");
        assert_eq!(padded.as_str(), "abc123");
    }

    #[test]
    fn test_hash_display_matches_normalized_form() {
        let hash = TorrentHash::new("DEADBEEF");
        assert_eq!(hash.to_string(), "deadbeef");
    }
}
