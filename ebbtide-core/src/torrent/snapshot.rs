//! Read-only torrent state snapshot produced fresh per adapter call.
//!
//! Every download-client backend maps its own wire representation into this
//! shape, so the rule engine never inspects client-specific status values.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use url::Url;

use super::TorrentHash;

/// Normalized lifecycle state of a torrent.
///
/// Each adapter maps its client-specific status (strings, numeric codes, or
/// bitfields) into exactly one of these variants. The rule engine dispatches
/// on this discriminator, never on the raw client status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TorrentState {
    /// Actively downloading payload data
    Downloading,
    /// Download state with no forward progress reported by the client
    Stalled,
    /// Complete and uploading to peers
    Seeding,
    /// Download finished, not necessarily seeding
    Completed,
    /// Paused or stopped by the operator
    Paused,
    /// Waiting in the client's download queue
    Queued,
    /// Verifying existing data
    Checking,
    /// Pre-allocating disk space
    Allocating,
    /// Still fetching metadata from the swarm (magnet links)
    FetchingMetadata,
    /// Client reports a torrent-level error
    Error,
    /// Status not recognized by the adapter
    Unknown,
}

/// Client-agnostic view of one torrent's current state.
///
/// Immutable for the duration of one evaluation; built fresh on every
/// adapter call so no stale state leaks between polling cycles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TorrentSnapshot {
    /// Case-insensitive identity key
    pub hash: TorrentHash,
    /// Display name reported by the client
    pub name: String,
    /// Whether the torrent comes from a private tracker
    pub is_private: bool,
    /// Total payload size in bytes
    pub size_bytes: u64,
    /// Completion percentage, 0 to 100
    pub completion_percent: f64,
    /// Payload bytes downloaded so far (monotonic while downloading)
    pub downloaded_bytes: u64,
    /// Current download speed in bytes per second
    pub download_speed_bps: u64,
    /// Estimated seconds to completion, 0 meaning unknown or complete
    pub eta_seconds: u64,
    /// Deduplicated lowercase tracker hostnames
    pub trackers: Vec<String>,
    /// Client-side category, if the backend supports one
    pub category: Option<String>,
    /// Client-side tags or labels
    pub tags: Vec<String>,
    /// Every file in the torrent is marked unwanted/skipped
    pub all_files_skipped: bool,
    /// Normalized lifecycle state
    pub state: TorrentState,
}

impl TorrentSnapshot {
    /// Actively downloading payload data.
    pub fn is_downloading(&self) -> bool {
        self.state == TorrentState::Downloading
    }

    /// Download state with no forward progress.
    pub fn is_stalled(&self) -> bool {
        self.state == TorrentState::Stalled
    }

    /// Complete and uploading.
    pub fn is_seeding(&self) -> bool {
        self.state == TorrentState::Seeding
    }

    /// Download finished (seeding counts as completed).
    pub fn is_completed(&self) -> bool {
        matches!(self.state, TorrentState::Completed | TorrentState::Seeding)
    }

    /// Paused or stopped by the operator.
    pub fn is_paused(&self) -> bool {
        self.state == TorrentState::Paused
    }

    /// Waiting in the client's queue.
    pub fn is_queued(&self) -> bool {
        self.state == TorrentState::Queued
    }

    /// Verifying existing data.
    pub fn is_checking(&self) -> bool {
        self.state == TorrentState::Checking
    }

    /// Pre-allocating disk space.
    pub fn is_allocating(&self) -> bool {
        self.state == TorrentState::Allocating
    }

    /// Still fetching metadata from the swarm.
    pub fn is_fetching_metadata(&self) -> bool {
        self.state == TorrentState::FetchingMetadata
    }
}

/// Extracts deduplicated lowercase hostnames from tracker URLs.
///
/// Non-URL pseudo-tracker entries such as `** [DHT] **` parse as errors and
/// are discarded. Output order is stable (sorted) so snapshots compare
/// predictably in tests and logs.
pub fn tracker_hostnames<I, S>(urls: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut hosts = BTreeSet::new();
    for raw in urls {
        let Ok(url) = Url::parse(raw.as_ref().trim()) else {
            continue;
        };
        if let Some(host) = url.host_str() {
            hosts.insert(host.to_ascii_lowercase());
        }
    }
    hosts.into_iter().collect()
}
