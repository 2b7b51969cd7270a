//! Removal decision returned to the polling caller.

use serde::{Deserialize, Serialize};

use crate::torrent::TorrentSnapshot;

/// Why a torrent was (or would be) removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteReason {
    /// No removal applies
    #[default]
    None,
    /// Stall rule strike limit reached
    Stalled,
    /// Slow rule (speed threshold) strike limit reached
    SlowSpeed,
    /// Slow rule (time threshold) strike limit reached
    SlowTime,
    /// Stuck fetching metadata past its strike limit
    DownloadingMetadata,
    /// Every file in the torrent is marked unwanted
    AllFilesSkipped,
}

/// Transient outcome of one queue check; never persisted.
///
/// `found` must be checked before trusting any other field: a torrent the
/// client no longer tracks yields `found: false` with all defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemovalDecision {
    /// Torrent located in the download client
    pub found: bool,
    /// Caller should remove the torrent from the managed queue
    pub should_remove: bool,
    /// Reason for removal, `None` when keeping
    pub reason: DeleteReason,
    /// Privacy flag copied from the snapshot
    pub is_private: bool,
    /// Caller should also delete the torrent and its data from the client
    pub delete_from_client: bool,
}

impl RemovalDecision {
    /// Decision for a hash the client does not track.
    pub fn not_found() -> Self {
        Self {
            found: false,
            should_remove: false,
            reason: DeleteReason::None,
            is_private: false,
            delete_from_client: false,
        }
    }

    /// Decision that keeps the torrent untouched.
    pub fn keep(snapshot: &TorrentSnapshot) -> Self {
        Self {
            found: true,
            should_remove: false,
            reason: DeleteReason::None,
            is_private: snapshot.is_private,
            delete_from_client: false,
        }
    }

    /// Decision after a strike call: removal when the limit was reached,
    /// otherwise equivalent to [`RemovalDecision::keep`].
    ///
    /// `delete_flag` is the firing rule's delete-from-client setting; it is
    /// mirrored verbatim on removal regardless of the snapshot's privacy.
    pub fn after_strike(
        snapshot: &TorrentSnapshot,
        limit_reached: bool,
        reason: DeleteReason,
        delete_flag: bool,
    ) -> Self {
        Self {
            found: true,
            should_remove: limit_reached,
            reason: if limit_reached {
                reason
            } else {
                DeleteReason::None
            },
            is_private: snapshot.is_private,
            delete_from_client: limit_reached && delete_flag,
        }
    }

    /// Decision that removes the torrent outright, bypassing strikes.
    pub fn remove(snapshot: &TorrentSnapshot, reason: DeleteReason, delete_from_client: bool) -> Self {
        Self {
            found: true,
            should_remove: true,
            reason,
            is_private: snapshot.is_private,
            delete_from_client,
        }
    }
}
