//! Strike accounting shared across polling cycles.
//!
//! Two keyed stores back the rule evaluator: the strike ledger counts
//! violations per `(hash, kind)`, and the progress cache remembers the last
//! observed download progress so forward-progress deltas can be computed.
//! Both are independent; there is no cross-store transaction.

pub mod ledger;
pub mod progress;

use std::fmt;

pub use ledger::MemoryStrikeLedger;
pub use progress::ProgressCache;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::torrent::TorrentHash;

/// Failure kind a strike is accumulated under.
///
/// Counters for different kinds are fully independent, even for the same
/// torrent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrikeKind {
    /// Download state with no forward progress
    Stalled,
    /// Downloading below the configured speed threshold
    SlowSpeed,
    /// ETA beyond the configured time threshold
    SlowTime,
    /// Stuck fetching metadata from the swarm
    DownloadingMetadata,
}

impl fmt::Display for StrikeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StrikeKind::Stalled => "stalled",
            StrikeKind::SlowSpeed => "slow_speed",
            StrikeKind::SlowTime => "slow_time",
            StrikeKind::DownloadingMetadata => "downloading_metadata",
        };
        f.write_str(label)
    }
}

/// Errors from the strike ledger's backing store.
///
/// The in-memory ledger never fails; external implementations (a database,
/// a shared cache) must propagate their failures through this type rather
/// than silently no-op, so the evaluator can abort the cycle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StrikeError {
    #[error("strike store failure: {reason}")]
    Store { reason: String },
}

/// Keyed strike counter with atomic per-key increment-and-check and reset.
#[async_trait]
pub trait StrikeLedger: Send + Sync {
    /// Adds one strike for `(hash, kind)` and reports whether the count
    /// reached `max_strikes` on this call.
    ///
    /// # Errors
    /// - `StrikeError::Store` - Backing store failed; the evaluation must
    ///   abort rather than continue with an unknown count
    async fn increment_and_check(
        &self,
        hash: &TorrentHash,
        name: &str,
        max_strikes: u16,
        kind: StrikeKind,
    ) -> Result<bool, StrikeError>;

    /// Clears the strike count for `(hash, kind)`.
    async fn reset(&self, hash: &TorrentHash, name: &str, kind: StrikeKind) -> Result<(), StrikeError>;
}
