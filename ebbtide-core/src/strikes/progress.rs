//! Progress baseline cache for forward-progress delta computation.

use std::time::{Duration, Instant};

use dashmap::DashMap;

use super::StrikeKind;
use crate::torrent::TorrentHash;

/// Default lifetime of an untouched baseline entry.
pub const DEFAULT_BASELINE_TTL: Duration = Duration::from_secs(72 * 3600);

#[derive(Debug, Clone, Copy)]
struct BaselineEntry {
    downloaded_bytes: u64,
    recorded_at: Instant,
}

/// Remembers the last observed downloaded-bytes measurement per
/// `(hash, kind)` so the evaluator can compute deltas across polling cycles.
///
/// The first observation for a key seeds the baseline and yields no
/// previous value; stale entries (older than the TTL) are treated as
/// absent, so a torrent that reappears after a long pause seeds fresh.
pub struct ProgressCache {
    entries: DashMap<(TorrentHash, StrikeKind), BaselineEntry>,
    ttl: Duration,
}

impl ProgressCache {
    /// Creates a cache with the default entry TTL.
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_BASELINE_TTL)
    }

    /// Creates a cache whose untouched entries expire after `ttl`.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Records a new observation and returns the previous fresh baseline.
    ///
    /// Returns `None` when this is the first observation for the key (or
    /// the stored one had expired); the new value is stored either way.
    pub fn observe(
        &self,
        hash: &TorrentHash,
        kind: StrikeKind,
        downloaded_bytes: u64,
    ) -> Option<u64> {
        let now = Instant::now();
        let mut previous = None;
        // Entry API keeps read-modify-write atomic per key.
        self.entries
            .entry((hash.clone(), kind))
            .and_modify(|entry| {
                if now.duration_since(entry.recorded_at) <= self.ttl {
                    previous = Some(entry.downloaded_bytes);
                }
                entry.downloaded_bytes = downloaded_bytes;
                entry.recorded_at = now;
            })
            .or_insert(BaselineEntry {
                downloaded_bytes,
                recorded_at: now,
            });
        previous
    }

    /// Drops the baseline for a key, forcing the next observation to seed.
    pub fn clear(&self, hash: &TorrentHash, kind: StrikeKind) {
        self.entries.remove(&(hash.clone(), kind));
    }
}

impl Default for ProgressCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash() -> TorrentHash {
        TorrentHash::new("0ddba11")
    }

    #[test]
    fn test_first_observation_seeds_without_previous() {
        let cache = ProgressCache::new();
        assert_eq!(cache.observe(&hash(), StrikeKind::Stalled, 1000), None);
    }

    #[test]
    fn test_subsequent_observations_return_previous_baseline() {
        let cache = ProgressCache::new();
        cache.observe(&hash(), StrikeKind::Stalled, 1000);
        assert_eq!(cache.observe(&hash(), StrikeKind::Stalled, 5000), Some(1000));
        assert_eq!(cache.observe(&hash(), StrikeKind::Stalled, 9000), Some(5000));
    }

    #[test]
    fn test_kinds_are_tracked_independently() {
        let cache = ProgressCache::new();
        cache.observe(&hash(), StrikeKind::Stalled, 1000);
        assert_eq!(cache.observe(&hash(), StrikeKind::SlowSpeed, 2000), None);
    }

    #[test]
    fn test_clear_forces_reseed() {
        let cache = ProgressCache::new();
        cache.observe(&hash(), StrikeKind::Stalled, 1000);
        cache.clear(&hash(), StrikeKind::Stalled);
        assert_eq!(cache.observe(&hash(), StrikeKind::Stalled, 2000), None);
    }

    #[test]
    fn test_expired_baseline_is_treated_as_absent() {
        let cache = ProgressCache::with_ttl(Duration::from_secs(0));
        cache.observe(&hash(), StrikeKind::Stalled, 1000);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.observe(&hash(), StrikeKind::Stalled, 2000), None);
    }
}
