//! In-memory strike ledger with per-key atomicity and time-boxed entries.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, info};

use super::{StrikeError, StrikeKind, StrikeLedger};
use crate::torrent::TorrentHash;

/// Default lifetime of an untouched strike entry.
pub const DEFAULT_STRIKE_TTL: Duration = Duration::from_secs(72 * 3600);

#[derive(Debug, Clone, Copy)]
struct StrikeEntry {
    count: u16,
    updated_at: Instant,
}

/// Concurrent in-memory strike counter keyed by `(hash, kind)`.
///
/// The sharded map gives atomic per-key read-modify-write without a global
/// lock, so polling cycles for different torrents never contend. Entries
/// untouched for longer than the TTL restart from zero on next access;
/// reaching the limit clears the entry, since removal follows.
pub struct MemoryStrikeLedger {
    entries: DashMap<(TorrentHash, StrikeKind), StrikeEntry>,
    ttl: Duration,
}

impl MemoryStrikeLedger {
    /// Creates a ledger with the default entry TTL.
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_STRIKE_TTL)
    }

    /// Creates a ledger whose untouched entries expire after `ttl`.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Current strike count for a key, ignoring expired entries.
    pub fn current_count(&self, hash: &TorrentHash, kind: StrikeKind) -> u16 {
        self.entries
            .get(&(hash.clone(), kind))
            .filter(|entry| entry.updated_at.elapsed() <= self.ttl)
            .map(|entry| entry.count)
            .unwrap_or(0)
    }
}

impl Default for MemoryStrikeLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StrikeLedger for MemoryStrikeLedger {
    async fn increment_and_check(
        &self,
        hash: &TorrentHash,
        name: &str,
        max_strikes: u16,
        kind: StrikeKind,
    ) -> Result<bool, StrikeError> {
        let key = (hash.clone(), kind);
        let now = Instant::now();

        let count = {
            let mut entry = self.entries.entry(key.clone()).or_insert(StrikeEntry {
                count: 0,
                updated_at: now,
            });
            if entry.updated_at.elapsed() > self.ttl {
                entry.count = 0;
            }
            entry.count = entry.count.saturating_add(1).min(max_strikes.max(1));
            entry.updated_at = now;
            entry.count
        };

        let limit_reached = count >= max_strikes;
        if limit_reached {
            // Removal follows; the next appearance of this hash starts clean.
            self.entries.remove(&key);
            info!(torrent = name, %kind, strikes = count, "strike limit reached");
        } else {
            debug!(torrent = name, %kind, strikes = count, max_strikes, "strike recorded");
        }
        Ok(limit_reached)
    }

    async fn reset(
        &self,
        hash: &TorrentHash,
        name: &str,
        kind: StrikeKind,
    ) -> Result<(), StrikeError> {
        if self.entries.remove(&(hash.clone(), kind)).is_some() {
            debug!(torrent = name, %kind, "strikes reset");
        }
        Ok(())
    }
}
