//! Per-torrent queue check composing pre-checks with the rule evaluator.
//!
//! Checks run in a fixed order; the first producing a removal wins and the
//! rest are skipped: ignore list, all-files-skipped, metadata strikes, slow
//! rules, stall rules.

use std::sync::Arc;

use tracing::{debug, info};

use super::{DeleteReason, IgnoreList, RemovalDecision};
use crate::config::QueueConfig;
use crate::rules::{RuleEvaluator, RuleSet};
use crate::strikes::{ProgressCache, StrikeError, StrikeKind, StrikeLedger};
use crate::torrent::{DownloadClient, TorrentHash, TorrentSnapshot};

/// Orchestrates the full decision chain for one torrent at a time.
///
/// Holds the active rule set and ignore list as explicit state passed in at
/// construction; nothing is looked up ambiently during evaluation.
pub struct QueueChecker<L: StrikeLedger> {
    ledger: Arc<L>,
    evaluator: RuleEvaluator<L>,
    rules: RuleSet,
    ignore: IgnoreList,
    config: QueueConfig,
}

impl<L: StrikeLedger> QueueChecker<L> {
    /// Creates a checker over the shared strike stores and the active
    /// configuration.
    pub fn new(
        ledger: Arc<L>,
        progress: Arc<ProgressCache>,
        rules: RuleSet,
        ignore: IgnoreList,
        config: QueueConfig,
    ) -> Self {
        Self {
            evaluator: RuleEvaluator::new(Arc::clone(&ledger), progress),
            ledger,
            rules,
            ignore,
            config,
        }
    }

    /// Builds a snapshot via the adapter and runs the decision chain.
    ///
    /// A hash the client no longer tracks yields `found: false`, not an
    /// error.
    ///
    /// # Errors
    /// - `EbbtideError::Client` - Adapter could not talk to the client
    /// - `EbbtideError::Strike` - Ledger backing store failed
    pub async fn check_torrent(
        &self,
        client: &dyn DownloadClient,
        hash: &TorrentHash,
    ) -> crate::Result<RemovalDecision> {
        let Some(snapshot) = client.fetch_torrent(hash).await? else {
            debug!(%hash, "torrent not found in client");
            return Ok(RemovalDecision::not_found());
        };
        Ok(self.check_snapshot(&snapshot).await?)
    }

    /// Runs the decision chain over an already-built snapshot.
    ///
    /// # Errors
    /// - `StrikeError::Store` - Ledger backing store failed
    pub async fn check_snapshot(
        &self,
        snapshot: &TorrentSnapshot,
    ) -> Result<RemovalDecision, StrikeError> {
        if let Some(pattern) = self.ignore.matched_pattern(snapshot) {
            debug!(torrent = %snapshot.name, pattern, "ignore list match, skipping checks");
            return Ok(RemovalDecision::keep(snapshot));
        }

        if snapshot.all_files_skipped {
            info!(torrent = %snapshot.name, "all files unwanted, removing");
            return Ok(RemovalDecision::remove(
                snapshot,
                DeleteReason::AllFilesSkipped,
                true,
            ));
        }

        if snapshot.is_fetching_metadata() {
            return self.check_metadata(snapshot).await;
        }

        if snapshot.is_downloading() && snapshot.download_speed_bps > 0 {
            return self
                .evaluator
                .evaluate_slow_rules(snapshot, &self.rules.slow_rules)
                .await;
        }

        if snapshot.is_stalled() {
            return self
                .evaluator
                .evaluate_stall_rules(snapshot, &self.rules.stall_rules)
                .await;
        }

        Ok(RemovalDecision::keep(snapshot))
    }

    /// Strike counter for torrents stuck fetching metadata, independent of
    /// the rule engine and gated by its own configured limit.
    async fn check_metadata(
        &self,
        snapshot: &TorrentSnapshot,
    ) -> Result<RemovalDecision, StrikeError> {
        if self.config.metadata_max_strikes == 0 {
            return Ok(RemovalDecision::keep(snapshot));
        }

        let limit_reached = self
            .ledger
            .increment_and_check(
                &snapshot.hash,
                &snapshot.name,
                self.config.metadata_max_strikes,
                StrikeKind::DownloadingMetadata,
            )
            .await?;
        if limit_reached {
            info!(torrent = %snapshot.name, "stuck fetching metadata, removing");
        }
        // No rule fired here; metadata-only torrents always delete from
        // the client.
        Ok(RemovalDecision::after_strike(
            snapshot,
            limit_reached,
            DeleteReason::DownloadingMetadata,
            true,
        ))
    }
}
