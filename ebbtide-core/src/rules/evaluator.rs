//! Strike and reset decisions for a snapshot under its selected rule.
//!
//! The evaluator is request-scoped: each call reads one snapshot, consults
//! the rule manager, then performs at most one ledger mutation and at most
//! one baseline read-modify-write. Ledger failures abort the evaluation;
//! no retries happen here.

use std::sync::Arc;

use tracing::debug;

use super::{SlowRule, StallRule, select_slow_rule, select_stall_rule};
use crate::bytesize::hours_to_seconds;
use crate::queue::{DeleteReason, RemovalDecision};
use crate::strikes::{ProgressCache, StrikeError, StrikeKind, StrikeLedger};
use crate::torrent::TorrentSnapshot;

/// Applies the selected rule to a snapshot and decides strike, reset, or
/// removal.
pub struct RuleEvaluator<L: StrikeLedger> {
    ledger: Arc<L>,
    progress: Arc<ProgressCache>,
}

impl<L: StrikeLedger> RuleEvaluator<L> {
    /// Creates an evaluator over the shared strike ledger and baseline cache.
    pub fn new(ledger: Arc<L>, progress: Arc<ProgressCache>) -> Self {
        Self { ledger, progress }
    }

    /// Evaluates the stall rules for a snapshot in a stalled state.
    ///
    /// With reset-on-progress enabled, the first observation only seeds the
    /// progress baseline; later cycles compare the downloaded-bytes delta
    /// against the rule's minimum progress (any forward progress when
    /// unset). A qualifying delta resets the strikes instead of striking.
    /// The baseline is updated on every evaluation, so deltas are measured
    /// per polling cycle.
    ///
    /// # Errors
    /// - `StrikeError::Store` - Ledger backing store failed
    pub async fn evaluate_stall_rules(
        &self,
        snapshot: &TorrentSnapshot,
        rules: &[StallRule],
    ) -> Result<RemovalDecision, StrikeError> {
        let Some(rule) = select_stall_rule(snapshot, rules) else {
            return Ok(RemovalDecision::keep(snapshot));
        };

        if rule.reset_strikes_on_progress {
            match self
                .progress
                .observe(&snapshot.hash, StrikeKind::Stalled, snapshot.downloaded_bytes)
            {
                None => {
                    debug!(torrent = %snapshot.name, "seeded progress baseline");
                    return Ok(RemovalDecision::keep(snapshot));
                }
                Some(baseline) => {
                    let delta = snapshot.downloaded_bytes.saturating_sub(baseline);
                    let reset = match rule.minimum_progress {
                        Some(minimum) => delta >= minimum,
                        None => delta > 0,
                    };
                    if reset {
                        self.ledger
                            .reset(&snapshot.hash, &snapshot.name, StrikeKind::Stalled)
                            .await?;
                        debug!(
                            torrent = %snapshot.name,
                            delta,
                            "forward progress detected, strikes reset"
                        );
                        return Ok(RemovalDecision::keep(snapshot));
                    }
                }
            }
        }

        let limit_reached = self
            .ledger
            .increment_and_check(
                &snapshot.hash,
                &snapshot.name,
                rule.max_strikes,
                StrikeKind::Stalled,
            )
            .await?;
        Ok(RemovalDecision::after_strike(
            snapshot,
            limit_reached,
            DeleteReason::Stalled,
            rule.delete_private_torrents_from_client,
        ))
    }

    /// Evaluates the slow rules for a snapshot downloading with nonzero
    /// speed.
    ///
    /// The rule's configuration decides the subtype: a set `min_speed`
    /// evaluates as slow-speed regardless of `max_time_hours`; otherwise a
    /// positive `max_time_hours` evaluates as slow-time; with neither
    /// configured no strike call is made at all.
    ///
    /// # Errors
    /// - `StrikeError::Store` - Ledger backing store failed
    pub async fn evaluate_slow_rules(
        &self,
        snapshot: &TorrentSnapshot,
        rules: &[SlowRule],
    ) -> Result<RemovalDecision, StrikeError> {
        let Some(rule) = select_slow_rule(snapshot, rules) else {
            return Ok(RemovalDecision::keep(snapshot));
        };

        if let Some(min_speed) = rule.min_speed {
            let violating = snapshot.download_speed_bps < min_speed;
            self.judge_slow(snapshot, rule, violating, StrikeKind::SlowSpeed)
                .await
        } else if rule.max_time_hours > 0.0 {
            let max_eta = hours_to_seconds(rule.max_time_hours);
            let violating = snapshot.eta_seconds > max_eta;
            self.judge_slow(snapshot, rule, violating, StrikeKind::SlowTime)
                .await
        } else {
            Ok(RemovalDecision::keep(snapshot))
        }
    }

    async fn judge_slow(
        &self,
        snapshot: &TorrentSnapshot,
        rule: &SlowRule,
        violating: bool,
        kind: StrikeKind,
    ) -> Result<RemovalDecision, StrikeError> {
        if violating {
            let limit_reached = self
                .ledger
                .increment_and_check(&snapshot.hash, &snapshot.name, rule.max_strikes, kind)
                .await?;
            let reason = match kind {
                StrikeKind::SlowSpeed => DeleteReason::SlowSpeed,
                _ => DeleteReason::SlowTime,
            };
            return Ok(RemovalDecision::after_strike(
                snapshot,
                limit_reached,
                reason,
                rule.delete_private_torrents_from_client,
            ));
        }

        if rule.reset_strikes_on_progress {
            self.ledger
                .reset(&snapshot.hash, &snapshot.name, kind)
                .await?;
        }
        Ok(RemovalDecision::keep(snapshot))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::rules::test_rules::{slow_rule, stall_rule};
    use crate::strikes::MemoryStrikeLedger;
    use crate::torrent::{TorrentHash, TorrentState};

    fn snapshot() -> TorrentSnapshot {
        TorrentSnapshot {
            hash: TorrentHash::new("deadbeef"),
            name: "ubuntu.iso".to_string(),
            is_private: false,
            size_bytes: 2_000_000_000,
            completion_percent: 30.0,
            downloaded_bytes: 600_000_000,
            download_speed_bps: 0,
            eta_seconds: 0,
            trackers: Vec::new(),
            category: None,
            tags: Vec::new(),
            all_files_skipped: false,
            state: TorrentState::Stalled,
        }
    }

    fn evaluator() -> RuleEvaluator<MemoryStrikeLedger> {
        RuleEvaluator::new(
            Arc::new(MemoryStrikeLedger::new()),
            Arc::new(ProgressCache::new()),
        )
    }

    /// Ledger double that counts calls and fails or fires on demand.
    struct ScriptedLedger {
        increments: AtomicU32,
        resets: AtomicU32,
        limit_reached: bool,
        fail: bool,
    }

    impl ScriptedLedger {
        fn new(limit_reached: bool) -> Self {
            Self {
                increments: AtomicU32::new(0),
                resets: AtomicU32::new(0),
                limit_reached,
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                increments: AtomicU32::new(0),
                resets: AtomicU32::new(0),
                limit_reached: false,
                fail: true,
            }
        }
    }

    #[async_trait]
    impl StrikeLedger for ScriptedLedger {
        async fn increment_and_check(
            &self,
            _hash: &TorrentHash,
            _name: &str,
            _max_strikes: u16,
            _kind: StrikeKind,
        ) -> Result<bool, StrikeError> {
            if self.fail {
                return Err(StrikeError::Store {
                    reason: "backing store unavailable".to_string(),
                });
            }
            self.increments.fetch_add(1, Ordering::SeqCst);
            Ok(self.limit_reached)
        }

        async fn reset(
            &self,
            _hash: &TorrentHash,
            _name: &str,
            _kind: StrikeKind,
        ) -> Result<(), StrikeError> {
            self.resets.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_no_matching_stall_rule_keeps_without_striking() {
        let ledger = Arc::new(ScriptedLedger::new(false));
        let evaluator = RuleEvaluator::new(Arc::clone(&ledger), Arc::new(ProgressCache::new()));

        let decision = evaluator
            .evaluate_stall_rules(&snapshot(), &[])
            .await
            .unwrap();
        assert!(!decision.should_remove);
        assert_eq!(ledger.increments.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stall_strikes_accumulate_to_removal() {
        let evaluator = evaluator();
        let rules = vec![stall_rule(1, "default")];

        for _ in 0..2 {
            let decision = evaluator
                .evaluate_stall_rules(&snapshot(), &rules)
                .await
                .unwrap();
            assert!(!decision.should_remove);
        }
        let decision = evaluator
            .evaluate_stall_rules(&snapshot(), &rules)
            .await
            .unwrap();
        assert!(decision.should_remove);
        assert_eq!(decision.reason, DeleteReason::Stalled);
    }

    #[tokio::test]
    async fn test_removal_mirrors_delete_flag_even_for_public_snapshot() {
        let ledger = Arc::new(ScriptedLedger::new(true));
        let evaluator = RuleEvaluator::new(Arc::clone(&ledger), Arc::new(ProgressCache::new()));
        let mut rule = stall_rule(1, "default");
        rule.delete_private_torrents_from_client = true;

        let decision = evaluator
            .evaluate_stall_rules(&snapshot(), &[rule])
            .await
            .unwrap();
        assert!(decision.should_remove);
        assert!(!decision.is_private);
        assert!(decision.delete_from_client);
    }

    #[tokio::test]
    async fn test_first_observation_seeds_baseline_without_strike() {
        let ledger = Arc::new(ScriptedLedger::new(false));
        let evaluator = RuleEvaluator::new(Arc::clone(&ledger), Arc::new(ProgressCache::new()));
        let mut rule = stall_rule(1, "default");
        rule.reset_strikes_on_progress = true;

        let decision = evaluator
            .evaluate_stall_rules(&snapshot(), &[rule])
            .await
            .unwrap();
        assert!(!decision.should_remove);
        assert_eq!(ledger.increments.load(Ordering::SeqCst), 0);
        assert_eq!(ledger.resets.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_minimum_progress_resets_exactly_once() {
        let ledger = Arc::new(ScriptedLedger::new(false));
        let evaluator = RuleEvaluator::new(Arc::clone(&ledger), Arc::new(ProgressCache::new()));
        let mut rule = stall_rule(1, "default");
        rule.reset_strikes_on_progress = true;
        rule.minimum_progress = Some(10_000_000);
        let rules = vec![rule];

        // 0 -> 1 MB -> 12 MB: only the third observation clears the 10 MB bar.
        for (bytes, expected_resets) in [(0, 0), (1_000_000, 0), (12_000_000, 1)] {
            let mut observed = snapshot();
            observed.downloaded_bytes = bytes;
            evaluator
                .evaluate_stall_rules(&observed, &rules)
                .await
                .unwrap();
            assert_eq!(ledger.resets.load(Ordering::SeqCst), expected_resets);
        }
    }

    #[tokio::test]
    async fn test_any_progress_resets_when_minimum_unset() {
        let ledger = Arc::new(ScriptedLedger::new(false));
        let evaluator = RuleEvaluator::new(Arc::clone(&ledger), Arc::new(ProgressCache::new()));
        let mut rule = stall_rule(1, "default");
        rule.reset_strikes_on_progress = true;
        let rules = vec![rule];

        let mut observed = snapshot();
        observed.downloaded_bytes = 1000;
        evaluator
            .evaluate_stall_rules(&observed, &rules)
            .await
            .unwrap();

        observed.downloaded_bytes = 1001;
        evaluator
            .evaluate_stall_rules(&observed, &rules)
            .await
            .unwrap();
        assert_eq!(ledger.resets.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_progress_strikes_after_seeding() {
        let ledger = Arc::new(ScriptedLedger::new(false));
        let evaluator = RuleEvaluator::new(Arc::clone(&ledger), Arc::new(ProgressCache::new()));
        let mut rule = stall_rule(1, "default");
        rule.reset_strikes_on_progress = true;
        let rules = vec![rule];

        evaluator
            .evaluate_stall_rules(&snapshot(), &rules)
            .await
            .unwrap();
        evaluator
            .evaluate_stall_rules(&snapshot(), &rules)
            .await
            .unwrap();
        assert_eq!(ledger.increments.load(Ordering::SeqCst), 1);
        assert_eq!(ledger.resets.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_each_evaluation_strikes_at_most_once() {
        let ledger = Arc::new(ScriptedLedger::new(false));
        let evaluator = RuleEvaluator::new(Arc::clone(&ledger), Arc::new(ProgressCache::new()));
        let rules = vec![stall_rule(1, "default")];

        evaluator
            .evaluate_stall_rules(&snapshot(), &rules)
            .await
            .unwrap();
        assert_eq!(ledger.increments.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_ledger_failure_propagates() {
        let evaluator = RuleEvaluator::new(
            Arc::new(ScriptedLedger::failing()),
            Arc::new(ProgressCache::new()),
        );
        let rules = vec![stall_rule(1, "default")];

        let result = evaluator.evaluate_stall_rules(&snapshot(), &rules).await;
        assert!(matches!(result, Err(StrikeError::Store { .. })));
    }

    #[tokio::test]
    async fn test_min_speed_selects_slow_speed_even_with_max_time() {
        let ledger = Arc::new(ScriptedLedger::new(true));
        let evaluator = RuleEvaluator::new(Arc::clone(&ledger), Arc::new(ProgressCache::new()));
        let mut rule = slow_rule(1, "slow");
        rule.min_speed = Some(500_000);
        rule.max_time_hours = 24.0;
        let mut observed = snapshot();
        observed.state = TorrentState::Downloading;
        observed.download_speed_bps = 100_000;

        let decision = evaluator
            .evaluate_slow_rules(&observed, &[rule])
            .await
            .unwrap();
        assert_eq!(decision.reason, DeleteReason::SlowSpeed);
    }

    #[tokio::test]
    async fn test_speed_at_threshold_is_not_a_violation() {
        let ledger = Arc::new(ScriptedLedger::new(false));
        let evaluator = RuleEvaluator::new(Arc::clone(&ledger), Arc::new(ProgressCache::new()));
        let mut rule = slow_rule(1, "slow");
        rule.min_speed = Some(500_000);
        rule.reset_strikes_on_progress = true;
        let mut observed = snapshot();
        observed.download_speed_bps = 500_000;

        let decision = evaluator
            .evaluate_slow_rules(&observed, &[rule])
            .await
            .unwrap();
        assert!(!decision.should_remove);
        assert_eq!(ledger.increments.load(Ordering::SeqCst), 0);
        assert_eq!(ledger.resets.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_speed_recovery_without_reset_flag_takes_no_action() {
        let ledger = Arc::new(ScriptedLedger::new(false));
        let evaluator = RuleEvaluator::new(Arc::clone(&ledger), Arc::new(ProgressCache::new()));
        let mut rule = slow_rule(1, "slow");
        rule.min_speed = Some(500_000);
        let mut observed = snapshot();
        observed.download_speed_bps = 900_000;

        evaluator
            .evaluate_slow_rules(&observed, &[rule])
            .await
            .unwrap();
        assert_eq!(ledger.increments.load(Ordering::SeqCst), 0);
        assert_eq!(ledger.resets.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_max_time_selects_slow_time() {
        let ledger = Arc::new(ScriptedLedger::new(true));
        let evaluator = RuleEvaluator::new(Arc::clone(&ledger), Arc::new(ProgressCache::new()));
        let mut rule = slow_rule(1, "slow");
        rule.max_time_hours = 2.0;
        let mut observed = snapshot();
        observed.eta_seconds = 3 * 3600;

        let decision = evaluator
            .evaluate_slow_rules(&observed, &[rule])
            .await
            .unwrap();
        assert_eq!(decision.reason, DeleteReason::SlowTime);
    }

    #[tokio::test]
    async fn test_eta_at_threshold_resets_when_enabled() {
        let ledger = Arc::new(ScriptedLedger::new(false));
        let evaluator = RuleEvaluator::new(Arc::clone(&ledger), Arc::new(ProgressCache::new()));
        let mut rule = slow_rule(1, "slow");
        rule.max_time_hours = 2.0;
        rule.reset_strikes_on_progress = true;
        let mut observed = snapshot();
        observed.eta_seconds = 2 * 3600;

        let decision = evaluator
            .evaluate_slow_rules(&observed, &[rule])
            .await
            .unwrap();
        assert!(!decision.should_remove);
        assert_eq!(ledger.resets.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unconfigured_slow_rule_makes_no_strike_call() {
        let ledger = Arc::new(ScriptedLedger::new(false));
        let evaluator = RuleEvaluator::new(Arc::clone(&ledger), Arc::new(ProgressCache::new()));
        let rule = slow_rule(1, "no thresholds");
        let mut observed = snapshot();
        observed.download_speed_bps = 1;

        let decision = evaluator
            .evaluate_slow_rules(&observed, &[rule])
            .await
            .unwrap();
        assert!(!decision.should_remove);
        assert_eq!(ledger.increments.load(Ordering::SeqCst), 0);
        assert_eq!(ledger.resets.load(Ordering::SeqCst), 0);
    }
}
