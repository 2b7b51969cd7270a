//! Rule selection with explicit ambiguity fail-safe.
//!
//! At most one rule may apply to a snapshot. Zero matches means no rule
//! applies; two or more matches is a configuration error the interval
//! validator should have caught, so selection fails safe and applies none
//! rather than picking arbitrarily.

use tracing::warn;

use super::{QueueRule, SlowRule, StallRule};
use crate::torrent::TorrentSnapshot;

/// Selects the single stall rule applying to the snapshot, if any.
pub fn select_stall_rule<'a>(
    snapshot: &TorrentSnapshot,
    rules: &'a [StallRule],
) -> Option<&'a StallRule> {
    select_rule(snapshot, rules, "stall")
}

/// Selects the single slow rule applying to the snapshot, if any.
///
/// Slow rules additionally exclude torrents above their `ignore_above_size`
/// threshold; that filter lives in [`QueueRule::matches`] for [`SlowRule`].
pub fn select_slow_rule<'a>(
    snapshot: &TorrentSnapshot,
    rules: &'a [SlowRule],
) -> Option<&'a SlowRule> {
    select_rule(snapshot, rules, "slow")
}

fn select_rule<'a, R: QueueRule>(
    snapshot: &TorrentSnapshot,
    rules: &'a [R],
    kind: &str,
) -> Option<&'a R> {
    let mut candidates = rules.iter().filter(|rule| rule.matches(snapshot));
    let first = candidates.next()?;
    let conflicting: Vec<&str> = candidates.map(|rule| rule.name()).collect();
    if conflicting.is_empty() {
        return Some(first);
    }

    warn!(
        torrent = %snapshot.name,
        completion = snapshot.completion_percent,
        rules = %format!("{}, {}", first.name(), conflicting.join(", ")),
        "multiple {kind} rules match; applying none"
    );
    None
}
