//! User-configured cleanup rules and the engine that applies them.
//!
//! Rules come in two variants: stall rules fire on torrents that stopped
//! making progress, slow rules on torrents downloading below a speed or
//! above a time threshold. Each rule is scoped by privacy type and a
//! completion-percentage range; the manager selects at most one rule per
//! snapshot and the evaluator turns it into a strike or reset.

pub mod evaluator;
pub mod manager;
pub mod validator;

pub use evaluator::RuleEvaluator;
pub use manager::{select_slow_rule, select_stall_rule};
pub use validator::{
    CoverageGap, RuleConflict, ValidationOutcome, find_coverage_gaps, validate_intervals,
    validate_rule_set,
};

use serde::{Deserialize, Serialize};

use crate::bytesize::deserialize_opt_byte_size;
use crate::torrent::TorrentSnapshot;

/// Privacy scope a rule applies to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivacyType {
    /// Public torrents only
    Public,
    /// Private-tracker torrents only
    Private,
    /// Any torrent
    #[default]
    Both,
}

/// One of the two concrete privacy classifications of a torrent.
///
/// Coverage gaps are computed independently per classification; a rule
/// scoped `Both` contributes to each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivacyScope {
    Public,
    Private,
}

impl PrivacyType {
    /// Whether a rule with this scope applies to a torrent with the given
    /// privacy flag.
    pub fn applies_to(self, is_private: bool) -> bool {
        match self {
            PrivacyType::Both => true,
            PrivacyType::Private => is_private,
            PrivacyType::Public => !is_private,
        }
    }

    /// Whether this scope contributes coverage to the given classification.
    pub fn covers(self, scope: PrivacyScope) -> bool {
        match self {
            PrivacyType::Both => true,
            PrivacyType::Public => scope == PrivacyScope::Public,
            PrivacyType::Private => scope == PrivacyScope::Private,
        }
    }

    /// Whether two rule scopes can ever apply to the same torrent.
    pub fn intersects(self, other: PrivacyType) -> bool {
        self == PrivacyType::Both || other == PrivacyType::Both || self == other
    }
}

/// Capabilities shared by both rule variants.
///
/// The manager and validator operate through this trait so selection and
/// interval checking are written once for both rule kinds.
pub trait QueueRule {
    /// Stable identity, unique within one rule list.
    fn id(&self) -> u32;

    /// Operator-facing rule name.
    fn name(&self) -> &str;

    /// Disabled rules never match and never participate in validation.
    fn enabled(&self) -> bool;

    /// Privacy scope this rule applies to.
    fn privacy_type(&self) -> PrivacyType;

    /// Inclusive completion-percentage range `(min, max)`.
    fn completion_range(&self) -> (f64, f64);

    /// Strike count at which the torrent is removed.
    fn max_strikes(&self) -> u16;

    /// Whether forward progress clears accumulated strikes.
    fn reset_strikes_on_progress(&self) -> bool;

    /// Mirrored into the removal decision's delete-from-client flag.
    fn delete_private_torrents_from_client(&self) -> bool;

    /// Whether this rule applies to the given snapshot.
    ///
    /// A rule whose range violates `min <= max` matches nothing.
    fn matches(&self, snapshot: &TorrentSnapshot) -> bool {
        let (min, max) = self.completion_range();
        self.enabled()
            && self.privacy_type().applies_to(snapshot.is_private)
            && snapshot.completion_percent >= min
            && snapshot.completion_percent <= max
    }
}

/// Rule for torrents that stopped making forward progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StallRule {
    /// Stable identity, unique within the stall rule list
    pub id: u32,
    /// Operator-facing rule name
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Strike count at which the torrent is removed
    #[serde(default = "default_max_strikes")]
    pub max_strikes: u16,
    #[serde(default)]
    pub privacy_type: PrivacyType,
    /// Lower bound of the completion range, inclusive
    #[serde(default)]
    pub min_completion_percent: f64,
    /// Upper bound of the completion range, inclusive
    #[serde(default = "default_max_completion")]
    pub max_completion_percent: f64,
    /// Clear strikes when the torrent moves forward again
    #[serde(default)]
    pub reset_strikes_on_progress: bool,
    /// Mirrored into the removal decision's delete-from-client flag
    #[serde(default)]
    pub delete_private_torrents_from_client: bool,
    /// Minimum forward progress per cycle that counts as a reset;
    /// unset means any forward progress qualifies
    #[serde(default, deserialize_with = "deserialize_opt_byte_size")]
    pub minimum_progress: Option<u64>,
}

impl QueueRule for StallRule {
    fn id(&self) -> u32 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn privacy_type(&self) -> PrivacyType {
        self.privacy_type
    }

    fn completion_range(&self) -> (f64, f64) {
        (self.min_completion_percent, self.max_completion_percent)
    }

    fn max_strikes(&self) -> u16 {
        self.max_strikes
    }

    fn reset_strikes_on_progress(&self) -> bool {
        self.reset_strikes_on_progress
    }

    fn delete_private_torrents_from_client(&self) -> bool {
        self.delete_private_torrents_from_client
    }
}

/// Rule for torrents downloading too slowly or with too distant an ETA.
///
/// The configured thresholds decide the subtype: a set `min_speed` makes it
/// a slow-speed rule regardless of `max_time_hours`; otherwise a positive
/// `max_time_hours` makes it a slow-time rule; with neither, the rule
/// matches but never strikes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlowRule {
    /// Stable identity, unique within the slow rule list
    pub id: u32,
    /// Operator-facing rule name
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Strike count at which the torrent is removed
    #[serde(default = "default_max_strikes")]
    pub max_strikes: u16,
    #[serde(default)]
    pub privacy_type: PrivacyType,
    /// Lower bound of the completion range, inclusive
    #[serde(default)]
    pub min_completion_percent: f64,
    /// Upper bound of the completion range, inclusive
    #[serde(default = "default_max_completion")]
    pub max_completion_percent: f64,
    /// Clear strikes when the torrent recovers past the threshold
    #[serde(default)]
    pub reset_strikes_on_progress: bool,
    /// Mirrored into the removal decision's delete-from-client flag
    #[serde(default)]
    pub delete_private_torrents_from_client: bool,
    /// Download speed below this strikes the torrent
    #[serde(default, deserialize_with = "deserialize_opt_byte_size")]
    pub min_speed: Option<u64>,
    /// ETA above this many hours strikes the torrent; 0 means unset
    #[serde(default)]
    pub max_time_hours: f64,
    /// Torrents larger than this are never matched by this rule
    #[serde(default, deserialize_with = "deserialize_opt_byte_size")]
    pub ignore_above_size: Option<u64>,
}

impl QueueRule for SlowRule {
    fn id(&self) -> u32 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn privacy_type(&self) -> PrivacyType {
        self.privacy_type
    }

    fn completion_range(&self) -> (f64, f64) {
        (self.min_completion_percent, self.max_completion_percent)
    }

    fn max_strikes(&self) -> u16 {
        self.max_strikes
    }

    fn reset_strikes_on_progress(&self) -> bool {
        self.reset_strikes_on_progress
    }

    fn delete_private_torrents_from_client(&self) -> bool {
        self.delete_private_torrents_from_client
    }

    fn matches(&self, snapshot: &TorrentSnapshot) -> bool {
        let (min, max) = self.completion_range();
        let within_size = self
            .ignore_above_size
            .is_none_or(|limit| snapshot.size_bytes <= limit);
        self.enabled
            && self.privacy_type.applies_to(snapshot.is_private)
            && snapshot.completion_percent >= min
            && snapshot.completion_percent <= max
            && within_size
    }
}

/// The active rule configuration: stall and slow rules as independent pools.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(default)]
    pub stall_rules: Vec<StallRule>,
    #[serde(default)]
    pub slow_rules: Vec<SlowRule>,
}

fn default_enabled() -> bool {
    true
}

fn default_max_strikes() -> u16 {
    3
}

fn default_max_completion() -> f64 {
    100.0
}
