//! Centralized configuration for Ebbtide.
//!
//! Tunable engine parameters live here; the user-defined rule set and
//! ignore list load separately from an operator-supplied sweep file, which
//! is validated before it is accepted.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::queue::IgnoreList;
use crate::rules::{RuleSet, ValidationOutcome, validate_rule_set};

/// Central configuration for all Ebbtide components.
#[derive(Debug, Clone, Default)]
pub struct EbbtideConfig {
    pub queue: QueueConfig,
    pub strikes: StrikeConfig,
}

/// Queue-check behavior outside the rule engine.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Strikes before a torrent stuck fetching metadata is removed
    /// (0 disables the metadata check)
    pub metadata_max_strikes: u16,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            metadata_max_strikes: 5,
        }
    }
}

/// Lifetimes for the shared strike ledger and progress baseline cache.
#[derive(Debug, Clone)]
pub struct StrikeConfig {
    /// Untouched strike entries expire after this long
    pub ledger_ttl: Duration,
    /// Untouched progress baselines expire after this long
    pub baseline_ttl: Duration,
}

impl Default for StrikeConfig {
    fn default() -> Self {
        Self {
            ledger_ttl: Duration::from_secs(72 * 3600),   // 3 days
            baseline_ttl: Duration::from_secs(72 * 3600), // 3 days
        }
    }
}

impl EbbtideConfig {
    /// Creates configuration from environment variables with fallback to
    /// defaults.
    ///
    /// Supported: `EBBTIDE_METADATA_MAX_STRIKES`, `EBBTIDE_STRIKE_TTL_HOURS`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(strikes) = std::env::var("EBBTIDE_METADATA_MAX_STRIKES")
            && let Ok(value) = strikes.parse()
        {
            config.queue.metadata_max_strikes = value;
        }

        if let Ok(hours) = std::env::var("EBBTIDE_STRIKE_TTL_HOURS")
            && let Ok(value) = hours.parse::<u64>()
        {
            let ttl = Duration::from_secs(value * 3600);
            config.strikes.ledger_ttl = ttl;
            config.strikes.baseline_ttl = ttl;
        }

        config
    }
}

/// Operator-supplied sweep configuration: rules plus ignore list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SweepFile {
    #[serde(default)]
    pub rules: RuleSet,
    #[serde(default)]
    pub ignore: IgnoreList,
}

/// Errors loading or validating a sweep file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read sweep file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse sweep file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("rule set rejected: {reason}")]
    Conflict {
        reason: String,
        outcome: ValidationOutcome,
    },
}

impl SweepFile {
    /// Loads and validates a sweep file.
    ///
    /// A rule set failing interval validation is rejected here, before any
    /// evaluation can run against it.
    ///
    /// # Errors
    /// - `ConfigError::Io` - File unreadable
    /// - `ConfigError::Parse` - Malformed JSON or invalid field values
    /// - `ConfigError::Conflict` - Enabled rules with overlapping ranges
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let file: SweepFile = serde_json::from_str(&raw)?;

        let outcome = validate_rule_set(&file.rules);
        if !outcome.is_valid {
            return Err(ConfigError::Conflict {
                reason: outcome
                    .message
                    .clone()
                    .unwrap_or_else(|| "overlapping rule ranges".to_string()),
                outcome,
            });
        }
        Ok(file)
    }
}
