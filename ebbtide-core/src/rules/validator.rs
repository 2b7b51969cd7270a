//! Configuration-time validation of rule completion ranges.
//!
//! Runs when a rule set is created or edited, never on the polling path.
//! Detects enabled rules whose completion ranges overlap within a shared
//! privacy scope, and reports sub-ranges of the 0-100% axis left uncovered
//! per scope.

use serde::Serialize;

use super::{PrivacyScope, QueueRule, RuleSet};

/// One existing rule conflicting with a validated candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleConflict {
    /// Identity of the conflicting existing rule
    pub rule_id: u32,
    /// Name of the conflicting existing rule
    pub rule_name: String,
    /// Human-readable description of the conflict
    pub detail: String,
}

/// Result of validating one candidate rule against the existing rules.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationOutcome {
    /// False when at least one conflict was found
    pub is_valid: bool,
    /// One entry per conflicting existing rule
    pub conflicts: Vec<RuleConflict>,
    /// Summary suitable for surfacing to the operator
    pub message: Option<String>,
}

impl ValidationOutcome {
    fn valid() -> Self {
        Self {
            is_valid: true,
            conflicts: Vec::new(),
            message: None,
        }
    }
}

/// A sub-range of the completion axis not covered by any enabled rule.
///
/// The two privacy scopes are fully independent; a gap in one says nothing
/// about the other.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageGap {
    /// Privacy classification the gap belongs to
    pub scope: PrivacyScope,
    /// Start of the uncovered range, inclusive
    pub from: f64,
    /// End of the uncovered range
    pub to: f64,
}

/// Validates a candidate rule's completion range against existing rules.
///
/// Two enabled rules conflict when their ranges intersect with positive
/// width and their privacy scopes can apply to the same torrent. Ranges
/// that only touch at a boundary do not conflict, a zero-width range nested
/// inside another never conflicts (it is a single-point exception), and a
/// rule never conflicts with another rule sharing its id, so in-place edits
/// do not self-conflict. Disabled rules on either side are skipped.
pub fn validate_intervals<R: QueueRule>(candidate: &R, existing: &[R]) -> ValidationOutcome {
    if !candidate.enabled() {
        return ValidationOutcome::valid();
    }

    let conflicts: Vec<RuleConflict> = existing
        .iter()
        .filter(|other| other.id() != candidate.id())
        .filter(|other| other.enabled())
        .filter(|other| candidate.privacy_type().intersects(other.privacy_type()))
        .filter(|other| ranges_conflict(candidate.completion_range(), other.completion_range()))
        .map(|other| {
            let (min, max) = other.completion_range();
            RuleConflict {
                rule_id: other.id(),
                rule_name: other.name().to_string(),
                detail: format!(
                    "completion range {}-{}% intersects '{}' ({}-{}%)",
                    candidate.completion_range().0,
                    candidate.completion_range().1,
                    other.name(),
                    min,
                    max,
                ),
            }
        })
        .collect();

    if conflicts.is_empty() {
        return ValidationOutcome::valid();
    }

    let names: Vec<&str> = conflicts
        .iter()
        .map(|conflict| conflict.rule_name.as_str())
        .collect();
    ValidationOutcome {
        is_valid: false,
        message: Some(format!(
            "rule '{}' overlaps enabled rule(s): {}",
            candidate.name(),
            names.join(", "),
        )),
        conflicts,
    }
}

/// Validates every enabled rule of a rule set against its own pool.
///
/// Stall and slow rules are selected from independent pools, so ranges only
/// conflict within a pool, never across. Returns the first invalid outcome
/// found, or a valid outcome when the whole set is conflict-free.
pub fn validate_rule_set(set: &RuleSet) -> ValidationOutcome {
    for rule in &set.stall_rules {
        let outcome = validate_intervals(rule, &set.stall_rules);
        if !outcome.is_valid {
            return outcome;
        }
    }
    for rule in &set.slow_rules {
        let outcome = validate_intervals(rule, &set.slow_rules);
        if !outcome.is_valid {
            return outcome;
        }
    }
    ValidationOutcome::valid()
}

/// Reports uncovered completion sub-ranges for each privacy scope.
///
/// Runs the sweep once for `Public` and once for `Private`; a rule scoped
/// `Both` contributes coverage to each. With no enabled rules for a scope
/// the whole axis is reported as a single `[0, 100]` gap.
pub fn find_coverage_gaps<R: QueueRule>(rules: &[R]) -> Vec<CoverageGap> {
    let mut gaps = Vec::new();
    for scope in [PrivacyScope::Public, PrivacyScope::Private] {
        gaps.extend(scope_gaps(rules, scope));
    }
    gaps
}

fn scope_gaps<R: QueueRule>(rules: &[R], scope: PrivacyScope) -> Vec<CoverageGap> {
    let mut intervals: Vec<(f64, f64)> = rules
        .iter()
        .filter(|rule| rule.enabled())
        .filter(|rule| rule.privacy_type().covers(scope))
        .map(|rule| {
            let (min, max) = rule.completion_range();
            (min.clamp(0.0, 100.0), max.clamp(0.0, 100.0))
        })
        .filter(|(min, max)| max >= min)
        .collect();
    intervals.sort_by(|a, b| a.partial_cmp(b).expect("clamped bounds are comparable"));

    let mut gaps = Vec::new();
    let mut cursor = 0.0_f64;
    for (min, max) in intervals {
        if min > cursor {
            gaps.push(CoverageGap {
                scope,
                from: cursor,
                to: min,
            });
        }
        cursor = cursor.max(max).min(100.0);
    }
    if cursor < 100.0 {
        gaps.push(CoverageGap {
            scope,
            from: cursor,
            to: 100.0,
        });
    }
    gaps
}

fn ranges_conflict(a: (f64, f64), b: (f64, f64)) -> bool {
    // Zero-width and inverted ranges contribute no coverage and cannot
    // conflict; touching boundaries share no positive-width intersection.
    let (a_min, a_max) = a;
    let (b_min, b_max) = b;
    if a_min >= a_max || b_min >= b_max {
        return false;
    }
    a_min < b_max && b_min < a_max
}
