//! Operator-supplied ignore list short-circuiting all queue checks.

use serde::{Deserialize, Serialize};

use crate::torrent::TorrentSnapshot;

/// Patterns exempting torrents from every check and strike.
///
/// A pattern matches case-insensitively against the full info hash, the
/// category, any tag, and any tracker hostname. Tracker matching accepts
/// the exact host or any parent domain, so `example.org` also matches
/// `tracker.example.org`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IgnoreList {
    patterns: Vec<String>,
}

impl IgnoreList {
    /// Builds an ignore list from raw patterns.
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns.into_iter().map(Into::into).collect(),
        }
    }

    /// True when no patterns are configured.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Returns the first pattern matching the snapshot, if any.
    pub fn matched_pattern(&self, snapshot: &TorrentSnapshot) -> Option<&str> {
        self.patterns
            .iter()
            .find(|pattern| Self::matches(pattern, snapshot))
            .map(String::as_str)
    }

    fn matches(pattern: &str, snapshot: &TorrentSnapshot) -> bool {
        let pattern = pattern.trim().to_ascii_lowercase();
        if pattern.is_empty() {
            return false;
        }

        if snapshot.hash.as_str() == pattern {
            return true;
        }
        if let Some(category) = &snapshot.category
            && category.eq_ignore_ascii_case(&pattern)
        {
            return true;
        }
        if snapshot.tags.iter().any(|tag| tag.eq_ignore_ascii_case(&pattern)) {
            return true;
        }

        let domain_suffix = format!(".{pattern}");
        snapshot.trackers.iter().any(|host| {
            let host = host.to_ascii_lowercase();
            host == pattern || host.ends_with(&domain_suffix)
        })
    }
}
