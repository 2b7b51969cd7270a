//! End-to-end checks driving the queue checker through a mock adapter.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::{DeleteReason, IgnoreList, QueueChecker};
use crate::config::QueueConfig;
use crate::rules::RuleSet;
use crate::rules::test_rules::stall_rule;
use crate::strikes::{MemoryStrikeLedger, ProgressCache};
use crate::torrent::{
    ClientError, DownloadClient, TorrentHash, TorrentSnapshot, TorrentState,
};

/// Adapter double serving snapshots from a fixed map.
struct MockClient {
    torrents: HashMap<TorrentHash, TorrentSnapshot>,
}

impl MockClient {
    fn with(snapshots: impl IntoIterator<Item = TorrentSnapshot>) -> Self {
        Self {
            torrents: snapshots
                .into_iter()
                .map(|snapshot| (snapshot.hash.clone(), snapshot))
                .collect(),
        }
    }
}

#[async_trait]
impl DownloadClient for MockClient {
    async fn fetch_torrent(
        &self,
        hash: &TorrentHash,
    ) -> Result<Option<TorrentSnapshot>, ClientError> {
        Ok(self.torrents.get(hash).cloned())
    }

    async fn list_torrents(&self) -> Result<Vec<TorrentSnapshot>, ClientError> {
        Ok(self.torrents.values().cloned().collect())
    }

    async fn remove_torrent(
        &self,
        _hash: &TorrentHash,
        _delete_data: bool,
    ) -> Result<(), ClientError> {
        Ok(())
    }
}

fn stalled_snapshot(hash: &str) -> TorrentSnapshot {
    TorrentSnapshot {
        hash: TorrentHash::new(hash),
        name: format!("torrent-{hash}"),
        is_private: true,
        size_bytes: 700_000_000,
        completion_percent: 55.0,
        downloaded_bytes: 385_000_000,
        download_speed_bps: 0,
        eta_seconds: 0,
        trackers: vec!["tracker.example.org".to_string()],
        category: Some("movies".to_string()),
        tags: Vec::new(),
        all_files_skipped: false,
        state: TorrentState::Stalled,
    }
}

fn checker_with_rules(rules: RuleSet) -> QueueChecker<MemoryStrikeLedger> {
    QueueChecker::new(
        Arc::new(MemoryStrikeLedger::new()),
        Arc::new(ProgressCache::new()),
        rules,
        IgnoreList::default(),
        QueueConfig::default(),
    )
}

#[tokio::test]
async fn test_missing_torrent_reports_not_found() {
    let client = MockClient::with([]);
    let checker = checker_with_rules(RuleSet::default());

    let decision = checker
        .check_torrent(&client, &TorrentHash::new("unknown"))
        .await
        .unwrap();
    assert!(!decision.found);
    assert!(!decision.should_remove);
}

#[tokio::test]
async fn test_stalled_torrent_removed_on_third_cycle() {
    let snapshot = stalled_snapshot("cc11");
    let client = MockClient::with([snapshot.clone()]);

    let mut rule = stall_rule(1, "default stall");
    rule.delete_private_torrents_from_client = true;
    let checker = checker_with_rules(RuleSet {
        stall_rules: vec![rule],
        slow_rules: Vec::new(),
    });

    for cycle in 0..2 {
        let decision = checker
            .check_torrent(&client, &snapshot.hash)
            .await
            .unwrap();
        assert!(!decision.should_remove, "cycle {cycle} should only strike");
    }

    let decision = checker
        .check_torrent(&client, &snapshot.hash)
        .await
        .unwrap();
    assert!(decision.found);
    assert!(decision.should_remove);
    assert_eq!(decision.reason, DeleteReason::Stalled);
    assert!(decision.is_private);
    assert!(decision.delete_from_client);
}

#[tokio::test]
async fn test_strike_counters_are_per_torrent() {
    let first = stalled_snapshot("aa01");
    let second = stalled_snapshot("bb02");
    let client = MockClient::with([first.clone(), second.clone()]);

    let checker = checker_with_rules(RuleSet {
        stall_rules: vec![stall_rule(1, "default stall")],
        slow_rules: Vec::new(),
    });

    // Two strikes against the first torrent must not push the second
    // torrent any closer to removal.
    for _ in 0..2 {
        checker.check_torrent(&client, &first.hash).await.unwrap();
    }
    let decision = checker.check_torrent(&client, &second.hash).await.unwrap();
    assert!(!decision.should_remove);
}

#[tokio::test]
async fn test_concurrent_checks_against_different_torrents() {
    let snapshots: Vec<TorrentSnapshot> = (0..8)
        .map(|index| stalled_snapshot(&format!("{index:04x}")))
        .collect();
    let client = Arc::new(MockClient::with(snapshots.clone()));

    let mut rule = stall_rule(1, "default stall");
    rule.max_strikes = 1;
    let checker = Arc::new(checker_with_rules(RuleSet {
        stall_rules: vec![rule],
        slow_rules: Vec::new(),
    }));

    let mut handles = Vec::new();
    for snapshot in snapshots {
        let checker = Arc::clone(&checker);
        let client = Arc::clone(&client);
        handles.push(tokio::spawn(async move {
            checker
                .check_torrent(client.as_ref(), &snapshot.hash)
                .await
                .unwrap()
        }));
    }

    for handle in handles {
        let decision = handle.await.unwrap();
        assert!(decision.should_remove);
    }
}
