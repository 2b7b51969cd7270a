//! Deluge Web JSON-RPC adapter.
//!
//! Authenticates against the web UI's `/json` endpoint (cookie session via
//! `auth.login`), then reads torrent status through `core.*` methods.
//! Deluge has no explicit stalled state; downloading with a zero payload
//! rate is reported as stalled, and downloading with a zero total size as
//! fetching metadata.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use ebbtide_core::torrent::{
    ClientError, DownloadClient, TorrentHash, TorrentSnapshot, TorrentState, tracker_hostnames,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;
use url::Url;

const STATUS_KEYS: &[&str] = &[
    "name",
    "state",
    "total_size",
    "progress",
    "download_payload_rate",
    "eta",
    "private",
    "total_done",
    "trackers",
    "file_priorities",
    "label",
];

/// Torrent status dictionary returned by `core.get_torrent_status`.
#[derive(Debug, Clone, Deserialize)]
pub struct DelugeTorrent {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub total_size: i64,
    /// Completion percentage, 0.0 to 100.0
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub download_payload_rate: i64,
    #[serde(default)]
    pub eta: i64,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub total_done: i64,
    #[serde(default)]
    pub trackers: Vec<DelugeTracker>,
    /// 0 means the file is skipped
    #[serde(default)]
    pub file_priorities: Vec<i64>,
    #[serde(default)]
    pub label: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DelugeTracker {
    pub url: String,
}

/// Maps Deluge wire data onto the normalized torrent state.
pub fn torrent_state_from_deluge(torrent: &DelugeTorrent) -> TorrentState {
    match torrent.state.as_str() {
        "Downloading" if torrent.total_size == 0 => TorrentState::FetchingMetadata,
        "Downloading" if torrent.download_payload_rate == 0 => TorrentState::Stalled,
        "Downloading" => TorrentState::Downloading,
        "Seeding" => TorrentState::Seeding,
        "Paused" => TorrentState::Paused,
        "Queued" => TorrentState::Queued,
        "Checking" => TorrentState::Checking,
        "Allocating" => TorrentState::Allocating,
        "Error" => TorrentState::Error,
        _ => TorrentState::Unknown,
    }
}

/// Builds the client-agnostic snapshot from a Deluge status dictionary.
pub fn snapshot_from_deluge(hash: &TorrentHash, torrent: &DelugeTorrent) -> TorrentSnapshot {
    TorrentSnapshot {
        hash: hash.clone(),
        name: torrent.name.clone(),
        is_private: torrent.private,
        size_bytes: torrent.total_size.max(0) as u64,
        completion_percent: torrent.progress.clamp(0.0, 100.0),
        downloaded_bytes: torrent.total_done.max(0) as u64,
        download_speed_bps: torrent.download_payload_rate.max(0) as u64,
        eta_seconds: torrent.eta.max(0) as u64,
        trackers: tracker_hostnames(torrent.trackers.iter().map(|t| t.url.as_str())),
        category: (!torrent.label.is_empty()).then(|| torrent.label.clone()),
        tags: Vec::new(),
        all_files_skipped: !torrent.file_priorities.is_empty()
            && torrent.file_priorities.iter().all(|priority| *priority == 0),
        state: torrent_state_from_deluge(torrent),
    }
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    message: String,
}

/// Session against one Deluge web UI.
pub struct DelugeClient {
    http: reqwest::Client,
    json_url: Url,
    password: String,
    request_id: AtomicU64,
}

impl DelugeClient {
    /// Creates an adapter for the given web UI base URL.
    ///
    /// # Errors
    /// - `ClientError::UrlParsing` - Malformed base URL
    pub fn new(base_url: &str, password: impl Into<String>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .map_err(ClientError::http)?;
        Ok(Self {
            http,
            json_url: Url::parse(base_url)?.join("json")?,
            password: password.into(),
            request_id: AtomicU64::new(1),
        })
    }

    /// Authenticates and stores the session cookie for subsequent calls.
    ///
    /// # Errors
    /// - `ClientError::Authentication` - Password rejected
    /// - `ClientError::Http` - Transport failure
    pub async fn login(&self) -> Result<(), ClientError> {
        let accepted = self.call("auth.login", json!([self.password])).await?;
        if accepted != json!(true) {
            return Err(ClientError::Authentication {
                reason: "Deluge rejected the web UI password".to_string(),
            });
        }
        debug!("Deluge session established");
        Ok(())
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, ClientError> {
        let body = json!({
            "method": method,
            "params": params,
            "id": self.request_id.fetch_add(1, Ordering::Relaxed),
        });
        let envelope: RpcEnvelope = self
            .http
            .post(self.json_url.clone())
            .json(&body)
            .send()
            .await
            .map_err(ClientError::http)?
            .json()
            .await
            .map_err(ClientError::protocol)?;

        if let Some(error) = envelope.error {
            return Err(ClientError::Protocol {
                reason: format!("Deluge RPC error: {}", error.message),
            });
        }
        Ok(envelope.result)
    }
}

#[async_trait]
impl DownloadClient for DelugeClient {
    async fn fetch_torrent(
        &self,
        hash: &TorrentHash,
    ) -> Result<Option<TorrentSnapshot>, ClientError> {
        let result = self
            .call(
                "core.get_torrent_status",
                json!([hash.as_str(), STATUS_KEYS]),
            )
            .await?;

        // Deluge answers an unknown hash with an empty dictionary.
        let is_missing = result
            .as_object()
            .is_none_or(|object| object.is_empty());
        if is_missing {
            return Ok(None);
        }

        let torrent: DelugeTorrent =
            serde_json::from_value(result).map_err(ClientError::protocol)?;
        Ok(Some(snapshot_from_deluge(hash, &torrent)))
    }

    async fn list_torrents(&self) -> Result<Vec<TorrentSnapshot>, ClientError> {
        let result = self
            .call("core.get_torrents_status", json!([{}, STATUS_KEYS]))
            .await?;
        let by_hash: std::collections::HashMap<String, DelugeTorrent> =
            serde_json::from_value(result).map_err(ClientError::protocol)?;

        Ok(by_hash
            .into_iter()
            .map(|(hash, torrent)| snapshot_from_deluge(&TorrentHash::new(hash), &torrent))
            .collect())
    }

    async fn remove_torrent(
        &self,
        hash: &TorrentHash,
        delete_data: bool,
    ) -> Result<(), ClientError> {
        self.call(
            "core.remove_torrent",
            json!([hash.as_str(), delete_data]),
        )
        .await?;
        Ok(())
    }
}
