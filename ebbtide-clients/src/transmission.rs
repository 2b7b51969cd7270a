//! Transmission RPC adapter.
//!
//! Single-endpoint JSON-RPC with the `X-Transmission-Session-Id` handshake:
//! a 409 response carries a fresh session id, after which the request is
//! replayed once. Numeric status codes map onto the normalized states, with
//! a zero receive rate in the downloading state reported as stalled.

use async_trait::async_trait;
use ebbtide_core::torrent::{
    ClientError, DownloadClient, TorrentHash, TorrentSnapshot, TorrentState, tracker_hostnames,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::debug;
use url::Url;

const SESSION_HEADER: &str = "X-Transmission-Session-Id";

const TORRENT_FIELDS: &[&str] = &[
    "hashString",
    "name",
    "totalSize",
    "percentDone",
    "rateDownload",
    "eta",
    "status",
    "isPrivate",
    "metadataPercentComplete",
    "downloadedEver",
    "trackers",
    "wanted",
    "labels",
];

/// One torrent object from a `torrent-get` response.
#[derive(Debug, Clone, Deserialize)]
pub struct TransmissionTorrent {
    #[serde(rename = "hashString")]
    pub hash_string: String,
    pub name: String,
    #[serde(rename = "totalSize", default)]
    pub total_size: i64,
    /// Completion fraction, 0.0 to 1.0
    #[serde(rename = "percentDone", default)]
    pub percent_done: f64,
    #[serde(rename = "rateDownload", default)]
    pub rate_download: i64,
    /// Negative values mean unknown or not available
    #[serde(default)]
    pub eta: i64,
    /// 0 stopped, 1-2 checking, 3 queued, 4 downloading, 5-6 seeding
    #[serde(default)]
    pub status: i64,
    #[serde(rename = "isPrivate", default)]
    pub is_private: bool,
    #[serde(rename = "metadataPercentComplete", default = "complete_metadata")]
    pub metadata_percent_complete: f64,
    #[serde(rename = "downloadedEver", default)]
    pub downloaded_ever: i64,
    #[serde(default)]
    pub trackers: Vec<TransmissionTracker>,
    /// Per-file wanted flags; older daemons send 0/1, newer send booleans
    #[serde(default)]
    pub wanted: Vec<Value>,
    #[serde(default)]
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransmissionTracker {
    pub announce: String,
}

fn complete_metadata() -> f64 {
    1.0
}

/// Maps Transmission wire data onto the normalized torrent state.
pub fn torrent_state_from_transmission(torrent: &TransmissionTorrent) -> TorrentState {
    if torrent.metadata_percent_complete < 1.0 {
        return TorrentState::FetchingMetadata;
    }
    match torrent.status {
        0 => TorrentState::Paused,
        1 | 2 => TorrentState::Checking,
        3 => TorrentState::Queued,
        4 if torrent.rate_download == 0 => TorrentState::Stalled,
        4 => TorrentState::Downloading,
        5 | 6 => TorrentState::Seeding,
        _ => TorrentState::Unknown,
    }
}

/// Builds the client-agnostic snapshot from a Transmission torrent object.
pub fn snapshot_from_transmission(torrent: &TransmissionTorrent) -> TorrentSnapshot {
    let wanted_flags: Vec<bool> = torrent
        .wanted
        .iter()
        .map(|value| match value {
            Value::Bool(flag) => *flag,
            Value::Number(number) => number.as_i64().unwrap_or(0) != 0,
            _ => true,
        })
        .collect();

    TorrentSnapshot {
        hash: TorrentHash::new(&torrent.hash_string),
        name: torrent.name.clone(),
        is_private: torrent.is_private,
        size_bytes: torrent.total_size.max(0) as u64,
        completion_percent: (torrent.percent_done * 100.0).clamp(0.0, 100.0),
        downloaded_bytes: torrent.downloaded_ever.max(0) as u64,
        download_speed_bps: torrent.rate_download.max(0) as u64,
        eta_seconds: torrent.eta.max(0) as u64,
        trackers: tracker_hostnames(torrent.trackers.iter().map(|t| t.announce.as_str())),
        category: None,
        tags: torrent.labels.clone(),
        all_files_skipped: !wanted_flags.is_empty() && wanted_flags.iter().all(|flag| !flag),
        state: torrent_state_from_transmission(torrent),
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Deserialize)]
struct TorrentGetArguments {
    #[serde(default)]
    torrents: Vec<TransmissionTorrent>,
}

/// Session against one Transmission RPC endpoint.
pub struct TransmissionClient {
    http: reqwest::Client,
    rpc_url: Url,
    username: Option<String>,
    password: Option<String>,
    session_id: Mutex<Option<String>>,
}

impl TransmissionClient {
    /// Creates an adapter for the given RPC URL
    /// (typically `http://host:9091/transmission/rpc`).
    ///
    /// # Errors
    /// - `ClientError::UrlParsing` - Malformed RPC URL
    pub fn new(
        rpc_url: &str,
        username: Option<String>,
        password: Option<String>,
    ) -> Result<Self, ClientError> {
        Ok(Self {
            http: reqwest::Client::new(),
            rpc_url: Url::parse(rpc_url)?,
            username,
            password,
            session_id: Mutex::new(None),
        })
    }

    /// Sends one RPC call, renewing the session id on a 409 handshake.
    async fn call(&self, method: &str, arguments: Value) -> Result<Value, ClientError> {
        let body = json!({ "method": method, "arguments": arguments });

        let first = self.send(&body).await?;
        let response = if first.status() == reqwest::StatusCode::CONFLICT {
            let fresh = first
                .headers()
                .get(SESSION_HEADER)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
                .ok_or_else(|| ClientError::Protocol {
                    reason: "409 response without a session id header".to_string(),
                })?;
            debug!("Transmission session id renewed");
            *self.session_id.lock().await = Some(fresh);
            self.send(&body).await?
        } else {
            first
        };

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ClientError::Authentication {
                reason: "Transmission rejected the RPC credentials".to_string(),
            });
        }
        let parsed: RpcResponse = response.json().await.map_err(ClientError::protocol)?;
        if parsed.result != "success" {
            return Err(ClientError::Protocol {
                reason: format!("Transmission RPC error: {}", parsed.result),
            });
        }
        Ok(parsed.arguments)
    }

    async fn send(&self, body: &Value) -> Result<reqwest::Response, ClientError> {
        let mut request = self.http.post(self.rpc_url.clone()).json(body);
        if let Some(username) = &self.username {
            request = request.basic_auth(username, self.password.as_deref());
        }
        if let Some(session_id) = self.session_id.lock().await.as_deref() {
            request = request.header(SESSION_HEADER, session_id);
        }
        request.send().await.map_err(ClientError::http)
    }

    async fn torrent_get(&self, ids: Option<&TorrentHash>) -> Result<Vec<TransmissionTorrent>, ClientError> {
        let mut arguments = json!({ "fields": TORRENT_FIELDS });
        if let Some(hash) = ids {
            arguments["ids"] = json!([hash.as_str()]);
        }
        let raw = self.call("torrent-get", arguments).await?;
        let parsed: TorrentGetArguments =
            serde_json::from_value(raw).map_err(ClientError::protocol)?;
        Ok(parsed.torrents)
    }
}

#[async_trait]
impl DownloadClient for TransmissionClient {
    async fn fetch_torrent(
        &self,
        hash: &TorrentHash,
    ) -> Result<Option<TorrentSnapshot>, ClientError> {
        let torrents = self.torrent_get(Some(hash)).await?;
        Ok(torrents.first().map(snapshot_from_transmission))
    }

    async fn list_torrents(&self) -> Result<Vec<TorrentSnapshot>, ClientError> {
        let torrents = self.torrent_get(None).await?;
        Ok(torrents.iter().map(snapshot_from_transmission).collect())
    }

    async fn remove_torrent(
        &self,
        hash: &TorrentHash,
        delete_data: bool,
    ) -> Result<(), ClientError> {
        self.call(
            "torrent-remove",
            json!({
                "ids": [hash.as_str()],
                "delete-local-data": delete_data,
            }),
        )
        .await?;
        Ok(())
    }
}
