//! qBittorrent Web API adapter.
//!
//! Talks to the v2 Web API: cookie-based login, torrent list filtered by
//! hash, per-torrent tracker and file listings. State strings map onto the
//! normalized torrent states; the `private` field (qBittorrent 5.x) drives
//! privacy derivation, absent meaning public.

use async_trait::async_trait;
use ebbtide_core::torrent::{
    ClientError, DownloadClient, TorrentHash, TorrentSnapshot, TorrentState, tracker_hostnames,
};
use serde::Deserialize;
use tracing::debug;
use url::Url;

/// qBittorrent reports this ETA when it cannot estimate one.
const QBIT_ETA_UNKNOWN: i64 = 8_640_000;

/// One row of `/api/v2/torrents/info`.
#[derive(Debug, Clone, Deserialize)]
pub struct QbitTorrentInfo {
    pub hash: String,
    pub name: String,
    #[serde(default)]
    pub size: i64,
    /// Completion fraction, 0.0 to 1.0
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub dlspeed: i64,
    #[serde(default)]
    pub eta: i64,
    pub state: String,
    #[serde(default)]
    pub category: String,
    /// Comma-separated tag list
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub downloaded: i64,
    /// Present since qBittorrent 5.0; absent means public
    #[serde(default)]
    pub private: Option<bool>,
}

/// One row of `/api/v2/torrents/trackers`.
#[derive(Debug, Clone, Deserialize)]
pub struct QbitTrackerEntry {
    pub url: String,
}

/// One row of `/api/v2/torrents/files`.
#[derive(Debug, Clone, Deserialize)]
pub struct QbitFileEntry {
    /// 0 means the file is not downloaded
    #[serde(default)]
    pub priority: i64,
}

/// Maps a qBittorrent state string onto the normalized torrent state.
pub fn torrent_state_from_qbittorrent(state: &str) -> TorrentState {
    match state {
        "downloading" | "forcedDL" => TorrentState::Downloading,
        "stalledDL" => TorrentState::Stalled,
        "metaDL" | "forcedMetaDL" => TorrentState::FetchingMetadata,
        "pausedDL" | "stoppedDL" => TorrentState::Paused,
        "queuedDL" => TorrentState::Queued,
        "checkingDL" | "checkingUP" | "checkingResumeData" => TorrentState::Checking,
        "allocating" => TorrentState::Allocating,
        "uploading" | "stalledUP" | "forcedUP" => TorrentState::Seeding,
        "pausedUP" | "stoppedUP" | "queuedUP" => TorrentState::Completed,
        "error" | "missingFiles" => TorrentState::Error,
        _ => TorrentState::Unknown,
    }
}

/// Builds the client-agnostic snapshot from qBittorrent wire data.
pub fn snapshot_from_qbittorrent(
    info: &QbitTorrentInfo,
    trackers: &[QbitTrackerEntry],
    files: &[QbitFileEntry],
) -> TorrentSnapshot {
    let eta_seconds = match info.eta {
        eta if eta <= 0 || eta >= QBIT_ETA_UNKNOWN => 0,
        eta => eta as u64,
    };
    let tags: Vec<String> = info
        .tags
        .split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect();

    TorrentSnapshot {
        hash: TorrentHash::new(&info.hash),
        name: info.name.clone(),
        is_private: info.private.unwrap_or(false),
        size_bytes: info.size.max(0) as u64,
        completion_percent: (info.progress * 100.0).clamp(0.0, 100.0),
        downloaded_bytes: info.downloaded.max(0) as u64,
        download_speed_bps: info.dlspeed.max(0) as u64,
        eta_seconds,
        trackers: tracker_hostnames(trackers.iter().map(|entry| entry.url.as_str())),
        category: (!info.category.is_empty()).then(|| info.category.clone()),
        tags,
        all_files_skipped: !files.is_empty() && files.iter().all(|file| file.priority == 0),
        state: torrent_state_from_qbittorrent(&info.state),
    }
}

/// Authenticated session against one qBittorrent instance.
pub struct QbittorrentClient {
    http: reqwest::Client,
    base_url: Url,
    username: String,
    password: String,
}

impl QbittorrentClient {
    /// Creates an adapter for the given Web UI base URL.
    ///
    /// # Errors
    /// - `ClientError::UrlParsing` - Malformed base URL
    pub fn new(
        base_url: &str,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .map_err(ClientError::http)?;
        Ok(Self {
            http,
            base_url: Url::parse(base_url)?,
            username: username.into(),
            password: password.into(),
        })
    }

    /// Logs in and stores the session cookie for subsequent calls.
    ///
    /// # Errors
    /// - `ClientError::Authentication` - Credentials rejected
    /// - `ClientError::Http` - Transport failure
    pub async fn login(&self) -> Result<(), ClientError> {
        let url = self.api_url("auth/login")?;
        let response = self
            .http
            .post(url)
            .form(&[
                ("username", self.username.as_str()),
                ("password", self.password.as_str()),
            ])
            .send()
            .await
            .map_err(ClientError::http)?;

        let body = response.text().await.map_err(ClientError::http)?;
        if body.trim() != "Ok." {
            return Err(ClientError::Authentication {
                reason: "qBittorrent rejected the login credentials".to_string(),
            });
        }
        debug!("qBittorrent session established");
        Ok(())
    }

    fn api_url(&self, endpoint: &str) -> Result<Url, ClientError> {
        Ok(self.base_url.join(&format!("api/v2/{endpoint}"))?)
    }

    async fn fetch_info(&self, hash: &TorrentHash) -> Result<Option<QbitTorrentInfo>, ClientError> {
        let mut url = self.api_url("torrents/info")?;
        url.query_pairs_mut().append_pair("hashes", hash.as_str());
        let rows: Vec<QbitTorrentInfo> = self.get_json(url).await?;
        Ok(rows.into_iter().next())
    }

    async fn fetch_trackers(&self, hash: &TorrentHash) -> Result<Vec<QbitTrackerEntry>, ClientError> {
        let mut url = self.api_url("torrents/trackers")?;
        url.query_pairs_mut().append_pair("hash", hash.as_str());
        self.get_json(url).await
    }

    async fn fetch_files(&self, hash: &TorrentHash) -> Result<Vec<QbitFileEntry>, ClientError> {
        let mut url = self.api_url("torrents/files")?;
        url.query_pairs_mut().append_pair("hash", hash.as_str());
        self.get_json(url).await
    }

    async fn build_snapshot(&self, info: QbitTorrentInfo) -> Result<TorrentSnapshot, ClientError> {
        let hash = TorrentHash::new(&info.hash);
        let trackers = self.fetch_trackers(&hash).await?;
        let files = self.fetch_files(&hash).await?;
        Ok(snapshot_from_qbittorrent(&info, &trackers, &files))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T, ClientError> {
        let response = self.http.get(url).send().await.map_err(ClientError::http)?;
        if response.status() == reqwest::StatusCode::FORBIDDEN {
            return Err(ClientError::Authentication {
                reason: "qBittorrent session expired or missing".to_string(),
            });
        }
        response.json().await.map_err(ClientError::protocol)
    }
}

#[async_trait]
impl DownloadClient for QbittorrentClient {
    async fn fetch_torrent(
        &self,
        hash: &TorrentHash,
    ) -> Result<Option<TorrentSnapshot>, ClientError> {
        match self.fetch_info(hash).await? {
            None => Ok(None),
            Some(info) => Ok(Some(self.build_snapshot(info).await?)),
        }
    }

    async fn list_torrents(&self) -> Result<Vec<TorrentSnapshot>, ClientError> {
        let rows: Vec<QbitTorrentInfo> = self.get_json(self.api_url("torrents/info")?).await?;
        let mut snapshots = Vec::with_capacity(rows.len());
        for info in rows {
            snapshots.push(self.build_snapshot(info).await?);
        }
        Ok(snapshots)
    }

    async fn remove_torrent(
        &self,
        hash: &TorrentHash,
        delete_data: bool,
    ) -> Result<(), ClientError> {
        let url = self.api_url("torrents/delete")?;
        self.http
            .post(url)
            .form(&[
                ("hashes", hash.as_str()),
                ("deleteFiles", if delete_data { "true" } else { "false" }),
            ])
            .send()
            .await
            .map_err(ClientError::http)?
            .error_for_status()
            .map_err(ClientError::http)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(state: &str) -> QbitTorrentInfo {
        serde_json::from_str(&format!(
            r#"{{
                "hash": "ABCDEF0123456789ABCDEF0123456789ABCDEF01",
                "name": "distro.iso",
                "size": 4000000000,
                "progress": 0.375,
                "dlspeed": 125000,
                "eta": 7200,
                "state": "{state}",
                "category": "linux",
                "tags": "iso, keep ",
                "downloaded": 1500000000,
                "private": true
            }}"#
        ))
        .unwrap()
    }

    #[test]
    fn test_snapshot_mapping_normalizes_fields() {
        let trackers = vec![
            QbitTrackerEntry {
                url: "https://Tracker.Example.org/announce".to_string(),
            },
            QbitTrackerEntry {
                url: "** [DHT] **".to_string(),
            },
        ];
        let files = vec![QbitFileEntry { priority: 1 }, QbitFileEntry { priority: 0 }];

        let snapshot = snapshot_from_qbittorrent(&info("stalledDL"), &trackers, &files);
        assert_eq!(
            snapshot.hash,
            TorrentHash::new("abcdef0123456789abcdef0123456789abcdef01")
        );
        assert!(snapshot.is_private);
        assert_eq!(snapshot.completion_percent, 37.5);
        assert_eq!(snapshot.downloaded_bytes, 1_500_000_000);
        assert_eq!(snapshot.eta_seconds, 7200);
        assert_eq!(snapshot.trackers, vec!["tracker.example.org"]);
        assert_eq!(snapshot.category.as_deref(), Some("linux"));
        assert_eq!(snapshot.tags, vec!["iso", "keep"]);
        assert!(!snapshot.all_files_skipped);
        assert_eq!(snapshot.state, TorrentState::Stalled);
    }

    #[test]
    fn test_state_string_mapping() {
        assert_eq!(
            torrent_state_from_qbittorrent("downloading"),
            TorrentState::Downloading
        );
        assert_eq!(
            torrent_state_from_qbittorrent("metaDL"),
            TorrentState::FetchingMetadata
        );
        assert_eq!(
            torrent_state_from_qbittorrent("forcedMetaDL"),
            TorrentState::FetchingMetadata
        );
        assert_eq!(
            torrent_state_from_qbittorrent("stalledUP"),
            TorrentState::Seeding
        );
        assert_eq!(
            torrent_state_from_qbittorrent("stoppedDL"),
            TorrentState::Paused
        );
        assert_eq!(
            torrent_state_from_qbittorrent("surprise"),
            TorrentState::Unknown
        );
    }

    #[test]
    fn test_unknown_eta_maps_to_zero() {
        let mut row = info("downloading");
        row.eta = QBIT_ETA_UNKNOWN;
        let snapshot = snapshot_from_qbittorrent(&row, &[], &[]);
        assert_eq!(snapshot.eta_seconds, 0);
    }

    #[test]
    fn test_missing_private_field_means_public() {
        let row: QbitTorrentInfo = serde_json::from_str(
            r#"{"hash": "aa", "name": "t", "state": "downloading"}"#,
        )
        .unwrap();
        let snapshot = snapshot_from_qbittorrent(&row, &[], &[]);
        assert!(!snapshot.is_private);
        assert!(snapshot.category.is_none());
        assert!(snapshot.tags.is_empty());
    }

    #[test]
    fn test_all_files_skipped_requires_every_priority_zero() {
        let row = info("downloading");
        let skipped = vec![QbitFileEntry { priority: 0 }, QbitFileEntry { priority: 0 }];
        assert!(snapshot_from_qbittorrent(&row, &[], &skipped).all_files_skipped);

        // An empty file list means metadata has not arrived, not that the
        // operator skipped everything.
        assert!(!snapshot_from_qbittorrent(&row, &[], &[]).all_files_skipped);
    }
}
