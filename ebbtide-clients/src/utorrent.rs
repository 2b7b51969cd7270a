//! µTorrent Web UI adapter.
//!
//! Token-authenticated GET API: the token is scraped from `token.html` and
//! sent with every request alongside the session cookie. Torrent rows are
//! positional JSON arrays; the status field is a bitfield. The list API
//! exposes no privacy flag, so privacy derives from the torrent properties:
//! µTorrent disables DHT (`dht == -1`) for private torrents.

use async_trait::async_trait;
use ebbtide_core::torrent::{
    ClientError, DownloadClient, TorrentHash, TorrentSnapshot, TorrentState, tracker_hostnames,
};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;
use url::Url;

const STATUS_STARTED: i64 = 1;
const STATUS_CHECKING: i64 = 2;
const STATUS_ERROR: i64 = 16;
const STATUS_PAUSED: i64 = 32;
const STATUS_QUEUED: i64 = 64;

/// Decoded fields of one positional torrent row from `list=1`.
#[derive(Debug, Clone)]
pub struct UtTorrent {
    pub hash: String,
    pub status_bits: i64,
    pub name: String,
    pub size: i64,
    /// Completion in per-mille (1000 = done)
    pub progress_per_mille: i64,
    pub downloaded: i64,
    pub download_speed: i64,
    pub eta: i64,
    pub label: String,
}

/// Relevant fields of one `getprops` entry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UtProps {
    /// Tracker URLs separated by blank-line records
    #[serde(default)]
    pub trackers: String,
    /// -1 means DHT is disabled for this torrent, i.e. private
    #[serde(default)]
    pub dht: i64,
}

/// Decodes one positional torrent row.
///
/// # Errors
/// - `ClientError::Protocol` - Row is not an array or too short
pub fn parse_list_row(row: &Value) -> Result<UtTorrent, ClientError> {
    let fields = row.as_array().ok_or_else(|| ClientError::Protocol {
        reason: "torrent row is not an array".to_string(),
    })?;
    if fields.len() < 12 {
        return Err(ClientError::Protocol {
            reason: format!("torrent row has {} fields, expected 12+", fields.len()),
        });
    }

    let text = |index: usize| fields[index].as_str().unwrap_or_default().to_string();
    let number = |index: usize| fields[index].as_i64().unwrap_or_default();

    Ok(UtTorrent {
        hash: text(0),
        status_bits: number(1),
        name: text(2),
        size: number(3),
        progress_per_mille: number(4),
        downloaded: number(5),
        download_speed: number(9),
        eta: number(10),
        label: text(11),
    })
}

/// Maps a µTorrent status bitfield plus context onto the normalized state.
pub fn torrent_state_from_utorrent(torrent: &UtTorrent) -> TorrentState {
    let bits = torrent.status_bits;
    if bits & STATUS_ERROR != 0 {
        return TorrentState::Error;
    }
    if bits & STATUS_CHECKING != 0 {
        return TorrentState::Checking;
    }
    if bits & STATUS_PAUSED != 0 {
        return TorrentState::Paused;
    }
    if torrent.progress_per_mille >= 1000 {
        return if bits & STATUS_STARTED != 0 {
            TorrentState::Seeding
        } else {
            TorrentState::Completed
        };
    }
    if bits & STATUS_STARTED != 0 {
        if torrent.size == 0 {
            return TorrentState::FetchingMetadata;
        }
        return if torrent.download_speed > 0 {
            TorrentState::Downloading
        } else {
            TorrentState::Stalled
        };
    }
    if bits & STATUS_QUEUED != 0 {
        return TorrentState::Queued;
    }
    TorrentState::Paused
}

/// Builds the client-agnostic snapshot from µTorrent wire data.
pub fn snapshot_from_utorrent(
    torrent: &UtTorrent,
    props: &UtProps,
    file_priorities: &[i64],
) -> TorrentSnapshot {
    TorrentSnapshot {
        hash: TorrentHash::new(&torrent.hash),
        name: torrent.name.clone(),
        is_private: props.dht == -1,
        size_bytes: torrent.size.max(0) as u64,
        completion_percent: (torrent.progress_per_mille.clamp(0, 1000) as f64) / 10.0,
        downloaded_bytes: torrent.downloaded.max(0) as u64,
        download_speed_bps: torrent.download_speed.max(0) as u64,
        eta_seconds: torrent.eta.max(0) as u64,
        trackers: tracker_hostnames(props.trackers.lines().map(str::trim)),
        category: (!torrent.label.is_empty()).then(|| torrent.label.clone()),
        tags: Vec::new(),
        all_files_skipped: !file_priorities.is_empty()
            && file_priorities.iter().all(|priority| *priority == 0),
        state: torrent_state_from_utorrent(torrent),
    }
}

/// Session against one µTorrent Web UI.
pub struct UtorrentClient {
    http: reqwest::Client,
    gui_url: Url,
    username: String,
    password: String,
    token: Mutex<Option<String>>,
}

impl UtorrentClient {
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
            gui_url: Url::parse(base_url)?.join("gui/")?,
            username: username.into(),
            password: password.into(),
            token: Mutex::new(None),
        })
    }

    /// Fetches the request token, establishing the session cookie.
    ///
    /// # Errors
    /// - `ClientError::Authentication` - Credentials rejected
    /// - `ClientError::Protocol` - Token page in an unexpected shape
    pub async fn login(&self) -> Result<(), ClientError> {
        let url = self.gui_url.join("token.html")?;
        let response = self
            .http
            .get(url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .map_err(ClientError::http)?;
        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ClientError::Authentication {
                reason: "µTorrent rejected the Web UI credentials".to_string(),
            });
        }

        let page = response.text().await.map_err(ClientError::http)?;
        let token = extract_token(&page).ok_or_else(|| ClientError::Protocol {
            reason: "token.html did not contain a token".to_string(),
        })?;
        debug!("µTorrent session established");
        *self.token.lock().await = Some(token);
        Ok(())
    }

    async fn token(&self) -> Result<String, ClientError> {
        if let Some(token) = self.token.lock().await.clone() {
            return Ok(token);
        }
        self.login().await?;
        self.token
            .lock()
            .await
            .clone()
            .ok_or_else(|| ClientError::Authentication {
                reason: "µTorrent session could not be established".to_string(),
            })
    }

    async fn get(&self, pairs: &[(&str, &str)]) -> Result<Value, ClientError> {
        let token = self.token().await?;
        let mut url = self.gui_url.clone();
        url.query_pairs_mut().append_pair("token", &token);
        for (key, value) in pairs {
            url.query_pairs_mut().append_pair(key, value);
        }

        let response = self
            .http
            .get(url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .map_err(ClientError::http)?;
        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ClientError::Authentication {
                reason: "µTorrent session expired".to_string(),
            });
        }
        response.json().await.map_err(ClientError::protocol)
    }

    async fn find_row(&self, hash: &TorrentHash) -> Result<Option<UtTorrent>, ClientError> {
        let list = self.get(&[("list", "1")]).await?;
        let rows = list
            .get("torrents")
            .and_then(Value::as_array)
            .ok_or_else(|| ClientError::Protocol {
                reason: "list response without a torrents array".to_string(),
            })?;

        for row in rows {
            let torrent = parse_list_row(row)?;
            if TorrentHash::new(&torrent.hash) == *hash {
                return Ok(Some(torrent));
            }
        }
        Ok(None)
    }

    async fn fetch_props(&self, hash: &TorrentHash) -> Result<UtProps, ClientError> {
        let raw = self
            .get(&[("action", "getprops"), ("hash", hash.as_str())])
            .await?;
        let first = raw
            .get("props")
            .and_then(Value::as_array)
            .and_then(|entries| entries.first())
            .cloned()
            .unwrap_or(Value::Null);
        if first.is_null() {
            return Ok(UtProps::default());
        }
        serde_json::from_value(first).map_err(ClientError::protocol)
    }

    async fn fetch_file_priorities(&self, hash: &TorrentHash) -> Result<Vec<i64>, ClientError> {
        let raw = self
            .get(&[("action", "getfiles"), ("hash", hash.as_str())])
            .await?;
        // "files" is ["<hash>", [[name, size, downloaded, priority], ...]]
        let entries = raw
            .get("files")
            .and_then(Value::as_array)
            .and_then(|files| files.get(1))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Ok(entries
            .iter()
            .filter_map(|file| file.get(3).and_then(Value::as_i64))
            .collect())
    }

    async fn build_snapshot(&self, torrent: UtTorrent) -> Result<TorrentSnapshot, ClientError> {
        let hash = TorrentHash::new(&torrent.hash);
        let props = self.fetch_props(&hash).await?;
        let priorities = self.fetch_file_priorities(&hash).await?;
        Ok(snapshot_from_utorrent(&torrent, &props, &priorities))
    }
}

fn extract_token(page: &str) -> Option<String> {
    let start = page.find("<div")?;
    let open = page[start..].find('>')? + start + 1;
    let close = page[open..].find("</div>")? + open;
    let token = page[open..close].trim();
    (!token.is_empty()).then(|| token.to_string())
}

#[async_trait]
impl DownloadClient for UtorrentClient {
    async fn fetch_torrent(
        &self,
        hash: &TorrentHash,
    ) -> Result<Option<TorrentSnapshot>, ClientError> {
        match self.find_row(hash).await? {
            None => Ok(None),
            Some(torrent) => Ok(Some(self.build_snapshot(torrent).await?)),
        }
    }

    async fn list_torrents(&self) -> Result<Vec<TorrentSnapshot>, ClientError> {
        let list = self.get(&[("list", "1")]).await?;
        let rows = list
            .get("torrents")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut snapshots = Vec::with_capacity(rows.len());
        for row in &rows {
            let torrent = parse_list_row(row)?;
            snapshots.push(self.build_snapshot(torrent).await?);
        }
        Ok(snapshots)
    }

    async fn remove_torrent(
        &self,
        hash: &TorrentHash,
        delete_data: bool,
    ) -> Result<(), ClientError> {
        let action = if delete_data { "removedata" } else { "remove" };
        self.get(&[("action", action), ("hash", hash.as_str())])
            .await?;
        Ok(())
    }
}
