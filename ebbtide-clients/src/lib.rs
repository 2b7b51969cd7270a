//! Ebbtide Clients - Download-client adapters
//!
//! One adapter per supported backend, each mapping the client's wire
//! representation into the core snapshot contract: status normalization,
//! privacy-flag derivation, tracker-hostname extraction, and the
//! all-files-skipped structural check. Sessions are thin; retry policy
//! belongs to the caller.

pub mod deluge;
pub mod qbittorrent;
pub mod transmission;
pub mod utorrent;

pub use deluge::DelugeClient;
pub use qbittorrent::QbittorrentClient;
pub use transmission::TransmissionClient;
pub use utorrent::UtorrentClient;
