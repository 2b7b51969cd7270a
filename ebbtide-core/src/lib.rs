//! Ebbtide Core - Rule-based strike engine for stuck torrent cleanup
//!
//! This crate provides the decision engine behind Ebbtide: a client-agnostic
//! torrent snapshot model, user-configured stall and slow rules with
//! configuration-time interval validation, strike accounting across polling
//! cycles, and the per-torrent queue check that turns it all into a removal
//! decision.

pub mod bytesize;
pub mod config;
pub mod queue;
pub mod rules;
pub mod strikes;
pub mod torrent;

// Re-export main types for convenient access
pub use config::{EbbtideConfig, SweepFile};
pub use queue::{DeleteReason, IgnoreList, QueueChecker, RemovalDecision};
pub use rules::{RuleEvaluator, RuleSet, SlowRule, StallRule};
pub use strikes::{MemoryStrikeLedger, ProgressCache, StrikeKind, StrikeLedger};
pub use torrent::{ClientError, DownloadClient, TorrentHash, TorrentSnapshot, TorrentState};

/// Core errors that can bubble up from any Ebbtide subsystem.
#[derive(Debug, thiserror::Error)]
pub enum EbbtideError {
    #[error("strike ledger error: {0}")]
    Strike(#[from] strikes::StrikeError),

    #[error("download client error: {0}")]
    Client(#[from] torrent::ClientError),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EbbtideError>;
