//! CLI command implementations

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args, Subcommand, ValueEnum};
use ebbtide_clients::{DelugeClient, QbittorrentClient, TransmissionClient, UtorrentClient};
use ebbtide_core::config::EbbtideConfig;
use ebbtide_core::queue::QueueChecker;
use ebbtide_core::rules::{QueueRule, find_coverage_gaps, validate_rule_set};
use ebbtide_core::strikes::{MemoryStrikeLedger, ProgressCache};
use ebbtide_core::torrent::DownloadClient;
use ebbtide_core::{SweepFile, TorrentSnapshot};
use tracing::{info, warn};

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Validate a sweep file: rule conflicts and coverage gaps
    Validate {
        /// Path to the sweep configuration file
        #[arg(short, long)]
        rules: PathBuf,
    },
    /// Check a download client's queue and act on removal decisions
    Sweep {
        /// Path to the sweep configuration file
        #[arg(short, long)]
        rules: PathBuf,
        #[command(flatten)]
        client: ClientArgs,
        /// Repeat every N seconds instead of running a single cycle
        #[arg(long)]
        interval: Option<u64>,
        /// Log decisions without removing anything
        #[arg(long)]
        dry_run: bool,
    },
}

/// Download-client connection settings
#[derive(Args)]
pub struct ClientArgs {
    /// Download client backend
    #[arg(long, value_enum)]
    pub backend: Backend,
    /// Web UI base URL, or the RPC endpoint for Transmission
    #[arg(long)]
    pub url: String,
    /// Client username, if authentication is enabled
    #[arg(long, default_value = "")]
    pub username: String,
    /// Client password, if authentication is enabled
    #[arg(long, default_value = "")]
    pub password: String,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Backend {
    Qbittorrent,
    Transmission,
    Deluge,
    Utorrent,
}

/// Handle the CLI command
///
/// # Errors
/// Returns appropriate error based on the command that fails
pub async fn handle_command(command: Commands) -> Result<()> {
    match command {
        Commands::Validate { rules } => validate(rules),
        Commands::Sweep {
            rules,
            client,
            interval,
            dry_run,
        } => sweep(rules, client, interval, dry_run).await,
    }
}

/// Validate a sweep file and print conflicts and coverage gaps
fn validate(rules: PathBuf) -> Result<()> {
    let raw = std::fs::read_to_string(&rules)
        .with_context(|| format!("failed to read {}", rules.display()))?;
    let sweep: SweepFile = serde_json::from_str(&raw).context("failed to parse sweep file")?;

    report_gaps("stall", &sweep.rules.stall_rules);
    report_gaps("slow", &sweep.rules.slow_rules);

    let outcome = validate_rule_set(&sweep.rules);
    if !outcome.is_valid {
        for conflict in &outcome.conflicts {
            println!("conflict: {}", conflict.detail);
        }
        bail!(
            "{}",
            outcome
                .message
                .unwrap_or_else(|| "rule set has overlapping ranges".to_string())
        );
    }

    println!(
        "rule set is valid ({} stall, {} slow)",
        sweep.rules.stall_rules.len(),
        sweep.rules.slow_rules.len()
    );
    Ok(())
}

fn report_gaps<R: QueueRule>(pool: &str, rules: &[R]) {
    for gap in find_coverage_gaps(rules) {
        println!(
            "note: {pool} rules leave {:?} torrents uncovered from {}% to {}%",
            gap.scope, gap.from, gap.to
        );
    }
}

/// Run cleanup cycles against a download client
async fn sweep(
    rules: PathBuf,
    client_args: ClientArgs,
    interval: Option<u64>,
    dry_run: bool,
) -> Result<()> {
    let sweep = SweepFile::load(&rules)
        .with_context(|| format!("failed to load {}", rules.display()))?;
    let config = EbbtideConfig::from_env();
    let client = build_client(&client_args).await?;

    let checker = QueueChecker::new(
        Arc::new(MemoryStrikeLedger::with_ttl(config.strikes.ledger_ttl)),
        Arc::new(ProgressCache::with_ttl(config.strikes.baseline_ttl)),
        sweep.rules,
        sweep.ignore,
        config.queue,
    );

    loop {
        run_cycle(&checker, client.as_ref(), dry_run).await?;
        match interval {
            None => return Ok(()),
            Some(seconds) => tokio::time::sleep(Duration::from_secs(seconds)).await,
        }
    }
}

async fn run_cycle(
    checker: &QueueChecker<MemoryStrikeLedger>,
    client: &dyn DownloadClient,
    dry_run: bool,
) -> Result<()> {
    let snapshots: Vec<TorrentSnapshot> = client.list_torrents().await?;
    info!(torrents = snapshots.len(), "starting queue check cycle");

    for snapshot in &snapshots {
        let decision = checker.check_snapshot(snapshot).await?;
        if !decision.should_remove {
            continue;
        }

        info!(
            torrent = %snapshot.name,
            reason = ?decision.reason,
            delete_from_client = decision.delete_from_client,
            dry_run,
            "removal decision"
        );
        if dry_run {
            continue;
        }
        if let Err(error) = client
            .remove_torrent(&snapshot.hash, decision.delete_from_client)
            .await
        {
            warn!(torrent = %snapshot.name, %error, "removal failed, will retry next cycle");
        }
    }
    Ok(())
}

async fn build_client(args: &ClientArgs) -> Result<Box<dyn DownloadClient>> {
    match args.backend {
        Backend::Qbittorrent => {
            let client = QbittorrentClient::new(&args.url, &args.username, &args.password)?;
            client.login().await?;
            Ok(Box::new(client))
        }
        Backend::Transmission => {
            let username = (!args.username.is_empty()).then(|| args.username.clone());
            let password = (!args.password.is_empty()).then(|| args.password.clone());
            Ok(Box::new(TransmissionClient::new(
                &args.url, username, password,
            )?))
        }
        Backend::Deluge => {
            let client = DelugeClient::new(&args.url, &args.password)?;
            client.login().await?;
            Ok(Box::new(client))
        }
        Backend::Utorrent => {
            let client = UtorrentClient::new(&args.url, &args.username, &args.password)?;
            client.login().await?;
            Ok(Box::new(client))
        }
    }
}
