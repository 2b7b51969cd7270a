//! Ebbtide CLI - Command-line interface
//!
//! Validates sweep configurations and runs cleanup cycles against a
//! download client.

mod commands;

use clap::Parser;

#[derive(Parser)]
#[command(name = "ebbtide")]
#[command(about = "Cleanup of stuck and slow torrent downloads")]
struct Cli {
    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    commands::handle_command(cli.command).await
}
