//! `purse` - budget tracker in your terminal
//!
//! Records income and expenses, checks a mailbox for unread mail and signs
//! in with Google.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod commands;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use commands::{auth, mail, tx};

/// purse - income, expenses and your inbox
#[derive(Parser)]
#[command(name = "purse", version, about, long_about = None)]
struct Cli {
    /// Directory holding config.json, preferences and the session
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record and review transactions
    Tx {
        #[command(subcommand)]
        command: tx::TxCommands,
    },
    /// Check a mailbox and manage saved mail settings
    Mail {
        #[command(subcommand)]
        command: mail::MailCommands,
    },
    /// Sign in and out
    Auth {
        #[command(subcommand)]
        command: auth::AuthCommands,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "purse=debug,purse_core=debug,purse_mail=debug,purse_oauth=debug"
    } else {
        "purse=info,purse_core=info,purse_mail=info"
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let ctx = commands::Context::load(cli.config_dir).await?;
    match cli.command {
        Commands::Tx { command } => tx::run(&ctx, command).await,
        Commands::Mail { command } => mail::run(&ctx, command).await,
        Commands::Auth { command } => auth::run(&ctx, command).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", output::error_line(&e));
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["purse", "tx", "list", "--verbose", "--config-dir", "/tmp/p"])
            .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config_dir, Some(PathBuf::from("/tmp/p")));
        assert!(matches!(cli.command, Commands::Tx { .. }));
    }
}
