//! gitbackup binary.

mod cli;
mod passthrough;

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use gitbackup_core::config::load_config;
use gitbackup_git::{BackupOutcome, BackupRunner, CommitResult, RunOptions};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        },
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = load_config(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;

    if let Some(Command::Git { args }) = &cli.command {
        let status = passthrough::run_git(config.snapshot_store(), args).await?;
        return Ok(if status.success() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    tracing::info!("gitbackup v{}", gitbackup_core::version());

    let options = RunOptions {
        dry_run: cli.dry_run,
        force: cli.force,
    };
    let outcome = BackupRunner::new(config).run(options).await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_summary(&outcome);
    }

    Ok(ExitCode::SUCCESS)
}

fn print_summary(outcome: &BackupOutcome) {
    let stats = &outcome.stats;
    match &outcome.result {
        CommitResult::Committed { commit, files, .. } => println!(
            "Snapshot {} on {}: {} files",
            commit.to_hex_with_len(12),
            outcome.branch.as_deref().unwrap_or("?"),
            files
        ),
        CommitResult::NoChanges { head, .. } => {
            println!("No changes since {}", head.to_hex_with_len(12))
        },
        CommitResult::DryRun { files, bytes } => {
            println!("Dry run: {} files ({} bytes) would be backed up", files, bytes)
        },
    }
    println!(
        "{} scanned, {} excluded, {} unreadable",
        stats.discovered,
        stats.excluded(),
        stats.failed
    );
}
