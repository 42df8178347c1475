//! Forwarding commands to the system `git` binary.

use std::path::Path;
use std::process::ExitStatus;

use anyhow::{Context, bail};
use tokio::process::Command;
use tracing::debug;

/// Builds `git -C <store> <args...>`.
pub fn git_command(store: &Path, args: &[String]) -> Command {
    let mut command = Command::new("git");
    command.arg("-C").arg(store).args(args);
    command
}

/// Runs git against `store` with inherited stdio.
pub async fn run_git(store: &Path, args: &[String]) -> anyhow::Result<ExitStatus> {
    if !store.exists() {
        bail!("snapshot store {} does not exist yet; run a backup first", store.display());
    }

    debug!("Running git -C {} {}", store.display(), args.join(" "));

    git_command(store, args)
        .status()
        .await
        .context("Failed to run git; is it installed and on PATH?")
}
