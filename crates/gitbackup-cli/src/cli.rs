//! Command line definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Back up a directory tree into git snapshots.
#[derive(Debug, Parser)]
#[command(name = "gitbackup", version, about)]
pub struct Cli {
    /// Configuration file (INI).
    #[arg(short, long, value_name = "FILE", default_value = "gitbackup.ini", global = true)]
    pub config: PathBuf,

    /// Evaluate and read files without writing to the store.
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Log debug output (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Commit even when nothing changed.
    #[arg(short, long)]
    pub force: bool,

    /// Print the run outcome as JSON.
    #[arg(long)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run git against the snapshot store.
    Git {
        /// Arguments forwarded to git.
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["gitbackup"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("gitbackup.ini"));
        assert!(!cli.dry_run);
        assert!(!cli.force);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_backup_flags() {
        let cli = Cli::try_parse_from([
            "gitbackup",
            "--config",
            "/etc/backup.ini",
            "--dry-run",
            "--verbose",
            "--force",
            "--json",
        ])
        .unwrap();

        assert_eq!(cli.config, PathBuf::from("/etc/backup.ini"));
        assert!(cli.dry_run && cli.verbose && cli.force && cli.json);
    }

    #[test]
    fn test_git_passthrough_keeps_hyphenated_args() {
        let cli = Cli::try_parse_from(["gitbackup", "-c", "b.ini", "git", "log", "--oneline", "-n", "5"]).unwrap();

        let Some(Command::Git { args }) = cli.command else {
            panic!("expected git subcommand");
        };
        assert_eq!(args, vec!["log", "--oneline", "-n", "5"]);
        assert_eq!(cli.config, PathBuf::from("b.ini"));
    }
}
