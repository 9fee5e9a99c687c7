use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgGroup, Parser};
use tracing_subscriber::EnvFilter;

mod dispatch;
mod render;
mod update_flows;

#[cfg(test)]
mod tests;

const LOG_TARGETS: &[&str] = &[
    "hangar_update",
    "hangar_installer",
    "hangar_registry",
    "hangar_security",
    "hangar_core",
];

/// Check for, apply and roll back Hangar releases.
#[derive(Parser, Debug)]
#[command(name = "hangar-update", version)]
#[command(about = "Check for, apply and roll back Hangar releases", long_about = None)]
#[command(group(
    ArgGroup::new("mode").args(["check", "list_backups", "restore", "list_releases"])
))]
struct Cli {
    /// Installation root.
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Config file; defaults to `hangar-update.toml` in the installation root.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Release repository as `owner/repo`.
    #[arg(long, env = "HANGAR_UPDATE_REPOSITORY")]
    repository: Option<String>,

    /// API token for private repositories or higher rate limits.
    #[arg(long, env = "HANGAR_UPDATE_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Only report whether an update is available.
    #[arg(long)]
    check: bool,

    /// Apply without asking for confirmation.
    #[arg(long)]
    force: bool,

    #[arg(long)]
    list_backups: bool,

    /// Restore a backup archive (path or file name in the backup directory).
    #[arg(long, value_name = "FILE")]
    restore: Option<PathBuf>,

    /// List the most recent releases.
    #[arg(long, value_name = "N", num_args = 0..=1, default_missing_value = "10")]
    list_releases: Option<usize>,

    /// Apply this release tag instead of the newest one.
    #[arg(long, conflicts_with = "mode")]
    tag: Option<String>,

    /// Consider prereleases as update targets.
    #[arg(long)]
    prerelease: bool,

    #[arg(long, short)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    dispatch::run(cli)
}

fn default_log_filter(verbose: bool) -> String {
    let level = if verbose { "debug" } else { "warn" };
    LOG_TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_log_filter(verbose)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
