use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use hangar_core::{Release, ReleaseChannel, UpdateError};
use hangar_installer::{
    read_installed_version, AppliedUpdate, HttpDownloader, InstallLayout, InstallationLock,
    Snapshot, SnapshotStore, SystemProcessRunner, UpdateOrchestrator, UpdateOutcome,
    UpdaterConfig, DEFAULT_CONFIG_FILE,
};
use hangar_registry::{GitHubReleaseSource, ReleaseSource};
use indicatif::HumanBytes;

use crate::render::TerminalRenderer;

pub(crate) type Updater = UpdateOrchestrator<GitHubReleaseSource, HttpDownloader, SystemProcessRunner>;

pub(crate) fn load_config(
    root: &Path,
    explicit: Option<&Path>,
    repository: Option<&str>,
    prerelease: bool,
) -> Result<UpdaterConfig> {
    let mut config = match explicit {
        Some(path) => UpdaterConfig::load(path)?,
        None => UpdaterConfig::load_or_default(&root.join(DEFAULT_CONFIG_FILE))?,
    };
    if let Some(repository) = repository {
        config.repository = Some(repository.trim().to_string());
    }
    if prerelease {
        config.channel = ReleaseChannel::Prerelease;
    }
    config.validate()?;
    Ok(config)
}

pub(crate) fn build_source(
    config: &UpdaterConfig,
    token: Option<String>,
) -> Result<GitHubReleaseSource> {
    let source =
        GitHubReleaseSource::with_bases(config.repository_id()?, &config.api_base, &config.web_base)?;
    Ok(source.with_token(token))
}

pub(crate) fn build_orchestrator(
    layout: InstallLayout,
    config: UpdaterConfig,
    token: Option<String>,
) -> Result<Updater> {
    let source = build_source(&config, token)?;
    let downloader = HttpDownloader::new(Duration::from_secs(config.download_timeout_secs))?;
    Ok(UpdateOrchestrator::new(
        layout,
        config,
        source,
        downloader,
        SystemProcessRunner,
    ))
}

pub(crate) fn check_update(renderer: TerminalRenderer, updater: &Updater) -> Result<()> {
    let outcome = updater.check_for_update()?;
    renderer.print_lines(&format_check_lines(&outcome));
    if outcome.available {
        renderer.print_status("info", "run without --check to install it");
    } else {
        renderer.print_status("ok", "already up to date");
    }
    Ok(())
}

pub(crate) fn apply_update(
    renderer: TerminalRenderer,
    updater: &Updater,
    tag: Option<&str>,
    force: bool,
) -> Result<()> {
    let current = updater.current_version()?;
    let release = match tag {
        Some(tag) => updater.source().release_by_tag(tag)?,
        None => {
            let outcome = updater.check_for_update()?;
            let Some(release) = outcome.release else {
                renderer.print_status("ok", &format!("already up to date ({current})"));
                return Ok(());
            };
            release
        }
    };

    let question = format!(
        "Update {} from {current} to {}?",
        updater.source().describe(),
        release.version()
    );
    if !force && !confirm(&question)? {
        renderer.print_status("info", "update cancelled");
        return Ok(());
    }

    renderer.print_section("update");
    let progress = renderer.start_stages();
    let result = updater.apply(Some(release), &progress);
    progress.finish();

    match result {
        Ok(applied) => {
            renderer.print_lines(&format_applied_lines(&applied));
            for warning in &applied.cache_warnings {
                renderer.print_status("warn", warning);
            }
            renderer.print_status("ok", &format!("updated to {}", applied.installed));
            Ok(())
        }
        Err(err) => {
            report_failure(renderer, &err);
            Err(err.into())
        }
    }
}

pub(crate) fn list_backups(
    renderer: TerminalRenderer,
    layout: &InstallLayout,
    config: &UpdaterConfig,
) -> Result<()> {
    let store = SnapshotStore::for_layout(layout, config.snapshot_exclude_paths());
    let snapshots = store.list()?;
    if snapshots.is_empty() {
        renderer.print_status("info", &format!("no backups in {}", store.dir().display()));
        return Ok(());
    }
    renderer.print_lines(&format_snapshot_lines(&snapshots));
    Ok(())
}

pub(crate) fn restore_backup(
    renderer: TerminalRenderer,
    layout: &InstallLayout,
    config: &UpdaterConfig,
    requested: &Path,
    force: bool,
) -> Result<()> {
    let store = SnapshotStore::for_layout(layout, config.snapshot_exclude_paths());
    let path = resolve_backup_path(store.dir(), requested);

    let question = format!(
        "Restore {} over {}? Files in the backup will be overwritten.",
        path.display(),
        layout.root().display()
    );
    if !force && !confirm(&question)? {
        renderer.print_status("info", "restore cancelled");
        return Ok(());
    }

    let _lock = InstallationLock::acquire(&layout.lock_path())?;
    store.restore(&path)?;
    let version = read_installed_version(layout)?;
    renderer.print_status(
        "ok",
        &format!("restored {} (version {version})", path.display()),
    );
    Ok(())
}

pub(crate) fn list_releases(
    renderer: TerminalRenderer,
    source: &GitHubReleaseSource,
    limit: usize,
) -> Result<()> {
    let releases = source.list_releases(limit)?;
    if releases.is_empty() {
        renderer.print_status("info", &format!("no releases found for {}", source.describe()));
        return Ok(());
    }
    renderer.print_lines(&format_release_lines(&releases));
    Ok(())
}

pub(crate) fn resolve_backup_path(store_dir: &Path, requested: &Path) -> PathBuf {
    let is_bare_name = requested.components().count() == 1 && !requested.is_absolute();
    if is_bare_name && !requested.exists() {
        store_dir.join(requested)
    } else {
        requested.to_path_buf()
    }
}

pub(crate) fn parse_confirmation(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn confirm(question: &str) -> Result<bool> {
    if !io::stdin().is_terminal() {
        bail!("refusing to continue without confirmation; pass --force for non-interactive runs");
    }
    print!("{question} [y/N] ");
    io::stdout().flush().context("failed to flush stdout")?;
    let mut answer = String::new();
    io::stdin()
        .read_line(&mut answer)
        .context("failed to read confirmation")?;
    Ok(parse_confirmation(&answer))
}

fn report_failure(renderer: TerminalRenderer, err: &UpdateError) {
    match err {
        UpdateError::RolledBack { snapshot, .. } => {
            renderer.print_status(
                "warn",
                &format!("update failed; installation restored from {snapshot}"),
            );
        }
        UpdateError::RollbackFailed { snapshot, .. } => {
            renderer.print_status(
                "error",
                &format!(
                    "update failed and automatic rollback did not complete; retry with --restore {snapshot}"
                ),
            );
        }
        _ => {}
    }
}

pub(crate) fn format_check_lines(outcome: &UpdateOutcome) -> Vec<String> {
    let mut lines = vec![
        format!("current version: {}", outcome.current),
        format!("latest version:  {}", outcome.latest),
    ];
    if let Some(release) = &outcome.release {
        lines.push(format!("release:         {}", release_summary(release)));
    }
    lines
}

pub(crate) fn format_applied_lines(applied: &AppliedUpdate) -> Vec<String> {
    let mut lines = vec![
        format!("{} -> {} ({})", applied.previous, applied.installed, applied.release_tag),
        format!(
            "archive: {} ({})",
            applied.archive_url,
            HumanBytes(applied.archive_bytes)
        ),
        format!(
            "files copied: {} (preserved paths skipped: {})",
            applied.files_copied, applied.preserved_skipped
        ),
        format!("backup: {}", applied.snapshot.path.display()),
    ];
    if applied.checksum_verified {
        lines.push("checksum: verified".to_string());
    }
    if applied.pruned_snapshots > 0 {
        lines.push(format!("old backups pruned: {}", applied.pruned_snapshots));
    }
    lines
}

pub(crate) fn format_snapshot_lines(snapshots: &[Snapshot]) -> Vec<String> {
    snapshots
        .iter()
        .map(|snapshot| {
            format!(
                "{}  {:>10}  {}",
                snapshot.file_name,
                HumanBytes(snapshot.size_bytes).to_string(),
                snapshot.created_at.format("%Y-%m-%d %H:%M:%S UTC")
            )
        })
        .collect()
}

pub(crate) fn format_release_lines(releases: &[Release]) -> Vec<String> {
    releases
        .iter()
        .map(|release| {
            let published = release
                .published_at
                .map(|at| at.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "unpublished".to_string());
            let marker = if release.is_prerelease() {
                " [prerelease]"
            } else {
                ""
            };
            format!("{:<16} {published}  {}{marker}", release.tag, release.title)
        })
        .collect()
}

fn release_summary(release: &Release) -> String {
    match release.published_at {
        Some(at) => format!("{} ({}), published {}", release.tag, release.title, at.format("%Y-%m-%d")),
        None => format!("{} ({})", release.tag, release.title),
    }
}
