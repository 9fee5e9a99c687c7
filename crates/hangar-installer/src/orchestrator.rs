use std::fs;
use std::path::{Path, PathBuf};

use hangar_core::{ArchiveFormat, Release, UpdateError, UpdateResult, Version};
use hangar_registry::{select_latest_release, ReleaseSource};
use hangar_security::{digest_for_file_name, verify_sha256_file};
use tracing::{debug, error, info, warn};

use crate::config::UpdaterConfig;
use crate::download::{checksum_asset_for, validate_downloaded_archive, Downloader};
use crate::extract::{extract_archive, resolve_source_root};
use crate::layout::InstallLayout;
use crate::lock::InstallationLock;
use crate::merge::{merge_tree, remove_created_entries, MergeReport};
use crate::process::{resolve_installer_program, CommandSpec, ProcessRunner};
use crate::progress::{emit, ProgressSink, UpdateStage};
use crate::snapshot::{Snapshot, SnapshotStore};
use crate::version_marker::{read_installed_version, write_version_marker};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub available: bool,
    pub current: Version,
    pub latest: Version,
    pub release: Option<Release>,
}

impl UpdateOutcome {
    pub fn evaluate(current: Version, latest_release: Release) -> Self {
        let latest = latest_release.version();
        let available = latest > current;
        Self {
            available,
            current,
            latest,
            release: available.then_some(latest_release),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedUpdate {
    pub previous: Version,
    pub installed: Version,
    pub release_tag: String,
    pub snapshot: Snapshot,
    pub archive_url: String,
    pub archive_bytes: u64,
    pub checksum_verified: bool,
    pub files_copied: usize,
    pub preserved_skipped: usize,
    pub cache_warnings: Vec<String>,
    pub pruned_snapshots: usize,
}

#[derive(Debug)]
struct DownloadedArchive {
    url: String,
    path: PathBuf,
    format: ArchiveFormat,
    size: u64,
    checksum_verified: bool,
}

#[derive(Debug)]
struct AppliedSteps {
    archive: DownloadedArchive,
    cache_warnings: Vec<String>,
}

pub struct UpdateOrchestrator<S, D, P> {
    layout: InstallLayout,
    config: UpdaterConfig,
    source: S,
    downloader: D,
    runner: P,
    snapshots: SnapshotStore,
}

impl<S, D, P> UpdateOrchestrator<S, D, P>
where
    S: ReleaseSource,
    D: Downloader,
    P: ProcessRunner,
{
    pub fn new(
        layout: InstallLayout,
        config: UpdaterConfig,
        source: S,
        downloader: D,
        runner: P,
    ) -> Self {
        let snapshots = SnapshotStore::for_layout(&layout, config.snapshot_exclude_paths());
        Self {
            layout,
            config,
            source,
            downloader,
            runner,
            snapshots,
        }
    }

    pub fn layout(&self) -> &InstallLayout {
        &self.layout
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn downloader(&self) -> &D {
        &self.downloader
    }

    pub fn runner(&self) -> &P {
        &self.runner
    }

    pub fn snapshots(&self) -> &SnapshotStore {
        &self.snapshots
    }

    pub fn current_version(&self) -> UpdateResult<Version> {
        read_installed_version(&self.layout)
    }

    pub fn check_for_update(&self) -> UpdateResult<UpdateOutcome> {
        let current = self.current_version()?;
        let release = select_latest_release(&self.source, self.config.channel)?;
        let outcome = UpdateOutcome::evaluate(current, release);
        debug!(
            current = %outcome.current,
            latest = %outcome.latest,
            available = outcome.available,
            "update check finished"
        );
        Ok(outcome)
    }

    pub fn apply(
        &self,
        release: Option<Release>,
        progress: &dyn ProgressSink,
    ) -> UpdateResult<AppliedUpdate> {
        let _lock = InstallationLock::acquire(&self.layout.lock_path())?;

        emit(progress, UpdateStage::Checking, "Checking installed version");
        let current = self.current_version()?;
        let target = match release {
            Some(release) => release,
            None => select_latest_release(&self.source, self.config.channel)?,
        };
        let target_version = target.version();
        if target_version <= current {
            return Err(UpdateError::AlreadyUpToDate(current.to_string()));
        }
        emit(
            progress,
            UpdateStage::Checking,
            format!("Updating from {current} to {target_version}"),
        );

        emit(progress, UpdateStage::SpaceCheck, "Checking free disk space");
        self.ensure_free_space()?;

        emit(
            progress,
            UpdateStage::Backup,
            format!("Creating backup of version {current}"),
        );
        let snapshot = self.snapshots.create(current.as_str())?;

        let mut merge = MergeReport::default();
        let steps = match self.run_destructive_steps(&target, &target_version, progress, &mut merge)
        {
            Ok(steps) => steps,
            Err(err) => return Err(self.roll_back(err, &snapshot, &merge, progress)),
        };

        emit(progress, UpdateStage::Cleanup, "Removing temporary files");
        let pruned_snapshots = self.clean_up();

        emit(
            progress,
            UpdateStage::Done,
            format!("Updated to version {target_version}"),
        );
        Ok(AppliedUpdate {
            previous: current,
            installed: target_version,
            release_tag: target.tag,
            snapshot,
            archive_url: steps.archive.url,
            archive_bytes: steps.archive.size,
            checksum_verified: steps.archive.checksum_verified,
            files_copied: merge.files_copied,
            preserved_skipped: merge.skipped_preserved,
            cache_warnings: steps.cache_warnings,
            pruned_snapshots,
        })
    }

    fn ensure_free_space(&self) -> UpdateResult<()> {
        let root = self.layout.root();
        let available = fs2::available_space(root).map_err(|err| {
            UpdateError::io(
                format!("failed to query free space for {}", root.display()),
                err,
            )
        })?;
        let required = self.config.min_free_bytes;
        if available < required {
            return Err(UpdateError::InsufficientDiskSpace {
                required,
                available,
            });
        }
        debug!(available, required, "disk space check passed");
        Ok(())
    }

    fn run_destructive_steps(
        &self,
        release: &Release,
        target_version: &Version,
        progress: &dyn ProgressSink,
        merge: &mut MergeReport,
    ) -> UpdateResult<AppliedSteps> {
        let archive = self.download_release(release, progress)?;

        emit(progress, UpdateStage::Extracting, "Extracting release archive");
        let extract_dir = self.layout.extract_dir();
        extract_archive(&archive.path, archive.format, &extract_dir)?;
        let source_root = resolve_source_root(&extract_dir, &self.config.root_markers)?;

        emit(
            progress,
            UpdateStage::Extracting,
            "Copying release files into the installation",
        );
        let mut preserved = self.config.preserved_relative_paths();
        preserved.extend(self.layout.internal_relative_dirs());
        merge_tree(&source_root, self.layout.root(), &preserved, merge)?;
        write_version_marker(&self.layout, target_version)?;
        info!(
            files = merge.files_copied,
            preserved = merge.skipped_preserved,
            "release files merged"
        );

        emit(progress, UpdateStage::Dependencies, "Installing dependencies");
        self.install_dependencies()?;

        emit(progress, UpdateStage::Migrating, "Running database migrations");
        self.run_migrations()?;

        emit(progress, UpdateStage::CacheRefresh, "Rebuilding caches");
        let cache_warnings = self.refresh_caches();

        Ok(AppliedSteps {
            archive,
            cache_warnings,
        })
    }

    fn download_release(
        &self,
        release: &Release,
        progress: &dyn ProgressSink,
    ) -> UpdateResult<DownloadedArchive> {
        self.layout.ensure_scratch_dirs()?;

        let url = self.source.download_url(release, self.config.archive_format);
        let format = ArchiveFormat::infer_from_name(&url).unwrap_or(self.config.archive_format);
        let path = self.layout.download_path(format);
        emit(
            progress,
            UpdateStage::Downloading,
            format!("Downloading {} from {url}", release.tag),
        );

        self.downloader.download(&url, &path)?;
        let size = validate_downloaded_archive(&path, &url, self.config.min_archive_bytes)?;
        let checksum_verified = self.verify_checksum(release, &url, &path)?;

        Ok(DownloadedArchive {
            url,
            path,
            format,
            size,
            checksum_verified,
        })
    }

    fn verify_checksum(&self, release: &Release, url: &str, path: &Path) -> UpdateResult<bool> {
        let Some(asset) = release.assets.iter().find(|asset| asset.download_url == url) else {
            debug!(url, "generated source archive has no published checksum");
            return Ok(false);
        };
        let Some(checksum_asset) = checksum_asset_for(release, asset) else {
            warn!(asset = %asset.name, "release publishes no checksum; skipping verification");
            return Ok(false);
        };

        let checksum_path = self.layout.checksum_download_path();
        self.downloader
            .download(&checksum_asset.download_url, &checksum_path)?;
        let content = fs::read_to_string(&checksum_path).map_err(|err| {
            UpdateError::io(
                format!("failed to read checksum file {}", checksum_path.display()),
                err,
            )
        })?;
        let Some(expected) = digest_for_file_name(&content, &asset.name) else {
            warn!(
                asset = %asset.name,
                checksum_asset = %checksum_asset.name,
                "checksum file has no digest for archive; skipping verification"
            );
            return Ok(false);
        };

        let mismatch = verify_sha256_file(path, &expected).map_err(|err| {
            UpdateError::io(
                format!("failed to hash {}", path.display()),
                format!("{err:#}"),
            )
        })?;
        if let Some(actual) = mismatch {
            return Err(UpdateError::ChecksumMismatch {
                file: asset.name.clone(),
                expected,
                actual,
            });
        }
        debug!(asset = %asset.name, "archive checksum verified");
        Ok(true)
    }

    fn install_dependencies(&self) -> UpdateResult<()> {
        let root = self.layout.root();
        let command = CommandSpec {
            program: resolve_installer_program(&self.runner, &self.config.dependencies, root),
            args: self.config.dependencies.args.clone(),
            cwd: root.to_path_buf(),
        };
        let output = self.runner.run(&command).map_err(|err| {
            UpdateError::DependencyInstallFailed(format!("failed to launch `{command}`: {err}"))
        })?;
        if !output.success() {
            return Err(UpdateError::DependencyInstallFailed(format!(
                "`{command}` failed with {}:\n{}",
                output.describe_exit(),
                output.output
            )));
        }
        Ok(())
    }

    fn run_migrations(&self) -> UpdateResult<()> {
        let command = CommandSpec::from_config(&self.config.migrations, self.layout.root());
        let output = self.runner.run(&command).map_err(|err| {
            UpdateError::MigrationFailed(format!("failed to launch `{command}`: {err}"))
        })?;
        if !output.success() {
            return Err(UpdateError::MigrationFailed(format!(
                "`{command}` failed with {}:\n{}",
                output.describe_exit(),
                output.output
            )));
        }
        Ok(())
    }

    fn refresh_caches(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        for config in &self.config.cache_commands {
            let command = CommandSpec::from_config(config, self.layout.root());
            let failure = match self.runner.run(&command) {
                Ok(output) if output.success() => continue,
                Ok(output) => format!("`{command}` failed with {}", output.describe_exit()),
                Err(err) => format!("failed to launch `{command}`: {err}"),
            };
            warn!("cache refresh step failed: {failure}");
            warnings.push(failure);
        }
        warnings
    }

    fn roll_back(
        &self,
        original: UpdateError,
        snapshot: &Snapshot,
        merge: &MergeReport,
        progress: &dyn ProgressSink,
    ) -> UpdateError {
        emit(progress, UpdateStage::Failed, original.to_string());
        emit(
            progress,
            UpdateStage::RollingBack,
            format!("Restoring backup {}", snapshot.file_name),
        );

        let restored = self
            .snapshots
            .restore(&snapshot.path)
            .and_then(|()| remove_created_entries(self.layout.root(), merge));
        if let Err(err) = self.layout.clear_scratch_artifacts() {
            warn!("failed to remove temporary update files: {err}");
        }

        let snapshot_label = snapshot.path.display().to_string();
        match restored {
            Ok(()) => {
                error!(snapshot = %snapshot_label, "update failed and was rolled back: {original}");
                emit(
                    progress,
                    UpdateStage::RolledBack,
                    format!("Rolled back to {}", snapshot.file_name),
                );
                UpdateError::RolledBack {
                    original: Box::new(original),
                    snapshot: snapshot_label,
                }
            }
            Err(restore) => {
                error!(
                    snapshot = %snapshot_label,
                    "update failed and rollback failed: {original}; {restore}"
                );
                emit(
                    progress,
                    UpdateStage::RollbackFailed,
                    format!("Rollback from {} failed: {restore}", snapshot.file_name),
                );
                UpdateError::RollbackFailed {
                    original: Box::new(original),
                    restore: Box::new(restore),
                    snapshot: snapshot_label,
                }
            }
        }
    }

    // Failures here are logged; the update itself already succeeded.
    fn clean_up(&self) -> usize {
        if let Err(err) = self.layout.clear_scratch_artifacts() {
            warn!("failed to remove temporary update files: {err}");
        }
        match self.snapshots.cleanup(self.config.retain_snapshots) {
            Ok(pruned) => pruned,
            Err(err) => {
                warn!("failed to prune old backups: {err}");
                0
            }
        }
    }
}
