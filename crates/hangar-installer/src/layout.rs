use std::fs;
use std::path::{Path, PathBuf};

use hangar_core::{ArchiveFormat, UpdateError, UpdateResult};

use crate::config::UpdaterConfig;

pub const VERSION_MARKER: &str = "VERSION";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
    root: PathBuf,
    snapshot_dir: PathBuf,
    scratch_dir: PathBuf,
}

impl InstallLayout {
    pub fn from_config(root: impl Into<PathBuf>, config: &UpdaterConfig) -> Self {
        let root = root.into();
        Self {
            snapshot_dir: resolve_under(&root, &config.snapshot_dir),
            scratch_dir: resolve_under(&root, &config.scratch_dir),
            root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn snapshot_dir(&self) -> &Path {
        &self.snapshot_dir
    }

    pub fn version_marker_path(&self) -> PathBuf {
        self.root.join(VERSION_MARKER)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.scratch_dir.join("update.lock")
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.scratch_dir.join("downloads")
    }

    pub fn download_path(&self, format: ArchiveFormat) -> PathBuf {
        self.downloads_dir()
            .join(format!("release.{}", format.extension()))
    }

    pub fn checksum_download_path(&self) -> PathBuf {
        self.downloads_dir().join("release.sha256")
    }

    pub fn extract_dir(&self) -> PathBuf {
        self.scratch_dir.join("extract")
    }

    pub fn internal_relative_dirs(&self) -> Vec<PathBuf> {
        [&self.snapshot_dir, &self.scratch_dir]
            .into_iter()
            .filter_map(|dir| dir.strip_prefix(&self.root).ok())
            .filter(|relative| !relative.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .collect()
    }

    pub fn ensure_scratch_dirs(&self) -> UpdateResult<()> {
        for dir in [self.scratch_dir.clone(), self.downloads_dir()] {
            fs::create_dir_all(&dir)
                .map_err(|err| UpdateError::io(format!("failed to create {}", dir.display()), err))?;
        }
        Ok(())
    }

    pub fn clear_scratch_artifacts(&self) -> UpdateResult<()> {
        for dir in [self.downloads_dir(), self.extract_dir()] {
            if dir.exists() {
                fs::remove_dir_all(&dir).map_err(|err| {
                    UpdateError::io(format!("failed to remove {}", dir.display()), err)
                })?;
            }
        }
        Ok(())
    }
}

fn resolve_under(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}
