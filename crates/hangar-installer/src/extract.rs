use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

use anyhow::{anyhow, Context, Result};
use hangar_core::{ArchiveFormat, UpdateError, UpdateResult};
use regex::Regex;
use tracing::debug;

use crate::zip_io::extract_zip_into;

const NAME_VERSION_PATTERN: &str =
    r"^[A-Za-z0-9][A-Za-z0-9._-]*-v?[0-9]+\.[0-9]+(\.[0-9]+)?([-+][0-9A-Za-z.+-]+)?$";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopLevelListing {
    pub files: Vec<String>,
    pub dirs: Vec<String>,
}

impl TopLevelListing {
    pub fn read(dir: &Path) -> UpdateResult<Self> {
        let entries = fs::read_dir(dir).map_err(|err| {
            UpdateError::ExtractionFailed(format!("failed to read {}: {err}", dir.display()))
        })?;

        let mut listing = Self::default();
        for entry in entries {
            let entry = entry.map_err(|err| {
                UpdateError::ExtractionFailed(format!("failed to read {}: {err}", dir.display()))
            })?;
            let name = entry.file_name().to_string_lossy().to_string();
            let is_dir = entry
                .file_type()
                .map(|file_type| file_type.is_dir())
                .unwrap_or(false);
            if is_dir {
                listing.dirs.push(name);
            } else {
                listing.files.push(name);
            }
        }
        listing.files.sort();
        listing.dirs.sort();
        Ok(listing)
    }

    fn contains(&self, name: &str) -> bool {
        self.files.iter().chain(&self.dirs).any(|entry| entry == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRoot {
    Flat,
    Nested(String),
}

pub fn choose_source_root(listing: &TopLevelListing, markers: &[String]) -> UpdateResult<SourceRoot> {
    if markers.iter().any(|marker| listing.contains(marker)) {
        return Ok(SourceRoot::Flat);
    }

    let candidates = listing
        .dirs
        .iter()
        .filter(|name| name.as_str() != "__MACOSX")
        .collect::<Vec<_>>();
    if let [only] = candidates.as_slice() {
        return Ok(SourceRoot::Nested((*only).clone()));
    }
    if candidates.is_empty() {
        return Err(UpdateError::ExtractionFailed(
            "unable to resolve archive root: no marker files and no top-level directory"
                .to_string(),
        ));
    }

    let patterned = match name_version_pattern() {
        Some(pattern) => candidates
            .iter()
            .filter(|name| pattern.is_match(name))
            .collect::<Vec<_>>(),
        None => Vec::new(),
    };
    match patterned.as_slice() {
        [only] => Ok(SourceRoot::Nested((**only).clone())),
        _ => Err(UpdateError::ExtractionFailed(format!(
            "unable to resolve archive root: expected marker files ({}) or a single top-level directory, found {}",
            markers.join(", "),
            candidates
                .iter()
                .map(|name| name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ))),
    }
}

pub fn resolve_source_root(extract_dir: &Path, markers: &[String]) -> UpdateResult<PathBuf> {
    let listing = TopLevelListing::read(extract_dir)?;
    let root = match choose_source_root(&listing, markers)? {
        SourceRoot::Flat => extract_dir.to_path_buf(),
        SourceRoot::Nested(name) => extract_dir.join(name),
    };
    debug!(root = %root.display(), "resolved archive source root");
    Ok(root)
}

pub fn extract_archive(archive_path: &Path, format: ArchiveFormat, dst: &Path) -> UpdateResult<()> {
    if dst.exists() {
        fs::remove_dir_all(dst).map_err(|err| {
            UpdateError::ExtractionFailed(format!("failed to clear {}: {err}", dst.display()))
        })?;
    }
    fs::create_dir_all(dst).map_err(|err| {
        UpdateError::ExtractionFailed(format!("failed to create {}: {err}", dst.display()))
    })?;

    match format {
        ArchiveFormat::Zip => extract_zip_into(archive_path, dst)
            .map(|_| ())
            .map_err(|err| UpdateError::ExtractionFailed(format!("{err:#}"))),
        ArchiveFormat::TarGz => extract_tar_gz(archive_path, dst),
    }
}

fn extract_tar_gz(archive_path: &Path, dst: &Path) -> UpdateResult<()> {
    run_command(
        Command::new("tar")
            .arg("-xzf")
            .arg(archive_path)
            .arg("-C")
            .arg(dst),
        "failed to extract tar archive",
    )
    .map_err(|err| UpdateError::ExtractionFailed(format!("{err:#}")))
}

fn run_command(command: &mut Command, context_message: &str) -> Result<()> {
    let output = command
        .output()
        .with_context(|| format!("{context_message}: command failed to start"))?;
    if output.status.success() {
        return Ok(());
    }

    Err(anyhow!(
        "{context_message}: status={} stdout='{}' stderr='{}'",
        output.status,
        String::from_utf8_lossy(&output.stdout).trim(),
        String::from_utf8_lossy(&output.stderr).trim()
    ))
}

fn name_version_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(NAME_VERSION_PATTERN).ok())
        .as_ref()
}
