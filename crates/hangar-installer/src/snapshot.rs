use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use hangar_core::{UpdateError, UpdateResult};
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::layout::{InstallLayout, VERSION_MARKER};
use crate::zip_io::extract_zip_into;

const SNAPSHOT_PREFIX: &str = "backup-";
const SNAPSHOT_EXTENSION: &str = "zip";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub file_name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    root: PathBuf,
    dir: PathBuf,
    excludes: Vec<PathBuf>,
}

impl SnapshotStore {
    pub fn new(root: impl Into<PathBuf>, dir: impl Into<PathBuf>, excludes: Vec<PathBuf>) -> Self {
        Self {
            root: root.into(),
            dir: dir.into(),
            excludes,
        }
    }

    pub fn for_layout(layout: &InstallLayout, mut excludes: Vec<PathBuf>) -> Self {
        excludes.extend(layout.internal_relative_dirs());
        Self::new(layout.root(), layout.snapshot_dir(), excludes)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn create(&self, label_version: &str) -> UpdateResult<Snapshot> {
        fs::create_dir_all(&self.dir).map_err(|err| UpdateError::backup(&self.dir, err))?;

        let path = self.next_snapshot_path(label_version);
        let part_path = path.with_extension("zip.part");
        info!(path = %path.display(), "creating snapshot");

        if let Err(err) = self.write_archive(&part_path, label_version) {
            let _ = fs::remove_file(&part_path);
            return Err(UpdateError::backup(&path, format!("{err:#}")));
        }
        fs::rename(&part_path, &path).map_err(|err| {
            let _ = fs::remove_file(&part_path);
            UpdateError::backup(&path, err)
        })?;

        snapshot_from_path(&path).map_err(|err| UpdateError::backup(&path, format!("{err:#}")))
    }

    pub fn list(&self) -> UpdateResult<Vec<Snapshot>> {
        fs::create_dir_all(&self.dir).map_err(|err| {
            UpdateError::io(format!("failed to create {}", self.dir.display()), err)
        })?;

        let entries = fs::read_dir(&self.dir).map_err(|err| {
            UpdateError::io(format!("failed to read {}", self.dir.display()), err)
        })?;

        let mut snapshots = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| {
                UpdateError::io(format!("failed to read {}", self.dir.display()), err)
            })?;
            let path = entry.path();
            let is_archive = path.is_file()
                && path
                    .extension()
                    .is_some_and(|extension| extension == SNAPSHOT_EXTENSION);
            if !is_archive {
                continue;
            }
            let snapshot = snapshot_from_path(&path).map_err(|err| {
                UpdateError::io(format!("failed to inspect {}", path.display()), format!("{err:#}"))
            })?;
            snapshots.push(snapshot);
        }

        snapshots.sort_by(|left, right| {
            right
                .created_at
                .cmp(&left.created_at)
                .then_with(|| name_sequence(&right.file_name).cmp(&name_sequence(&left.file_name)))
                .then_with(|| right.file_name.cmp(&left.file_name))
        });
        Ok(snapshots)
    }

    pub fn restore(&self, path: &Path) -> UpdateResult<()> {
        if !path.exists() {
            return Err(UpdateError::RestoreFailed(format!(
                "Backup file not found: {}",
                path.display()
            )));
        }

        info!(path = %path.display(), root = %self.root.display(), "restoring snapshot");
        let restored = extract_zip_into(path, &self.root)
            .map_err(|err| UpdateError::restore(path, format!("{err:#}")))?;
        debug!(files = restored, "snapshot restored");
        Ok(())
    }

    pub fn cleanup(&self, retain: usize) -> UpdateResult<usize> {
        let mut removed = 0_usize;
        for snapshot in self.list()?.into_iter().skip(retain) {
            fs::remove_file(&snapshot.path).map_err(|err| {
                UpdateError::io(
                    format!("failed to delete snapshot {}", snapshot.path.display()),
                    err,
                )
            })?;
            debug!(path = %snapshot.path.display(), "pruned snapshot");
            removed += 1;
        }
        Ok(removed)
    }

    fn next_snapshot_path(&self, label_version: &str) -> PathBuf {
        let stem = format!(
            "{SNAPSHOT_PREFIX}{}-{}",
            file_name_safe(label_version),
            Utc::now().format("%Y%m%d-%H%M%S")
        );
        let mut candidate = self.dir.join(format!("{stem}.{SNAPSHOT_EXTENSION}"));
        let mut counter = 1_u32;
        while candidate.exists() {
            candidate = self
                .dir
                .join(format!("{stem}-{counter}.{SNAPSHOT_EXTENSION}"));
            counter += 1;
        }
        candidate
    }

    fn is_excluded(&self, relative: &Path) -> bool {
        self.excludes
            .iter()
            .any(|exclude| relative.starts_with(exclude))
    }

    fn write_archive(&self, archive_path: &Path, label_version: &str) -> Result<()> {
        let file = File::create(archive_path)
            .with_context(|| format!("failed to create {}", archive_path.display()))?;
        let mut writer = ZipWriter::new(BufWriter::new(file));
        let base_options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        let own_dir = self.dir.strip_prefix(&self.root).ok().map(Path::to_path_buf);
        let mut wrote_marker = false;

        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                    return false;
                };
                if relative.as_os_str().is_empty() {
                    return true;
                }
                if own_dir.as_deref().is_some_and(|own| relative.starts_with(own)) {
                    return false;
                }
                !self.is_excluded(relative)
            });

        for entry in walker {
            let entry = entry.context("failed walking installation tree")?;
            let relative = entry
                .path()
                .strip_prefix(&self.root)
                .context("walked outside installation root")?;
            if relative.as_os_str().is_empty() {
                continue;
            }
            let name = archive_entry_name(relative)?;
            let file_type = entry.file_type();

            if file_type.is_dir() {
                writer
                    .add_directory(format!("{name}/"), base_options)
                    .with_context(|| format!("failed adding directory {name}"))?;
                continue;
            }
            if !file_type.is_file() {
                debug!(path = %entry.path().display(), "skipping non-regular file in snapshot");
                continue;
            }

            let metadata = entry
                .metadata()
                .with_context(|| format!("failed to stat {}", entry.path().display()))?;
            let options = entry_options(base_options, &metadata);
            writer
                .start_file(name.clone(), options)
                .with_context(|| format!("failed adding {name}"))?;
            let mut source = BufReader::new(
                File::open(entry.path())
                    .with_context(|| format!("failed to open {}", entry.path().display()))?,
            );
            io::copy(&mut source, &mut writer)
                .with_context(|| format!("failed writing {name} into snapshot"))?;

            if name == VERSION_MARKER {
                wrote_marker = true;
            }
        }

        if !wrote_marker {
            writer
                .start_file(VERSION_MARKER, base_options)
                .context("failed adding version marker")?;
            writer
                .write_all(format!("{label_version}\n").as_bytes())
                .context("failed writing version marker")?;
        }

        let mut inner = writer.finish().context("failed finalizing snapshot archive")?;
        inner.flush().context("failed flushing snapshot archive")?;
        Ok(())
    }
}

fn entry_options(base: SimpleFileOptions, metadata: &fs::Metadata) -> SimpleFileOptions {
    let options = base.large_file(metadata.len() > u64::from(u32::MAX));
    #[cfg(unix)]
    let options = {
        use std::os::unix::fs::PermissionsExt;
        options.unix_permissions(metadata.permissions().mode() & 0o7777)
    };
    options
}

fn archive_entry_name(relative: &Path) -> Result<String> {
    let mut parts = Vec::new();
    for component in relative.components() {
        let part = component
            .as_os_str()
            .to_str()
            .ok_or_else(|| anyhow!("non UTF-8 path in installation tree: {}", relative.display()))?;
        parts.push(part);
    }
    Ok(parts.join("/"))
}

fn file_name_safe(value: &str) -> String {
    let cleaned: String = value
        .trim()
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "unknown".to_string()
    } else {
        cleaned
    }
}

// `backup-{version}-{YYYYMMDD}-{HHMMSS}[-{counter}].zip`; the counter marks
// later snapshots taken within the same second.
fn name_sequence(file_name: &str) -> (String, u32) {
    let stem = file_name
        .strip_suffix(&format!(".{SNAPSHOT_EXTENSION}"))
        .unwrap_or(file_name);
    let parts = stem.rsplit('-').collect::<Vec<_>>();
    match parts.as_slice() {
        [counter, time, date, ..]
            if is_digits(counter, None) && is_digits(time, Some(6)) && is_digits(date, Some(8)) =>
        {
            (format!("{date}-{time}"), counter.parse().unwrap_or(u32::MAX))
        }
        [time, date, ..] if is_digits(time, Some(6)) && is_digits(date, Some(8)) => {
            (format!("{date}-{time}"), 0)
        }
        _ => (String::new(), 0),
    }
}

fn is_digits(part: &str, len: Option<usize>) -> bool {
    let length_ok = match len {
        Some(len) => part.len() == len,
        None => true,
    };
    length_ok && !part.is_empty() && part.bytes().all(|byte| byte.is_ascii_digit())
}

fn snapshot_from_path(path: &Path) -> Result<Snapshot> {
    let metadata =
        fs::metadata(path).with_context(|| format!("failed to stat {}", path.display()))?;
    let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| anyhow!("snapshot path has no file name: {}", path.display()))?
        .to_string();

    Ok(Snapshot {
        file_name,
        path: path.to_path_buf(),
        size_bytes: metadata.len(),
        created_at: DateTime::<Utc>::from(modified),
    })
}
