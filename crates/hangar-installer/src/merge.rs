use std::fs;
use std::path::{Path, PathBuf};

use hangar_core::{UpdateError, UpdateResult};
use tracing::debug;
use walkdir::WalkDir;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub files_copied: usize,
    pub skipped_preserved: usize,
    pub created_files: Vec<PathBuf>,
    pub created_dirs: Vec<PathBuf>,
}

// Whole components: `.env` does not cover `.env.example`.
pub fn is_preserved(relative: &Path, preserved: &[PathBuf]) -> bool {
    preserved.iter().any(|prefix| relative.starts_with(prefix))
}

pub fn merge_tree(
    src: &Path,
    dst: &Path,
    preserved: &[PathBuf],
    report: &mut MergeReport,
) -> UpdateResult<()> {
    let mut skipped = 0_usize;
    let walker = WalkDir::new(src)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| match entry.path().strip_prefix(src) {
            Ok(relative) if relative.as_os_str().is_empty() => true,
            Ok(relative) if is_preserved(relative, preserved) => {
                debug!(path = %relative.display(), "preserving existing path");
                skipped += 1;
                false
            }
            Ok(_) => true,
            Err(_) => false,
        });

    for entry in walker {
        let entry = entry.map_err(|err| UpdateError::FileCopyFailed {
            path: err
                .path()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| src.display().to_string()),
            reason: err.to_string(),
        })?;
        let Ok(relative) = entry.path().strip_prefix(src) else {
            continue;
        };
        if relative.as_os_str().is_empty() {
            continue;
        }
        let target = dst.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            if !target.is_dir() {
                fs::create_dir_all(&target).map_err(|err| copy_failed(&target, err))?;
                report.created_dirs.push(relative.to_path_buf());
            }
            continue;
        }
        if !file_type.is_file() {
            debug!(path = %relative.display(), "skipping non-regular file in release");
            continue;
        }

        let existed = target.exists();
        fs::copy(entry.path(), &target).map_err(|err| copy_failed(&target, err))?;
        if !existed {
            report.created_files.push(relative.to_path_buf());
        }
        report.files_copied += 1;
    }

    report.skipped_preserved += skipped;
    Ok(())
}

pub fn remove_created_entries(dst: &Path, report: &MergeReport) -> UpdateResult<()> {
    for relative in &report.created_files {
        let path = dst.join(relative);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                return Err(UpdateError::io(
                    format!("failed to remove {}", path.display()),
                    err,
                ));
            }
        }
    }

    let mut dirs = report.created_dirs.clone();
    dirs.sort_by_key(|relative| std::cmp::Reverse(relative.components().count()));
    for relative in dirs {
        let path = dst.join(&relative);
        let is_empty = fs::read_dir(&path)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false);
        if is_empty {
            fs::remove_dir(&path).map_err(|err| {
                UpdateError::io(format!("failed to remove {}", path.display()), err)
            })?;
        }
    }
    Ok(())
}

fn copy_failed(path: &Path, err: std::io::Error) -> UpdateError {
    UpdateError::FileCopyFailed {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}
