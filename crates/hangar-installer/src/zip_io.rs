use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use zip::ZipArchive;

// Entries whose names would escape `dst` abort the extraction.
pub(crate) fn extract_zip_into(archive_path: &Path, dst: &Path) -> Result<usize> {
    let file = File::open(archive_path)
        .with_context(|| format!("failed to open archive {}", archive_path.display()))?;
    let mut archive = ZipArchive::new(BufReader::new(file))
        .with_context(|| format!("failed to read zip archive {}", archive_path.display()))?;

    fs::create_dir_all(dst).with_context(|| format!("failed to create {}", dst.display()))?;

    let mut files_written = 0_usize;
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .with_context(|| format!("failed to read zip entry #{index}"))?;
        let relative = entry
            .enclosed_name()
            .ok_or_else(|| anyhow!("zip entry escapes destination: {}", entry.name()))?;
        let out_path = dst.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)
                .with_context(|| format!("failed to create {}", out_path.display()))?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let mut out = File::create(&out_path)
            .with_context(|| format!("failed to create {}", out_path.display()))?;
        io::copy(&mut entry, &mut out)
            .with_context(|| format!("failed to write {}", out_path.display()))?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode().filter(|mode| mode & 0o777 != 0) {
            use std::os::unix::fs::PermissionsExt;

            fs::set_permissions(&out_path, fs::Permissions::from_mode(mode & 0o7777))
                .with_context(|| format!("failed to set mode on {}", out_path.display()))?;
        }

        files_written += 1;
    }

    Ok(files_written)
}
