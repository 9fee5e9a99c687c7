use std::fs;
use std::io;

use hangar_core::{UpdateError, UpdateResult, Version};

use crate::layout::InstallLayout;

pub fn read_installed_version(layout: &InstallLayout) -> UpdateResult<Version> {
    let path = layout.version_marker_path();
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Version::dev_placeholder()),
        Err(err) => {
            return Err(UpdateError::io(
                format!("failed to read version marker {}", path.display()),
                err,
            ));
        }
    };

    let value = raw.lines().next().unwrap_or("").trim();
    if value.is_empty() {
        return Ok(Version::dev_placeholder());
    }
    Ok(Version::parse(value))
}

pub fn write_version_marker(layout: &InstallLayout, version: &Version) -> UpdateResult<()> {
    let path = layout.version_marker_path();
    fs::write(&path, format!("{version}\n")).map_err(|err| {
        UpdateError::io(
            format!("failed to write version marker {}", path.display()),
            err,
        )
    })
}
