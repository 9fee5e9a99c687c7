use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use hangar_core::{UpdateError, UpdateResult};
use tracing::{debug, warn};

#[derive(Debug)]
pub struct InstallationLock {
    file: File,
    path: PathBuf,
}

impl InstallationLock {
    pub fn acquire(path: &Path) -> UpdateResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                UpdateError::io(format!("failed to create {}", parent.display()), err)
            })?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|err| {
                UpdateError::io(format!("failed to open lock file {}", path.display()), err)
            })?;

        match file.try_lock_exclusive() {
            Ok(()) => {}
            Err(err) if is_contended(&err) => {
                return Err(UpdateError::AlreadyRunning(path.display().to_string()));
            }
            Err(err) => {
                return Err(UpdateError::io(
                    format!("failed to lock {}", path.display()),
                    err,
                ));
            }
        }

        file.set_len(0)
            .and_then(|()| writeln!(file, "{}", std::process::id()))
            .map_err(|err| {
                UpdateError::io(format!("failed to write lock file {}", path.display()), err)
            })?;

        debug!(path = %path.display(), "acquired installation lock");
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstallationLock {
    fn drop(&mut self) {
        if let Err(err) = FileExt::unlock(&self.file) {
            warn!(path = %self.path.display(), "failed to release installation lock: {err}");
        }
    }
}

fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}
