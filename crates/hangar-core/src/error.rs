use std::fmt::Display;
use std::path::Path;

pub type UpdateResult<T> = std::result::Result<T, UpdateError>;

#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    #[error("no releases found for {repository}")]
    NoReleasesFound { repository: String },

    #[error("release registry request failed: {0}")]
    NetworkError(String),

    #[error("already up to date: installed version {0} is not older than the target release")]
    AlreadyUpToDate(String),

    #[error(
        "insufficient disk space: {required} bytes required, only {available} bytes available"
    )]
    InsufficientDiskSpace { required: u64, available: u64 },

    #[error("download failed for {url}: {reason}")]
    DownloadFailed { url: String, reason: String },

    #[error("extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("dependency install failed: {0}")]
    DependencyInstallFailed(String),

    #[error("migration failed: {0}")]
    MigrationFailed(String),

    #[error("backup failed: {0}")]
    BackupFailed(String),

    #[error("restore failed: {0}")]
    RestoreFailed(String),

    #[error("checksum mismatch for {file}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        file: String,
        expected: String,
        actual: String,
    },

    #[error("failed to copy {path}: {reason}")]
    FileCopyFailed { path: String, reason: String },

    #[error("invalid updater configuration: {0}")]
    Config(String),

    #[error("{context}: {reason}")]
    Io { context: String, reason: String },

    #[error("another update is already running (lock held on {0})")]
    AlreadyRunning(String),

    /// The pipeline failed after the snapshot and the snapshot was restored.
    #[error("{original} (handled, rolled back to {snapshot})")]
    RolledBack {
        original: Box<UpdateError>,
        snapshot: String,
    },

    /// The pipeline failed and restoring the snapshot failed too.
    #[error("{original}; rollback from {snapshot} also failed: {restore}")]
    RollbackFailed {
        original: Box<UpdateError>,
        restore: Box<UpdateError>,
        snapshot: String,
    },
}

impl UpdateError {
    pub fn io(context: impl Into<String>, err: impl Display) -> Self {
        Self::Io {
            context: context.into(),
            reason: err.to_string(),
        }
    }

    pub fn download(url: impl Into<String>, reason: impl Display) -> Self {
        Self::DownloadFailed {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn backup(path: &Path, err: impl Display) -> Self {
        Self::BackupFailed(format!("{}: {err}", path.display()))
    }

    pub fn restore(path: &Path, err: impl Display) -> Self {
        Self::RestoreFailed(format!("{}: {err}", path.display()))
    }

    /// The failure that started it all, looking through rollback wrappers.
    pub fn root_cause(&self) -> &UpdateError {
        match self {
            Self::RolledBack { original, .. } | Self::RollbackFailed { original, .. } => {
                original.root_cause()
            }
            other => other,
        }
    }

    pub fn is_rolled_back(&self) -> bool {
        matches!(self, Self::RolledBack { .. })
    }

    pub fn is_rollback_failure(&self) -> bool {
        matches!(self, Self::RollbackFailed { .. })
    }
}
