use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::SyncSender;

use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum UpdateStage {
    Checking,
    SpaceCheck,
    Backup,
    Downloading,
    Extracting,
    Dependencies,
    Migrating,
    CacheRefresh,
    Cleanup,
    Done,
    Failed,
    RollingBack,
    RolledBack,
    RollbackFailed,
}

impl UpdateStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Checking => "checking",
            Self::SpaceCheck => "space-check",
            Self::Backup => "backup",
            Self::Downloading => "downloading",
            Self::Extracting => "extracting",
            Self::Dependencies => "dependencies",
            Self::Migrating => "migrating",
            Self::CacheRefresh => "cache-refresh",
            Self::Cleanup => "cleanup",
            Self::Done => "done",
            Self::Failed => "failed",
            Self::RollingBack => "rolling-back",
            Self::RolledBack => "rolled-back",
            Self::RollbackFailed => "rollback-failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::RolledBack | Self::RollbackFailed)
    }
}

impl fmt::Display for UpdateStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub stage: UpdateStage,
    pub message: String,
}

// Implementations must not block.
pub trait ProgressSink {
    fn notify(&self, event: &ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressEvent),
{
    fn notify(&self, event: &ProgressEvent) {
        self(event);
    }
}

impl ProgressSink for SyncSender<ProgressEvent> {
    fn notify(&self, event: &ProgressEvent) {
        let _ = self.try_send(event.clone());
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn notify(&self, _event: &ProgressEvent) {}
}

pub(crate) fn emit(sink: &dyn ProgressSink, stage: UpdateStage, message: impl Into<String>) {
    let event = ProgressEvent {
        stage,
        message: message.into(),
    };
    info!(stage = %event.stage, "{}", event.message);

    if catch_unwind(AssertUnwindSafe(|| sink.notify(&event))).is_err() {
        warn!(stage = %event.stage, "progress observer panicked; continuing");
    }
}
