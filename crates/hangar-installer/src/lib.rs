mod config;
mod download;
mod extract;
mod layout;
mod lock;
mod merge;
mod orchestrator;
mod process;
mod progress;
mod snapshot;
mod version_marker;
mod zip_io;

pub use config::{
    CommandConfig, DependencyInstallerConfig, UpdaterConfig, DEFAULT_CONFIG_FILE,
    DEFAULT_DOWNLOAD_TIMEOUT_SECS, DEFAULT_MIN_ARCHIVE_BYTES, DEFAULT_MIN_FREE_BYTES,
    DEFAULT_RETAIN_SNAPSHOTS,
};
pub use download::{checksum_asset_for, validate_downloaded_archive, Downloader, HttpDownloader};
pub use extract::{
    choose_source_root, extract_archive, resolve_source_root, SourceRoot, TopLevelListing,
};
pub use layout::{InstallLayout, VERSION_MARKER};
pub use lock::InstallationLock;
pub use merge::{is_preserved, merge_tree, remove_created_entries, MergeReport};
pub use orchestrator::{AppliedUpdate, UpdateOrchestrator, UpdateOutcome};
pub use process::{
    resolve_installer_program, CommandSpec, ProcessOutput, ProcessRunner, SystemProcessRunner,
};
pub use progress::{NoProgress, ProgressEvent, ProgressSink, UpdateStage};
pub use snapshot::{Snapshot, SnapshotStore};
pub use version_marker::{read_installed_version, write_version_marker};
