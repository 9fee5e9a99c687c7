use hangar_core::{ArchiveFormat, Release, ReleaseChannel, UpdateError, UpdateResult};
use tracing::debug;

/// How many recent releases are scanned when the registry's own "latest"
/// pointer does not satisfy the channel.
pub const RELEASE_SCAN_LIMIT: usize = 30;

/// Read-only view of a remote release registry.
pub trait ReleaseSource {
    /// Label used in error messages (usually `owner/repo`).
    fn describe(&self) -> String;

    /// The most recent published, non-draft release.
    fn latest_release(&self) -> UpdateResult<Release>;

    fn release_by_tag(&self, tag: &str) -> UpdateResult<Release>;

    /// Up to `limit` releases, newest first.
    fn list_releases(&self, limit: usize) -> UpdateResult<Vec<Release>>;

    /// Prefers an asset matching `format`; otherwise the registry's
    /// auto-generated source archive for the tag.
    fn download_url(&self, release: &Release, format: ArchiveFormat) -> String;
}

/// Picks the upgrade target for `channel`.
///
/// For [`ReleaseChannel::Stable`] the registry's latest pointer is trusted when
/// it is a stable release; otherwise recent releases are scanned for the
/// highest admitted version. [`ReleaseChannel::Prerelease`] always scans.
pub fn select_latest_release<S>(source: &S, channel: ReleaseChannel) -> UpdateResult<Release>
where
    S: ReleaseSource + ?Sized,
{
    if channel == ReleaseChannel::Stable {
        let latest = source.latest_release()?;
        if channel.admits(&latest) {
            return Ok(latest);
        }
        debug!(
            tag = %latest.tag,
            "latest release is a prerelease; scanning for newest stable release"
        );
    }

    source
        .list_releases(RELEASE_SCAN_LIMIT)?
        .into_iter()
        .filter(|release| channel.admits(release))
        .max_by(|left, right| left.version().cmp(&right.version()))
        .ok_or_else(|| UpdateError::NoReleasesFound {
            repository: source.describe(),
        })
}
