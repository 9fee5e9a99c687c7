use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::archive::ArchiveFormat;
use crate::version::Version;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseAsset {
    pub name: String,
    pub download_url: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub tag: String,
    pub title: String,
    pub notes: String,
    pub published_at: Option<DateTime<Utc>>,
    pub prerelease: bool,
    pub draft: bool,
    pub assets: Vec<ReleaseAsset>,
}

impl Release {
    pub fn version(&self) -> Version {
        Version::parse(&self.tag)
    }

    /// Flagged as a prerelease by the registry, or tagged with a prerelease suffix.
    pub fn is_prerelease(&self) -> bool {
        self.prerelease || self.version().is_prerelease()
    }

    pub fn find_archive_asset(&self, format: ArchiveFormat) -> Option<&ReleaseAsset> {
        self.assets
            .iter()
            .find(|asset| format.matches_name(&asset.name))
    }

    pub fn find_asset(&self, name: &str) -> Option<&ReleaseAsset> {
        self.assets.iter().find(|asset| asset.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseChannel {
    #[default]
    Stable,
    Prerelease,
}

impl ReleaseChannel {
    pub fn admits(self, release: &Release) -> bool {
        if release.draft {
            return false;
        }
        match self {
            Self::Stable => !release.is_prerelease(),
            Self::Prerelease => true,
        }
    }
}
