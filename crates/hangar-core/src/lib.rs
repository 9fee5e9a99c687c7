mod archive;
mod error;
mod release;
mod repository;
mod version;

pub use archive::ArchiveFormat;
pub use error::{UpdateError, UpdateResult};
pub use release::{Release, ReleaseAsset, ReleaseChannel};
pub use repository::RepositoryId;
pub use version::{compare_versions, parse_version, Version, DEV_PLACEHOLDER_VERSION};
