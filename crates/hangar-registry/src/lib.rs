mod api_types;
mod github;
mod source;

pub use api_types::{parse_release_json, parse_release_list_json};
pub use github::{GitHubReleaseSource, DEFAULT_API_BASE, DEFAULT_WEB_BASE};
pub use source::{select_latest_release, ReleaseSource, RELEASE_SCAN_LIMIT};

#[cfg(test)]
mod tests;
