use std::time::Duration;

use hangar_core::{ArchiveFormat, Release, RepositoryId, UpdateError, UpdateResult};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use tracing::debug;

use crate::api_types::{parse_release_json, parse_release_list_json};
use crate::source::ReleaseSource;

pub const DEFAULT_API_BASE: &str = "https://api.github.com";
pub const DEFAULT_WEB_BASE: &str = "https://github.com";

const API_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_PER_PAGE: usize = 100;

#[derive(Debug, Clone)]
pub struct GitHubReleaseSource {
    repository: RepositoryId,
    api_base: String,
    web_base: String,
    token: Option<String>,
    client: Client,
}

impl GitHubReleaseSource {
    pub fn new(repository: RepositoryId) -> UpdateResult<Self> {
        Self::with_bases(repository, DEFAULT_API_BASE, DEFAULT_WEB_BASE)
    }

    pub fn with_bases(
        repository: RepositoryId,
        api_base: impl Into<String>,
        web_base: impl Into<String>,
    ) -> UpdateResult<Self> {
        let client = Client::builder()
            .user_agent(user_agent())
            .timeout(API_TIMEOUT)
            .build()
            .map_err(|err| {
                UpdateError::NetworkError(format!("failed to build HTTP client: {err}"))
            })?;

        Ok(Self {
            repository,
            api_base: trim_base(api_base.into()),
            web_base: trim_base(web_base.into()),
            token: None,
            client,
        })
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|value| !value.trim().is_empty());
        self
    }

    pub fn latest_release_url(&self) -> String {
        format!("{}/releases/latest", self.repo_api_root())
    }

    pub fn release_by_tag_url(&self, tag: &str) -> String {
        format!("{}/releases/tags/{tag}", self.repo_api_root())
    }

    pub fn list_releases_url(&self, per_page: usize, page: usize) -> String {
        format!(
            "{}/releases?per_page={}&page={page}",
            self.repo_api_root(),
            per_page.clamp(1, MAX_PER_PAGE)
        )
    }

    pub fn source_archive_url(&self, tag: &str, format: ArchiveFormat) -> String {
        format!(
            "{}/{}/{}/archive/refs/tags/{tag}.{}",
            self.web_base,
            self.repository.owner(),
            self.repository.name(),
            format.extension()
        )
    }

    fn repo_api_root(&self) -> String {
        format!(
            "{}/repos/{}/{}",
            self.api_base,
            self.repository.owner(),
            self.repository.name()
        )
    }

    /// `Ok(None)` for a 404; any other non-success status is a network error.
    fn get_json(&self, url: &str) -> UpdateResult<Option<String>> {
        debug!(url, "querying release registry");
        let mut request = self
            .client
            .get(url)
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .map_err(|err| UpdateError::NetworkError(format!("GET {url} failed: {err}")))?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body = response.text().map_err(|err| {
            UpdateError::NetworkError(format!("GET {url}: failed reading response body: {err}"))
        })?;
        if !status.is_success() {
            return Err(UpdateError::NetworkError(format!(
                "GET {url} returned status {status}: {}",
                body_excerpt(&body)
            )));
        }
        Ok(Some(body))
    }

    fn fetch_single(&self, url: &str) -> UpdateResult<Release> {
        let release = match self.get_json(url)? {
            Some(body) => parse_release_json(&body)?,
            None => None,
        };
        match release {
            Some(release) if !release.draft => Ok(release),
            _ => Err(UpdateError::NoReleasesFound {
                repository: self.repository.to_string(),
            }),
        }
    }
}

impl ReleaseSource for GitHubReleaseSource {
    fn describe(&self) -> String {
        self.repository.to_string()
    }

    fn latest_release(&self) -> UpdateResult<Release> {
        self.fetch_single(&self.latest_release_url())
    }

    fn release_by_tag(&self, tag: &str) -> UpdateResult<Release> {
        self.fetch_single(&self.release_by_tag_url(tag))
    }

    fn list_releases(&self, limit: usize) -> UpdateResult<Vec<Release>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        // The API caps page size, so larger limits walk pages until the
        // registry runs out or enough non-draft releases are collected.
        let per_page = limit.min(MAX_PER_PAGE);
        let mut releases = Vec::new();
        for page in 1.. {
            let Some(body) = self.get_json(&self.list_releases_url(per_page, page))? else {
                break;
            };
            let batch = parse_release_list_json(&body)?;
            let exhausted = batch.len() < per_page;
            releases.extend(batch.into_iter().filter(|release| !release.draft));
            if exhausted || releases.len() >= limit {
                break;
            }
        }
        releases.truncate(limit);
        Ok(releases)
    }

    fn download_url(&self, release: &Release, format: ArchiveFormat) -> String {
        match release.find_archive_asset(format) {
            Some(asset) => asset.download_url.clone(),
            None => self.source_archive_url(&release.tag, format),
        }
    }
}

fn user_agent() -> String {
    format!("hangar-update/{}", env!("CARGO_PKG_VERSION"))
}

fn trim_base(base: String) -> String {
    base.trim_end_matches('/').to_string()
}

fn body_excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= 200 {
        return trimmed.to_string();
    }
    let head: String = trimmed.chars().take(200).collect();
    format!("{head}...")
}
