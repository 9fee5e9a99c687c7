use chrono::{DateTime, Utc};
use hangar_core::{Release, ReleaseAsset, UpdateError, UpdateResult};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ApiRelease {
    tag_name: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    draft: bool,
    #[serde(default)]
    prerelease: bool,
    #[serde(default)]
    assets: Vec<ApiAsset>,
}

#[derive(Debug, Deserialize)]
struct ApiAsset {
    name: String,
    browser_download_url: String,
    #[serde(default)]
    size: u64,
}

impl From<ApiRelease> for Release {
    fn from(api: ApiRelease) -> Self {
        Self {
            title: api
                .name
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| api.tag_name.clone()),
            tag: api.tag_name,
            notes: api.body.unwrap_or_default(),
            published_at: api.published_at,
            prerelease: api.prerelease,
            draft: api.draft,
            assets: api
                .assets
                .into_iter()
                .map(|asset| ReleaseAsset {
                    name: asset.name,
                    download_url: asset.browser_download_url,
                    size: asset.size,
                })
                .collect(),
        }
    }
}

pub fn parse_release_json(body: &str) -> UpdateResult<Option<Release>> {
    let trimmed = body.trim();
    if trimmed.is_empty() || trimmed == "null" || trimmed == "{}" {
        return Ok(None);
    }

    let api: ApiRelease = serde_json::from_str(trimmed).map_err(|err| {
        UpdateError::NetworkError(format!("failed parsing release metadata: {err}"))
    })?;
    if api.tag_name.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(api.into()))
}

pub fn parse_release_list_json(body: &str) -> UpdateResult<Vec<Release>> {
    let trimmed = body.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }

    let api: Vec<ApiRelease> = serde_json::from_str(trimmed).map_err(|err| {
        UpdateError::NetworkError(format!("failed parsing release list: {err}"))
    })?;
    Ok(api
        .into_iter()
        .filter(|release| !release.tag_name.trim().is_empty())
        .map(Release::from)
        .collect())
}
