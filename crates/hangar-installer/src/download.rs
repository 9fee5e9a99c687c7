use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use hangar_core::{Release, ReleaseAsset, UpdateError, UpdateResult};
use reqwest::blocking::Client;
use tracing::debug;

const CHECKSUM_LISTINGS: &[&str] = &["SHA256SUMS", "sha256sums.txt", "checksums.txt"];

pub trait Downloader {
    fn download(&self, url: &str, destination: &Path) -> UpdateResult<u64>;
}

#[derive(Debug, Clone)]
pub struct HttpDownloader {
    client: Client,
}

impl HttpDownloader {
    pub fn new(timeout: Duration) -> UpdateResult<Self> {
        let client = Client::builder()
            .user_agent(format!("hangar-update/{}", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|err| {
                UpdateError::NetworkError(format!("failed to build HTTP client: {err}"))
            })?;
        Ok(Self { client })
    }
}

impl Downloader for HttpDownloader {
    fn download(&self, url: &str, destination: &Path) -> UpdateResult<u64> {
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                UpdateError::download(url, format!("failed to create {}: {err}", parent.display()))
            })?;
        }

        debug!(url, destination = %destination.display(), "downloading");
        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|err| UpdateError::download(url, err))?;
        let status = response.status();
        if !status.is_success() {
            return Err(UpdateError::download(
                url,
                format!("server returned status {status}"),
            ));
        }

        let part_path = destination.with_extension("part");
        let result = (|| -> UpdateResult<u64> {
            let file = File::create(&part_path).map_err(|err| {
                UpdateError::download(url, format!("failed to create {}: {err}", part_path.display()))
            })?;
            let mut writer = BufWriter::new(file);
            let written = response
                .copy_to(&mut writer)
                .map_err(|err| UpdateError::download(url, format!("transfer interrupted: {err}")))?;
            writer
                .flush()
                .map_err(|err| UpdateError::download(url, format!("failed to flush: {err}")))?;
            Ok(written)
        })();

        let written = match result {
            Ok(written) => written,
            Err(err) => {
                let _ = fs::remove_file(&part_path);
                return Err(err);
            }
        };

        fs::rename(&part_path, destination).map_err(|err| {
            let _ = fs::remove_file(&part_path);
            UpdateError::download(
                url,
                format!("failed to move download into {}: {err}", destination.display()),
            )
        })?;
        Ok(written)
    }
}

pub fn validate_downloaded_archive(path: &Path, url: &str, min_bytes: u64) -> UpdateResult<u64> {
    let size = fs::metadata(path)
        .map_err(|err| {
            UpdateError::download(url, format!("downloaded file missing at {}: {err}", path.display()))
        })?
        .len();

    if size == 0 {
        return Err(UpdateError::download(url, "downloaded file is empty"));
    }
    if size < min_bytes {
        return Err(UpdateError::download(
            url,
            format!(
                "downloaded file is implausibly small ({size} bytes, expected at least {min_bytes})"
            ),
        ));
    }
    Ok(size)
}

pub fn checksum_asset_for<'a>(release: &'a Release, asset: &ReleaseAsset) -> Option<&'a ReleaseAsset> {
    let sidecar = format!("{}.sha256", asset.name);
    release.find_asset(&sidecar).or_else(|| {
        CHECKSUM_LISTINGS
            .iter()
            .find_map(|listing| release.find_asset(listing))
    })
}
