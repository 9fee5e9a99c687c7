use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use sha2::{Digest, Sha256};

fn sha256_hex_reader<R: Read>(mut reader: R) -> Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = [0_u8; 64 * 1024];
    loop {
        let read = reader
            .read(&mut buffer)
            .context("failed reading payload for sha256")?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

pub fn sha256_hex_file(path: &Path) -> Result<String> {
    let file =
        File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    sha256_hex_reader(BufReader::new(file))
        .with_context(|| format!("failed hashing {}", path.display()))
}

/// Returns `Ok(Some(actual))` when the digest does not match, `Ok(None)` on a match.
pub fn verify_sha256_file(path: &Path, expected_hex: &str) -> Result<Option<String>> {
    let expected = normalize_digest(expected_hex)?;
    let actual = sha256_hex_file(path)?;
    if actual == expected {
        Ok(None)
    } else {
        Ok(Some(actual))
    }
}

/// Looks up the digest for `file_name` in checksum file content.
///
/// Accepts both a bare digest (`<name>.sha256` assets) and the coreutils
/// `sha256sum` listing format (`<digest>  <name>` or `<digest> *<name>`).
pub fn digest_for_file_name(content: &str, file_name: &str) -> Option<String> {
    let lines = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect::<Vec<_>>();

    for line in &lines {
        let mut parts = line.split_whitespace();
        let Some(digest) = parts.next() else {
            continue;
        };
        match parts.next() {
            Some(name) => {
                let name = name.trim_start_matches('*');
                let base = name.rsplit('/').next().unwrap_or(name);
                if base == file_name {
                    return normalize_digest(digest).ok();
                }
            }
            None if lines.len() == 1 => return normalize_digest(digest).ok(),
            None => {}
        }
    }

    None
}

fn normalize_digest(value: &str) -> Result<String> {
    let normalized = value.trim().to_ascii_lowercase();
    if normalized.len() != 64 || !normalized.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return Err(anyhow!(
            "invalid sha256 digest '{value}': expected 64 hex characters"
        ));
    }
    Ok(normalized)
}
