use std::cmp::Ordering;
use std::fmt;

use semver::Prerelease;

/// Reported when no local version marker exists. Ranks below every real release.
pub const DEV_PLACEHOLDER_VERSION: &str = "0.0.0-dev";

/// A release version as written in tags and the local `VERSION` marker.
///
/// Parsing is lenient: a leading `v`/`V` is dropped, missing `minor`/`patch`
/// components count as zero and build metadata is ignored. Ordering follows
/// semver precedence over the normalized form, so a release without a
/// prerelease suffix outranks any prerelease of the same `major.minor.patch`.
#[derive(Debug, Clone)]
pub struct Version {
    raw: String,
    key: semver::Version,
}

impl Version {
    pub fn parse(input: &str) -> Self {
        let raw = parse_version(input);
        let key = precedence_key(&raw);
        Self { raw, key }
    }

    pub fn dev_placeholder() -> Self {
        Self::parse(DEV_PLACEHOLDER_VERSION)
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_prerelease(&self) -> bool {
        !self.key.pre.is_empty()
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Strips a single leading `v`/`V` and surrounding whitespace; everything else
/// (including prerelease suffixes) is kept as written.
pub fn parse_version(tag: &str) -> String {
    let trimmed = tag.trim();
    trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed)
        .to_string()
}

pub fn compare_versions(left: &str, right: &str) -> Ordering {
    Version::parse(left).cmp(&Version::parse(right))
}

fn precedence_key(normalized: &str) -> semver::Version {
    let without_build = normalized.split('+').next().unwrap_or(normalized);
    let (core, pre) = match without_build.split_once('-') {
        Some((core, pre)) => (core, Some(pre)),
        None => (without_build, None),
    };

    let mut numbers = core.split('.').map(leading_number);
    let major = numbers.next().unwrap_or(0);
    let minor = numbers.next().unwrap_or(0);
    let patch = numbers.next().unwrap_or(0);

    let mut key = semver::Version::new(major, minor, patch);
    if let Some(pre) = pre {
        key.pre = sanitize_prerelease(pre);
    }
    key
}

fn leading_number(component: &str) -> u64 {
    let digits: String = component
        .trim()
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    if digits.is_empty() {
        return 0;
    }
    digits.parse().unwrap_or(u64::MAX)
}

// semver rejects empty identifiers, characters outside [0-9A-Za-z-] and
// numeric identifiers with leading zeros. Map those onto valid identifiers so
// every input still lands on a prerelease (never on the stable slot).
fn sanitize_prerelease(pre: &str) -> Prerelease {
    let identifiers = pre
        .split('.')
        .filter(|identifier| !identifier.is_empty())
        .map(|identifier| {
            let cleaned: String = identifier
                .chars()
                .map(|ch| {
                    if ch.is_ascii_alphanumeric() || ch == '-' {
                        ch
                    } else {
                        '-'
                    }
                })
                .collect();
            if cleaned.chars().all(|ch| ch.is_ascii_digit()) {
                let stripped = cleaned.trim_start_matches('0');
                if stripped.is_empty() {
                    "0".to_string()
                } else {
                    stripped.to_string()
                }
            } else {
                cleaned
            }
        })
        .collect::<Vec<_>>();

    let joined = if identifiers.is_empty() {
        "0".to_string()
    } else {
        identifiers.join(".")
    };

    Prerelease::new(&joined)
        .or_else(|_| Prerelease::new("0"))
        .unwrap_or(Prerelease::EMPTY)
}
