use super::*;
use hangar_core::{ArchiveFormat, Release, ReleaseAsset, ReleaseChannel, RepositoryId, UpdateError};
use std::cell::Cell;

const LATEST_JSON: &str = r#"{
  "tag_name": "v1.4.0",
  "name": "Hangar 1.4.0",
  "body": "Adds fleet maintenance scheduling.",
  "draft": false,
  "prerelease": false,
  "published_at": "2026-09-30T12:00:00Z",
  "assets": [
    {
      "name": "hangar-1.4.0.zip",
      "browser_download_url": "https://example.test/download/hangar-1.4.0.zip",
      "size": 52428800
    },
    {
      "name": "hangar-1.4.0.zip.sha256",
      "browser_download_url": "https://example.test/download/hangar-1.4.0.zip.sha256",
      "size": 64
    }
  ]
}"#;

fn test_source() -> GitHubReleaseSource {
    let repository: RepositoryId = "hangar-ops/hangar".parse().expect("valid repository");
    GitHubReleaseSource::with_bases(
        repository,
        "https://api.example.test/",
        "https://code.example.test",
    )
    .expect("must build client")
}

fn release(tag: &str, prerelease: bool) -> Release {
    Release {
        tag: tag.to_string(),
        title: tag.to_string(),
        notes: String::new(),
        published_at: None,
        prerelease,
        draft: false,
        assets: Vec::new(),
    }
}

struct FakeSource {
    latest: Option<Release>,
    listed: Vec<Release>,
    list_calls: Cell<usize>,
}

impl FakeSource {
    fn new(latest: Option<Release>, listed: Vec<Release>) -> Self {
        Self {
            latest,
            listed,
            list_calls: Cell::new(0),
        }
    }
}

impl ReleaseSource for FakeSource {
    fn describe(&self) -> String {
        "fake/repo".to_string()
    }

    fn latest_release(&self) -> hangar_core::UpdateResult<Release> {
        self.latest
            .clone()
            .ok_or_else(|| UpdateError::NoReleasesFound {
                repository: self.describe(),
            })
    }

    fn release_by_tag(&self, tag: &str) -> hangar_core::UpdateResult<Release> {
        self.listed
            .iter()
            .find(|release| release.tag == tag)
            .cloned()
            .ok_or_else(|| UpdateError::NoReleasesFound {
                repository: self.describe(),
            })
    }

    fn list_releases(&self, limit: usize) -> hangar_core::UpdateResult<Vec<Release>> {
        self.list_calls.set(self.list_calls.get() + 1);
        Ok(self.listed.iter().take(limit).cloned().collect())
    }

    fn download_url(&self, release: &Release, format: ArchiveFormat) -> String {
        format!("https://fake.test/{}.{}", release.tag, format.extension())
    }
}

#[test]
fn parse_release_json_maps_registry_fields() {
    let release = parse_release_json(LATEST_JSON)
        .expect("must parse")
        .expect("must contain release");

    assert_eq!(release.tag, "v1.4.0");
    assert_eq!(release.title, "Hangar 1.4.0");
    assert_eq!(release.notes, "Adds fleet maintenance scheduling.");
    assert_eq!(
        release
            .published_at
            .map(|value| value.to_rfc3339())
            .as_deref(),
        Some("2026-09-30T12:00:00+00:00")
    );
    assert_eq!(release.assets.len(), 2);
    assert_eq!(
        release.assets[0].download_url,
        "https://example.test/download/hangar-1.4.0.zip"
    );
    assert_eq!(release.version().as_str(), "1.4.0");
}

#[test]
fn parse_release_json_tolerates_null_name_and_body() {
    let raw = r#"{"tag_name":"v2.0.0","name":null,"body":null,"published_at":null,"assets":[]}"#;
    let release = parse_release_json(raw)
        .expect("must parse")
        .expect("must contain release");
    assert_eq!(release.title, "v2.0.0");
    assert!(release.notes.is_empty());
    assert!(release.published_at.is_none());
}

#[test]
fn parse_release_json_treats_empty_body_as_no_release() {
    assert!(parse_release_json("").expect("must parse").is_none());
    assert!(parse_release_json("  null ").expect("must parse").is_none());
    assert!(parse_release_json("{}").expect("must parse").is_none());
}

#[test]
fn parse_release_json_reports_malformed_payload() {
    let err = parse_release_json("{\"tag_name\": 5}").expect_err("must reject");
    assert!(matches!(err, UpdateError::NetworkError(_)));
    assert!(err.to_string().contains("failed parsing release metadata"));
}

#[test]
fn parse_release_list_json_keeps_registry_order() {
    let raw = r#"[
      {"tag_name":"v1.1.0-beta","prerelease":true,"assets":[]},
      {"tag_name":"v1.0.0","assets":[]}
    ]"#;
    let releases = parse_release_list_json(raw).expect("must parse");
    let tags = releases
        .iter()
        .map(|release| release.tag.as_str())
        .collect::<Vec<_>>();
    assert_eq!(tags, vec!["v1.1.0-beta", "v1.0.0"]);
    assert!(releases[0].prerelease);
    assert!(parse_release_list_json("[]").expect("must parse").is_empty());
}

#[test]
fn endpoint_urls_follow_registry_layout() {
    let source = test_source();
    assert_eq!(
        source.latest_release_url(),
        "https://api.example.test/repos/hangar-ops/hangar/releases/latest"
    );
    assert_eq!(
        source.release_by_tag_url("v1.2.3"),
        "https://api.example.test/repos/hangar-ops/hangar/releases/tags/v1.2.3"
    );
    assert_eq!(
        source.list_releases_url(500, 3),
        "https://api.example.test/repos/hangar-ops/hangar/releases?per_page=100&page=3"
    );
}

#[test]
fn download_url_prefers_matching_asset() {
    let source = test_source();
    let release = parse_release_json(LATEST_JSON)
        .expect("must parse")
        .expect("must contain release");

    assert_eq!(
        source.download_url(&release, ArchiveFormat::Zip),
        "https://example.test/download/hangar-1.4.0.zip"
    );
}

#[test]
fn download_url_falls_back_to_source_archive() {
    let source = test_source();
    let mut release = release("v1.4.0", false);
    release.assets.push(ReleaseAsset {
        name: "hangar-1.4.0.zip".to_string(),
        download_url: "https://example.test/download/hangar-1.4.0.zip".to_string(),
        size: 10,
    });

    assert_eq!(
        source.download_url(&release, ArchiveFormat::TarGz),
        "https://code.example.test/hangar-ops/hangar/archive/refs/tags/v1.4.0.tar.gz"
    );
}

#[test]
fn stable_channel_uses_latest_pointer_when_stable() {
    let source = FakeSource::new(Some(release("v1.0.0", false)), Vec::new());
    let selected =
        select_latest_release(&source, ReleaseChannel::Stable).expect("must select release");
    assert_eq!(selected.tag, "v1.0.0");
    assert_eq!(source.list_calls.get(), 0);
}

#[test]
fn stable_channel_skips_unflagged_prerelease_latest() {
    let source = FakeSource::new(
        Some(release("v1.1.0-beta", false)),
        vec![release("v1.1.0-beta", false), release("v1.0.0", false)],
    );
    let selected =
        select_latest_release(&source, ReleaseChannel::Stable).expect("must select release");
    assert_eq!(selected.tag, "v1.0.0");
    assert_eq!(source.list_calls.get(), 1);
}

#[test]
fn prerelease_channel_picks_highest_version() {
    let source = FakeSource::new(
        Some(release("v1.0.0", false)),
        vec![
            release("v1.0.1", false),
            release("v1.1.0-beta", true),
            release("v1.0.0", false),
        ],
    );
    let selected = select_latest_release(&source, ReleaseChannel::Prerelease)
        .expect("must select release");
    assert_eq!(selected.tag, "v1.1.0-beta");
}

#[test]
fn selection_reports_no_releases_when_nothing_admitted() {
    let source = FakeSource::new(
        Some(release("v2.0.0-rc.1", true)),
        vec![release("v2.0.0-rc.1", true)],
    );
    let err = select_latest_release(&source, ReleaseChannel::Stable).expect_err("must fail");
    assert!(matches!(err, UpdateError::NoReleasesFound { repository } if repository == "fake/repo"));
}

fn start_http_server(responses: Vec<(u16, String)>) -> (String, std::thread::JoinHandle<Vec<String>>) {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("must bind test server");
    let address = listener
        .local_addr()
        .expect("must read test server address");
    let handle = std::thread::spawn(move || {
        let mut requests = Vec::new();
        for (status, body) in responses {
            let (mut stream, _) = listener.accept().expect("must accept test client");
            let mut request_buffer = [0_u8; 4096];
            let read = std::io::Read::read(&mut stream, &mut request_buffer).unwrap_or(0);
            requests.push(String::from_utf8_lossy(&request_buffer[..read]).into_owned());

            let reason = match status {
                200 => "OK",
                404 => "Not Found",
                _ => "Internal Server Error",
            };
            std::io::Write::write_all(
                &mut stream,
                format!(
                    "HTTP/1.1 {status} {reason}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                )
                .as_bytes(),
            )
            .expect("must write test response");
            std::io::Write::flush(&mut stream).expect("must flush test response");
        }
        requests
    });

    (format!("http://{address}"), handle)
}

fn source_at(api_base: &str) -> GitHubReleaseSource {
    let repository: RepositoryId = "hangar-ops/hangar".parse().expect("valid repository");
    GitHubReleaseSource::with_bases(repository, api_base, "https://code.example.test")
        .expect("must build client")
}

fn request_line(request: &str) -> &str {
    request.lines().next().unwrap_or_default()
}

fn release_page_json(patches: std::ops::Range<usize>) -> String {
    let entries = patches
        .map(|patch| {
            format!(r#"{{"tag_name": "v1.0.{patch}", "name": "Hangar 1.0.{patch}", "draft": false}}"#)
        })
        .collect::<Vec<_>>();
    format!("[{}]", entries.join(","))
}

#[test]
fn latest_release_fetches_registry_endpoint() {
    let (base, server) = start_http_server(vec![(200, LATEST_JSON.to_string())]);
    let source = source_at(&base).with_token(Some("secret-token".to_string()));

    let release = source.latest_release().expect("must fetch latest release");
    assert_eq!(release.tag, "v1.4.0");
    assert_eq!(release.assets.len(), 2);

    let requests = server.join().expect("server thread must finish");
    assert_eq!(
        request_line(&requests[0]),
        "GET /repos/hangar-ops/hangar/releases/latest HTTP/1.1"
    );
    let lowered = requests[0].to_ascii_lowercase();
    assert!(lowered.contains("user-agent: hangar-update/"));
    assert!(lowered.contains("authorization: bearer secret-token"));
}

#[test]
fn missing_release_maps_to_no_releases_found() {
    let (base, server) = start_http_server(vec![(404, r#"{"message": "Not Found"}"#.to_string())]);
    let err = source_at(&base)
        .release_by_tag("v9.9.9")
        .expect_err("404 must fail");
    assert!(matches!(
        err,
        UpdateError::NoReleasesFound { ref repository } if repository == "hangar-ops/hangar"
    ));

    let requests = server.join().expect("server thread must finish");
    assert_eq!(
        request_line(&requests[0]),
        "GET /repos/hangar-ops/hangar/releases/tags/v9.9.9 HTTP/1.1"
    );
}

#[test]
fn empty_success_body_maps_to_no_releases_found() {
    let (base, server) = start_http_server(vec![(200, String::new())]);
    let err = source_at(&base)
        .latest_release()
        .expect_err("empty body must fail");
    assert!(matches!(err, UpdateError::NoReleasesFound { .. }));
    server.join().expect("server thread must finish");
}

#[test]
fn server_error_maps_to_network_error_with_status_and_body() {
    let (base, server) = start_http_server(vec![(500, "boom".to_string())]);
    let err = source_at(&base)
        .latest_release()
        .expect_err("500 must fail");
    let reason = match err {
        UpdateError::NetworkError(reason) => reason,
        other => panic!("expected a network error, got {other:?}"),
    };
    assert!(reason.contains("500"), "reason: {reason}");
    assert!(reason.contains("boom"), "reason: {reason}");
    server.join().expect("server thread must finish");
}

#[test]
fn unreachable_registry_maps_to_network_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("must bind test port");
    let address = listener.local_addr().expect("must read test port");
    drop(listener);

    let err = source_at(&format!("http://{address}"))
        .latest_release()
        .expect_err("closed port must fail");
    assert!(matches!(err, UpdateError::NetworkError(_)));
}

#[test]
fn list_releases_walks_pages_past_the_page_size_cap() {
    let (base, server) = start_http_server(vec![
        (200, release_page_json(0..100)),
        (200, release_page_json(100..150)),
    ]);

    let releases = source_at(&base)
        .list_releases(200)
        .expect("must list releases");
    assert_eq!(releases.len(), 150);
    assert_eq!(releases[0].tag, "v1.0.0");
    assert_eq!(releases[149].tag, "v1.0.149");

    let requests = server.join().expect("server thread must finish");
    assert_eq!(
        requests.iter().map(|request| request_line(request)).collect::<Vec<_>>(),
        vec![
            "GET /repos/hangar-ops/hangar/releases?per_page=100&page=1 HTTP/1.1",
            "GET /repos/hangar-ops/hangar/releases?per_page=100&page=2 HTTP/1.1",
        ]
    );
}

#[test]
fn list_releases_stops_once_limit_is_reached() {
    let (base, server) = start_http_server(vec![(
        200,
        r#"[{"tag_name": "v1.2.0", "draft": true}, {"tag_name": "v1.1.0"}, {"tag_name": "v1.0.0"}]"#
            .to_string(),
    )]);

    let releases = source_at(&base).list_releases(2).expect("must list releases");
    assert_eq!(
        releases.iter().map(|release| release.tag.as_str()).collect::<Vec<_>>(),
        vec!["v1.1.0", "v1.0.0"]
    );

    let requests = server.join().expect("server thread must finish");
    assert_eq!(requests.len(), 1);
    assert_eq!(
        request_line(&requests[0]),
        "GET /repos/hangar-ops/hangar/releases?per_page=2&page=1 HTTP/1.1"
    );
}
