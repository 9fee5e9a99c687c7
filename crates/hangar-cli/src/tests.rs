use super::*;
use crate::dispatch::Mode;
use crate::render::{render_stage_line, render_status_line, resolve_output_style, OutputStyle};
use crate::update_flows::{
    format_applied_lines, format_check_lines, format_release_lines, format_snapshot_lines,
    load_config, parse_confirmation, resolve_backup_path,
};
use chrono::{TimeZone, Utc};
use clap::error::ErrorKind;
use hangar_core::{Release, ReleaseChannel, Version};
use hangar_installer::{AppliedUpdate, ProgressEvent, Snapshot, UpdateOutcome, UpdateStage};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(args).expect("arguments must parse")
}

fn release(tag: &str, prerelease: bool) -> Release {
    Release {
        tag: tag.to_string(),
        title: format!("Hangar {tag}"),
        notes: String::new(),
        published_at: Some(
            Utc.with_ymd_and_hms(2026, 9, 30, 12, 0, 0)
                .single()
                .expect("valid timestamp"),
        ),
        prerelease,
        draft: false,
        assets: Vec::new(),
    }
}

fn snapshot(file_name: &str, size_bytes: u64) -> Snapshot {
    Snapshot {
        file_name: file_name.to_string(),
        path: Path::new("/srv/hangar/storage/backups").join(file_name),
        size_bytes,
        created_at: Utc
            .with_ymd_and_hms(2026, 10, 1, 8, 30, 0)
            .single()
            .expect("valid timestamp"),
    }
}

#[test]
fn default_invocation_applies() {
    let cli = parse(&["hangar-update"]);
    assert_eq!(cli.mode(), Mode::Apply);
    assert_eq!(cli.root, Path::new("."));
    assert!(!cli.force);
}

#[test]
fn mode_flags_select_operation() {
    assert_eq!(parse(&["hangar-update", "--check"]).mode(), Mode::Check);
    assert_eq!(
        parse(&["hangar-update", "--list-backups"]).mode(),
        Mode::ListBackups
    );
    assert_eq!(
        parse(&["hangar-update", "--restore", "backup-1.0.0-20261001-083000.zip"]).mode(),
        Mode::Restore("backup-1.0.0-20261001-083000.zip".into())
    );
    assert_eq!(
        parse(&["hangar-update", "--list-releases"]).mode(),
        Mode::ListReleases(10)
    );
    assert_eq!(
        parse(&["hangar-update", "--list-releases", "3"]).mode(),
        Mode::ListReleases(3)
    );
}

#[test]
fn mode_flags_are_mutually_exclusive() {
    let err = Cli::try_parse_from(["hangar-update", "--check", "--list-backups"])
        .expect_err("must reject two modes");
    assert_eq!(err.kind(), ErrorKind::ArgumentConflict);

    let err = Cli::try_parse_from(["hangar-update", "--check", "--tag", "v1.1.0"])
        .expect_err("tag only applies to updates");
    assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
}

#[test]
fn apply_flags_parse() {
    let cli = parse(&[
        "hangar-update",
        "--root",
        "/srv/hangar",
        "--repository",
        "hangar-ops/hangar",
        "--tag",
        "v1.1.0",
        "--force",
        "--prerelease",
        "-v",
    ]);
    assert_eq!(cli.mode(), Mode::Apply);
    assert_eq!(cli.root, Path::new("/srv/hangar"));
    assert_eq!(cli.repository.as_deref(), Some("hangar-ops/hangar"));
    assert_eq!(cli.tag.as_deref(), Some("v1.1.0"));
    assert!(cli.force && cli.prerelease && cli.verbose);
}

#[test]
fn log_filter_covers_every_crate() {
    let filter = default_log_filter(false);
    assert!(filter.contains("hangar_update=warn"));
    assert!(filter.contains("hangar_installer=warn"));
    assert!(default_log_filter(true).contains("hangar_registry=debug"));
}

#[test]
fn load_config_applies_overrides_over_file() {
    let temp = TempDir::new().expect("must create temp dir");
    fs::write(
        temp.path().join("hangar-update.toml"),
        "repository = \"hangar-ops/hangar\"\nretain_snapshots = 3\n",
    )
    .expect("must write config");

    let from_file = load_config(temp.path(), None, None, false).expect("must load");
    assert_eq!(from_file.repository.as_deref(), Some("hangar-ops/hangar"));
    assert_eq!(from_file.retain_snapshots, 3);
    assert_eq!(from_file.channel, ReleaseChannel::Stable);

    let overridden =
        load_config(temp.path(), None, Some("hangar-ops/hangar-fork"), true).expect("must load");
    assert_eq!(overridden.repository.as_deref(), Some("hangar-ops/hangar-fork"));
    assert_eq!(overridden.channel, ReleaseChannel::Prerelease);
    assert_eq!(overridden.retain_snapshots, 3);
}

#[test]
fn load_config_requires_explicit_file_to_exist() {
    let temp = TempDir::new().expect("must create temp dir");
    let missing = temp.path().join("custom.toml");
    assert!(load_config(temp.path(), Some(&missing), None, false).is_err());

    let defaults = load_config(temp.path(), None, None, false).expect("defaults must load");
    assert!(defaults.repository.is_none());
}

#[test]
fn load_config_rejects_malformed_repository_override() {
    let temp = TempDir::new().expect("must create temp dir");
    let err = load_config(temp.path(), None, Some("hangar"), false).expect_err("must fail");
    assert!(err.to_string().contains("owner/repo"));
}

#[test]
fn confirmation_accepts_only_yes() {
    assert!(parse_confirmation("y\n"));
    assert!(parse_confirmation(" YES "));
    assert!(!parse_confirmation("\n"));
    assert!(!parse_confirmation("no"));
    assert!(!parse_confirmation("yep"));
}

#[test]
fn backup_names_resolve_into_backup_dir() {
    let dir = Path::new("/srv/hangar/storage/backups");
    assert_eq!(
        resolve_backup_path(dir, Path::new("backup-1.0.0-20261001-083000.zip")),
        dir.join("backup-1.0.0-20261001-083000.zip")
    );
    assert_eq!(
        resolve_backup_path(dir, Path::new("/tmp/backup.zip")),
        Path::new("/tmp/backup.zip")
    );
    assert_eq!(
        resolve_backup_path(dir, Path::new("archive/backup.zip")),
        Path::new("archive/backup.zip")
    );
}

#[test]
fn resolve_output_style_uses_rich_only_on_colored_tty() {
    assert_eq!(resolve_output_style(true, false), OutputStyle::Rich);
    assert_eq!(resolve_output_style(true, true), OutputStyle::Plain);
    assert_eq!(resolve_output_style(false, false), OutputStyle::Plain);
}

#[test]
fn render_status_line_plain_is_unadorned() {
    assert_eq!(
        render_status_line(OutputStyle::Plain, "ok", "updated to 1.1.0"),
        "updated to 1.1.0"
    );
}

#[test]
fn render_status_line_rich_includes_ascii_badge() {
    assert_eq!(
        render_status_line(OutputStyle::Rich, "warn", "cache refresh skipped"),
        "[WARN] cache refresh skipped"
    );
}

#[test]
fn render_stage_line_plain_names_stage() {
    let event = ProgressEvent {
        stage: UpdateStage::RollingBack,
        message: "Restoring backup backup-1.0.0.zip".to_string(),
    };
    assert_eq!(
        render_stage_line(OutputStyle::Plain, &event),
        "rolling-back: Restoring backup backup-1.0.0.zip"
    );
    assert!(render_stage_line(OutputStyle::Rich, &event).contains("Restoring backup"));
}

#[test]
fn check_lines_include_release_only_when_available() {
    let available = UpdateOutcome::evaluate(Version::parse("1.0.0"), release("v1.1.0", false));
    let lines = format_check_lines(&available);
    assert_eq!(lines[0], "current version: 1.0.0");
    assert_eq!(lines[1], "latest version:  1.1.0");
    assert_eq!(
        lines[2],
        "release:         v1.1.0 (Hangar v1.1.0), published 2026-09-30"
    );

    let current = UpdateOutcome::evaluate(Version::parse("1.1.0"), release("v1.1.0", false));
    assert_eq!(format_check_lines(&current).len(), 2);
}

#[test]
fn release_lines_mark_prereleases() {
    let lines = format_release_lines(&[release("v1.2.0-rc.1", true), release("v1.1.0", false)]);
    assert!(lines[0].starts_with("v1.2.0-rc.1"));
    assert!(lines[0].ends_with("[prerelease]"));
    assert!(lines[1].contains("2026-09-30"));
    assert!(!lines[1].contains("prerelease"));
}

#[test]
fn snapshot_lines_show_name_size_and_time() {
    let lines = format_snapshot_lines(&[snapshot("backup-1.0.0-20261001-083000.zip", 2048)]);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("backup-1.0.0-20261001-083000.zip"));
    assert!(lines[0].contains("KiB"));
    assert!(lines[0].ends_with("2026-10-01 08:30:00 UTC"));
}

#[test]
fn applied_lines_summarize_update() {
    let applied = AppliedUpdate {
        previous: Version::parse("1.0.0"),
        installed: Version::parse("1.1.0"),
        release_tag: "v1.1.0".to_string(),
        snapshot: snapshot("backup-1.0.0-20261001-083000.zip", 4096),
        archive_url: "https://example.test/hangar-1.1.0.zip".to_string(),
        archive_bytes: 1_048_576,
        checksum_verified: true,
        files_copied: 412,
        preserved_skipped: 3,
        cache_warnings: Vec::new(),
        pruned_snapshots: 1,
    };
    let lines = format_applied_lines(&applied);
    assert_eq!(lines[0], "1.0.0 -> 1.1.0 (v1.1.0)");
    assert!(lines.iter().any(|line| line == "files copied: 412 (preserved paths skipped: 3)"));
    assert!(lines.iter().any(|line| line == "checksum: verified"));
    assert!(lines.iter().any(|line| line == "old backups pruned: 1"));
    assert!(lines
        .iter()
        .any(|line| line.ends_with("storage/backups/backup-1.0.0-20261001-083000.zip")));
}
