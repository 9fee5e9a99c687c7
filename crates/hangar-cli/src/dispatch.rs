use std::path::PathBuf;

use anyhow::Result;
use hangar_installer::InstallLayout;

use crate::render::TerminalRenderer;
use crate::update_flows::{
    apply_update, build_orchestrator, build_source, check_update, list_backups, list_releases,
    load_config, restore_backup,
};
use crate::Cli;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Mode {
    Check,
    Apply,
    ListBackups,
    Restore(PathBuf),
    ListReleases(usize),
}

impl Cli {
    pub(crate) fn mode(&self) -> Mode {
        if self.check {
            Mode::Check
        } else if self.list_backups {
            Mode::ListBackups
        } else if let Some(path) = &self.restore {
            Mode::Restore(path.clone())
        } else if let Some(limit) = self.list_releases {
            Mode::ListReleases(limit)
        } else {
            Mode::Apply
        }
    }
}

pub(crate) fn run(cli: Cli) -> Result<()> {
    let renderer = TerminalRenderer::current();
    let config = load_config(
        &cli.root,
        cli.config.as_deref(),
        cli.repository.as_deref(),
        cli.prerelease,
    )?;
    let layout = InstallLayout::from_config(&cli.root, &config);

    match cli.mode() {
        Mode::ListBackups => list_backups(renderer, &layout, &config),
        Mode::Restore(path) => restore_backup(renderer, &layout, &config, &path, cli.force),
        Mode::ListReleases(limit) => {
            let source = build_source(&config, cli.token)?;
            list_releases(renderer, &source, limit)
        }
        Mode::Check => {
            let updater = build_orchestrator(layout, config, cli.token)?;
            check_update(renderer, &updater)
        }
        Mode::Apply => {
            let updater = build_orchestrator(layout, config, cli.token)?;
            apply_update(renderer, &updater, cli.tag.as_deref(), cli.force)
        }
    }
}
