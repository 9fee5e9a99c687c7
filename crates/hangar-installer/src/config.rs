use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use hangar_core::{ArchiveFormat, ReleaseChannel, RepositoryId, UpdateError, UpdateResult};
use hangar_registry::{DEFAULT_API_BASE, DEFAULT_WEB_BASE};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "hangar-update.toml";
pub const DEFAULT_MIN_FREE_BYTES: u64 = 100 * 1024 * 1024;
pub const DEFAULT_MIN_ARCHIVE_BYTES: u64 = 1024;
pub const DEFAULT_RETAIN_SNAPSHOTS: usize = 5;
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandConfig {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|arg| (*arg).to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyInstallerConfig {
    pub program: String,
    #[serde(default)]
    pub candidates: Vec<PathBuf>,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for DependencyInstallerConfig {
    fn default() -> Self {
        Self {
            program: "composer".to_string(),
            candidates: vec![
                PathBuf::from("/usr/local/bin/composer"),
                PathBuf::from("/usr/bin/composer"),
                PathBuf::from("/opt/homebrew/bin/composer"),
                PathBuf::from("composer.phar"),
            ],
            args: ["install", "--no-dev", "--optimize-autoloader", "--no-interaction"]
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UpdaterConfig {
    pub repository: Option<String>,
    pub api_base: String,
    pub web_base: String,
    pub archive_format: ArchiveFormat,
    pub channel: ReleaseChannel,
    pub min_free_bytes: u64,
    pub min_archive_bytes: u64,
    pub retain_snapshots: usize,
    pub download_timeout_secs: u64,
    pub snapshot_dir: PathBuf,
    pub scratch_dir: PathBuf,
    pub preserved_paths: Vec<String>,
    pub snapshot_excludes: Vec<String>,
    pub root_markers: Vec<String>,
    pub dependencies: DependencyInstallerConfig,
    pub migrations: CommandConfig,
    pub cache_commands: Vec<CommandConfig>,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            repository: None,
            api_base: DEFAULT_API_BASE.to_string(),
            web_base: DEFAULT_WEB_BASE.to_string(),
            archive_format: ArchiveFormat::Zip,
            channel: ReleaseChannel::Stable,
            min_free_bytes: DEFAULT_MIN_FREE_BYTES,
            min_archive_bytes: DEFAULT_MIN_ARCHIVE_BYTES,
            retain_snapshots: DEFAULT_RETAIN_SNAPSHOTS,
            download_timeout_secs: DEFAULT_DOWNLOAD_TIMEOUT_SECS,
            snapshot_dir: PathBuf::from("storage/backups"),
            scratch_dir: PathBuf::from("storage/updates"),
            preserved_paths: [".env", "storage/app", "storage/logs", "storage/installed"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            snapshot_excludes: ["vendor", "node_modules", "bootstrap/cache", "storage/framework"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            root_markers: ["composer.json", "artisan"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            dependencies: DependencyInstallerConfig::default(),
            migrations: CommandConfig::new("php", &["artisan", "migrate", "--force"]),
            cache_commands: vec![
                CommandConfig::new("php", &["artisan", "optimize:clear"]),
                CommandConfig::new("php", &["artisan", "config:cache"]),
                CommandConfig::new("php", &["artisan", "route:cache"]),
                CommandConfig::new("php", &["artisan", "view:cache"]),
            ],
        }
    }
}

impl UpdaterConfig {
    pub fn from_toml_str(content: &str) -> UpdateResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|err| UpdateError::Config(format!("failed parsing config: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> UpdateResult<Self> {
        let content = fs::read_to_string(path).map_err(|err| {
            UpdateError::Config(format!("failed reading {}: {err}", path.display()))
        })?;
        Self::from_toml_str(&content)
            .map_err(|err| UpdateError::Config(format!("{}: {err}", path.display())))
    }

    pub fn load_or_default(path: &Path) -> UpdateResult<Self> {
        match fs::metadata(path) {
            Ok(_) => Self::load(path),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(UpdateError::Config(format!(
                "failed reading {}: {err}",
                path.display()
            ))),
        }
    }

    pub fn validate(&self) -> UpdateResult<()> {
        if let Some(repository) = &self.repository {
            repository.parse::<RepositoryId>()?;
        }
        if self.download_timeout_secs == 0 {
            return Err(UpdateError::Config(
                "download_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.root_markers.iter().any(|marker| marker.trim().is_empty()) {
            return Err(UpdateError::Config(
                "root_markers must not contain empty entries".to_string(),
            ));
        }
        for path in self.preserved_paths.iter().chain(&self.snapshot_excludes) {
            let trimmed = path.trim().trim_matches('/');
            let escapes = Path::new(trimmed)
                .components()
                .any(|component| !matches!(component, Component::Normal(_)));
            if trimmed.is_empty() || escapes {
                return Err(UpdateError::Config(format!(
                    "invalid relative path '{path}' in preserved_paths/snapshot_excludes"
                )));
            }
        }
        if self.migrations.program.trim().is_empty() || self.dependencies.program.trim().is_empty()
        {
            return Err(UpdateError::Config(
                "dependency installer and migration programs must be set".to_string(),
            ));
        }
        Ok(())
    }

    pub fn repository_id(&self) -> UpdateResult<RepositoryId> {
        let repository = self.repository.as_deref().ok_or_else(|| {
            UpdateError::Config(
                "no release repository configured; set `repository = \"owner/repo\"`".to_string(),
            )
        })?;
        repository.parse()
    }

    pub fn preserved_relative_paths(&self) -> Vec<PathBuf> {
        normalize_relative(&self.preserved_paths)
    }

    pub fn snapshot_exclude_paths(&self) -> Vec<PathBuf> {
        normalize_relative(&self.snapshot_excludes)
    }
}

fn normalize_relative(paths: &[String]) -> Vec<PathBuf> {
    paths
        .iter()
        .map(|path| PathBuf::from(path.trim().trim_matches('/')))
        .collect()
}
