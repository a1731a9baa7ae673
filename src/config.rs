use config::{Config, ConfigError, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

/// Settings for worktree placement, git limits and refresh timing.
///
/// Settings are an explicit value handed to [`crate::git::Repository`],
/// [`crate::refresh::RefreshController`] and [`crate::status_cache::StatusCache`]
/// at construction; nothing reads them from ambient state afterwards.
///
/// The `worktree-path` template is relative to the repository root and supports:
/// - `{repo}` - Repository directory name
/// - `{branch}` - Branch name (characters outside `[A-Za-z0-9._-]` become `_`)
/// - `{date}` / `{time}` - Local date (`YYYYMMDD`) and time (`HHMMSS`)
///
/// # Examples
///
/// ```toml
/// # Default - hidden sibling of the repository
/// worktree-path = "../.worktree_{repo}_{branch}"
///
/// # Organized in .worktrees subdirectory
/// worktree-path = ".worktrees/{branch}"
///
/// command-timeout-ms = 60000
/// mutation-policy = "reject"
/// terminal-command = "alacritty --working-directory {path}"
/// ```
///
/// Config file location:
/// - Linux: `~/.config/worktree-hub/config.toml`
/// - macOS: `~/Library/Application Support/worktree-hub/config.toml`
/// - Windows: `%APPDATA%\worktree-hub\config.toml`
///
/// `WORKTREE_HUB_CONFIG_PATH` overrides the location. Individual keys can be
/// set with `WORKTREE_HUB_<KEY>`, e.g. `WORKTREE_HUB_COMMAND_TIMEOUT_MS=5000`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Settings {
    pub worktree_path: String,
    pub command_timeout_ms: u64,
    pub max_output_bytes: usize,
    pub status_ttl_ms: u64,
    pub debounce_ms: u64,
    pub mutation_policy: MutationPolicy,
    pub auto_open_terminal: bool,
    pub confirm_dangerous_operations: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminal_command: Option<String>,
}

/// What a mutating operation does when another one holds the repository.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum MutationPolicy {
    /// Wait, in submission order.
    #[default]
    Queue,
    /// Fail with `GitError::ConcurrentMutationRejected`.
    Reject,
}

pub const DEFAULT_WORKTREE_PATH: &str = "../.worktree_{repo}_{branch}";

impl Default for Settings {
    fn default() -> Self {
        Self {
            worktree_path: DEFAULT_WORKTREE_PATH.to_string(),
            command_timeout_ms: 30_000,
            max_output_bytes: crate::shell_exec::DEFAULT_MAX_OUTPUT_BYTES,
            status_ttl_ms: 2_000,
            debounce_ms: 300,
            mutation_policy: MutationPolicy::Queue,
            auto_open_terminal: false,
            confirm_dangerous_operations: true,
            terminal_command: None,
        }
    }
}

impl Settings {
    /// Load settings from the default config file and environment variables.
    ///
    /// Sources, later ones overriding earlier ones:
    /// 1. Default values
    /// 2. Config file (see [`config_path`])
    /// 3. Environment variables (`WORKTREE_HUB_*`)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(config_path().as_deref())
    }

    /// Like [`Settings::load`], reading the given file instead of the default.
    pub fn load_from(path: Option<&Path>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let mut builder = Config::builder()
            .set_default("worktree-path", defaults.worktree_path)?
            .set_default("command-timeout-ms", defaults.command_timeout_ms)?
            .set_default("max-output-bytes", defaults.max_output_bytes as u64)?
            .set_default("status-ttl-ms", defaults.status_ttl_ms)?
            .set_default("debounce-ms", defaults.debounce_ms)?
            .set_default("mutation-policy", defaults.mutation_policy.to_string())?
            .set_default("auto-open-terminal", defaults.auto_open_terminal)?
            .set_default(
                "confirm-dangerous-operations",
                defaults.confirm_dangerous_operations,
            )?;

        if let Some(path) = path
            && path.exists()
        {
            builder = builder.add_source(File::from(path));
        }

        // Double underscore separates nesting so single underscores map to dashes
        builder = builder.add_source(
            config::Environment::with_prefix("WORKTREE_HUB")
                .prefix_separator("_")
                .separator("__")
                .convert_case(config::Case::Kebab)
                .try_parsing(true),
        );

        let settings: Self = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_worktree_path(&self.worktree_path)?;
        if self.command_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "command-timeout-ms must be greater than zero".to_string(),
            ));
        }
        if self.max_output_bytes == 0 {
            return Err(ConfigError::Message(
                "max-output-bytes must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn status_ttl(&self) -> Duration {
        Duration::from_millis(self.status_ttl_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Location of the user config file.
pub fn config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("WORKTREE_HUB_CONFIG_PATH") {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|dir| dir.join("worktree-hub").join("config.toml"))
}

fn validate_worktree_path(template: &str) -> Result<(), ConfigError> {
    if template.is_empty() {
        return Err(ConfigError::Message(
            "worktree-path cannot be empty".to_string(),
        ));
    }

    // Reject absolute paths
    let path = Path::new(template);
    if path.is_absolute() {
        return Err(ConfigError::Message(
            "worktree-path must be relative, not absolute".to_string(),
        ));
    }

    Ok(())
}

/// Persistence for [`Settings`], supplied by the host application.
pub trait SettingsStore: Send + Sync {
    fn load(&self) -> anyhow::Result<Settings>;
    fn save(&self, settings: &Settings) -> anyhow::Result<()>;
}

/// Settings stored as a TOML file.
#[derive(Debug, Clone)]
pub struct TomlSettingsStore {
    path: PathBuf,
}

impl TomlSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at [`config_path`], if the platform has a config directory.
    pub fn user() -> Option<Self> {
        config_path().map(Self::new)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for TomlSettingsStore {
    fn load(&self) -> anyhow::Result<Settings> {
        Ok(Settings::load_from(Some(&self.path))?)
    }

    fn save(&self, settings: &Settings) -> anyhow::Result<()> {
        settings.validate()?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(settings)?;
        std::fs::write(&self.path, contents)?;
        log::debug!("Saved settings to {}", self.path.display());
        Ok(())
    }
}

/// In-memory store, for hosts that persist settings elsewhere and for tests.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    settings: Mutex<Settings>,
}

impl MemorySettingsStore {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: Mutex::new(settings),
        }
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> anyhow::Result<Settings> {
        Ok(self.settings.lock().unwrap().clone())
    }

    fn save(&self, settings: &Settings) -> anyhow::Result<()> {
        settings.validate()?;
        *self.settings.lock().unwrap() = settings.clone();
        Ok(())
    }
}
