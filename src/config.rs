use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{error, warn};

use crate::error::{HostError, Result};

/// Default location of the remote plugin repository.
pub const DEFAULT_PLUGIN_BASE_URL: &str =
    "https://raw.githubusercontent.com/Operativekiwi/LostCityClient/main/plugins";

/// Width of the always-visible side plugin panel, in layout units.
pub const DEFAULT_SIDE_PANEL_WIDTH: u32 = 250;

/// Height of the bottom plugin panel while it is visible.
pub const DEFAULT_BOTTOM_PANEL_HEIGHT: u32 = 200;

const APP_CONFIG_FILE: &str = "config.json";

/// Get the config directory using platform-appropriate location.
///
/// - macOS: `~/Library/Application Support/lostcity-client/`
/// - Linux: `~/.config/lostcity-client/` (or `$XDG_CONFIG_HOME`)
/// - Windows: `%APPDATA%/lostcity-client/`
///
/// Falls back to `~/.lostcity-client/` if the platform dir is unavailable.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("lostcity-client"))
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".lostcity-client")
        })
}

/// Local plugin directory: `{config_dir}/plugins/`
pub fn default_plugin_dir() -> PathBuf {
    config_dir().join("plugins")
}

/// Write a file atomically (temp file + rename) so readers never observe a
/// partially written file.
pub(crate) fn write_atomic(target: &Path, contents: &[u8]) -> Result<()> {
    let dir = target.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(|e| HostError::io(dir, e))?;

    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let temp = dir.join(format!(".{}.tmp.{}", file_name, std::process::id()));

    std::fs::write(&temp, contents).map_err(|e| HostError::io(&temp, e))?;

    // Atomic rename: either the old file or new file exists, never partial
    std::fs::rename(&temp, target).map_err(|e| {
        let _ = std::fs::remove_file(&temp);
        HostError::io(target, e)
    })
}

/// JSON settings files rooted at one directory.
///
/// The desktop shell uses [`ConfigStore::default_location`]; tests point it
/// at a temp dir.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    dir: PathBuf,
}

impl ConfigStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn default_location() -> Self {
        Self::new(config_dir())
    }

    /// Load a JSON config file, returning Default if missing or corrupt.
    /// Corrupt files are logged instead of silently resetting state.
    pub fn load_json<T: DeserializeOwned + Default>(&self, filename: &str) -> T {
        let path = self.dir.join(filename);
        if !path.exists() {
            return T::default();
        }
        let content = match std::fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) => {
                warn!("Could not read config {}: {e}", path.display());
                return T::default();
            }
        };
        match serde_json::from_str(&content) {
            Ok(v) => v,
            Err(e) => {
                error!("Corrupt config {}: {e}. Using defaults.", path.display());
                T::default()
            }
        }
    }

    /// Save a JSON config file atomically.
    /// Sets 0600 permissions on Unix.
    pub fn save_json<T: Serialize>(&self, filename: &str, config: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(config)?;
        let target = self.dir.join(filename);
        write_atomic(&target, json.as_bytes())?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&target, perms).map_err(|e| HostError::io(&target, e))?;
        }

        Ok(())
    }

    pub fn load_app_config(&self) -> AppConfig {
        self.load_json(APP_CONFIG_FILE)
    }

    pub fn save_app_config(&self, config: &AppConfig) -> Result<()> {
        self.save_json(APP_CONFIG_FILE, config)
    }
}

// ---------------------------------------------------------------------------
// AppConfig
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base URL of the remote plugin repository (`plugins.json` + `{name}.js`).
    #[serde(default = "default_plugin_base_url")]
    pub plugin_base_url: String,
    /// Override for the local plugin directory. `None` = `{config_dir}/plugins`.
    #[serde(default)]
    pub plugin_dir: Option<PathBuf>,
    #[serde(default = "default_side_panel_width")]
    pub side_panel_width: u32,
    #[serde(default = "default_bottom_panel_height")]
    pub bottom_panel_height: u32,
    #[serde(default)]
    pub bottom_panel_enabled: bool,
    /// World the game view was last pointed at.
    #[serde(default)]
    pub current_world: Option<u32>,
    #[serde(default = "default_world")]
    pub default_world: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_true")]
    pub check_updates_on_startup: bool,
}

fn default_plugin_base_url() -> String {
    DEFAULT_PLUGIN_BASE_URL.to_string()
}

fn default_side_panel_width() -> u32 {
    DEFAULT_SIDE_PANEL_WIDTH
}

fn default_bottom_panel_height() -> u32 {
    DEFAULT_BOTTOM_PANEL_HEIGHT
}

fn default_world() -> u32 {
    1
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            plugin_base_url: default_plugin_base_url(),
            plugin_dir: None,
            side_panel_width: default_side_panel_width(),
            bottom_panel_height: default_bottom_panel_height(),
            bottom_panel_enabled: false,
            current_world: None,
            default_world: default_world(),
            request_timeout_secs: default_request_timeout_secs(),
            check_updates_on_startup: true,
        }
    }
}

impl AppConfig {
    pub fn resolved_plugin_dir(&self) -> PathBuf {
        self.plugin_dir.clone().unwrap_or_else(default_plugin_dir)
    }

    /// World to open the game view on at startup.
    pub fn startup_world(&self) -> u32 {
        self.current_world.unwrap_or(self.default_world)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
