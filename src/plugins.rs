//! Plugin interface, catalog and local registry.
//!
//! Plugins are installed as `{plugin_dir}/{name}.js`, next to a shared
//! `plugins.json` carrying icon/panel metadata. A file only becomes a live
//! plugin once a factory from the [`PluginCatalog`] turns it into something
//! implementing [`Plugin`] and the result passes validation.
//!
//! This module provides:
//! - `Plugin` / `PluginFactory` — the capability set every plugin implements
//! - `PluginCatalog` — statically registered factories + script fallback
//! - `PluginRegistry::load_all()` — builds the loaded set, skipping bad plugins
//! - `resolve_script_path()` — safe lookup for the `plugin://` protocol

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{HostError, Result};
use crate::fetcher::ContentFetcher;
use crate::lookup::{GameEndpoints, WorldEntry};
use crate::manifest::{
    is_path_escape, validate_plugin_name, PanelSide, PluginManifest, PluginManifestEntry,
    MANIFEST_FILE, PLUGIN_FILE_EXT,
};

/// Icon shown for plugins that declare none.
pub const DEFAULT_ICON: &str = "🔌";

// ---------------------------------------------------------------------------
// Plugin interface
// ---------------------------------------------------------------------------

/// Everything a plugin may use while producing content.
#[derive(Clone)]
pub struct ContentContext {
    /// Panel the plugin is currently placed in; plugins lay out differently
    /// in the narrow side panel and the wide bottom panel.
    pub panel: PanelSide,
    pub fetcher: Arc<dyn ContentFetcher>,
    pub endpoints: GameEndpoints,
    pub current_world: Option<u32>,
    pub bottom_panel_enabled: bool,
}

/// Renderable unit produced by a plugin. The panel UI owns the actual markup.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ContentBody {
    WorldList {
        worlds: Vec<WorldEntry>,
        current_world: Option<u32>,
    },
    PlayerSearch {
        placeholder: String,
    },
    Settings {
        bottom_panel_enabled: bool,
    },
    /// Module the panel webview imports from `plugin://`.
    Script {
        module: String,
    },
    /// Inline message ("loading failed", etc.).
    Notice {
        message: String,
    },
}

/// Content returned across the host boundary for one `load-plugin` request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginContent {
    pub plugin: String,
    pub title: String,
    pub panel: PanelSide,
    pub body: ContentBody,
}

#[async_trait]
pub trait Plugin: Send + Sync {
    /// Display name. Must be non-empty.
    fn name(&self) -> &str;

    fn icon(&self) -> Option<&str> {
        None
    }

    /// Panel to use when the metadata does not say otherwise.
    fn default_panel(&self) -> Option<PanelSide> {
        None
    }

    async fn produce_content(&self, ctx: &ContentContext) -> Result<ContentBody>;
}

/// Input handed to a factory: the plugin key and its local script.
#[derive(Debug, Clone)]
pub struct PluginSource {
    pub name: String,
    pub bytes: Vec<u8>,
}

pub trait PluginFactory: Send + Sync {
    fn create(&self, source: &PluginSource) -> Result<Arc<dyn Plugin>>;
}

impl<F> PluginFactory for F
where
    F: Fn(&PluginSource) -> Result<Arc<dyn Plugin>> + Send + Sync,
{
    fn create(&self, source: &PluginSource) -> Result<Arc<dyn Plugin>> {
        self(source)
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Statically registered plugin factories.
#[derive(Default, Clone)]
pub struct PluginCatalog {
    factories: HashMap<String, Arc<dyn PluginFactory>>,
    /// Used for script files with no dedicated factory.
    fallback: Option<Arc<dyn PluginFactory>>,
}

impl PluginCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, factory: impl PluginFactory + 'static) -> &mut Self {
        self.factories.insert(name.into(), Arc::new(factory));
        self
    }

    pub fn set_fallback(&mut self, factory: impl PluginFactory + 'static) -> &mut Self {
        self.fallback = Some(Arc::new(factory));
        self
    }

    fn factory_for(&self, name: &str) -> Option<&Arc<dyn PluginFactory>> {
        self.factories.get(name).or(self.fallback.as_ref())
    }
}

// ---------------------------------------------------------------------------
// Loaded plugins and descriptors
// ---------------------------------------------------------------------------

/// A plugin held in-process. Never serialized.
#[derive(Clone)]
pub struct LoadedPlugin {
    /// Key used for files, placement and content requests.
    pub name: String,
    pub title: String,
    pub icon: String,
    pub panel: PanelSide,
    pub plugin: Arc<dyn Plugin>,
}

impl fmt::Debug for LoadedPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedPlugin")
            .field("name", &self.name)
            .field("title", &self.title)
            .field("icon", &self.icon)
            .field("panel", &self.panel)
            .finish_non_exhaustive()
    }
}

/// Content-free view of a plugin for listing in the panel UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    pub name: String,
    pub title: String,
    pub icon: String,
    pub panel: PanelSide,
}

impl From<&LoadedPlugin> for PluginDescriptor {
    fn from(loaded: &LoadedPlugin) -> Self {
        Self {
            name: loaded.name.clone(),
            title: loaded.title.clone(),
            icon: loaded.icon.clone(),
            panel: loaded.panel,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedPlugin {
    pub name: String,
    pub error: String,
}

#[derive(Debug, Default)]
pub struct RegistryLoad {
    pub plugins: Vec<LoadedPlugin>,
    pub skipped: Vec<SkippedPlugin>,
}

impl RegistryLoad {
    pub fn descriptors(&self) -> Vec<PluginDescriptor> {
        self.plugins.iter().map(PluginDescriptor::from).collect()
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

pub struct PluginRegistry {
    plugin_dir: PathBuf,
    catalog: PluginCatalog,
}

impl PluginRegistry {
    pub fn new(plugin_dir: impl Into<PathBuf>, catalog: PluginCatalog) -> Self {
        Self {
            plugin_dir: plugin_dir.into(),
            catalog,
        }
    }

    /// Load every local plugin from scratch. Invalid plugins are logged and
    /// skipped; they never prevent the rest from loading.
    pub fn load_all(&self) -> RegistryLoad {
        if let Err(e) = std::fs::create_dir_all(&self.plugin_dir) {
            warn!("Failed to create plugin dir {}: {e}", self.plugin_dir.display());
        }

        let metadata = self.read_local_manifest();
        let files = self.local_plugin_names();

        // Manifest order first, then unlisted files alphabetically.
        let mut order: Vec<String> = Vec::new();
        let mut seen = HashSet::new();
        let file_set: HashSet<&String> = files.iter().collect();
        for entry in &metadata.plugins {
            if file_set.contains(&entry.name) && seen.insert(entry.name.clone()) {
                order.push(entry.name.clone());
            }
        }
        for name in &files {
            if seen.insert(name.clone()) {
                order.push(name.clone());
            }
        }

        let mut load = RegistryLoad::default();
        for name in order {
            match self.load_one(&name, metadata.get(&name)) {
                Ok(plugin) => load.plugins.push(plugin),
                Err(err) => {
                    warn!("Skipping plugin {name}: {err}");
                    load.skipped.push(SkippedPlugin {
                        name,
                        error: err.to_string(),
                    });
                }
            }
        }

        info!(
            "Loaded {} plugin(s), skipped {}",
            load.plugins.len(),
            load.skipped.len()
        );
        load
    }

    fn load_one(
        &self,
        name: &str,
        metadata: Option<&PluginManifestEntry>,
    ) -> Result<LoadedPlugin> {
        let path = self.plugin_dir.join(format!("{name}.{PLUGIN_FILE_EXT}"));
        let bytes = std::fs::read(&path).map_err(|e| HostError::PluginEvaluation {
            name: name.to_string(),
            message: format!("Failed to read {}: {e}", path.display()),
        })?;

        let factory = self
            .catalog
            .factory_for(name)
            .ok_or_else(|| HostError::InvalidPluginStructure {
                name: name.to_string(),
                reason: "no factory registered for this plugin".into(),
            })?;

        let source = PluginSource {
            name: name.to_string(),
            bytes,
        };
        let plugin = factory.create(&source)?;

        let title = plugin.name().trim().to_string();
        if title.is_empty() {
            return Err(HostError::InvalidPluginStructure {
                name: name.to_string(),
                reason: "plugin name is empty".into(),
            });
        }

        let icon = metadata
            .and_then(|m| m.icon.clone())
            .or_else(|| plugin.icon().map(str::to_string))
            .filter(|i| !i.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ICON.to_string());

        let panel = metadata
            .and_then(|m| m.panel)
            .or_else(|| plugin.default_panel())
            .unwrap_or_default();

        Ok(LoadedPlugin {
            name: name.to_string(),
            title,
            icon,
            panel,
            plugin,
        })
    }

    /// The local `plugins.json`. Missing or corrupt files count as empty.
    pub fn read_local_manifest(&self) -> PluginManifest {
        let path = self.plugin_dir.join(MANIFEST_FILE);
        match std::fs::read(&path) {
            Ok(bytes) => PluginManifest::parse(&bytes).unwrap_or_else(|e| {
                warn!("Ignoring corrupt {}: {e}", path.display());
                PluginManifest::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => PluginManifest::default(),
            Err(e) => {
                warn!("Could not read {}: {e}", path.display());
                PluginManifest::default()
            }
        }
    }

    /// Names of local `*.js` plugin files, sorted.
    pub fn local_plugin_names(&self) -> Vec<String> {
        let entries = match std::fs::read_dir(&self.plugin_dir) {
            Ok(e) => e,
            Err(err) => {
                warn!("Failed to read plugin dir: {err}");
                return Vec::new();
            }
        };

        let mut names: Vec<String> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter(|path| path.extension().and_then(|e| e.to_str()) == Some(PLUGIN_FILE_EXT))
            .filter_map(|path| path.file_stem().and_then(|s| s.to_str()).map(str::to_string))
            .filter(|name| validate_plugin_name(name).is_ok())
            .collect();
        names.sort();
        names
    }
}

// ---------------------------------------------------------------------------
// plugin:// protocol path resolution
// ---------------------------------------------------------------------------

/// Resolve a `plugin://{name}.js` URI path to a script in the plugin dir.
/// Returns `None` for anything that is not a single safe `*.js` file name.
pub fn resolve_script_path(plugin_dir: &Path, uri_path: &str) -> Option<PathBuf> {
    let trimmed = uri_path.trim_start_matches('/');
    let stem = trimmed.strip_suffix(&format!(".{PLUGIN_FILE_EXT}"))?;

    if is_path_escape(trimmed) || validate_plugin_name(stem).is_err() {
        return None;
    }

    Some(plugin_dir.join(trimmed))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
