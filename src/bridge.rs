//! Plugin host: the application context shared by the desktop shell and the
//! panel UI.
//!
//! `PluginHost` owns every piece of mutable host state (loaded plugins, panel
//! placement, layout, config, diagnostics) and is the only thing the UI talks
//! to. Requests come in as [`UiRequest`] values; pushes go out through a
//! [`PanelNotifier`] as [`HostMessage`] values.

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::app_logger::{LogEntry, LogLevel, LogRingBuffer};
use crate::builtin::player_lookup::{self, PlayerLookupView};
use crate::config::{AppConfig, ConfigStore};
use crate::error::{HostError, Result};
use crate::fetcher::{validate_url, ContentFetcher, HttpFetcher};
use crate::layout::{LayoutBounds, PanelLayout};
use crate::lookup::{self, AdventureLogEntry, GameEndpoints, LookupOutcome, SkillTable};
use crate::manifest::PanelSide;
use crate::placement::ActivePanelAssignment;
use crate::plugins::{
    ContentBody, ContentContext, LoadedPlugin, PluginCatalog, PluginContent, PluginDescriptor,
    PluginRegistry,
};
use crate::updater::{PluginUpdateStatus, PluginUpdater, UpdateReport};

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Host → UI pushes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum HostMessage {
    PluginsLoaded {
        descriptors: Vec<PluginDescriptor>,
        active_placement: ActivePanelAssignment,
    },
    UpdatePluginPanels {
        active_placement: ActivePanelAssignment,
    },
    BottomPanelVisibility {
        enabled: bool,
    },
    LayoutChanged {
        bounds: LayoutBounds,
    },
}

impl HostMessage {
    /// Event name used when the message is emitted to a webview.
    pub fn event_name(&self) -> &'static str {
        match self {
            HostMessage::PluginsLoaded { .. } => "plugins-loaded",
            HostMessage::UpdatePluginPanels { .. } => "update-plugin-panels",
            HostMessage::BottomPanelVisibility { .. } => "bottom-panel-visibility",
            HostMessage::LayoutChanged { .. } => "layout-changed",
        }
    }
}

/// World switch target: either a world number or a full game URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WorldTarget {
    World(u32),
    Url(String),
}

/// UI → host requests.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum UiRequest {
    GetPlugins,
    LoadPlugin {
        name: String,
    },
    MovePlugin {
        name: String,
        target: PanelSide,
    },
    ToggleBottomPanel {
        enabled: bool,
    },
    ChangeWorld {
        target: WorldTarget,
    },
    FetchPlayerSkills {
        name: String,
    },
    FetchAdventureLog {
        name: String,
    },
    LookupPlayer {
        name: String,
    },
    Resize {
        width: u32,
        height: u32,
    },
    CheckForUpdates,
    GetLogs {
        #[serde(default)]
        limit: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginSnapshot {
    pub descriptors: Vec<PluginDescriptor>,
    pub active_placement: ActivePanelAssignment,
}

// ---------------------------------------------------------------------------
// Seams to the shell
// ---------------------------------------------------------------------------

/// Delivers host messages to the panel UI.
pub trait PanelNotifier: Send + Sync {
    fn notify(&self, message: &HostMessage);
}

/// The embedded game view.
pub trait GameSurface: Send + Sync {
    fn navigate(&self, url: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Host
// ---------------------------------------------------------------------------

pub struct PluginHost {
    fetcher: Arc<dyn ContentFetcher>,
    updater: PluginUpdater,
    registry: PluginRegistry,
    endpoints: GameEndpoints,
    config_store: ConfigStore,
    config: RwLock<AppConfig>,
    plugins: RwLock<Vec<LoadedPlugin>>,
    placement: RwLock<ActivePanelAssignment>,
    layout: Mutex<PanelLayout>,
    diagnostics: Mutex<LogRingBuffer>,
    /// Held for the duration of a reload; overlapping reloads are refused.
    reload_lock: Mutex<()>,
    /// Update cycles write to the same files, so they run one at a time.
    update_lock: tokio::sync::Mutex<()>,
    notifier: Arc<dyn PanelNotifier>,
    surface: Arc<dyn GameSurface>,
}

impl PluginHost {
    /// Host with the stock HTTP fetcher and built-in plugin catalog, using
    /// the config stored in `config_store`.
    pub fn new(
        config_store: ConfigStore,
        notifier: Arc<dyn PanelNotifier>,
        surface: Arc<dyn GameSurface>,
    ) -> Result<Self> {
        let config = config_store.load_app_config();
        let fetcher = HttpFetcher::new(Duration::from_secs(config.request_timeout_secs))?;
        Ok(Self::with_parts(
            config_store,
            config,
            Arc::new(fetcher),
            PluginCatalog::builtin(),
            notifier,
            surface,
        ))
    }

    pub fn with_parts(
        config_store: ConfigStore,
        config: AppConfig,
        fetcher: Arc<dyn ContentFetcher>,
        catalog: PluginCatalog,
        notifier: Arc<dyn PanelNotifier>,
        surface: Arc<dyn GameSurface>,
    ) -> Self {
        let plugin_dir = config.resolved_plugin_dir();
        let updater = PluginUpdater::new(fetcher.clone(), &config.plugin_base_url, &plugin_dir);
        let registry = PluginRegistry::new(&plugin_dir, catalog);

        let mut layout = PanelLayout::new(config.side_panel_width, config.bottom_panel_height);
        layout.set_bottom_visible(config.bottom_panel_enabled);

        Self {
            fetcher,
            updater,
            registry,
            endpoints: GameEndpoints::default(),
            config_store,
            config: RwLock::new(config),
            plugins: RwLock::new(Vec::new()),
            placement: RwLock::new(ActivePanelAssignment::default()),
            layout: Mutex::new(layout),
            diagnostics: Mutex::new(LogRingBuffer::default()),
            reload_lock: Mutex::new(()),
            update_lock: tokio::sync::Mutex::new(()),
            notifier,
            surface,
        }
    }

    pub fn with_endpoints(mut self, endpoints: GameEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn endpoints(&self) -> &GameEndpoints {
        &self.endpoints
    }

    pub fn config(&self) -> AppConfig {
        self.config.read().clone()
    }

    /// Game URL for the world the client should open on.
    pub fn startup_url(&self) -> String {
        self.endpoints.game_url(self.config.read().startup_world())
    }

    fn record(&self, level: LogLevel, source: &str, message: impl Into<String>) {
        self.diagnostics.lock().push(level, source, message);
    }

    fn persist_config(&self) {
        let snapshot = self.config.read().clone();
        if let Err(e) = self.config_store.save_app_config(&snapshot) {
            error!("Failed to save config: {e}");
        }
    }

    // -- Plugins ------------------------------------------------------------

    /// Current plugin list and placement. Never reloads.
    pub fn get_plugins(&self) -> PluginSnapshot {
        PluginSnapshot {
            descriptors: self.plugins.read().iter().map(PluginDescriptor::from).collect(),
            active_placement: self.placement.read().clone(),
        }
    }

    /// Ask a plugin for its content. Plugin failures are rendered as a notice
    /// rather than returned.
    pub async fn invoke_content(&self, name: &str) -> Result<PluginContent> {
        let loaded = self
            .plugins
            .read()
            .iter()
            .find(|p| p.name == name)
            .cloned()
            .ok_or_else(|| HostError::PluginNotFound(name.to_string()))?;

        let panel = self.placement.read().panel_of(name).unwrap_or(loaded.panel);
        let ctx = {
            let config = self.config.read();
            ContentContext {
                panel,
                fetcher: self.fetcher.clone(),
                endpoints: self.endpoints.clone(),
                current_world: config.current_world,
                bottom_panel_enabled: self.layout.lock().bottom_visible(),
            }
        };

        let body = match loaded.plugin.produce_content(&ctx).await {
            Ok(body) => body,
            Err(e) => {
                warn!("Plugin {name} failed to produce content: {e}");
                self.record(LogLevel::Warn, name, e.to_string());
                ContentBody::Notice {
                    message: e.to_string(),
                }
            }
        };

        Ok(PluginContent {
            plugin: loaded.name,
            title: loaded.title,
            panel,
            body,
        })
    }

    pub fn move_plugin(&self, name: &str, target: PanelSide) -> Result<ActivePanelAssignment> {
        if !self.plugins.read().iter().any(|p| p.name == name) {
            return Err(HostError::PluginNotFound(name.to_string()));
        }

        let placement = {
            let mut placement = self.placement.write();
            placement.move_plugin(name, target);
            placement.clone()
        };
        info!("Moved plugin {name} to {target} panel");
        self.notifier.notify(&HostMessage::UpdatePluginPanels {
            active_placement: placement.clone(),
        });
        Ok(placement)
    }

    /// Rebuild the loaded plugin set and placement from local files.
    pub fn reload_plugins(&self) -> Result<PluginSnapshot> {
        let Some(_guard) = self.reload_lock.try_lock() else {
            return Err(HostError::ReloadInProgress);
        };

        let load = self.registry.load_all();
        for skipped in &load.skipped {
            self.record(LogLevel::Warn, &skipped.name, &skipped.error);
        }

        let placement = ActivePanelAssignment::from_plugins(&load.plugins);
        *self.plugins.write() = load.plugins;
        *self.placement.write() = placement;

        let snapshot = self.get_plugins();
        self.notifier.notify(&HostMessage::PluginsLoaded {
            descriptors: snapshot.descriptors.clone(),
            active_placement: snapshot.active_placement.clone(),
        });
        Ok(snapshot)
    }

    /// Download plugin updates. Does not reload.
    pub async fn update_plugins(&self) -> UpdateReport {
        let report = {
            let _cycle = self.update_lock.lock().await;
            self.updater.update().await
        };

        if let Some(message) = &report.error {
            self.record(LogLevel::Error, "updater", message.as_str());
        }
        for outcome in &report.outcomes {
            if let PluginUpdateStatus::Failed { error } = &outcome.status {
                self.record(LogLevel::Warn, &outcome.name, error.as_str());
            }
        }
        report
    }

    /// Update, then reload whatever is now on disk.
    pub async fn check_for_updates(&self) -> UpdateReport {
        let report = self.update_plugins().await;
        if let Err(e) = self.reload_plugins() {
            warn!("Reload after update skipped: {e}");
        }
        report
    }

    /// Startup sequence: optional update, reload, then push the persisted
    /// bottom panel state and layout to the UI.
    pub async fn startup(&self) -> Result<PluginSnapshot> {
        let check_updates = self.config.read().check_updates_on_startup;
        if check_updates {
            let report = self.update_plugins().await;
            if !report.success {
                warn!("Starting with local plugins only");
            }
        }

        let snapshot = self.reload_plugins()?;

        let (enabled, bounds) = {
            let layout = self.layout.lock();
            (layout.bottom_visible(), layout.bounds())
        };
        self.notifier.notify(&HostMessage::BottomPanelVisibility { enabled });
        self.notifier.notify(&HostMessage::LayoutChanged { bounds });
        Ok(snapshot)
    }

    // -- Layout -------------------------------------------------------------

    pub fn toggle_bottom_panel(&self, enabled: bool) -> LayoutBounds {
        let bounds = self.layout.lock().set_bottom_visible(enabled);

        self.config.write().bottom_panel_enabled = enabled;
        self.persist_config();

        self.notifier.notify(&HostMessage::BottomPanelVisibility { enabled });
        self.notifier.notify(&HostMessage::LayoutChanged { bounds });
        bounds
    }

    pub fn resize(&self, width: u32, height: u32) -> LayoutBounds {
        let bounds = self.layout.lock().resize(width, height);
        self.notifier.notify(&HostMessage::LayoutChanged { bounds });
        bounds
    }

    pub fn bounds(&self) -> LayoutBounds {
        self.layout.lock().bounds()
    }

    // -- Game view ----------------------------------------------------------

    /// Point the game view at another world. Returns the URL navigated to.
    pub fn change_world(&self, target: WorldTarget) -> Result<String> {
        let url = match target {
            WorldTarget::World(world) => self.endpoints.game_url(world),
            WorldTarget::Url(url) => url,
        };
        validate_url(&url)?;
        self.surface.navigate(&url)?;

        if let Some(world) = self.endpoints.world_from_game_url(&url) {
            self.config.write().current_world = Some(world);
            self.persist_config();
        }
        info!("Switched game view to {url}");
        Ok(url)
    }

    // -- Lookups ------------------------------------------------------------

    pub async fn fetch_player_skills(&self, name: &str) -> LookupOutcome<SkillTable> {
        lookup::fetch_player_skills(self.fetcher.as_ref(), &self.endpoints, name).await
    }

    pub async fn fetch_adventure_log(&self, name: &str) -> LookupOutcome<Vec<AdventureLogEntry>> {
        lookup::fetch_adventure_log(self.fetcher.as_ref(), &self.endpoints, name).await
    }

    pub async fn lookup_player(&self, name: &str) -> PlayerLookupView {
        player_lookup::lookup_player(self.fetcher.as_ref(), &self.endpoints, name).await
    }

    // -- Diagnostics --------------------------------------------------------

    pub fn get_logs(&self, limit: usize) -> Vec<LogEntry> {
        self.diagnostics.lock().recent(limit)
    }

    // -- Dispatch -----------------------------------------------------------

    /// Single entry point for UI requests. The reply is the JSON payload the
    /// UI expects for that request type.
    pub async fn handle_request(&self, request: UiRequest) -> Result<serde_json::Value> {
        let value = match request {
            UiRequest::GetPlugins => serde_json::to_value(self.get_plugins())?,
            UiRequest::LoadPlugin { name } => serde_json::to_value(self.invoke_content(&name).await?)?,
            UiRequest::MovePlugin { name, target } => {
                serde_json::to_value(self.move_plugin(&name, target)?)?
            }
            UiRequest::ToggleBottomPanel { enabled } => {
                serde_json::to_value(self.toggle_bottom_panel(enabled))?
            }
            UiRequest::ChangeWorld { target } => {
                serde_json::Value::String(self.change_world(target)?)
            }
            UiRequest::FetchPlayerSkills { name } => {
                serde_json::to_value(self.fetch_player_skills(&name).await)?
            }
            UiRequest::FetchAdventureLog { name } => {
                serde_json::to_value(self.fetch_adventure_log(&name).await)?
            }
            UiRequest::LookupPlayer { name } => serde_json::to_value(self.lookup_player(&name).await)?,
            UiRequest::Resize { width, height } => serde_json::to_value(self.resize(width, height))?,
            UiRequest::CheckForUpdates => serde_json::to_value(self.check_for_updates().await)?,
            UiRequest::GetLogs { limit } => serde_json::to_value(self.get_logs(limit))?,
        };
        Ok(value)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
