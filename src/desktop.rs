//! Tauri shell: one window holding the game webview plus the side and bottom
//! panel webviews, all positioned from [`PluginHost`] layout bounds.

use std::sync::Arc;
use tauri::http::{Response, StatusCode};
use tauri::webview::WebviewBuilder;
use tauri::window::WindowBuilder;
use tauri::{
    AppHandle, Emitter, LogicalPosition, LogicalSize, Manager, State, WebviewUrl, WindowEvent,
};
use tracing::{error, info, warn};

use crate::app_logger::LogEntry;
use crate::bridge::{
    GameSurface, HostMessage, PanelNotifier, PluginHost, PluginSnapshot, UiRequest, WorldTarget,
};
use crate::builtin::player_lookup::PlayerLookupView;
use crate::config::{ConfigStore, DEFAULT_BOTTOM_PANEL_HEIGHT, DEFAULT_SIDE_PANEL_WIDTH};
use crate::error::HostError;
use crate::layout::{LayoutBounds, Rect};
use crate::lookup::{AdventureLogEntry, LookupOutcome, SkillTable};
use crate::manifest::PanelSide;
use crate::placement::ActivePanelAssignment;
use crate::plugins::{resolve_script_path, PluginContent};
use crate::updater::UpdateReport;

const MAIN_WINDOW: &str = "main";
const GAME_VIEW: &str = "game";
const SIDE_VIEW: &str = "side-panel";
const BOTTOM_VIEW: &str = "bottom-panel";

const INITIAL_WIDTH: u32 = 1280;
const INITIAL_HEIGHT: u32 = 800;

// ---------------------------------------------------------------------------
// Host seams
// ---------------------------------------------------------------------------

/// Emits host messages as Tauri events and keeps child webviews in line with
/// layout changes.
struct TauriNotifier {
    app: AppHandle,
}

impl PanelNotifier for TauriNotifier {
    fn notify(&self, message: &HostMessage) {
        if let HostMessage::LayoutChanged { bounds } = message {
            apply_layout(&self.app, bounds);
        }
        if let Err(e) = self.app.emit(message.event_name(), message) {
            warn!("Failed to emit {}: {e}", message.event_name());
        }
    }
}

struct WebviewSurface {
    app: AppHandle,
}

impl GameSurface for WebviewSurface {
    fn navigate(&self, url: &str) -> crate::error::Result<()> {
        let webview = self
            .app
            .get_webview(GAME_VIEW)
            .ok_or_else(|| HostError::Surface("game view is not open".into()))?;
        let parsed = tauri::Url::parse(url).map_err(|e| HostError::UnsupportedUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        webview
            .navigate(parsed)
            .map_err(|e| HostError::Surface(format!("navigation failed: {e}")))
    }
}

fn place(app: &AppHandle, label: &str, rect: Rect) {
    let Some(webview) = app.get_webview(label) else {
        return;
    };
    if let Err(e) = webview.set_position(LogicalPosition::new(rect.x, rect.y)) {
        warn!("Failed to move {label}: {e}");
    }
    if let Err(e) = webview.set_size(LogicalSize::new(rect.width, rect.height)) {
        warn!("Failed to resize {label}: {e}");
    }
}

fn apply_layout(app: &AppHandle, bounds: &LayoutBounds) {
    place(app, GAME_VIEW, bounds.main);
    place(app, SIDE_VIEW, bounds.side);
    place(app, BOTTOM_VIEW, bounds.bottom);
}

// ---------------------------------------------------------------------------
// plugin:// protocol
// ---------------------------------------------------------------------------

/// Serve local plugin scripts as `plugin://{name}.js`.
fn register_plugin_protocol(builder: tauri::Builder<tauri::Wry>) -> tauri::Builder<tauri::Wry> {
    builder.register_uri_scheme_protocol("plugin", |ctx, request| {
        let text = |status: StatusCode, body: &'static [u8]| {
            let mut response = Response::new(body.to_vec());
            *response.status_mut() = status;
            response
        };

        let Some(host) = ctx.app_handle().try_state::<Arc<PluginHost>>() else {
            return text(StatusCode::SERVICE_UNAVAILABLE, b"Plugin host not ready");
        };
        let plugin_dir = host.config().resolved_plugin_dir();

        let Some(file_path) = resolve_script_path(&plugin_dir, request.uri().path()) else {
            return text(StatusCode::BAD_REQUEST, b"Invalid plugin path");
        };

        match std::fs::read(&file_path) {
            Ok(data) => Response::builder()
                .status(StatusCode::OK)
                .header("Content-Type", "application/javascript")
                .header("Access-Control-Allow-Origin", "*")
                .header("Cache-Control", "no-store")
                .body(data)
                .unwrap_or_else(|_| text(StatusCode::INTERNAL_SERVER_ERROR, b"Response error")),
            Err(_) => text(StatusCode::NOT_FOUND, b"Plugin file not found"),
        }
    })
}

// ---------------------------------------------------------------------------
// Tauri commands
// ---------------------------------------------------------------------------

type HostState<'a> = State<'a, Arc<PluginHost>>;

#[tauri::command]
fn get_plugins(host: HostState<'_>) -> PluginSnapshot {
    host.get_plugins()
}

#[tauri::command]
async fn load_plugin(host: HostState<'_>, name: String) -> Result<PluginContent, String> {
    host.invoke_content(&name).await.map_err(|e| e.to_string())
}

#[tauri::command]
fn move_plugin(
    host: HostState<'_>,
    name: String,
    target: PanelSide,
) -> Result<ActivePanelAssignment, String> {
    host.move_plugin(&name, target).map_err(|e| e.to_string())
}

#[tauri::command]
fn toggle_bottom_panel(host: HostState<'_>, enabled: bool) -> LayoutBounds {
    host.toggle_bottom_panel(enabled)
}

#[tauri::command]
fn change_world(host: HostState<'_>, target: WorldTarget) -> Result<String, String> {
    host.change_world(target).map_err(|e| e.to_string())
}

#[tauri::command]
async fn fetch_player_skills(
    host: HostState<'_>,
    name: String,
) -> Result<LookupOutcome<SkillTable>, String> {
    Ok(host.fetch_player_skills(&name).await)
}

#[tauri::command]
async fn fetch_adventure_log(
    host: HostState<'_>,
    name: String,
) -> Result<LookupOutcome<Vec<AdventureLogEntry>>, String> {
    Ok(host.fetch_adventure_log(&name).await)
}

#[tauri::command]
async fn lookup_player(host: HostState<'_>, name: String) -> Result<PlayerLookupView, String> {
    Ok(host.lookup_player(&name).await)
}

#[tauri::command]
fn resize(host: HostState<'_>, width: u32, height: u32) -> LayoutBounds {
    host.resize(width, height)
}

#[tauri::command]
async fn check_for_updates(host: HostState<'_>) -> Result<UpdateReport, String> {
    Ok(host.check_for_updates().await)
}

#[tauri::command]
fn get_logs(host: HostState<'_>, limit: Option<usize>) -> Vec<LogEntry> {
    host.get_logs(limit.unwrap_or(0))
}

/// Generic entry point taking a tagged [`UiRequest`].
#[tauri::command]
async fn plugin_request(
    host: HostState<'_>,
    request: UiRequest,
) -> Result<serde_json::Value, String> {
    host.handle_request(request).await.map_err(|e| e.to_string())
}

// ---------------------------------------------------------------------------
// Window setup
// ---------------------------------------------------------------------------

fn build_window(app: &tauri::App, host: &PluginHost) -> Result<(), Box<dyn std::error::Error>> {
    let window = WindowBuilder::new(app, MAIN_WINDOW)
        .title("LostCity Client")
        .inner_size(f64::from(INITIAL_WIDTH), f64::from(INITIAL_HEIGHT))
        .min_inner_size(
            f64::from(DEFAULT_SIDE_PANEL_WIDTH * 2),
            f64::from(DEFAULT_BOTTOM_PANEL_HEIGHT * 2),
        )
        .build()?;

    let bounds = host.resize(INITIAL_WIDTH, INITIAL_HEIGHT);
    let game_url = tauri::Url::parse(&host.startup_url())?;
    let panel_view = |label: &str, side: PanelSide| {
        WebviewBuilder::new(label, WebviewUrl::App("index.html".into()))
            .initialization_script(format!("window.__PANEL_SIDE__ = \"{side}\";"))
    };

    let views = [
        (WebviewBuilder::new(GAME_VIEW, WebviewUrl::External(game_url)), bounds.main),
        (panel_view(SIDE_VIEW, PanelSide::Right), bounds.side),
        (panel_view(BOTTOM_VIEW, PanelSide::Bottom), bounds.bottom),
    ];
    for (builder, rect) in views {
        window.add_child(
            builder,
            LogicalPosition::new(rect.x, rect.y),
            LogicalSize::new(rect.width, rect.height),
        )?;
    }

    let handle = app.handle().clone();
    window.on_window_event(move |event| {
        if let WindowEvent::Resized(size) = event {
            let scale = handle
                .get_window(MAIN_WINDOW)
                .and_then(|w| w.scale_factor().ok())
                .unwrap_or(1.0);
            let logical = size.to_logical::<u32>(scale);
            if let Some(host) = handle.try_state::<Arc<PluginHost>>() {
                host.resize(logical.width, logical.height);
            }
        }
    });

    Ok(())
}

pub fn run() {
    crate::logging::init();

    let builder = tauri::Builder::default();
    let builder = register_plugin_protocol(builder);
    let result = builder
        .setup(|app| {
            let notifier = Arc::new(TauriNotifier {
                app: app.handle().clone(),
            });
            let surface = Arc::new(WebviewSurface {
                app: app.handle().clone(),
            });
            let host = Arc::new(PluginHost::new(
                ConfigStore::default_location(),
                notifier,
                surface,
            )?);
            app.manage(host.clone());

            build_window(app, &host)?;

            tauri::async_runtime::spawn(async move {
                match host.startup().await {
                    Ok(snapshot) => info!("Plugin host ready with {} plugin(s)", snapshot.descriptors.len()),
                    Err(e) => error!("Plugin host startup failed: {e}"),
                }
            });
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            get_plugins,
            load_plugin,
            move_plugin,
            toggle_bottom_panel,
            change_world,
            fetch_player_skills,
            fetch_adventure_log,
            lookup_player,
            resize,
            check_for_updates,
            get_logs,
            plugin_request,
        ])
        .run(tauri::generate_context!());

    if let Err(e) = result {
        error!("Error while running the client: {e}");
    }
}
