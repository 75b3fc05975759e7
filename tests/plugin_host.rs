//! End-to-end host flow against a local mock of the plugin repository and
//! the game website.

use parking_lot::Mutex;
use serde_json::json;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

use lostcity_client_lib::app_logger::LogLevel;
use lostcity_client_lib::config::{AppConfig, ConfigStore};
use lostcity_client_lib::fetcher::HttpFetcher;
use lostcity_client_lib::lookup::GameEndpoints;
use lostcity_client_lib::manifest::PanelSide;
use lostcity_client_lib::updater::content_hash;
use lostcity_client_lib::{
    GameSurface, HostError, HostMessage, PanelNotifier, PluginCatalog, PluginHost, UiRequest,
};

const MANIFEST: &str = r#"{"plugins":[
    {"name":"worldSelector","icon":"🌍","panel":"right"},
    {"name":"playerLookup","icon":"🧍","panel":"right"},
    {"name":"broken","panel":"bottom"}
]}"#;
const WORLD_SELECTOR_JS: &str = "window.worldSelector = function () { return { name: \"World Selector\" }; };";
const PLAYER_LOOKUP_JS: &str = "window.playerLookup = function () { return { name: \"Player Lookup\" }; };";
const BROKEN_JS: &str = "console.log('forgot to register');";

#[derive(Default)]
struct Recorder {
    messages: Mutex<Vec<HostMessage>>,
    urls: Mutex<Vec<String>>,
}

impl PanelNotifier for Recorder {
    fn notify(&self, message: &HostMessage) {
        self.messages.lock().push(message.clone());
    }
}

impl GameSurface for Recorder {
    fn navigate(&self, url: &str) -> lostcity_client_lib::Result<()> {
        self.urls.lock().push(url.to_string());
        Ok(())
    }
}

async fn mock_site(server: &mut mockito::ServerGuard) -> Vec<mockito::Mock> {
    let mut mocks = Vec::new();
    for (path, body) in [
        ("/plugins/plugins.json", MANIFEST),
        ("/plugins/worldSelector.js", WORLD_SELECTOR_JS),
        ("/plugins/playerLookup.js", PLAYER_LOOKUP_JS),
        ("/plugins/broken.js", BROKEN_JS),
    ] {
        mocks.push(
            server
                .mock("GET", path)
                .with_status(200)
                .with_body(body)
                .create_async()
                .await,
        );
    }

    let landing = format!("{}/hiscores", server.url());
    for path in ["/hiscores/player/nobody", "/player/adventurelog/nobody"] {
        mocks.push(
            server
                .mock("GET", path)
                .with_status(302)
                .with_header("location", &landing)
                .create_async()
                .await,
        );
    }
    mocks.push(
        server
            .mock("GET", "/hiscores")
            .with_status(200)
            .with_body("<html></html>")
            .create_async()
            .await,
    );
    mocks.push(
        server
            .mock("GET", "/serverlist")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(
                r#"<table><tr><td><img src="/flags/uk.png"></td></tr>
                   <tr><td><a href="client?world=1">World 1</a></td><td>12 players</td></tr>
                   <tr><td><a href="client?world=2">World 2</a></td><td>3 players</td></tr></table>"#,
            )
            .create_async()
            .await,
    );
    mocks
}

fn host(dir: &TempDir, server_url: &str, recorder: Arc<Recorder>) -> PluginHost {
    let config = AppConfig {
        plugin_base_url: format!("{server_url}/plugins"),
        plugin_dir: Some(dir.path().join("plugins")),
        ..AppConfig::default()
    };
    PluginHost::with_parts(
        ConfigStore::new(dir.path().join("config")),
        config,
        Arc::new(HttpFetcher::with_default_timeout().unwrap()),
        PluginCatalog::builtin(),
        recorder.clone(),
        recorder,
    )
    .with_endpoints(GameEndpoints::with_origin(server_url))
}

#[tokio::test]
async fn startup_update_reload_and_interact() {
    let mut server = mockito::Server::new_async().await;
    let _mocks = mock_site(&mut server).await;
    let dir = TempDir::new().unwrap();
    let recorder = Arc::new(Recorder::default());
    let host = host(&dir, &server.url(), recorder.clone());

    // Startup downloads everything, then loads what is valid.
    let snapshot = host.startup().await.unwrap();
    let plugin_dir = dir.path().join("plugins");
    let on_disk = fs::read(plugin_dir.join("worldSelector.js")).unwrap();
    assert_eq!(content_hash(&on_disk), content_hash(WORLD_SELECTOR_JS.as_bytes()));
    assert!(plugin_dir.join("plugins.json").exists());

    assert_eq!(
        serde_json::to_value(&snapshot.active_placement).unwrap(),
        json!({"right": ["worldSelector", "playerLookup"], "bottom": []})
    );

    let logs = host.get_logs(0);
    assert!(logs.iter().any(|l| l.source == "broken" && l.level == LogLevel::Warn));

    let events: Vec<&str> = recorder
        .messages
        .lock()
        .iter()
        .map(HostMessage::event_name)
        .collect();
    assert_eq!(
        events,
        vec!["plugins-loaded", "bottom-panel-visibility", "layout-changed"]
    );

    // Placement round trip through the request protocol.
    let placement = host
        .handle_request(UiRequest::MovePlugin {
            name: "playerLookup".into(),
            target: PanelSide::Bottom,
        })
        .await
        .unwrap();
    assert_eq!(
        placement,
        json!({"right": ["worldSelector"], "bottom": ["playerLookup"]})
    );

    // Content reflects the panel each plugin now lives in.
    let content = host
        .handle_request(UiRequest::LoadPlugin {
            name: "playerLookup".into(),
        })
        .await
        .unwrap();
    assert_eq!(content["panel"], "bottom");
    assert_eq!(content["body"]["kind"], "playerSearch");

    let content = host
        .handle_request(UiRequest::LoadPlugin {
            name: "worldSelector".into(),
        })
        .await
        .unwrap();
    assert_eq!(content["panel"], "right");
    assert_eq!(content["body"]["kind"], "worldList");
    assert_eq!(content["body"]["worlds"][0]["players"], 12);

    // Settings is not installed, so it is not a plugin.
    let err = host
        .handle_request(UiRequest::LoadPlugin {
            name: "settings".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, HostError::PluginNotFound(_)));

    // Bottom panel geometry.
    host.resize(1280, 800);
    let bounds = host
        .handle_request(UiRequest::ToggleBottomPanel { enabled: true })
        .await
        .unwrap();
    assert_eq!(bounds["bottom"], json!({"x": 0, "y": 600, "width": 1280, "height": 200}));
    assert_eq!(bounds["main"], json!({"x": 0, "y": 0, "width": 1030, "height": 800}));

    // Unknown player.
    let view = host
        .handle_request(UiRequest::LookupPlayer {
            name: "nobody".into(),
        })
        .await
        .unwrap();
    assert_eq!(view, json!({"state": "notFound"}));

    // A second update finds nothing new.
    let report = host.handle_request(UiRequest::CheckForUpdates).await.unwrap();
    assert_eq!(report["success"], true);
    let statuses: Vec<&str> = report["outcomes"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|o| o["status"].as_str())
        .collect();
    assert_eq!(statuses, vec!["unchanged", "unchanged", "unchanged"]);
}

#[tokio::test]
async fn unreachable_repository_keeps_local_plugins() {
    let mut server = mockito::Server::new_async().await;
    let _manifest = server
        .mock("GET", "/plugins/plugins.json")
        .with_status(500)
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let plugin_dir = dir.path().join("plugins");
    fs::create_dir_all(&plugin_dir).unwrap();
    fs::write(plugin_dir.join("playerLookup.js"), PLAYER_LOOKUP_JS).unwrap();

    let recorder = Arc::new(Recorder::default());
    let host = host(&dir, &server.url(), recorder);
    let snapshot = host.startup().await.unwrap();

    assert_eq!(
        fs::read_to_string(plugin_dir.join("playerLookup.js")).unwrap(),
        PLAYER_LOOKUP_JS
    );
    assert_eq!(snapshot.active_placement.right, vec!["playerLookup"]);
    assert!(host.get_logs(0).iter().any(|l| l.source == "updater"));
}
