//! Plugin updater: sync local plugin scripts with the remote repository.
//!
//! The remote manifest (`{base}/plugins.json`) lists the available plugins.
//! Each listed script (`{base}/{name}.js`) is downloaded concurrently and
//! written to the local plugin directory only when its SHA-256 differs from
//! the local copy.

use futures_util::future::join_all;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::write_atomic;
use crate::error::{HostError, Result};
use crate::fetcher::ContentFetcher;
use crate::manifest::{PluginManifest, PluginManifestEntry, MANIFEST_FILE};

/// SHA-256 of raw bytes as lowercase hex.
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Hash of a local file, or `None` if it does not exist.
fn file_hash(path: &Path) -> Result<Option<String>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(content_hash(&bytes))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(HostError::io(path, e)),
    }
}

/// Result of syncing one file against fetched content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSync {
    Written { hash: String },
    Unchanged { hash: String },
}

/// Write `content` to `path` unless the file already holds exactly that content.
pub fn sync_file(path: &Path, content: &[u8]) -> Result<FileSync> {
    let hash = content_hash(content);
    if file_hash(path)?.as_deref() == Some(hash.as_str()) {
        return Ok(FileSync::Unchanged { hash });
    }
    write_atomic(path, content)?;
    Ok(FileSync::Written { hash })
}

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum PluginUpdateStatus {
    Updated { hash: String },
    Unchanged { hash: String },
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct PluginUpdateOutcome {
    pub name: String,
    #[serde(flatten)]
    pub status: PluginUpdateStatus,
}

/// Result of one update cycle. `success` is false only when the manifest
/// itself could not be fetched.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateReport {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub outcomes: Vec<PluginUpdateOutcome>,
}

impl UpdateReport {
    fn failed(error: &HostError) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
            outcomes: Vec::new(),
        }
    }

    pub fn updated(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, PluginUpdateStatus::Updated { .. }))
            .map(|o| o.name.as_str())
    }

    pub fn failed_names(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, PluginUpdateStatus::Failed { .. }))
            .map(|o| o.name.as_str())
    }
}

// ---------------------------------------------------------------------------
// Updater
// ---------------------------------------------------------------------------

pub struct PluginUpdater {
    fetcher: Arc<dyn ContentFetcher>,
    base_url: String,
    plugin_dir: PathBuf,
}

impl PluginUpdater {
    pub fn new(
        fetcher: Arc<dyn ContentFetcher>,
        base_url: impl Into<String>,
        plugin_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            fetcher,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            plugin_dir: plugin_dir.into(),
        }
    }

    fn remote_url(&self, file: &str) -> String {
        format!("{}/{}", self.base_url, file)
    }

    /// Run one update cycle.
    pub async fn update(&self) -> UpdateReport {
        info!("Checking for plugin updates at {}", self.base_url);

        if let Err(e) = std::fs::create_dir_all(&self.plugin_dir) {
            let err = HostError::io(&self.plugin_dir, e);
            warn!("Plugin update failed: {err}");
            return UpdateReport::failed(&err);
        }

        let (manifest, raw_manifest) = match self.fetch_manifest().await {
            Ok(m) => m,
            Err(err) => {
                warn!("Plugin update failed: {err}");
                return UpdateReport::failed(&err);
            }
        };

        let (entries, rejected) = manifest.partition_valid();
        let mut outcomes: Vec<PluginUpdateOutcome> = rejected
            .into_iter()
            .map(|err| {
                warn!("{err}");
                let name = match &err {
                    HostError::InvalidManifestEntry { name, .. } => name.clone(),
                    _ => String::new(),
                };
                PluginUpdateOutcome {
                    name,
                    status: PluginUpdateStatus::Failed { error: err.to_string() },
                }
            })
            .collect();

        let downloads = entries.iter().map(|entry| self.update_entry(entry));
        outcomes.extend(join_all(downloads).await);

        // Mirror the manifest locally for the registry's icon/panel metadata
        if let Err(e) = sync_file(&self.plugin_dir.join(MANIFEST_FILE), &raw_manifest) {
            warn!("Failed to store local {MANIFEST_FILE}: {e}");
        }

        let updated = outcomes
            .iter()
            .filter(|o| matches!(o.status, PluginUpdateStatus::Updated { .. }))
            .count();
        let failed = outcomes
            .iter()
            .filter(|o| matches!(o.status, PluginUpdateStatus::Failed { .. }))
            .count();
        info!(
            "Plugin update finished: {updated} updated, {} up to date, {failed} failed",
            outcomes.len() - updated - failed
        );

        UpdateReport {
            success: true,
            error: None,
            outcomes,
        }
    }

    /// Fetch and parse the remote manifest. Returns the parsed manifest and
    /// the raw bytes for the local mirror.
    async fn fetch_manifest(&self) -> Result<(PluginManifest, Vec<u8>)> {
        let url = self.remote_url(MANIFEST_FILE);
        let response = self
            .fetcher
            .get(&url)
            .await
            .map_err(|e| HostError::ManifestFetch { message: e.to_string() })?;

        if !response.is_success() {
            return Err(HostError::ManifestFetch {
                message: format!("HTTP {}", response.status),
            });
        }

        let manifest = PluginManifest::parse(&response.body)?;
        Ok((manifest, response.body))
    }

    async fn update_entry(&self, entry: &PluginManifestEntry) -> PluginUpdateOutcome {
        let status = match self.download_entry(entry).await {
            Ok(FileSync::Written { hash }) => {
                info!("Updated plugin: {}", entry.name);
                PluginUpdateStatus::Updated { hash }
            }
            Ok(FileSync::Unchanged { hash }) => {
                info!("{} is already up to date", entry.name);
                PluginUpdateStatus::Unchanged { hash }
            }
            Err(err) => {
                warn!("{err}");
                PluginUpdateStatus::Failed { error: err.to_string() }
            }
        };

        PluginUpdateOutcome {
            name: entry.name.clone(),
            status,
        }
    }

    async fn download_entry(&self, entry: &PluginManifestEntry) -> Result<FileSync> {
        let file_name = entry.file_name();
        let fetch_error = |message: String| HostError::PluginFetch {
            name: entry.name.clone(),
            message,
        };

        let response = self
            .fetcher
            .get(&self.remote_url(&file_name))
            .await
            .map_err(|e| fetch_error(e.to_string()))?;

        if !response.is_success() {
            return Err(fetch_error(format!("HTTP {}", response.status)));
        }

        sync_file(&self.plugin_dir.join(&file_name), &response.body)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::HttpFetcher;
    use tempfile::TempDir;

    const MANIFEST: &str = r#"{"plugins":[{"name":"worldSelector","icon":"🌍"},{"name":"playerLookup"}]}"#;

    fn updater(server: &mockito::ServerGuard, dir: &Path) -> PluginUpdater {
        let fetcher = Arc::new(HttpFetcher::with_default_timeout().unwrap());
        PluginUpdater::new(fetcher, format!("{}/plugins/", server.url()), dir)
    }

    async fn serve(server: &mut mockito::ServerGuard, path: &str, status: usize, body: &str) -> mockito::Mock {
        server
            .mock("GET", path)
            .with_status(status)
            .with_body(body)
            .create_async()
            .await
    }

    #[test]
    fn content_hash_is_sha256_hex() {
        assert_eq!(
            content_hash(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn sync_file_skips_identical_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.js");
        assert!(matches!(sync_file(&path, b"x").unwrap(), FileSync::Written { .. }));
        assert!(matches!(sync_file(&path, b"x").unwrap(), FileSync::Unchanged { .. }));
        assert!(matches!(sync_file(&path, b"y").unwrap(), FileSync::Written { .. }));
        assert_eq!(std::fs::read(&path).unwrap(), b"y");
    }

    #[tokio::test]
    async fn downloads_missing_plugins_and_mirrors_manifest() {
        let mut server = mockito::Server::new_async().await;
        let _m = serve(&mut server, "/plugins/plugins.json", 200, MANIFEST).await;
        let _w = serve(&mut server, "/plugins/worldSelector.js", 200, "window.worldSelector = () => ({})").await;
        let _p = serve(&mut server, "/plugins/playerLookup.js", 200, "window.playerLookup = () => ({})").await;

        let dir = TempDir::new().unwrap();
        let report = updater(&server, dir.path()).update().await;

        assert!(report.success);
        assert_eq!(report.updated().count(), 2);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("worldSelector.js")).unwrap(),
            "window.worldSelector = () => ({})"
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join(MANIFEST_FILE)).unwrap(),
            MANIFEST
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn unchanged_content_is_not_rewritten() {
        use std::os::unix::fs::MetadataExt;

        let mut server = mockito::Server::new_async().await;
        let _m = serve(&mut server, "/plugins/plugins.json", 200, MANIFEST).await;
        let _w = serve(&mut server, "/plugins/worldSelector.js", 200, "same").await;
        let _p = serve(&mut server, "/plugins/playerLookup.js", 200, "same too").await;

        let dir = TempDir::new().unwrap();
        let updater = updater(&server, dir.path());
        updater.update().await;

        // Every write goes through temp file + rename, which replaces the inode.
        let inode = |name: &str| std::fs::metadata(dir.path().join(name)).unwrap().ino();
        let before: Vec<u64> = ["worldSelector.js", "playerLookup.js", MANIFEST_FILE]
            .iter()
            .map(|n| inode(n))
            .collect();

        let report = updater.update().await;
        assert!(report.success);
        assert_eq!(report.updated().count(), 0);
        assert_eq!(report.failed_names().count(), 0);
        assert!(
            report
                .outcomes
                .iter()
                .all(|o| matches!(o.status, PluginUpdateStatus::Unchanged { .. }))
        );

        let after: Vec<u64> = ["worldSelector.js", "playerLookup.js", MANIFEST_FILE]
            .iter()
            .map(|n| inode(n))
            .collect();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn changed_content_is_written_once_with_matching_hash() {
        let mut server = mockito::Server::new_async().await;
        let _m = serve(&mut server, "/plugins/plugins.json", 200, r#"{"plugins":[{"name":"worldSelector"}]}"#).await;
        let _w = serve(&mut server, "/plugins/worldSelector.js", 200, "version two").await;

        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("worldSelector.js"), "version one").unwrap();

        let report = updater(&server, dir.path()).update().await;
        assert_eq!(report.outcomes.len(), 1);
        let PluginUpdateStatus::Updated { hash } = &report.outcomes[0].status else {
            panic!("expected an update, got {:?}", report.outcomes[0].status);
        };
        let on_disk = std::fs::read(dir.path().join("worldSelector.js")).unwrap();
        assert_eq!(on_disk, b"version two");
        assert_eq!(hash, &content_hash(&on_disk));
    }

    #[tokio::test]
    async fn manifest_404_leaves_local_files_untouched() {
        let mut server = mockito::Server::new_async().await;
        let _m = serve(&mut server, "/plugins/plugins.json", 404, "Not Found").await;

        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("worldSelector.js"), "cached copy").unwrap();
        std::fs::write(dir.path().join(MANIFEST_FILE), MANIFEST).unwrap();

        let report = updater(&server, dir.path()).update().await;
        assert!(!report.success);
        assert!(report.error.as_deref().unwrap().contains("404"));
        assert_eq!(std::fs::read(dir.path().join("worldSelector.js")).unwrap(), b"cached copy");
        assert_eq!(std::fs::read_to_string(dir.path().join(MANIFEST_FILE)).unwrap(), MANIFEST);
    }

    #[tokio::test]
    async fn malformed_manifest_is_a_failure() {
        let mut server = mockito::Server::new_async().await;
        let _m = serve(&mut server, "/plugins/plugins.json", 200, r#"{"items":[]}"#).await;

        let dir = TempDir::new().unwrap();
        let report = updater(&server, dir.path()).update().await;
        assert!(!report.success);
        assert!(!dir.path().join(MANIFEST_FILE).exists());
    }

    #[tokio::test]
    async fn one_failed_download_does_not_block_others() {
        let mut server = mockito::Server::new_async().await;
        let _m = serve(&mut server, "/plugins/plugins.json", 200, MANIFEST).await;
        let _w = serve(&mut server, "/plugins/worldSelector.js", 500, "boom").await;
        let _p = serve(&mut server, "/plugins/playerLookup.js", 200, "lookup v1").await;

        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("worldSelector.js"), "stale copy").unwrap();

        let report = updater(&server, dir.path()).update().await;
        assert!(report.success);
        assert_eq!(report.failed_names().collect::<Vec<_>>(), vec!["worldSelector"]);
        assert_eq!(report.updated().collect::<Vec<_>>(), vec!["playerLookup"]);
        assert_eq!(std::fs::read(dir.path().join("worldSelector.js")).unwrap(), b"stale copy");
    }

    #[tokio::test]
    async fn unsafe_manifest_names_are_rejected() {
        let mut server = mockito::Server::new_async().await;
        let _m = serve(&mut server, "/plugins/plugins.json", 200, r#"{"plugins":[{"name":"../escape"}]}"#).await;

        let dir = TempDir::new().unwrap();
        let report = updater(&server, dir.path()).update().await;
        assert!(report.success);
        assert_eq!(report.failed_names().collect::<Vec<_>>(), vec!["../escape"]);
        assert!(!dir.path().parent().unwrap().join("escape.js").exists());
    }

    #[test]
    fn report_serialises_success_shape() {
        let report = UpdateReport {
            success: true,
            error: None,
            outcomes: vec![PluginUpdateOutcome {
                name: "worldSelector".into(),
                status: PluginUpdateStatus::Unchanged { hash: "abc".into() },
            }],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["success"], true);
        assert!(json.get("error").is_none());
        assert_eq!(json["outcomes"][0]["status"], "unchanged");
        assert_eq!(json["outcomes"][0]["name"], "worldSelector");
    }
}
