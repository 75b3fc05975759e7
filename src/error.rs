//! Error taxonomy for the plugin host.
//!
//! Every failure is scoped as narrowly as possible: manifest failures abort a
//! single update cycle, everything else is per-plugin or per-request.

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the updater, registry, bridge and remote lookups.
#[derive(Debug, Error)]
pub enum HostError {
    /// The remote manifest could not be fetched or did not have the
    /// `{plugins: [...]}` shape. Fatal to one update cycle only.
    #[error("Failed to fetch plugin manifest: {message}")]
    ManifestFetch { message: String },

    /// A single plugin script could not be downloaded.
    #[error("Failed to download plugin {name}: {message}")]
    PluginFetch { name: String, message: String },

    /// A manifest entry whose name cannot be used as a file key.
    #[error("Invalid manifest entry \"{name}\": {reason}")]
    InvalidManifestEntry { name: String, reason: String },

    /// A plugin that does not satisfy the plugin interface (missing name,
    /// no factory).
    #[error("Plugin {name} has an invalid structure: {reason}")]
    InvalidPluginStructure { name: String, reason: String },

    /// A plugin that failed while being loaded.
    #[error("Plugin {name} failed to load: {message}")]
    PluginEvaluation { name: String, message: String },

    /// A content request for a name that is not in the current plugin set.
    #[error("Plugin not found: {0}")]
    PluginNotFound(String),

    /// A plugin's own external data fetch failed.
    #[error("Remote lookup failed: {0}")]
    RemoteLookup(String),

    #[error("URL \"{url}\" is not supported: {reason}")]
    UnsupportedUrl { url: String, reason: String },

    #[error("A plugin reload is already in progress")]
    ReloadInProgress,

    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The game view is missing or refused to navigate.
    #[error("Game view error: {0}")]
    Surface(String),
}

impl HostError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        HostError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, HostError>;
