//! Plugin manifest: the remote `plugins.json` index and its local mirror.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Component, Path};
use tracing::warn;

use crate::error::{HostError, Result};

/// Name of the manifest file, both remotely and in the local plugin dir.
pub const MANIFEST_FILE: &str = "plugins.json";

/// Extension of plugin script files.
pub const PLUGIN_FILE_EXT: &str = "js";

/// Panel a plugin is placed in. Deserialization is strict; manifest entries
/// go through [`PanelSide::parse_lenient`] instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PanelSide {
    #[default]
    Right,
    Bottom,
}

impl PanelSide {
    /// Parse a panel name. Unrecognized values fall back to `Right`.
    pub fn parse_lenient(value: &str) -> Self {
        match value {
            "right" => PanelSide::Right,
            "bottom" => PanelSide::Bottom,
            other => {
                warn!("Unknown panel \"{other}\", defaulting to right");
                PanelSide::Right
            }
        }
    }
}

impl fmt::Display for PanelSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PanelSide::Right => f.write_str("right"),
            PanelSide::Bottom => f.write_str("bottom"),
        }
    }
}

fn lenient_panel<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<PanelSide>, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().map(PanelSide::parse_lenient))
}

/// A single entry in the plugin manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginManifestEntry {
    pub name: String,
    /// Display glyph; the registry falls back to a default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Default panel; `None` means "right" unless the plugin declares otherwise.
    #[serde(
        default,
        deserialize_with = "lenient_panel",
        skip_serializing_if = "Option::is_none"
    )]
    pub panel: Option<PanelSide>,
}

impl PluginManifestEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            icon: None,
            panel: None,
        }
    }

    /// File name of this plugin's script: `{name}.js`
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.name, PLUGIN_FILE_EXT)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginManifest {
    pub plugins: Vec<PluginManifestEntry>,
}

impl PluginManifest {
    /// Parse a manifest document. Anything not shaped `{plugins: [...]}` is an error.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| HostError::ManifestFetch {
            message: format!("Invalid plugin list format: {e}"),
        })
    }

    pub fn get(&self, name: &str) -> Option<&PluginManifestEntry> {
        self.plugins.iter().find(|p| p.name == name)
    }

    /// Entries usable as file keys, in manifest order, first occurrence of
    /// each name only. Rejected entries are returned alongside.
    pub fn partition_valid(&self) -> (Vec<PluginManifestEntry>, Vec<HostError>) {
        let mut seen = HashSet::new();
        let mut valid = Vec::new();
        let mut rejected = Vec::new();

        for entry in &self.plugins {
            if let Err(e) = validate_plugin_name(&entry.name) {
                rejected.push(e);
                continue;
            }
            if !seen.insert(entry.name.clone()) {
                warn!("Duplicate manifest entry \"{}\" ignored", entry.name);
                continue;
            }
            valid.push(entry.clone());
        }

        (valid, rejected)
    }
}

// ---------------------------------------------------------------------------
// Name safety
// ---------------------------------------------------------------------------

/// Returns true if a relative path attempts to escape its root via `..`,
/// absolute components, or other shenanigans.
pub(crate) fn is_path_escape(relative: &str) -> bool {
    let path = Path::new(relative);

    if path.is_absolute() {
        return true;
    }

    path.components().any(|component| {
        matches!(
            component,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}

/// A plugin name is used verbatim as a file stem, so it must be a single
/// plain path component.
pub fn validate_plugin_name(name: &str) -> Result<()> {
    let reject = |reason: &str| {
        Err(HostError::InvalidManifestEntry {
            name: name.to_string(),
            reason: reason.to_string(),
        })
    };

    if name.trim().is_empty() {
        return reject("name is empty");
    }
    if name.starts_with('.') {
        return reject("name must not start with '.'");
    }
    if name.contains('/') || name.contains('\\') || is_path_escape(name) {
        return reject("name attempts path traversal");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
