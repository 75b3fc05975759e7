//! Native shell for the LostCity 2004 game client with a downloadable plugin
//! sidebar.
//!
//! The plugin core (fetching, updating, loading, placement, layout and the UI
//! protocol) has no GUI dependency; the Tauri window lives behind the
//! `desktop` feature.

pub mod app_logger;
pub mod bridge;
pub mod builtin;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod layout;
pub mod logging;
pub mod lookup;
pub mod manifest;
pub mod placement;
pub mod plugins;
pub mod updater;

#[cfg(feature = "desktop")]
mod desktop;

pub use bridge::{GameSurface, HostMessage, PanelNotifier, PluginHost, PluginSnapshot, UiRequest, WorldTarget};
pub use error::{HostError, Result};
pub use plugins::{PluginCatalog, PluginRegistry};
pub use updater::{PluginUpdater, UpdateReport};

#[cfg(feature = "desktop")]
pub use desktop::run;
