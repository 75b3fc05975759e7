pub mod player_lookup;
pub mod script;
pub mod settings;
pub mod world_selector;

use std::sync::Arc;

use crate::error::Result;
use crate::plugins::{Plugin, PluginCatalog, PluginSource};

pub const WORLD_SELECTOR: &str = "worldSelector";
pub const PLAYER_LOOKUP: &str = "playerLookup";
pub const SETTINGS: &str = "settings";

impl PluginCatalog {
    /// Catalog shipped with the client: native world selector, player lookup
    /// and settings panel, and script plugins for anything else. Each one
    /// only loads once its file has been downloaded.
    pub fn builtin() -> Self {
        let mut catalog = PluginCatalog::new();
        catalog
            .register(WORLD_SELECTOR, |_: &PluginSource| -> Result<Arc<dyn Plugin>> {
                Ok(Arc::new(world_selector::WorldSelector))
            })
            .register(PLAYER_LOOKUP, |_: &PluginSource| -> Result<Arc<dyn Plugin>> {
                Ok(Arc::new(player_lookup::PlayerLookup))
            })
            .register(SETTINGS, |_: &PluginSource| -> Result<Arc<dyn Plugin>> {
                Ok(Arc::new(settings::Settings))
            })
            .set_fallback(|source: &PluginSource| -> Result<Arc<dyn Plugin>> {
                Ok(Arc::new(script::ScriptPlugin::from_source(source)?))
            });
        catalog
    }
}
