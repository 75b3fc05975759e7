use async_trait::async_trait;

use crate::error::Result;
use crate::plugins::{ContentBody, ContentContext, Plugin};

/// Settings panel. Currently only the bottom-panel toggle.
pub struct Settings;

#[async_trait]
impl Plugin for Settings {
    fn name(&self) -> &str {
        "Settings"
    }

    fn icon(&self) -> Option<&str> {
        Some("⚙️")
    }

    async fn produce_content(&self, ctx: &ContentContext) -> Result<ContentBody> {
        Ok(ContentBody::Settings {
            bottom_panel_enabled: ctx.bottom_panel_enabled,
        })
    }
}
