//! Native world selector: lists game worlds with player counts.

use async_trait::async_trait;
use tracing::warn;

use crate::error::Result;
use crate::lookup::fetch_world_list;
use crate::manifest::PanelSide;
use crate::plugins::{ContentBody, ContentContext, Plugin};

pub const WORLD_LIST_FAILED: &str = "Failed to load world list";

pub struct WorldSelector;

#[async_trait]
impl Plugin for WorldSelector {
    fn name(&self) -> &str {
        "World Selector"
    }

    fn icon(&self) -> Option<&str> {
        Some("🌍")
    }

    fn default_panel(&self) -> Option<PanelSide> {
        Some(PanelSide::Right)
    }

    async fn produce_content(&self, ctx: &ContentContext) -> Result<ContentBody> {
        match fetch_world_list(ctx.fetcher.as_ref(), &ctx.endpoints).await {
            Ok(worlds) => Ok(ContentBody::WorldList {
                worlds,
                current_world: ctx.current_world,
            }),
            Err(e) => {
                warn!("World list unavailable: {e}");
                Ok(ContentBody::Notice {
                    message: WORLD_LIST_FAILED.to_string(),
                })
            }
        }
    }
}
