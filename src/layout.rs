//! Panel geometry: main game surface, side panel and optional bottom panel.

use serde::{Deserialize, Serialize};

use crate::config::{DEFAULT_BOTTOM_PANEL_HEIGHT, DEFAULT_SIDE_PANEL_WIDTH};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutBounds {
    pub main: Rect,
    pub side: Rect,
    pub bottom: Rect,
}

/// Layout state. Bounds are always derived from the last container size and
/// the bottom panel flag, never updated incrementally.
#[derive(Debug, Clone)]
pub struct PanelLayout {
    side_width: u32,
    bottom_height: u32,
    bottom_visible: bool,
    container: (u32, u32),
}

impl Default for PanelLayout {
    fn default() -> Self {
        Self::new(DEFAULT_SIDE_PANEL_WIDTH, DEFAULT_BOTTOM_PANEL_HEIGHT)
    }
}

impl PanelLayout {
    pub fn new(side_width: u32, bottom_height: u32) -> Self {
        Self {
            side_width,
            bottom_height,
            bottom_visible: false,
            container: (0, 0),
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) -> LayoutBounds {
        self.container = (width, height);
        self.bounds()
    }

    pub fn set_bottom_visible(&mut self, visible: bool) -> LayoutBounds {
        self.bottom_visible = visible;
        self.bounds()
    }

    pub fn bottom_visible(&self) -> bool {
        self.bottom_visible
    }

    pub fn bounds(&self) -> LayoutBounds {
        compute_bounds(
            self.container,
            self.side_width,
            self.bottom_height,
            self.bottom_visible,
        )
    }
}

/// Panels never extend past the container; differences saturate at zero.
pub fn compute_bounds(
    (width, height): (u32, u32),
    side_width: u32,
    bottom_height: u32,
    bottom_visible: bool,
) -> LayoutBounds {
    let main_width = width.saturating_sub(side_width);
    let main = Rect::new(0, 0, main_width, height);
    let side = Rect::new(main_width, 0, side_width.min(width), height);
    let bottom = if bottom_visible {
        let bottom_height = bottom_height.min(height);
        Rect::new(0, height - bottom_height, width, bottom_height)
    } else {
        Rect::new(0, height, width, 0)
    };
    LayoutBounds { main, side, bottom }
}
