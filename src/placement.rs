//! Which plugins are shown in which panel.

use serde::{Deserialize, Serialize};

use crate::manifest::PanelSide;
use crate::plugins::LoadedPlugin;

/// Ordered plugin names per panel. A name is in at most one list, at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivePanelAssignment {
    pub right: Vec<String>,
    pub bottom: Vec<String>,
}

impl ActivePanelAssignment {
    /// Initial placement from each plugin's resolved panel, in load order.
    pub fn from_plugins(plugins: &[LoadedPlugin]) -> Self {
        let mut assignment = Self::default();
        for plugin in plugins {
            assignment.move_plugin(&plugin.name, plugin.panel);
        }
        assignment
    }

    /// Remove `name` from both panels and append it to `target`.
    pub fn move_plugin(&mut self, name: &str, target: PanelSide) {
        self.right.retain(|n| n != name);
        self.bottom.retain(|n| n != name);
        self.list_mut(target).push(name.to_string());
    }

    pub fn panel_of(&self, name: &str) -> Option<PanelSide> {
        if self.right.iter().any(|n| n == name) {
            Some(PanelSide::Right)
        } else if self.bottom.iter().any(|n| n == name) {
            Some(PanelSide::Bottom)
        } else {
            None
        }
    }

    fn list_mut(&mut self, side: PanelSide) -> &mut Vec<String> {
        match side {
            PanelSide::Right => &mut self.right,
            PanelSide::Bottom => &mut self.bottom,
        }
    }
}
