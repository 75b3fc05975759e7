//! Native player lookup: hiscores skills plus the adventure log.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;
use crate::fetcher::ContentFetcher;
use crate::lookup::{
    fetch_adventure_log, fetch_player_skills, AdventureLogEntry, GameEndpoints, LookupOutcome,
    SkillTable,
};
use crate::plugins::{ContentBody, ContentContext, Plugin};

/// Skills in the order the profile grid shows them.
pub const SKILLS: [&str; 19] = [
    "Attack",
    "Hitpoints",
    "Mining",
    "Strength",
    "Agility",
    "Smithing",
    "Defence",
    "Herblore",
    "Fishing",
    "Ranged",
    "Thieving",
    "Cooking",
    "Prayer",
    "Crafting",
    "Firemaking",
    "Magic",
    "Fletching",
    "Woodcutting",
    "Runecrafting",
];

pub const SEARCH_PLACEHOLDER: &str = "Enter player name...";

pub struct PlayerLookup;

#[async_trait]
impl Plugin for PlayerLookup {
    fn name(&self) -> &str {
        "Player Lookup"
    }

    fn icon(&self) -> Option<&str> {
        Some("🧍")
    }

    async fn produce_content(&self, _ctx: &ContentContext) -> Result<ContentBody> {
        Ok(ContentBody::PlayerSearch {
            placeholder: SEARCH_PLACEHOLDER.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillSummary {
    pub skill: String,
    pub level: u32,
    /// `None` when the player is unranked in this skill.
    pub xp: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerProfile {
    pub name: String,
    pub skills: Vec<SkillSummary>,
    pub adventure_log: Vec<AdventureLogEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum PlayerLookupView {
    NotFound,
    Failed { message: String },
    Found { profile: PlayerProfile },
}

impl PlayerProfile {
    fn build(name: &str, skills: &SkillTable, adventure_log: Vec<AdventureLogEntry>) -> Self {
        let skills = SKILLS
            .iter()
            .map(|skill| {
                let entry = skills.get(&skill.to_lowercase());
                SkillSummary {
                    skill: skill.to_string(),
                    level: entry.map_or(1, |s| s.level),
                    xp: entry.map(|s| s.xp),
                }
            })
            .collect();
        Self {
            name: name.to_string(),
            skills,
            adventure_log,
        }
    }
}

/// Fetch skills and adventure log concurrently and combine them. A missing
/// adventure log does not hide a found profile.
pub async fn lookup_player(
    fetcher: &dyn ContentFetcher,
    endpoints: &GameEndpoints,
    name: &str,
) -> PlayerLookupView {
    let name = name.trim();
    if name.is_empty() {
        return PlayerLookupView::NotFound;
    }

    let (skills, log) = tokio::join!(
        fetch_player_skills(fetcher, endpoints, name),
        fetch_adventure_log(fetcher, endpoints, name),
    );

    match skills {
        LookupOutcome::Found { data } => PlayerLookupView::Found {
            profile: PlayerProfile::build(name, &data, log.found().unwrap_or_default()),
        },
        LookupOutcome::NotFound => PlayerLookupView::NotFound,
        LookupOutcome::Failed { message } => PlayerLookupView::Failed { message },
    }
}
