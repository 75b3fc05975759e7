//! Remote profile lookups against the game website: hiscores, adventure log
//! and the world list.
//!
//! The site only serves HTML, so rows are picked apart with `regex`. Missing
//! players are signalled by the site redirecting away from the profile page
//! (or a 404); both map to [`LookupOutcome::NotFound`].

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::{debug, warn};

use crate::error::{HostError, Result};
use crate::fetcher::{validate_url, ContentFetcher};

pub const DEFAULT_SITE_ORIGIN: &str = "https://2004.lostcity.rs";
pub const DEFAULT_GAME_URL_TEMPLATE: &str = "https://w{world}-2004.lostcity.rs/rs2.cgi";
const SERVER_LIST_QUERY: &str = "serverlist?hires.x=101&hires.y=41&method=0";

static ROW_START: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<tr[\s>]").unwrap());
static ROW_END: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</tr\s*>").unwrap());
static CELL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<td[^>]*>(.*?)</td\s*>").unwrap());
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());
static IMG_SRC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<img[^>]*\ssrc\s*=\s*["']([^"']*)["']"#).unwrap());
static LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<a[^>]*\shref\s*=\s*["']([^"']*)["']"#).unwrap());
static WORLD_PARAM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"world=(\d+)").unwrap());
static PLAYER_COUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*players").unwrap());
static LOG_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<div\s+style\s*=\s*"text-align:\s*left;?"\s*>(.*?)</div\s*>"#).unwrap()
});
static SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<span[^>]*>(.*?)</span\s*>").unwrap());
static LINE_BREAK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").unwrap());

// ---------------------------------------------------------------------------
// Endpoints
// ---------------------------------------------------------------------------

/// Where lookups go. Overridable so tests can target a local server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameEndpoints {
    /// Site origin, also used to absolutize relative flag image paths.
    pub site_origin: String,
    /// Game client URL with a `{world}` placeholder.
    pub game_url_template: String,
}

impl Default for GameEndpoints {
    fn default() -> Self {
        Self {
            site_origin: DEFAULT_SITE_ORIGIN.to_string(),
            game_url_template: DEFAULT_GAME_URL_TEMPLATE.to_string(),
        }
    }
}

impl GameEndpoints {
    pub fn with_origin(origin: impl Into<String>) -> Self {
        Self {
            site_origin: origin.into().trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    pub fn hiscores_url(&self, player: &str) -> Result<String> {
        self.player_url(&["hiscores", "player"], player)
    }

    pub fn adventure_log_url(&self, player: &str) -> Result<String> {
        self.player_url(&["player", "adventurelog"], player)
    }

    pub fn server_list_url(&self) -> String {
        format!("{}/{SERVER_LIST_QUERY}", self.site_origin)
    }

    pub fn game_url(&self, world: u32) -> String {
        self.game_url_template.replace("{world}", &world.to_string())
    }

    /// World number of a game client URL, if the URL matches the template.
    pub fn world_from_game_url(&self, url: &str) -> Option<u32> {
        let pattern = format!(
            "^{}$",
            regex::escape(&self.game_url_template).replace(r"\{world\}", r"(\d+)")
        );
        let re = Regex::new(&pattern).ok()?;
        re.captures(url)?.get(1)?.as_str().parse().ok()
    }

    fn player_url(&self, segments: &[&str], player: &str) -> Result<String> {
        let mut url = validate_url(&self.site_origin)?;
        url.path_segments_mut()
            .map_err(|_| HostError::UnsupportedUrl {
                url: self.site_origin.clone(),
                reason: "URL cannot be a base".into(),
            })?
            .pop_if_empty()
            .extend(segments)
            .push(player);
        Ok(url.to_string())
    }

    fn absolutize(&self, src: &str) -> String {
        if src.starts_with("http") {
            src.to_string()
        } else if src.starts_with('/') {
            format!("{}{src}", self.site_origin)
        } else {
            format!("{}/{src}", self.site_origin)
        }
    }
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum LookupOutcome<T> {
    Found { data: T },
    NotFound,
    Failed { message: String },
}

impl<T> LookupOutcome<T> {
    pub fn found(self) -> Option<T> {
        match self {
            LookupOutcome::Found { data } => Some(data),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillLevel {
    pub level: u32,
    pub xp: u64,
}

/// Skills keyed by lowercased name as shown on the hiscores page.
pub type SkillTable = BTreeMap<String, SkillLevel>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdventureLogEntry {
    pub timestamp: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldEntry {
    pub world: u32,
    pub players: u32,
    /// Region flag image; empty when the list carried none.
    pub flag_src: String,
}

// ---------------------------------------------------------------------------
// Fetching
// ---------------------------------------------------------------------------

pub async fn fetch_player_skills(
    fetcher: &dyn ContentFetcher,
    endpoints: &GameEndpoints,
    name: &str,
) -> LookupOutcome<SkillTable> {
    let name = name.trim();
    if name.is_empty() {
        return LookupOutcome::NotFound;
    }
    match fetch_profile_page(fetcher, endpoints.hiscores_url(name)).await {
        Ok(Some(html)) => LookupOutcome::Found {
            data: parse_skill_table(&html),
        },
        Ok(None) => LookupOutcome::NotFound,
        Err(e) => {
            warn!("Hiscores lookup for {name} failed: {e}");
            LookupOutcome::Failed {
                message: e.to_string(),
            }
        }
    }
}

pub async fn fetch_adventure_log(
    fetcher: &dyn ContentFetcher,
    endpoints: &GameEndpoints,
    name: &str,
) -> LookupOutcome<Vec<AdventureLogEntry>> {
    let name = name.trim();
    if name.is_empty() {
        return LookupOutcome::NotFound;
    }
    match fetch_profile_page(fetcher, endpoints.adventure_log_url(name)).await {
        Ok(Some(html)) => LookupOutcome::Found {
            data: parse_adventure_log(&html),
        },
        Ok(None) => LookupOutcome::NotFound,
        Err(e) => {
            warn!("Adventure log lookup for {name} failed: {e}");
            LookupOutcome::Failed {
                message: e.to_string(),
            }
        }
    }
}

pub async fn fetch_world_list(
    fetcher: &dyn ContentFetcher,
    endpoints: &GameEndpoints,
) -> Result<Vec<WorldEntry>> {
    let response = fetcher.get(&endpoints.server_list_url()).await?;
    if !response.is_success() {
        return Err(HostError::RemoteLookup(format!(
            "server list returned status {}",
            response.status
        )));
    }
    let worlds = parse_world_list(&response.text(), endpoints);
    debug!(count = worlds.len(), "parsed world list");
    Ok(worlds)
}

/// `Ok(None)` when the site says the player does not exist.
async fn fetch_profile_page(
    fetcher: &dyn ContentFetcher,
    url: Result<String>,
) -> Result<Option<String>> {
    let response = fetcher.get(&url?).await?;
    if response.redirected || response.status == 404 {
        return Ok(None);
    }
    if !response.is_success() {
        return Err(HostError::RemoteLookup(format!(
            "profile page returned status {}",
            response.status
        )));
    }
    Ok(Some(response.text()))
}

// ---------------------------------------------------------------------------
// HTML parsing
// ---------------------------------------------------------------------------

fn text_of(fragment: &str) -> String {
    let stripped = TAG.replace_all(fragment, "");
    stripped
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .trim()
        .to_string()
}

/// Each table row's own markup, from its `<tr` up to its `</tr>` or the next
/// row, whichever comes first. Nested tables therefore yield their inner rows.
fn rows(html: &str) -> Vec<&str> {
    let starts: Vec<usize> = ROW_START.find_iter(html).map(|m| m.start()).collect();
    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let limit = starts.get(i + 1).copied().unwrap_or(html.len());
            let row = &html[start..limit];
            match ROW_END.find(row) {
                Some(end) => &row[..end.start()],
                None => row,
            }
        })
        .collect()
}

fn cells(row: &str) -> Vec<String> {
    CELL.captures_iter(row)
        .map(|c| text_of(c.get(1).map_or("", |m| m.as_str())))
        .collect()
}

pub fn parse_skill_table(html: &str) -> SkillTable {
    let mut skills = SkillTable::new();
    for row in rows(html) {
        let cells = cells(row);
        if cells.len() != 6 {
            continue;
        }
        let skill = cells[2].to_lowercase();
        let level = cells[4].parse::<u32>();
        let xp = cells[5].replace(',', "").parse::<u64>();
        if let (false, Ok(level), Ok(xp)) = (skill.is_empty(), level, xp) {
            skills.insert(skill, SkillLevel { level, xp });
        }
    }
    skills
}

pub fn parse_adventure_log(html: &str) -> Vec<AdventureLogEntry> {
    LOG_BLOCK
        .captures_iter(html)
        .filter_map(|block| {
            let inner = block.get(1)?.as_str();
            let timestamp = SPAN
                .captures(inner)
                .map(|c| text_of(c.get(1).map_or("", |m| m.as_str())))
                .unwrap_or_default();
            if timestamp.is_empty() {
                return None;
            }
            // The timestamp span and <br> end a line; inline markup does not.
            let without_stamp = SPAN.replace(inner, "\n");
            let content = LINE_BREAK
                .replace_all(&without_stamp, "\n")
                .lines()
                .map(text_of)
                .find(|line| !line.is_empty() && !line.contains(&timestamp))?;
            Some(AdventureLogEntry { timestamp, content })
        })
        .collect()
}

pub fn parse_world_list(html: &str, endpoints: &GameEndpoints) -> Vec<WorldEntry> {
    let mut worlds = Vec::new();
    let mut flag_src = String::new();

    for row in rows(html) {
        let link = LINK.captures(row).and_then(|c| c.get(1)).map(|m| m.as_str());
        let image = IMG_SRC.captures(row).and_then(|c| c.get(1)).map(|m| m.as_str());

        match (link, image) {
            (None, Some(src)) => flag_src = endpoints.absolutize(src),
            (Some(href), _) => {
                let Some(world) = WORLD_PARAM
                    .captures(href)
                    .and_then(|c| c[1].parse::<u32>().ok())
                else {
                    continue;
                };
                let players = cells(row)
                    .last()
                    .and_then(|cell| PLAYER_COUNT.captures(cell))
                    .and_then(|c| c[1].parse().ok())
                    .unwrap_or(0);
                worlds.push(WorldEntry {
                    world,
                    players,
                    flag_src: flag_src.clone(),
                });
            }
            (None, None) => {}
        }
    }
    worlds
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::HttpFetcher;

    const HISCORES: &str = r##"
        <table><tbody>
          <tr><td>Rank</td><td></td><td>Skill</td><td>Rank</td><td>Level</td><td>XP</td></tr>
          <tr><td>1</td><td><img src="/img/overall.gif"></td><td><a href="#">Overall</a></td><td>4,012</td><td>512</td><td>1,234,567</td></tr>
          <tr><td>2</td><td><img src="/img/attack.gif"></td><td><a href="#">Attack</a></td><td>3,001</td><td>60</td><td>273,742</td></tr>
          <tr><td colspan="6">Not a skill</td></tr>
        </tbody></table>"##;

    const ADVENTURE_LOG: &str = r#"
        <div style="text-align: left">
            <span>12 Mar 2025 14:02</span>
            Levelled up Attack to 60.
        </div>
        <div style="text-align: left"><span></span>No timestamp</div>
        <div style="text-align: left">
            <span>13 Mar 2025 09:10</span><br>
            Killed a Black demon.
        </div>"#;

    const SERVER_LIST: &str = r#"
        <table><tbody><tr><td>
          <table>
            <tr><td><img src="/img/flags/uk.png"></td><td>United Kingdom</td></tr>
            <tr><td><a href="client?world=1&detail=high">World 1</a></td><td>123 players</td></tr>
            <tr><td><a href="client?world=2&detail=high">World 2</a></td><td>Offline</td></tr>
          </table>
        </td><td>
          <table>
            <tr><td><img src="https://cdn.example/us.png"></td><td>USA</td></tr>
            <tr><td><a href="client?world=3">World 3</a></td><td>7 players</td></tr>
            <tr><td><a href="/news">News</a></td><td>1 players</td></tr>
          </table>
        </td></tr></tbody></table>"#;

    #[test]
    fn endpoints_encode_player_names() {
        let endpoints = GameEndpoints::default();
        assert_eq!(
            endpoints.hiscores_url("Zezima").unwrap(),
            "https://2004.lostcity.rs/hiscores/player/Zezima"
        );
        assert_eq!(
            endpoints.adventure_log_url("some one/two").unwrap(),
            "https://2004.lostcity.rs/player/adventurelog/some%20one%2Ftwo"
        );
        assert_eq!(
            endpoints.server_list_url(),
            "https://2004.lostcity.rs/serverlist?hires.x=101&hires.y=41&method=0"
        );
    }

    #[test]
    fn game_url_round_trips_world() {
        let endpoints = GameEndpoints::default();
        assert_eq!(endpoints.game_url(2), "https://w2-2004.lostcity.rs/rs2.cgi");
        assert_eq!(
            endpoints.world_from_game_url("https://w12-2004.lostcity.rs/rs2.cgi"),
            Some(12)
        );
        assert_eq!(endpoints.world_from_game_url("https://example.com/rs2.cgi"), None);
    }

    #[test]
    fn parses_six_cell_skill_rows() {
        let skills = parse_skill_table(HISCORES);
        assert_eq!(skills.len(), 2);
        assert_eq!(skills["attack"], SkillLevel { level: 60, xp: 273_742 });
        assert_eq!(skills["overall"].xp, 1_234_567);
    }

    #[test]
    fn parses_adventure_log_entries() {
        let entries = parse_adventure_log(ADVENTURE_LOG);
        assert_eq!(
            entries,
            vec![
                AdventureLogEntry {
                    timestamp: "12 Mar 2025 14:02".into(),
                    content: "Levelled up Attack to 60.".into(),
                },
                AdventureLogEntry {
                    timestamp: "13 Mar 2025 09:10".into(),
                    content: "Killed a Black demon.".into(),
                },
            ]
        );
    }

    #[test]
    fn adventure_log_keeps_inline_markup_on_one_line() {
        let html = r#"
            <div style="text-align: left"><span>13 Mar 2025</span><br>Killed a <b>Black demon</b>.</div>
            <div style="text-align: left">
                <span>14 Mar 2025</span>
                Found <a href="/item/123">a <i>rune</i> scimitar</a> &amp; kept it.
            </div>"#;
        let entries = parse_adventure_log(html);
        let content: Vec<&str> = entries.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(content, vec!["Killed a Black demon.", "Found a rune scimitar & kept it."]);
    }

    #[test]
    fn parses_world_list_with_region_flags() {
        let worlds = parse_world_list(SERVER_LIST, &GameEndpoints::default());
        assert_eq!(
            worlds,
            vec![
                WorldEntry {
                    world: 1,
                    players: 123,
                    flag_src: "https://2004.lostcity.rs/img/flags/uk.png".into(),
                },
                WorldEntry {
                    world: 2,
                    players: 0,
                    flag_src: "https://2004.lostcity.rs/img/flags/uk.png".into(),
                },
                WorldEntry {
                    world: 3,
                    players: 7,
                    flag_src: "https://cdn.example/us.png".into(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn redirected_profile_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        let landing = format!("{}/hiscores", server.url());
        let _redirect = server
            .mock("GET", "/hiscores/player/nobody")
            .with_status(302)
            .with_header("location", &landing)
            .create_async()
            .await;
        let _landing = server
            .mock("GET", "/hiscores")
            .with_status(200)
            .with_body("<html>Hiscores</html>")
            .create_async()
            .await;
        let _log = server
            .mock("GET", "/player/adventurelog/nobody")
            .with_status(404)
            .create_async()
            .await;

        let fetcher = HttpFetcher::with_default_timeout().unwrap();
        let endpoints = GameEndpoints::with_origin(server.url());

        assert_eq!(
            fetch_player_skills(&fetcher, &endpoints, "nobody").await,
            LookupOutcome::NotFound
        );
        assert_eq!(
            fetch_adventure_log(&fetcher, &endpoints, "nobody").await,
            LookupOutcome::NotFound
        );
    }

    #[tokio::test]
    async fn found_profile_is_parsed() {
        let mut server = mockito::Server::new_async().await;
        let _page = server
            .mock("GET", "/hiscores/player/Zezima")
            .with_status(200)
            .with_body(HISCORES)
            .create_async()
            .await;

        let fetcher = HttpFetcher::with_default_timeout().unwrap();
        let endpoints = GameEndpoints::with_origin(server.url());
        let skills = fetch_player_skills(&fetcher, &endpoints, " Zezima ")
            .await
            .found()
            .unwrap();
        assert_eq!(skills["attack"].level, 60);
    }

    #[tokio::test]
    async fn server_error_is_failed_not_missing() {
        let mut server = mockito::Server::new_async().await;
        let _page = server
            .mock("GET", "/hiscores/player/Zezima")
            .with_status(500)
            .create_async()
            .await;

        let fetcher = HttpFetcher::with_default_timeout().unwrap();
        let endpoints = GameEndpoints::with_origin(server.url());
        let outcome = fetch_player_skills(&fetcher, &endpoints, "Zezima").await;
        assert!(matches!(outcome, LookupOutcome::Failed { .. }));
    }

    #[tokio::test]
    async fn blank_name_makes_no_request() {
        let endpoints = GameEndpoints::with_origin("http://127.0.0.1:9");
        let fetcher = HttpFetcher::with_default_timeout().unwrap();
        assert_eq!(
            fetch_player_skills(&fetcher, &endpoints, "   ").await,
            LookupOutcome::NotFound
        );
    }

    #[tokio::test]
    async fn world_list_fetch_uses_server_list_endpoint() {
        let mut server = mockito::Server::new_async().await;
        let _list = server
            .mock("GET", "/serverlist")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(SERVER_LIST)
            .create_async()
            .await;

        let fetcher = HttpFetcher::with_default_timeout().unwrap();
        let endpoints = GameEndpoints::with_origin(server.url());
        let worlds = fetch_world_list(&fetcher, &endpoints).await.unwrap();
        assert_eq!(worlds.len(), 3);
        assert!(worlds[0].flag_src.starts_with(&server.url()));
    }
}
