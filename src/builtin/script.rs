//! Script plugins: downloaded files with no native implementation.
//!
//! The host cannot run the script itself, so it checks the file's shape at
//! load time and points the panel webview at `plugin://{name}.js`, which the
//! webview imports as a module. A script must register a factory, either
//! `window.<name> = function ...` / `window.<name> = (...) => ...`, or an
//! `export default`.

use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;

use crate::error::{HostError, Result};
use crate::manifest::PLUGIN_FILE_EXT;
use crate::plugins::{ContentBody, ContentContext, Plugin, PluginSource};

static EXPORT_DEFAULT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*export\s+default\b").unwrap());
static NAME_LITERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bname\s*:\s*["']([^"'\n]+)["']"#).unwrap());
static ICON_LITERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bicon\s*:\s*["']([^"'\n]+)["']"#).unwrap());

#[derive(Debug, Clone)]
pub struct ScriptPlugin {
    title: String,
    icon: Option<String>,
    module: String,
}

impl ScriptPlugin {
    pub fn from_source(source: &PluginSource) -> Result<Self> {
        let text = std::str::from_utf8(&source.bytes).map_err(|e| HostError::PluginEvaluation {
            name: source.name.clone(),
            message: format!("script is not valid UTF-8: {e}"),
        })?;
        if text.trim().is_empty() {
            return Err(HostError::PluginEvaluation {
                name: source.name.clone(),
                message: "script is empty".into(),
            });
        }
        if !exposes_factory(text, &source.name) {
            return Err(HostError::InvalidPluginStructure {
                name: source.name.clone(),
                reason: format!(
                    "script does not assign window.{} or export a default factory",
                    source.name
                ),
            });
        }

        let literal = |re: &Regex| {
            re.captures(text)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().trim().to_string())
                .filter(|s| !s.is_empty())
        };

        Ok(Self {
            title: literal(&NAME_LITERAL).unwrap_or_else(|| source.name.clone()),
            icon: literal(&ICON_LITERAL),
            module: format!("{}.{PLUGIN_FILE_EXT}", source.name),
        })
    }
}

fn exposes_factory(text: &str, name: &str) -> bool {
    if EXPORT_DEFAULT.is_match(text) {
        return true;
    }
    let assignment = format!(
        r"window\.{}\s*=\s*(async\s+)?(function\b|\([^)]*\)\s*=>|[A-Za-z_$][\w$]*\s*=>)",
        regex::escape(name)
    );
    Regex::new(&assignment).is_ok_and(|re| re.is_match(text))
}

#[async_trait]
impl Plugin for ScriptPlugin {
    fn name(&self) -> &str {
        &self.title
    }

    fn icon(&self) -> Option<&str> {
        self.icon.as_deref()
    }

    async fn produce_content(&self, _ctx: &ContentContext) -> Result<ContentBody> {
        Ok(ContentBody::Script {
            module: self.module.clone(),
        })
    }
}
