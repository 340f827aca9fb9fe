use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub zotero: Option<ZoteroConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

/// Remote library settings. Only `lidia fetch` needs these.
#[derive(Debug, Deserialize, Clone)]
pub struct ZoteroConfig {
    pub library_id: String,
    #[serde(default = "default_library_type")]
    pub library_type: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_library_type() -> String {
    "group".to_string()
}
fn default_base_url() -> String {
    "https://api.zotero.org".to_string()
}
fn default_page_size() -> u32 {
    100
}

impl ZoteroConfig {
    /// Path segment used by the Web API for this library (`users/<id>` or `groups/<id>`).
    pub fn library_prefix(&self) -> String {
        let kind = if self.library_type == "user" {
            "users"
        } else {
            "groups"
        };
        format!("{}/{}", kind, self.library_id)
    }

    /// API key from the config file, or from `ZOTERO_API_KEY`.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var("ZOTERO_API_KEY").ok())
    }
}

impl Config {
    /// Config with only a database path, for tests and tooling.
    pub fn with_db_path(path: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig { path: path.into() },
            zotero: None,
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if let Some(ref zotero) = config.zotero {
        if zotero.library_id.trim().is_empty() {
            anyhow::bail!("zotero.library_id must not be empty");
        }
        match zotero.library_type.as_str() {
            "user" | "group" => {}
            other => anyhow::bail!(
                "Unknown zotero.library_type: '{}'. Must be user or group.",
                other
            ),
        }
        if !(1..=100).contains(&zotero.page_size) {
            anyhow::bail!("zotero.page_size must be in [1, 100]");
        }
    }

    Ok(config)
}
