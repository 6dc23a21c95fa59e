use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::{DEFAULT_NAMESPACE, DEFAULT_TTL};
use crate::relay::RelayConfig;
use crate::types::SourceKind;

pub const CUSTOM_RELAY_ID: &str = "custom";
pub const DIRECT_RELAY_ID: &str = "none";

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub relay: RelaySettings,
    pub cache: CacheSettings,
    pub http: HttpSettings,
    pub storage: StorageSettings,
    pub sources: CuratedSources,
    pub categories: Categories,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct RelayPreset {
    pub id: String,
    pub name: String,
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RelaySettings {
    pub preset: String,
    pub custom_url: Option<String>,
    pub presets: Vec<RelayPreset>,
    // Raw prefix that wins over the preset; set from VODMUX_RELAY.
    #[serde(skip)]
    pub override_prefix: Option<String>,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self { preset: DIRECT_RELAY_ID.to_string(), custom_url: None, presets: default_presets(), override_prefix: None }
    }
}

fn default_presets() -> Vec<RelayPreset> {
    let preset = |id: &str, name: &str, url: &str| RelayPreset { id: id.into(), name: name.into(), url: url.into() };
    vec![
        preset("cors-eu-org", "cors.eu.org", "https://cors.eu.org/"),
        preset("corsproxy-io", "corsproxy.io", "https://corsproxy.io/?"),
        preset(DIRECT_RELAY_ID, "No relay (direct connection)", ""),
        preset(CUSTOM_RELAY_ID, "Custom relay", ""),
    ]
}

impl RelaySettings {
    pub fn find_preset(&self, id: &str) -> Option<&RelayPreset> { self.presets.iter().find(|p| p.id == id) }

    /// Resolve a preset selection to a relay. `custom` takes `custom_url`;
    /// unknown ids fall back to a direct connection.
    pub fn resolve(&self, preset: &str, custom_url: Option<&str>) -> RelayConfig {
        if preset == CUSTOM_RELAY_ID {
            return RelayConfig::new(custom_url.unwrap_or_default());
        }
        self.find_preset(preset).map(|p| RelayConfig::new(p.url.as_str())).unwrap_or_default()
    }

    pub fn initial_relay(&self) -> RelayConfig {
        match &self.override_prefix {
            Some(prefix) => RelayConfig::new(prefix.as_str()),
            None => self.resolve(&self.preset, self.custom_url.as_deref()),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CacheSettings {
    pub namespace: String,
    pub ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self { Self { namespace: DEFAULT_NAMESPACE.to_string(), ttl_secs: DEFAULT_TTL.as_secs() } }
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration { Duration::from_secs(self.ttl_secs) }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self { Self { timeout_secs: 15, user_agent: format!("vodmux/{}", env!("CARGO_PKG_VERSION")) } }
}

impl HttpSettings {
    pub fn timeout(&self) -> Duration { Duration::from_secs(self.timeout_secs) }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct StorageSettings {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct CuratedSource {
    pub name: String,
    pub url: String,
    pub kind: SourceKind,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(transparent)]
pub struct CuratedSources(pub Vec<CuratedSource>);

impl Default for CuratedSources {
    fn default() -> Self {
        let cms = |name: &str, url: &str| CuratedSource { name: name.into(), url: url.into(), kind: SourceKind::CmsApi };
        let mut list = vec![
            cms("Ikun", "https://ikunzyapi.com/api.php/provide/vod"),
            cms("Maotai", "https://caiji.maotaizy.cc/api.php/provide/vod/from/mtm3u8/at/josn/"),
            cms("Dytt", "https://caiji.dyttzyapi.com/api.php/provide/vod"),
        ];
        list.sort_by(|a, b| a.name.cmp(&b.name));
        Self(list)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct Category {
    pub name: String,
    pub id: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(transparent)]
pub struct Categories(pub Vec<Category>);

impl Default for Categories {
    fn default() -> Self {
        let cat = |name: &str, id: Option<&str>| Category { name: name.into(), id: id.map(str::to_string) };
        Self(vec![cat("home", None), cat("movies", Some("1")), cat("series", Some("2")), cat("variety", Some("3")), cat("anime", Some("4"))])
    }
}

impl Categories {
    /// Map a category name (case-insensitive) to its id. Anything that is not
    /// a known name is taken to be a raw id.
    pub fn resolve(&self, name_or_id: &str) -> Option<String> {
        let wanted = name_or_id.trim();
        match self.0.iter().find(|c| c.name.eq_ignore_ascii_case(wanted)) {
            Some(c) => c.id.clone(),
            None if wanted.is_empty() => None,
            None => Some(wanted.to_string()),
        }
    }
}

impl Config {
    /// Load from `path`, or from the default config location when it exists,
    /// then apply `VODMUX_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => Some(p.to_path_buf()),
            None => default_config_path().filter(|p| p.exists()),
        };
        let mut cfg = match path {
            Some(p) => {
                let text = std::fs::read_to_string(&p).with_context(|| format!("reading config: {}", p.display()))?;
                Self::from_toml(&text).with_context(|| format!("parsing config: {}", p.display()))?
            }
            None => Self::default(),
        };
        cfg.apply_env(|k| std::env::var(k).ok());
        Ok(cfg)
    }

    pub fn from_toml(text: &str) -> Result<Self> { Ok(toml::from_str(text)?) }

    pub fn apply_env<F: Fn(&str) -> Option<String>>(&mut self, var: F) {
        if let Some(prefix) = var("VODMUX_RELAY") {
            self.relay.override_prefix = Some(prefix);
        }
        if let Some(ttl) = var("VODMUX_CACHE_TTL_SECS").and_then(|s| s.parse().ok()) {
            self.cache.ttl_secs = ttl;
        }
        if let Some(store) = var("VODMUX_STORE").filter(|s| !s.trim().is_empty()) {
            self.storage.path = Some(PathBuf::from(store));
        }
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("dev", "vodmux", "vodmux").map(|p| p.config_dir().join("config.toml"))
}
