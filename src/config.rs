use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::Deserialize;

use crate::catalog;
use crate::error::ConfigError;
use crate::fetch::DEFAULT_TIMEOUT;
use crate::types::SourceDescriptor;

pub const TIMEOUT_ENV: &str = "GALLERY_TIMEOUT_MS";
pub const DATABASE_ENV: &str = "GALLERY_DATABASE_URL";

/// Contents of `gallery.toml`. Every field is optional.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct GalleryConfig {
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub database_url: Option<String>,
    /// Set to false to drop the built-in catalog entirely.
    #[serde(default)]
    pub builtin_sources: Option<bool>,
    #[serde(default)]
    pub sources: Vec<SourceDescriptor>,
    /// Extra or replacement edge-proxy routes, id -> upstream base URL.
    #[serde(default)]
    pub proxy: BTreeMap<String, String>,
}

impl GalleryConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: GalleryConfig = toml::from_str(s)?;
        let mut seen = std::collections::HashSet::new();
        for src in &cfg.sources {
            if !seen.insert(src.id.as_str()) {
                return Err(ConfigError::DuplicateId(src.id.clone()));
            }
        }
        Ok(cfg)
    }

    /// Load `path` (must exist), or the default location when `None` (may be absent).
    /// Environment overrides are applied on top.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let cfg = match path {
            Some(p) => Self::read(p)?,
            None => match default_config_path() {
                Some(p) if p.exists() => Self::read(&p)?,
                _ => Self::default(),
            },
        };
        Ok(cfg.with_overrides(|key| std::env::var(key).ok()))
    }

    fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file: {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("parsing config file: {}", path.display()))
    }

    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(ms) = lookup(TIMEOUT_ENV).and_then(|s| s.trim().parse().ok()) {
            self.timeout_ms = Some(ms);
        }
        if let Some(url) = lookup(DATABASE_ENV).filter(|s| !s.trim().is_empty()) {
            self.database_url = Some(url);
        }
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout_ms.filter(|ms| *ms > 0).map(Duration::from_millis).unwrap_or(DEFAULT_TIMEOUT)
    }

    /// Built-in sources (unless disabled) followed by configured ones; a
    /// configured source replaces a built-in one with the same id in place.
    pub fn catalog(&self) -> Result<Vec<SourceDescriptor>, ConfigError> {
        let mut out = if self.builtin_sources.unwrap_or(true) { catalog::builtin()? } else { Vec::new() };
        merge_sources(&mut out, self.sources.iter().cloned());
        Ok(out)
    }
}

/// Insert or replace by id, preserving the position of replaced entries.
pub(crate) fn merge_sources(into: &mut Vec<SourceDescriptor>, extra: impl IntoIterator<Item = SourceDescriptor>) {
    for src in extra {
        match into.iter_mut().find(|s| s.id == src.id) {
            Some(existing) => *existing = src,
            None => into.push(src),
        }
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    let proj = ProjectDirs::from("dev", "gallery", "gallery")?;
    Some(proj.config_dir().join("gallery.toml"))
}
