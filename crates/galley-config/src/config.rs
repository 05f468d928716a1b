//! Configuration types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::scenario::Scenario;

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GalleyConfig {
    /// Source root the entry points resolve against.
    #[serde(default)]
    pub root: Option<PathBuf>,

    /// Entry-point specifiers, relative to `root`.
    #[serde(default)]
    pub entries: Vec<String>,

    #[serde(default)]
    pub scenario: Scenario,

    #[serde(default)]
    pub dev: DevConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    /// Log filter, e.g. `"info"` or `"galley_kitchen=debug"`.
    #[serde(default)]
    pub log: Option<String>,
}

impl Default for GalleyConfig {
    fn default() -> Self {
        Self {
            root: None,
            entries: Vec::new(),
            scenario: Scenario::default(),
            dev: DevConfig::default(),
            cache: CacheConfig::default(),
            log: None,
        }
    }
}

impl GalleyConfig {
    /// Checks the parts of the config that must hold before a session starts.
    pub fn validate(&self) -> Result<()> {
        if let Some(root) = &self.root {
            if !root.exists() {
                return Err(ConfigError::RootNotFound(root.clone()));
            }
        }
        if self.scenario.is_build() && self.entries.is_empty() {
            return Err(ConfigError::NoEntries);
        }
        Ok(())
    }
}

/// Dev-scenario options: file watching and hot reload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevConfig {
    /// Per-file window coalescing rapid successive watcher events.
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_between_file_events_ms: u64,

    /// Replay `added` for files that already exist when watching starts.
    #[serde(default)]
    pub notify_existent: bool,

    /// Path substrings the watcher ignores, in addition to hidden files.
    #[serde(default = "default_watch_ignore")]
    pub watch_ignore: Vec<String>,
}

impl Default for DevConfig {
    fn default() -> Self {
        Self {
            cooldown_between_file_events_ms: default_cooldown_ms(),
            notify_existent: false,
            watch_ignore: default_watch_ignore(),
        }
    }
}

/// Compile-cache options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,

    /// Cache root directory. `None` disables persistence.
    #[serde(default)]
    pub dir: Option<PathBuf>,

    /// Tool version recorded in `__compile_context__.json`; bumping it
    /// invalidates the whole cache.
    #[serde(default = "default_cache_version")]
    pub version: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            dir: None,
            version: default_cache_version(),
        }
    }
}

fn default_cooldown_ms() -> u64 {
    100
}

fn default_watch_ignore() -> Vec<String> {
    vec!["node_modules".to_string(), ".git".to_string()]
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GalleyConfig::default();
        assert_eq!(config.scenario, Scenario::Dev);
        assert_eq!(config.dev.cooldown_between_file_events_ms, 100);
        assert!(!config.dev.notify_existent);
        assert!(config.cache.enabled);
        assert!(config.cache.dir.is_none());
    }

    #[test]
    fn test_validate_build_requires_entries() {
        let config = GalleyConfig {
            scenario: Scenario::Build,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::NoEntries)));
    }

    #[test]
    fn test_validate_missing_root() {
        let config = GalleyConfig {
            root: Some(PathBuf::from("/definitely/not/here")),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::RootNotFound(_))
        ));
    }

    #[test]
    fn test_toml_partial_fills_defaults() {
        let config: GalleyConfig = toml::from_str(
            r#"
            entries = ["index.html"]

            [dev]
            cooldown_between_file_events_ms = 250
            "#,
        )
        .unwrap();
        assert_eq!(config.entries, vec!["index.html".to_string()]);
        assert_eq!(config.dev.cooldown_between_file_events_ms, 250);
        assert!(config.cache.enabled);
    }
}
