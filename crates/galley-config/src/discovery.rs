//! File-based config discovery.
//!
//! Finds a `galley.toml` and merges it with `GALLEY_*` environment
//! variables on top of the built-in defaults.

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};

use crate::config::GalleyConfig;
use crate::error::{ConfigError, Result};

const CONFIG_FILE: &str = "galley.toml";

/// Searches for a config file and loads it with env overrides.
///
/// # Example
///
/// ```no_run
/// use galley_config::ConfigDiscovery;
///
/// let config = ConfigDiscovery::new(".").load().unwrap();
/// ```
pub struct ConfigDiscovery {
    root: PathBuf,
}

impl ConfigDiscovery {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Finds `galley.toml` in the root directory or any of its ancestors.
    pub fn find(&self) -> Option<PathBuf> {
        let mut dir = self.root.as_path();
        loop {
            let candidate = dir.join(CONFIG_FILE);
            if candidate.exists() {
                return Some(candidate);
            }
            dir = dir.parent()?;
        }
    }

    /// Loads the discovered file merged with `GALLEY_*` env variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] when no config file exists.
    pub fn load(&self) -> Result<GalleyConfig> {
        let path = self.find().ok_or(ConfigError::NotFound)?;
        self.load_from(&path)
    }

    /// Like [`load`](Self::load) but falls back to defaults when no file
    /// is found. Env variables still apply.
    pub fn load_or_default(&self) -> Result<GalleyConfig> {
        match self.find() {
            Some(path) => self.load_from(&path),
            None => {
                let config = Figment::from(Serialized::defaults(GalleyConfig::default()))
                    .merge(Env::prefixed("GALLEY_").split("__"))
                    .extract()?;
                Ok(config)
            }
        }
    }

    fn load_from(&self, path: &Path) -> Result<GalleyConfig> {
        tracing::debug!(path = %path.display(), "loading config");
        let config = Figment::from(Serialized::defaults(GalleyConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("GALLEY_").split("__"))
            .extract()?;
        Ok(config)
    }
}

/// Discovers and loads config from the current directory.
pub fn discover() -> Result<GalleyConfig> {
    let root = std::env::current_dir()?;
    ConfigDiscovery::new(&root).load()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn find_returns_none_when_no_config() {
        let dir = TempDir::new().unwrap();
        let discovery = ConfigDiscovery::new(dir.path());
        assert!(discovery.find().is_none());
    }

    #[test]
    fn find_discovers_toml_config() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("galley.toml");
        fs::write(&config_path, "entries = [\"index.html\"]\n").unwrap();

        let discovery = ConfigDiscovery::new(dir.path());
        assert_eq!(discovery.find().unwrap(), config_path);
    }

    #[test]
    fn find_walks_up_to_ancestors() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("src").join("pages");
        fs::create_dir_all(&nested).unwrap();
        let config_path = dir.path().join("galley.toml");
        fs::write(&config_path, "entries = []\n").unwrap();

        let discovery = ConfigDiscovery::new(&nested);
        assert_eq!(discovery.find().unwrap(), config_path);
    }

    #[test]
    fn load_returns_not_found_when_no_config() {
        let dir = TempDir::new().unwrap();
        let discovery = ConfigDiscovery::new(dir.path());
        assert!(matches!(discovery.load(), Err(ConfigError::NotFound)));
    }

    #[test]
    fn load_parses_toml_config() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("galley.toml"),
            r#"
            entries = ["index.html"]
            scenario = "build"

            [cache]
            enabled = false
            "#,
        )
        .unwrap();

        let discovery = ConfigDiscovery::new(dir.path());
        let config = discovery.load().unwrap();
        assert_eq!(config.entries, vec!["index.html".to_string()]);
        assert!(config.scenario.is_build());
        assert!(!config.cache.enabled);
        // untouched sections keep their defaults
        assert_eq!(config.dev.cooldown_between_file_events_ms, 100);
    }

    #[test]
    fn load_or_default_without_file() {
        let dir = TempDir::new().unwrap();
        let discovery = ConfigDiscovery::new(dir.path());
        let config = discovery.load_or_default().unwrap();
        assert!(config.entries.is_empty());
    }

    #[test]
    fn env_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "galley.toml",
                r#"
                entries = ["index.html"]

                [dev]
                cooldown_between_file_events_ms = 100
                "#,
            )?;
            jail.set_env("GALLEY_DEV__COOLDOWN_BETWEEN_FILE_EVENTS_MS", "250");

            let discovery = ConfigDiscovery::new(jail.directory());
            let config = discovery.load().expect("config loads");
            assert_eq!(config.dev.cooldown_between_file_events_ms, 250);
            Ok(())
        });
    }
}
