use crate::model::{SortKey, View};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "runtree";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Top-level items older than this many days are offered for cleanup.
    pub stale_after_days: u32,
    pub search_debounce_ms: u64,
    pub toast_ttl_secs: u64,
    /// Names or path prefixes skipped by directory scans.
    pub ignore: Vec<String>,
    /// Ids that cleanup never touches.
    pub protected: Vec<String>,
    pub default_view: View,
    pub default_sort: SortKey,
    /// Where downloads are copied. Defaults to the user's download directory.
    pub download_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stale_after_days: 30,
            search_debounce_ms: 250,
            toast_ttl_secs: 5,
            ignore: vec![".git".to_string()],
            protected: Vec::new(),
            default_view: View::List,
            default_sort: SortKey::DateDesc,
            download_dir: None,
        }
    }
}

impl Config {
    /// Loads `config.toml` from the user config directory.
    /// A missing or unreadable file yields the defaults.
    pub fn load() -> Self {
        let Some(path) = config_dir().map(|d| d.join("config.toml")) else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("ignoring config {}: {e:#}", path.display());
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let raw =
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
    }

    /// Checks whether a scanned path should be skipped.
    /// A rule matches a path component exactly, or prefixes the relative path.
    pub fn is_ignored(&self, rel_path: &str) -> bool {
        self.ignore.iter().any(|rule| {
            rel_path.starts_with(rule.as_str()) || rel_path.split('/').any(|part| part == rule)
        })
    }

    pub fn download_dir(&self) -> Option<PathBuf> {
        self.download_dir
            .clone()
            .or_else(dirs::download_dir)
            .or_else(|| dirs::home_dir().map(|d| d.join("Downloads")))
    }
}

pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR))
}

pub fn data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join(APP_DIR))
}

pub fn cache_dir() -> Option<PathBuf> {
    dirs::cache_dir().map(|d| d.join(APP_DIR))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn partial_file_keeps_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.toml");
        let mut f = fs::File::create(&path)?;
        writeln!(f, "stale_after_days = 7")?;
        writeln!(f, "default_sort = \"name\"")?;
        writeln!(f, "protected = [\"golden\"]")?;

        let config = Config::load_from(&path)?;
        assert_eq!(config.stale_after_days, 7);
        assert_eq!(config.default_sort, SortKey::Name);
        assert_eq!(config.toast_ttl_secs, 5);
        assert_eq!(config.protected, vec!["golden".to_string()]);
        assert_eq!(config.download_dir, None);
        Ok(())
    }

    #[test]
    fn configured_download_dir_wins() {
        let config = Config {
            download_dir: Some(PathBuf::from("/srv/exports")),
            ..Config::default()
        };
        assert_eq!(config.download_dir(), Some(PathBuf::from("/srv/exports")));
    }

    #[test]
    fn malformed_file_is_an_error() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.toml");
        fs::write(&path, "default_sort = \"size\"")?;
        assert!(Config::load_from(&path).is_err());
        Ok(())
    }

    #[test]
    fn test_is_ignored() {
        let config = Config {
            ignore: vec![".git".to_string(), "runs/tmp".to_string()],
            ..Config::default()
        };

        assert!(config.is_ignored(".git"));
        assert!(config.is_ignored("alu/.git/HEAD"));
        assert!(config.is_ignored("runs/tmp/out.log"));

        assert!(!config.is_ignored("runs/final"));
        assert!(!config.is_ignored("alu/src/alu.v"));
    }
}
