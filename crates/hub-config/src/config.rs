use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::{ConfigError, ConfigResult};

/// Accepted values for `log_level`
pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

const ENV_STORAGE_DIR: &str = "HUB_STORAGE_DIR";
const ENV_LOG_LEVEL: &str = "HUB_LOG_LEVEL";

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HubConfig {
    /// Directory holding rules, schedules, saved states and registries
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,

    /// Default tracing filter level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            log_level: default_log_level(),
        }
    }
}

impl HubConfig {
    /// Load the configuration file; a missing file yields the defaults
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::ReadFile {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        Self::parse(&content, path)
    }

    fn parse(content: &str, path: &Path) -> ConfigResult<Self> {
        // An empty document deserializes to unit, not to an empty mapping
        let config = if content.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(content).map_err(|source| ConfigError::ParseYaml {
                path: path.to_path_buf(),
                source,
            })?
        };
        config.validate()?;
        Ok(config)
    }

    /// Apply `HUB_STORAGE_DIR` and `HUB_LOG_LEVEL` from the process environment
    pub fn with_env_overrides(self) -> ConfigResult<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        if let Some(dir) = lookup(ENV_STORAGE_DIR).filter(|v| !v.is_empty()) {
            self.storage_dir = PathBuf::from(dir);
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL).filter(|v| !v.is_empty()) {
            self.log_level = level;
        }
        self.validate()?;
        Ok(self)
    }

    /// Check that every value is usable
    pub fn validate(&self) -> ConfigResult<()> {
        let level = self.log_level.to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidValue {
                key: "log_level".to_string(),
                reason: format!("'{}' is not one of {}", self.log_level, LOG_LEVELS.join(", ")),
            });
        }
        if self.storage_dir.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "storage_dir".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn write(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("hub.yaml");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = HubConfig::load(dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config, HubConfig::default());
        assert_eq!(config.storage_dir, PathBuf::from("."));
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_load_file() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "storage_dir: /var/lib/hub\nlog_level: debug\n");

        let config = HubConfig::load(path).unwrap();
        assert_eq!(config.storage_dir, PathBuf::from("/var/lib/hub"));
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_partial_and_empty_files() {
        let dir = TempDir::new().unwrap();

        let config = HubConfig::load(write(&dir, "log_level: warn\n")).unwrap();
        assert_eq!(config.storage_dir, PathBuf::from("."));
        assert_eq!(config.log_level, "warn");

        let config = HubConfig::load(write(&dir, "")).unwrap();
        assert_eq!(config, HubConfig::default());
    }

    #[test]
    fn test_invalid_yaml() {
        let dir = TempDir::new().unwrap();
        let result = HubConfig::load(write(&dir, "storage_dir: [unclosed\n"));
        assert!(matches!(result, Err(ConfigError::ParseYaml { .. })));

        let result = HubConfig::load(write(&dir, "unknown_key: 1\n"));
        assert!(matches!(result, Err(ConfigError::ParseYaml { .. })));
    }

    #[test]
    fn test_invalid_log_level() {
        let dir = TempDir::new().unwrap();
        let result = HubConfig::load(write(&dir, "log_level: loud\n"));
        match result {
            Err(ConfigError::InvalidValue { key, .. }) => assert_eq!(key, "log_level"),
            other => panic!("expected InvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn test_env_overrides() {
        let env = HashMap::from([
            (ENV_STORAGE_DIR, "/tmp/hub".to_string()),
            (ENV_LOG_LEVEL, "TRACE".to_string()),
        ]);
        let config = HubConfig::default()
            .with_overrides(|key| env.get(key).cloned())
            .unwrap();
        assert_eq!(config.storage_dir, PathBuf::from("/tmp/hub"));
        assert_eq!(config.log_level, "TRACE");

        let bad = HashMap::from([(ENV_LOG_LEVEL, "verbose".to_string())]);
        assert!(HubConfig::default()
            .with_overrides(|key| bad.get(key).cloned())
            .is_err());
    }

    #[test]
    fn test_empty_overrides_ignored() {
        let config = HubConfig::default()
            .with_overrides(|_| Some(String::new()))
            .unwrap();
        assert_eq!(config, HubConfig::default());
    }
}
