use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{StateError, StateResult};

/// Where and how often the store persists itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory containing the config directory.
    pub base_path: PathBuf,
    /// Config directory name, relative to `base_path`.
    pub config_dir: String,
    /// Save loop period in milliseconds.
    pub save_interval_ms: u64,
    /// Write indented JSON.
    pub pretty: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("."),
            config_dir: "config".to_string(),
            save_interval_ms: 1000,
            pretty: true,
        }
    }
}

impl StoreConfig {
    pub fn from_toml_str(text: &str) -> StateResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| StateError::Config(e.to_string()))?;
        if config.save_interval_ms == 0 {
            return Err(StateError::Config(
                "save_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(config)
    }

    pub fn from_file(path: &Path) -> StateResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| StateError::io(path, e))?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> StateResult<String> {
        toml::to_string_pretty(self).map_err(|e| StateError::Config(e.to_string()))
    }

    pub fn config_root(&self) -> PathBuf {
        self.base_path.join(&self.config_dir)
    }

    /// File holding a non-hash entry: `<config>/<backing>.json`.
    pub fn backing_file(&self, backing: &str) -> PathBuf {
        self.config_root().join(format!("{backing}.json"))
    }

    /// Directory holding a hash entry's elements: `<config>/<backing>/`.
    pub fn backing_dir(&self, backing: &str) -> PathBuf {
        self.config_root().join(backing)
    }

    /// File holding one hash element: `<config>/<backing>/<key>.json`.
    ///
    /// Keys that would leave the backing directory are rejected.
    pub fn element_file(&self, backing: &str, key: &str) -> StateResult<PathBuf> {
        if key.is_empty() || key == "." || key == ".." || key.contains(['/', '\\']) {
            return Err(StateError::UnsafeKey(key.to_string()));
        }
        Ok(self.backing_dir(backing).join(format!("{key}.json")))
    }

    pub fn save_interval(&self) -> Duration {
        Duration::from_millis(self.save_interval_ms)
    }
}
