//! Persistent settings for the script runner.
//!
//! Stored in `~/.mcfscript/config.json`. Every field is optional; command-line
//! flags override whatever the file says.
//!
//! # Example
//!
//! ```no_run
//! use mcfscript_core::config::ScriptConfig;
//!
//! // Load (returns defaults if the file doesn't exist)
//! let config = ScriptConfig::load();
//!
//! if let Some(base) = &config.base_url {
//!     println!("API base: {}", base);
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

const CONFIG_DIRNAME: &str = ".mcfscript";
const CONFIG_FILENAME: &str = "config.json";

/// Errors from [`ScriptConfig::load_from`] and [`ScriptConfig::save`].
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not determine home directory")]
    NoHomeDir,

    #[error("config I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("config is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Returns `~/.mcfscript`, or `None` when there is no home directory.
pub fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(CONFIG_DIRNAME))
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ScriptConfig {
    /// Request timeout for the HTTP verbs. No timeout when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_timeout_secs: Option<u64>,

    /// `User-Agent` header sent with every request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    /// Bound to the script variable `__base__` when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl ScriptConfig {
    /// Load config from `~/.mcfscript/config.json`.
    ///
    /// Returns [`Default`] if the file does not exist or cannot be parsed.
    pub fn load() -> Self {
        config_dir()
            .and_then(|dir| Self::load_from(&dir.join(CONFIG_FILENAME)).ok())
            .unwrap_or_default()
    }

    /// Load config from an explicit path, reporting any failure.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Save config to `~/.mcfscript/config.json`.
    pub fn save(&self) -> Result<(), ConfigError> {
        let dir = config_dir().ok_or(ConfigError::NoHomeDir)?;
        std::fs::create_dir_all(&dir)?;
        self.save_to(&dir.join(CONFIG_FILENAME))
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
