//! Configuration module for Gator.
//!
//! The configuration is a small JSON document in the user's home directory
//! holding the database connection string and the name of the logged-in user.
//! It is read once at startup and rewritten in full whenever the user changes.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{GatorError, Result};

/// File name of the configuration inside the home directory.
pub const CONFIG_FILE_NAME: &str = ".gatorconfig.json";

/// Environment variable overriding the database connection string.
pub const DB_URL_ENV: &str = "GATOR_DB_URL";

/// Persisted configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Database connection string (e.g. `sqlite://gator.db`).
    pub db_url: String,
    /// Name of the logged-in user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_user_name: Option<String>,
}

impl Config {
    /// Create a configuration with no logged-in user.
    pub fn new(db_url: impl Into<String>) -> Self {
        Self {
            db_url: db_url.into(),
            current_user_name: None,
        }
    }

    /// Parse configuration from a JSON string.
    pub fn parse(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| GatorError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `GATOR_DB_URL`: Override the database connection string
    pub fn apply_env_overrides(&mut self) {
        if let Ok(db_url) = std::env::var(DB_URL_ENV) {
            if !db_url.is_empty() {
                self.db_url = db_url;
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.db_url.trim().is_empty() {
            return Err(GatorError::Config("db_url is not set".to_string()));
        }
        Ok(())
    }
}

/// A configuration bound to the file it was loaded from.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    path: PathBuf,
    config: Config,
}

impl ConfigFile {
    /// Default location: `$HOME/.gatorconfig.json`.
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| GatorError::Config("cannot determine home directory".to_string()))?;
        Ok(home.join(CONFIG_FILE_NAME))
    }

    /// Load the configuration file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let content = std::fs::read_to_string(&path).map_err(|e| {
            GatorError::Io(e).context(format!("read config {}", path.display()))
        })?;
        let config = Config::parse(&content)?;
        debug!(path = %path.display(), "configuration loaded");
        Ok(Self { path, config })
    }

    /// Wrap an in-memory configuration without touching the filesystem.
    pub fn new(path: impl Into<PathBuf>, config: Config) -> Self {
        Self {
            path: path.into(),
            config,
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current configuration values.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Write the full configuration back to its file.
    ///
    /// The document is written to a temporary sibling and renamed into place.
    pub fn save(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.config)
            .map_err(|e| GatorError::Config(format!("config serialize error: {e}")))?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), "configuration saved");
        Ok(())
    }

    /// Record `name` as the logged-in user and persist.
    ///
    /// On write failure the in-memory value is left unchanged.
    pub fn set_user(&mut self, name: &str) -> Result<()> {
        let previous = self.config.current_user_name.replace(name.to_string());
        if let Err(e) = self.save() {
            self.config.current_user_name = previous;
            return Err(e);
        }
        Ok(())
    }
}
