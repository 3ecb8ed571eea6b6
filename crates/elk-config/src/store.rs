//! Saved settings on disk.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{ConfigError, Result};
use crate::settings::Configuration;

/// Directory under the home directory holding saved settings.
pub const CONFIG_DIR: &str = ".elktail";

/// File name of the default settings.
pub const DEFAULT_CONFIG_FILE: &str = "default.json";

/// A directory of saved settings.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    dir: PathBuf,
}

impl ConfigStore {
    /// Creates a store rooted at `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The store under the current user's home directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::HomeNotFound`] if there is no home directory.
    pub fn in_home() -> Result<Self> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(Self::new(home.join(CONFIG_DIR)))
    }

    /// Directory of the store.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the default settings file.
    #[must_use]
    pub fn default_path(&self) -> PathBuf {
        self.dir.join(DEFAULT_CONFIG_FILE)
    }

    /// Loads the default settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn load_default(&self) -> Result<Configuration> {
        self.ensure_dir()?;
        let path = self.default_path();
        let text = fs::read_to_string(&path).map_err(|e| ConfigError::io(&path, e))?;
        let config = serde_json::from_str(&text)?;
        debug!(path = %path.display(), "loaded default settings");
        Ok(config)
    }

    /// Saves `config` as the default settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn save_default(&self, config: &Configuration) -> Result<()> {
        self.ensure_dir()?;
        let path = self.default_path();
        let text = serde_json::to_string_pretty(config)?;
        fs::write(&path, text).map_err(|e| ConfigError::io(&path, e))?;
        debug!(path = %path.display(), "saved default settings");
        Ok(())
    }

    fn ensure_dir(&self) -> Result<()> {
        if self.dir.is_dir() {
            return Ok(());
        }
        info!(dir = %self.dir.display(), "creating settings directory");
        create_private_dir(&self.dir).map_err(|e| ConfigError::io(&self.dir, e))
    }
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new().recursive(true).mode(0o700).create(dir)
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dir)
}
