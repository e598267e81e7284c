//! File-based configuration loading.

use std::path::{Path, PathBuf};

use super::{EnvConfig, Settings};
use crate::error::SettingsError;

/// Configuration file name.
pub const CONFIG_FILE_NAME: &str = "vaultsh.toml";

/// Directory under the user config dir holding [`CONFIG_FILE_NAME`].
pub const APP_DIR: &str = "vaultsh";

/// Finds and loads the configuration file.
///
/// Search order: an explicit path, then `$VAULTSH_CONFIG`, then
/// `config/vaultsh.toml` in the working directory, then
/// `<user config dir>/vaultsh/vaultsh.toml`.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    explicit: Option<PathBuf>,
    env: EnvConfig,
    local_dir: PathBuf,
    user_dir: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Loader using the process environment and the platform config dir.
    #[must_use]
    pub fn new() -> Self {
        Self {
            explicit: None,
            env: EnvConfig::default(),
            local_dir: PathBuf::from("config"),
            user_dir: dirs::config_dir(),
        }
    }

    /// Use this file, skipping the search.
    #[must_use]
    pub fn with_path(mut self, path: Option<PathBuf>) -> Self {
        self.explicit = path;
        self
    }

    /// Read `VAULTSH_*` variables through `env`.
    #[must_use]
    pub fn with_env(mut self, env: EnvConfig) -> Self {
        self.env = env;
        self
    }

    /// Replace the working-directory candidate directory.
    #[must_use]
    pub fn with_local_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.local_dir = dir.into();
        self
    }

    /// Replace the user config directory.
    #[must_use]
    pub fn with_user_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.user_dir = dir;
        self
    }

    /// Determine which file to load.
    ///
    /// Falling through to the user config dir creates the `vaultsh`
    /// directory there if needed.
    pub fn locate(&self) -> Result<PathBuf, SettingsError> {
        if let Some(path) = &self.explicit {
            return Ok(path.clone());
        }
        if let Some(path) = self.env.get(super::env::vars::CONFIG) {
            return Ok(PathBuf::from(path));
        }

        let local = self.local_dir.join(CONFIG_FILE_NAME);
        if local.exists() {
            return Ok(local);
        }
        tracing::debug!(path = %local.display(), "local config not found, using user config directory");

        let user_dir = self.user_dir.as_ref().ok_or_else(|| SettingsError::NoConfigDir {
            message: "no user configuration directory on this platform".to_string(),
        })?;
        let app_dir = user_dir.join(APP_DIR);
        std::fs::create_dir_all(&app_dir).map_err(|e| SettingsError::NoConfigDir {
            message: format!("error creating config directory {}: {e}", app_dir.display()),
        })?;
        Ok(app_dir.join(CONFIG_FILE_NAME))
    }

    /// Locate, read, parse and validate the configuration.
    pub fn load(&self) -> Result<(PathBuf, Settings), SettingsError> {
        let path = self.locate()?;
        let settings = load_file(&path)?;
        Ok((path, settings))
    }
}

/// Read, parse and validate one file.
pub fn load_file(path: &Path) -> Result<Settings, SettingsError> {
    let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let settings = Settings::from_toml(&content, &path.display().to_string())?;
    settings.validate()?;
    tracing::debug!(path = %path.display(), environments = settings.environments.len(), "loaded configuration");
    Ok(settings)
}
