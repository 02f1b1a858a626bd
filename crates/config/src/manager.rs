//! Configuration manager - main API for config operations

use crate::persistence::ConfigPersistence;
use crate::{Config, ConfigError, ConfigResult};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

const APP_NAME: &str = "narrivo";

/// Main configuration manager
///
/// Resolves platform directories, loads and saves `config.toml`, and
/// applies environment overrides.
pub struct ConfigManager {
    persistence: ConfigPersistence,
    config_dir: PathBuf,
    data_dir: PathBuf,
}

impl ConfigManager {
    /// Creates a new config manager using the platform directories
    ///
    /// - Linux: `~/.config/narrivo/` and `~/.local/share/narrivo/`
    /// - macOS: `~/Library/Application Support/narrivo/`
    /// - Windows: `%APPDATA%\narrivo\`
    pub fn new() -> ConfigResult<Self> {
        let dirs = ProjectDirs::from("", "", APP_NAME).ok_or_else(|| {
            ConfigError::PathResolutionError {
                reason: "Could not determine user config directory".to_string(),
            }
        })?;

        Ok(Self::with_directories(
            dirs.config_dir().to_path_buf(),
            dirs.data_dir().to_path_buf(),
        ))
    }

    /// Creates a config manager rooted at one directory for both config and data
    pub fn with_directory(dir: PathBuf) -> ConfigResult<Self> {
        Ok(Self::with_directories(dir.clone(), dir))
    }

    fn with_directories(config_dir: PathBuf, data_dir: PathBuf) -> Self {
        let persistence = ConfigPersistence::new(config_dir.join("config.toml"));
        Self {
            persistence,
            config_dir,
            data_dir,
        }
    }

    /// Returns the config directory path
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Returns the full config file path
    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    /// Resolves a configured path: absolute paths pass through, relative
    /// ones are placed under the platform data directory
    pub fn resolve_data_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir.join(path)
        }
    }

    /// Loads the configuration from file
    pub fn load(&self) -> ConfigResult<Config> {
        self.persistence.load()
    }

    /// Loads the configuration, falling back to defaults on any error
    pub fn load_or_default(&self) -> Config {
        match self.load_with_env_overrides() {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Failed to load config: {}, using defaults", e);
                Config::default()
            }
        }
    }

    /// Saves the configuration to file
    pub fn save(&self, config: &Config) -> ConfigResult<()> {
        self.persistence.save(config)
    }

    /// Writes a default config file if one doesn't exist
    ///
    /// Returns Ok(true) if a new file was created, Ok(false) if one already exists.
    pub fn initialize(&self) -> ConfigResult<bool> {
        if self.config_path().exists() {
            log::info!(
                "Config file already exists at {}",
                self.config_path().display()
            );
            return Ok(false);
        }

        self.save(&Config::default())?;
        Ok(true)
    }

    /// Applies environment variable overrides on top of the file
    ///
    /// Pattern: `NARRIVO_SECTION_FIELD`, e.g. `NARRIVO_APP_DATA_DIR=/srv/books`.
    pub fn load_with_env_overrides(&self) -> ConfigResult<Config> {
        let mut config = self.load()?;

        if let Ok(dir) = std::env::var("NARRIVO_APP_DATA_DIR") {
            config.app.data_dir = PathBuf::from(dir);
        }

        if let Ok(dir) = std::env::var("NARRIVO_DOWNLOADS_DOWNLOAD_DIR") {
            config.downloads.download_dir = PathBuf::from(dir);
        }

        if let Ok(rate) = std::env::var("NARRIVO_PLAYER_DEFAULT_RATE") {
            match rate.parse::<f32>() {
                Ok(r) => config.player.default_rate = r,
                Err(_) => log::warn!("Ignoring unparsable NARRIVO_PLAYER_DEFAULT_RATE={}", rate),
            }
        }

        if let Err(errors) = config.validate() {
            log::warn!(
                "Config validation warnings after env overrides: {:?}",
                errors
            );
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_manager() -> (TempDir, ConfigManager) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let manager = ConfigManager::with_directory(temp_dir.path().to_path_buf())
            .expect("Failed to create manager");
        (temp_dir, manager)
    }

    #[test]
    fn test_load_missing_file_returns_default() {
        let (_temp_dir, manager) = setup_test_manager();
        let config = manager.load().expect("Should load defaults");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_initialize_creates_file_once() {
        let (_temp_dir, manager) = setup_test_manager();

        assert!(manager.initialize().expect("Should initialize"));
        assert!(manager.config_path().exists());
        assert!(!manager.initialize().expect("Should initialize"));
    }

    #[test]
    fn test_invalid_config_is_not_saved() {
        let (_temp_dir, manager) = setup_test_manager();

        let mut config = Config::default();
        config.player.max_rate = 100.0;
        manager
            .save(&config)
            .expect_err("Should not save invalid config");
    }

    #[test]
    fn test_load_or_default_on_corrupt_file() {
        let (_temp_dir, manager) = setup_test_manager();
        std::fs::write(manager.config_path(), "not = [valid").expect("Should write");

        assert_eq!(manager.load_or_default(), Config::default());
    }

    #[test]
    fn test_resolve_data_path() {
        let (temp_dir, manager) = setup_test_manager();

        let relative = manager.resolve_data_path(Path::new("library"));
        assert_eq!(relative, temp_dir.path().join("library"));

        let absolute = temp_dir.path().join("elsewhere");
        assert_eq!(manager.resolve_data_path(&absolute), absolute);
    }

    #[test]
    fn test_config_file_path() {
        let (_temp_dir, manager) = setup_test_manager();
        assert!(manager.config_path().ends_with("config.toml"));
    }
}
