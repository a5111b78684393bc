// ============================================================================
// CONFIG - TOML settings under the user's config directory
// ============================================================================

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::calendar::WeekStart;

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "FURIKAERI_CONFIG";

const APP_DIR: &str = "furikaeri";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Overrides `<data_dir>/furikaeri`.
    pub data_dir: Option<PathBuf>,
    pub session_lifetime_minutes: u32,
    pub refresh_before_expiry_minutes: u32,
    pub week_start: WeekStart,
    pub default_framework: String,
    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            session_lifetime_minutes: 60,
            refresh_before_expiry_minutes: 5,
            week_start: WeekStart::Sunday,
            default_framework: "ywt".to_string(),
            log_filter: "info".to_string(),
        }
    }
}

impl AppConfig {
    pub fn default_config_path() -> PathBuf {
        if let Ok(path) = env::var(CONFIG_ENV) {
            return PathBuf::from(path);
        }
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }

    /// Load configuration from file, creating default if it doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::default_config_path())
    }

    pub fn load_from_path(config_path: &Path) -> Result<Self> {
        debug!("Loading configuration from {:?}", config_path);

        if !config_path.exists() {
            info!("No configuration at {:?}, writing defaults", config_path);
            let config = Self::default();
            config.save_to_path(config_path)?;
            return Ok(config);
        }

        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;
        let config: AppConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;
        Ok(config)
    }

    pub fn save_to_path(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        dirs::data_dir()
            .map(|d| d.join(APP_DIR))
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))
    }

    pub fn store_path(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("reflections.bin"))
    }

    pub fn auth_state_path(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("auth.json"))
    }

    pub fn log_path(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("furikaeri.log"))
    }

    pub fn export_dir(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("exports"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = AppConfig::load_from_path(&path).unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(path.exists());
        assert_eq!(AppConfig::load_from_path(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "week_start = \"monday\"\nrefresh_before_expiry_minutes = 10\n").unwrap();

        let config = AppConfig::load_from_path(&path).unwrap();
        assert_eq!(config.week_start, WeekStart::Monday);
        assert_eq!(config.refresh_before_expiry_minutes, 10);
        assert_eq!(config.session_lifetime_minutes, 60);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "week_start = 3").unwrap();
        assert!(AppConfig::load_from_path(&path).is_err());
    }

    #[test]
    fn test_data_dir_override() {
        let config = AppConfig {
            data_dir: Some(PathBuf::from("/tmp/reflections")),
            ..AppConfig::default()
        };
        assert_eq!(config.store_path().unwrap(), PathBuf::from("/tmp/reflections/reflections.bin"));
    }
}
