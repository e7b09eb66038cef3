//! Configuration Loader
//!
//! Handles loading and merging settings from files and environment variables.

use crate::config::settings::Settings;
use crate::error::{ChatError, Result};
use std::path::{Path, PathBuf};

/// Names a settings file to load instead of the default locations
pub const CONFIG_PATH_ENV: &str = "ANYROUTER_CONFIG";
pub const BASE_URL_ENV: &str = "ANYROUTER_BASE_URL";
pub const MODEL_ENV: &str = "ANYROUTER_MODEL";

/// Settings loader with support for multiple sources
#[derive(Debug, Default)]
pub struct ConfigLoader {
    settings: Settings,
}

impl ConfigLoader {
    /// Load from the default locations, then apply environment overrides
    pub fn new() -> Result<Self> {
        let mut loader = Self::default();
        loader.load_from_default_paths()?;
        loader.apply_env_overrides(|name| std::env::var(name).ok());
        Ok(loader)
    }

    /// Load a specific settings file, then apply environment overrides
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let mut loader = Self::default();
        loader.load_from_file(path)?;
        loader.apply_env_overrides(|name| std::env::var(name).ok());
        Ok(loader)
    }

    /// Load configuration from default paths
    fn load_from_default_paths(&mut self) -> Result<()> {
        for path in Self::get_config_paths() {
            if path.exists() {
                self.load_from_file(&path)?;
            }
        }

        Ok(())
    }

    /// Paths to check, lowest precedence first
    fn get_config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("anyrouter").join("config.json"));
        }

        paths.push(PathBuf::from("anyrouter.json"));

        if let Ok(custom_path) = std::env::var(CONFIG_PATH_ENV) {
            paths.push(PathBuf::from(custom_path));
        }

        paths
    }

    /// Load settings from a specific file
    fn load_from_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ChatError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let settings: Settings = serde_json::from_str(&content).map_err(|e| {
            ChatError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        tracing::info!(path = %path.display(), "Loaded settings");
        self.settings.merge(settings);
        Ok(())
    }

    /// Apply base URL and model overrides read through `lookup`
    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        self.settings.merge(Settings {
            base_url: non_empty(BASE_URL_ENV),
            model: non_empty(MODEL_ENV),
            ..Default::default()
        });
    }

    /// Get the loaded settings
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Take ownership of the settings
    pub fn into_settings(self) -> Settings {
        self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_from_custom_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{
                "base_url": "https://custom.api.com",
                "model": "claude-3-opus-20240229",
                "api_key_env": "CUSTOM_API_KEY"
            }}"#
        )
        .unwrap();

        let mut loader = ConfigLoader::default();
        loader.load_from_file(file.path()).unwrap();

        let settings = loader.settings();
        assert_eq!(settings.base_url.as_deref(), Some("https://custom.api.com"));
        assert_eq!(settings.model.as_deref(), Some("claude-3-opus-20240229"));
        assert_eq!(settings.api_key_env(), "CUSTOM_API_KEY");
    }

    #[test]
    fn test_later_files_override_earlier() {
        let mut first = NamedTempFile::new().unwrap();
        writeln!(first, r#"{{"model": "first", "max_tokens": 50}}"#).unwrap();
        let mut second = NamedTempFile::new().unwrap();
        writeln!(second, r#"{{"model": "second"}}"#).unwrap();

        let mut loader = ConfigLoader::default();
        loader.load_from_file(first.path()).unwrap();
        loader.load_from_file(second.path()).unwrap();

        let settings = loader.into_settings();
        assert_eq!(settings.model.as_deref(), Some("second"));
        assert_eq!(settings.max_tokens, Some(50));
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not json").unwrap();

        let mut loader = ConfigLoader::default();
        assert!(matches!(
            loader.load_from_file(file.path()),
            Err(ChatError::Config(_))
        ));
        assert!(matches!(
            loader.load_from_file("/nonexistent/anyrouter.json"),
            Err(ChatError::Config(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let mut loader = ConfigLoader::default();
        loader.settings.model = Some("from-file".to_string());
        loader.settings.base_url = Some("https://file.example.com".to_string());

        loader.apply_env_overrides(|name| match name {
            MODEL_ENV => Some("from-env".to_string()),
            BASE_URL_ENV => Some("   ".to_string()),
            _ => None,
        });

        assert_eq!(loader.settings().model.as_deref(), Some("from-env"));
        assert_eq!(
            loader.settings().base_url.as_deref(),
            Some("https://file.example.com")
        );
    }
}
