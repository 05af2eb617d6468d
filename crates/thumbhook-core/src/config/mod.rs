//! Configuration management for thumbhook.
//!
//! Configuration is loaded from the platform config directory with sensible
//! defaults. Every section implements `Default`, so a partial file is fine.

mod types;
mod validate;

pub use types::*;
pub use validate::MAX_HASH_INPUT_DIMENSION;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure for thumbhook.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Normalized buffer bounds
    pub bounds: BoundsConfig,

    /// Asset service transformation settings
    pub transform: TransformConfig,

    /// Resource limits
    pub limits: LimitsConfig,

    /// Target collection and field
    pub schema: SchemaConfig,

    /// Event dispatch settings
    pub processing: ProcessingConfig,

    /// Directus backend settings
    pub directus: DirectusConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// Uses platform-appropriate directories:
    /// - macOS: ~/Library/Application Support/com.thumbhook.thumbhook/config.toml
    /// - Linux: ~/.config/thumbhook/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\thumbhook\config\config.toml
    ///
    /// Falls back to ~/.thumbhook/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "thumbhook", "thumbhook")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".thumbhook").join("config.toml")
            })
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.bounds.max_width, 100);
        assert_eq!(config.bounds.max_height, 100);
        assert_eq!(config.transform.quality, 30);
        assert_eq!(config.transform.strategy, FetchStrategy::Auto);
        assert_eq!(config.schema.collection, "directus_files");
        assert_eq!(config.schema.field, "thumbhash");
    }

    #[test]
    fn test_config_to_toml() {
        let config = Config::default();
        let toml = config.to_toml().unwrap();
        assert!(toml.contains("[bounds]"));
        assert!(toml.contains("[transform]"));
        assert!(toml.contains("[schema]"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[bounds]\nmax_width = 64\n\n[transform]\nstrategy = \"client\"\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.bounds.max_width, 64);
        assert_eq!(config.bounds.max_height, 100);
        assert_eq!(config.transform.strategy, FetchStrategy::Client);
        assert_eq!(config.transform.format, "png");
    }

    #[test]
    fn test_load_from_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[bounds]\nmax_width = 400\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("bounds.max_width"));
    }

    #[test]
    fn test_load_from_rejects_bad_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[bounds\nmax_width = ").unwrap();

        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_filter_names_resolve() {
        let mut bounds = BoundsConfig::default();
        assert!(bounds.filter_type().is_some());
        bounds.filter = "Lanczos3".to_string();
        assert!(bounds.filter_type().is_some());
        bounds.filter = "sharpen".to_string();
        assert!(bounds.filter_type().is_none());
    }

    #[test]
    fn test_literal_token_passes_through() {
        let directus = DirectusConfig {
            token: "static-admin-token".to_string(),
            ..DirectusConfig::default()
        };
        assert_eq!(
            directus.resolved_token().as_deref(),
            Some("static-admin-token")
        );
    }

    #[test]
    fn test_unset_token_variable_resolves_to_none() {
        let directus = DirectusConfig {
            token: "${THUMBHOOK_TEST_TOKEN_THAT_IS_NEVER_SET}".to_string(),
            ..DirectusConfig::default()
        };
        assert!(directus.resolved_token().is_none());
    }
}
