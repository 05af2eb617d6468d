//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

/// Largest side the ThumbHash encoder accepts.
pub const MAX_HASH_INPUT_DIMENSION: u32 = 100;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bounds.max_width == 0 || self.bounds.max_width > MAX_HASH_INPUT_DIMENSION {
            return Err(ConfigError::ValidationError(format!(
                "bounds.max_width must be between 1 and {MAX_HASH_INPUT_DIMENSION}"
            )));
        }
        if self.bounds.max_height == 0 || self.bounds.max_height > MAX_HASH_INPUT_DIMENSION {
            return Err(ConfigError::ValidationError(format!(
                "bounds.max_height must be between 1 and {MAX_HASH_INPUT_DIMENSION}"
            )));
        }
        if self.bounds.filter_type().is_none() {
            return Err(ConfigError::ValidationError(format!(
                "bounds.filter '{}' is not a known resampling filter",
                self.bounds.filter
            )));
        }
        if self.transform.quality > 100 {
            return Err(ConfigError::ValidationError(
                "transform.quality must be between 0 and 100".into(),
            ));
        }
        if !matches!(self.transform.format.as_str(), "jpg" | "jpeg" | "png" | "webp") {
            return Err(ConfigError::ValidationError(format!(
                "transform.format '{}' must be one of jpg, png, webp",
                self.transform.format
            )));
        }
        if self.transform.fit != "inside" {
            return Err(ConfigError::ValidationError(
                "transform.fit must be \"inside\" so both sides stay within bounds".into(),
            ));
        }
        if self.limits.max_asset_size_mb == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_asset_size_mb must be > 0".into(),
            ));
        }
        if self.limits.max_image_dimension == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_image_dimension must be > 0".into(),
            ));
        }
        if self.limits.decode_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.decode_timeout_ms must be > 0".into(),
            ));
        }
        if self.schema.collection.is_empty() || self.schema.field.is_empty() {
            return Err(ConfigError::ValidationError(
                "schema.collection and schema.field must be set".into(),
            ));
        }
        if self.processing.parallel_workers == 0 {
            return Err(ConfigError::ValidationError(
                "processing.parallel_workers must be > 0".into(),
            ));
        }
        if self.directus.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "directus.timeout_ms must be > 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_passes_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_bounds() {
        let mut config = Config::default();
        config.bounds.max_height = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("bounds.max_height"));
    }

    #[test]
    fn test_validate_rejects_bounds_above_encoder_limit() {
        let mut config = Config::default();
        config.bounds.max_width = 101;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("bounds.max_width"));
    }

    #[test]
    fn test_validate_rejects_unknown_filter() {
        let mut config = Config::default();
        config.bounds.filter = "box".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("bounds.filter"));
    }

    #[test]
    fn test_validate_rejects_invalid_quality() {
        let mut config = Config::default();
        config.transform.quality = 101;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("transform.quality"));
    }

    #[test]
    fn test_validate_rejects_non_inside_fit() {
        let mut config = Config::default();
        config.transform.fit = "cover".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("transform.fit"));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = Config::default();
        config.limits.decode_timeout_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("decode_timeout_ms"));
    }

    #[test]
    fn test_validate_rejects_zero_parallel_workers() {
        let mut config = Config::default();
        config.processing.parallel_workers = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("parallel_workers"));
    }
}
