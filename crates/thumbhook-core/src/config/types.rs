//! Sub-configuration structs with their defaults.

use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

/// Output bound for the normalized pixel buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundsConfig {
    /// Maximum buffer width in pixels (ThumbHash accepts at most 100)
    pub max_width: u32,

    /// Maximum buffer height in pixels (ThumbHash accepts at most 100)
    pub max_height: u32,

    /// Resampling filter: nearest, triangle, catmullrom, gaussian, lanczos3
    pub filter: String,
}

impl Default for BoundsConfig {
    fn default() -> Self {
        Self {
            max_width: 100,
            max_height: 100,
            filter: "triangle".to_string(),
        }
    }
}

impl BoundsConfig {
    /// Resolve the configured filter name.
    pub fn filter_type(&self) -> Option<FilterType> {
        match self.filter.to_lowercase().as_str() {
            "nearest" => Some(FilterType::Nearest),
            "triangle" | "bilinear" => Some(FilterType::Triangle),
            "catmullrom" | "cubic" => Some(FilterType::CatmullRom),
            "gaussian" => Some(FilterType::Gaussian),
            "lanczos3" | "lanczos" => Some(FilterType::Lanczos3),
            _ => None,
        }
    }
}

/// Where the bounding resize happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStrategy {
    /// Server-side transform when the asset source supports it, local otherwise
    #[default]
    Auto,
    /// Always ask the asset source to transform
    Server,
    /// Always fetch the original and resize locally
    Client,
}

/// Transformation parameters sent to the asset service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    /// Resize strategy
    pub strategy: FetchStrategy,

    /// Output encoding requested from the service ("png", "webp", "jpg").
    /// "jpg" flattens alpha, so transparent uploads hash as opaque.
    pub format: String,

    /// Output quality (0-100)
    pub quality: u8,

    /// Fit mode; only "inside" keeps both sides within the bound
    pub fit: String,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            strategy: FetchStrategy::Auto,
            format: "png".to_string(),
            quality: 30,
            fit: "inside".to_string(),
        }
    }
}

/// Resource limits to protect against problematic inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum asset stream size in megabytes
    pub max_asset_size_mb: u64,

    /// Maximum decoded image dimension (width or height)
    pub max_image_dimension: u32,

    /// Decode + resize timeout in milliseconds
    pub decode_timeout_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_asset_size_mb: 50,
            max_image_dimension: 10000,
            decode_timeout_ms: 5000,
        }
    }
}

impl LimitsConfig {
    /// Size limit in bytes.
    pub fn max_asset_bytes(&self) -> usize {
        (self.max_asset_size_mb as usize).saturating_mul(1024 * 1024)
    }
}

/// Where the hash lives on the target record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Collection holding uploaded file records
    pub collection: String,

    /// Text field receiving the base64 hash
    pub field: String,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            collection: "directus_files".to_string(),
            field: "thumbhash".to_string(),
        }
    }
}

/// Event dispatch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Maximum pipeline invocations running at once
    pub parallel_workers: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            parallel_workers: 4,
        }
    }
}

/// Directus backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectusConfig {
    /// Base URL of the Directus instance
    pub url: String,

    /// Static admin token used for elevated writes (supports ${ENV_VAR} syntax)
    pub token: String,

    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for DirectusConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8055".to_string(),
            token: "${DIRECTUS_TOKEN}".to_string(),
            timeout_ms: 30_000,
        }
    }
}

impl DirectusConfig {
    /// Resolve `${ENV_VAR}` references in the token.
    ///
    /// Returns `None` if the token is empty or references an unset variable.
    pub fn resolved_token(&self) -> Option<String> {
        if self.token.is_empty() {
            return None;
        }
        shellexpand::env(&self.token)
            .ok()
            .map(|token| token.into_owned())
            .filter(|token| !token.is_empty())
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
