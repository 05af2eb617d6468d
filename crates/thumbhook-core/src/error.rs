//! Error types for the thumbhash upload pipeline.
//!
//! Errors are organized by stage so that a failure surfaced to the host's
//! event-error channel names the record key and what went wrong.

use thiserror::Error;

use crate::pipeline::state::PipelineState;

/// Top-level error type for thumbhook operations.
#[derive(Error, Debug)]
pub enum ThumbhookError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Pipeline processing errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// A full pipeline run failed
    #[error(transparent)]
    Run(#[from] PipelineFailure),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Pipeline processing errors, organized by stage.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The upload event did not have the expected shape
    #[error("Invalid upload event: {0}")]
    InvalidEvent(String),

    /// Looking up the schema failed (distinct from the schema being absent)
    #[error("Schema lookup failed for {collection}: {message}")]
    Schema { collection: String, message: String },

    /// Asset retrieval failed (network, missing asset, bad status)
    #[error("Fetch failed for {key}: {message}")]
    Fetch {
        key: String,
        message: String,
        status_code: Option<u16>,
    },

    /// Asset stream exceeds the configured size limit
    #[error("Asset too large: {key} (more than {max_mb}MB)")]
    AssetTooLarge { key: String, max_mb: u64 },

    /// Image decoding failed
    #[error("Decode error for {key}: {message}")]
    Decode { key: String, message: String },

    /// Source or target dimensions are unusable
    #[error("Invalid dimensions for {key}: {width}x{height}")]
    InvalidDimensions { key: String, width: u32, height: u32 },

    /// Hash encoding precondition violated
    #[error("Encode error: {0}")]
    Encode(String),

    /// Record update failed
    #[error("Persist failed for {key}: {message}")]
    Persist {
        key: String,
        message: String,
        status_code: Option<u16>,
    },

    /// Operation timed out
    #[error("Timeout in {stage} stage for {key} after {timeout_ms}ms")]
    Timeout {
        key: String,
        stage: String,
        timeout_ms: u64,
    },
}

/// A pipeline run that ended in the `Failed` state.
///
/// `reached` is the last state the run completed before the error, so a
/// corrupt image reports `Fetched` and a rejected write reports `Encoded`.
#[derive(Error, Debug)]
#[error("Pipeline for {key} failed after {reached}: {source}")]
pub struct PipelineFailure {
    pub key: String,
    pub reached: PipelineState,
    #[source]
    pub source: PipelineError,
}

/// Convenience type alias for thumbhook results.
pub type Result<T> = std::result::Result<T, ThumbhookError>;

/// Convenience type alias for pipeline-specific results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
