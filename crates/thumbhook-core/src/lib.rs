//! Thumbhook Core - ThumbHash placeholders for uploaded images.
//!
//! When an image asset is uploaded to the content store, thumbhook computes a
//! compact perceptual hash of it and writes the base64 text back onto the
//! asset's record, so clients can render a blurred preview before the real
//! image arrives.
//!
//! # Architecture
//!
//! Each upload event runs through a short pipeline against host services
//! supplied as trait objects (see [`host`]):
//!
//! ```text
//! Event → Gate (schema) → Fetch (bounded) → Normalize (≤100x100 RGBA) → Encode → Writeback
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use thumbhook_core::{Config, Thumbhook, UploadEvent};
//!
//! #[tokio::main]
//! async fn main() -> thumbhook_core::Result<()> {
//!     let config = Config::load()?;
//!     let thumbhook = Thumbhook::directus(config);
//!
//!     let outcome = thumbhook.handle(UploadEvent::new("a1b2c3")).await?;
//!     println!("{outcome:?}");
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod backend;
pub mod config;
pub mod error;
pub mod host;
pub mod pipeline;
pub mod types;

use std::sync::Arc;

// Re-exports for convenient access
pub use backend::{DirectusClient, MemoryBackend};
pub use config::Config;
pub use error::{
    ConfigError, PipelineError, PipelineFailure, PipelineResult, Result, ThumbhookError,
};
pub use host::{AssetSource, AssetStream, RecordStore, SchemaSource};
pub use pipeline::{
    DispatchSummary, HashEncoder, HashSummary, PipelineCoordinator, PipelineOutcome,
    PipelineState, RunResult, SkipReason,
};
pub use types::{Accountability, PerceptualHash, PixelBuffer, SchemaSnapshot, UploadEvent};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Thumbhook handler - the main entry point for upload events.
pub struct Thumbhook {
    config: Config,
    coordinator: Arc<PipelineCoordinator>,
}

impl Thumbhook {
    /// Create a handler over explicit host services.
    pub fn new(
        config: Config,
        schema_source: Arc<dyn SchemaSource>,
        assets: Arc<dyn AssetSource>,
        records: Arc<dyn RecordStore>,
    ) -> Self {
        tracing::debug!("Initializing thumbhook v{}", VERSION);
        let coordinator = Arc::new(PipelineCoordinator::new(
            &config,
            schema_source,
            assets,
            records,
        ));
        Self {
            config,
            coordinator,
        }
    }

    /// Create a handler that talks to the configured Directus instance.
    pub fn directus(config: Config) -> Self {
        let client = Arc::new(DirectusClient::new(&config.directus));
        tracing::debug!("Using Directus at {}", client.base_url());
        Self::new(config, client.clone(), client.clone(), client)
    }

    /// Get a reference to the current configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Process one upload event.
    pub async fn handle(&self, event: UploadEvent) -> RunResult {
        self.coordinator.run(event).await
    }

    /// Process a batch of events concurrently, reporting each as it finishes.
    pub async fn handle_batch<F>(&self, events: Vec<UploadEvent>, on_result: F) -> DispatchSummary
    where
        F: Fn(&RunResult) + Send + Sync + 'static,
    {
        self.coordinator.dispatch(events, on_result).await
    }
}
