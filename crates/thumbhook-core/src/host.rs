//! Interfaces to the services the pipeline borrows from its host.
//!
//! The pipeline never looks services up by name; a coordinator is built with
//! one implementation of each trait. All three are object-safe so they can be
//! shared as `Arc<dyn Trait>` across concurrently running invocations.

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};

use crate::error::{PipelineError, PipelineResult};
use crate::types::{Accountability, RecordPatch, SchemaSnapshot, TransformationParams};

/// Chunked asset body.
pub type ByteStream = BoxStream<'static, PipelineResult<Vec<u8>>>;

/// Supplies the schema used by the capability check.
///
/// Called once per event; implementations must not cache across events since
/// a migration can add the hash field at any time.
#[async_trait]
pub trait SchemaSource: Send + Sync {
    /// Schema covering `collection`, or `None` if the host has no schema.
    async fn snapshot(&self, collection: &str) -> PipelineResult<Option<SchemaSnapshot>>;
}

/// Retrieves stored assets by key.
#[async_trait]
pub trait AssetSource: Send + Sync {
    /// Name for logging (e.g., "directus", "memory").
    fn name(&self) -> &str;

    /// Whether `get_asset` honours transformation parameters.
    fn supports_transforms(&self) -> bool;

    /// Open the asset body, transformed when `transform` is given.
    async fn get_asset(
        &self,
        key: &str,
        transform: Option<&TransformationParams>,
        accountability: &Accountability,
    ) -> PipelineResult<AssetStream>;
}

/// Persists field updates on records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Overwrite the patched field on record `key` in `collection`.
    async fn update_one(
        &self,
        collection: &str,
        key: &str,
        patch: &RecordPatch,
        accountability: &Accountability,
    ) -> PipelineResult<()>;
}

/// An asset body owned by one pipeline invocation.
///
/// Dropping the stream closes the underlying connection, so every exit path
/// releases it whether or not `collect` ran to completion.
pub struct AssetStream {
    key: String,
    body: ByteStream,
    /// Width of the delivered image, when the source reports it
    pub width: Option<u32>,
    /// Height of the delivered image, when the source reports it
    pub height: Option<u32>,
    /// True if the source already applied the bounding transform
    pub transformed: bool,
}

impl AssetStream {
    pub fn new(key: impl Into<String>, body: ByteStream) -> Self {
        Self {
            key: key.into(),
            body,
            width: None,
            height: None,
            transformed: false,
        }
    }

    /// Single-chunk stream over in-memory bytes.
    pub fn from_bytes(key: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self::new(key, stream::iter(vec![Ok(bytes)]).boxed())
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn transformed(mut self, transformed: bool) -> Self {
        self.transformed = transformed;
        self
    }

    /// Size the source reported for the delivered image, if both sides are known.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.width.zip(self.height)
    }

    /// Drain the stream into one buffer, failing once it exceeds `max_bytes`.
    pub async fn collect(mut self, max_bytes: usize) -> PipelineResult<Vec<u8>> {
        let mut bytes = Vec::new();
        while let Some(chunk) = self.body.next().await {
            let chunk = chunk?;
            if bytes.len() + chunk.len() > max_bytes {
                return Err(PipelineError::AssetTooLarge {
                    key: self.key,
                    max_mb: (max_bytes / (1024 * 1024)) as u64,
                });
            }
            bytes.extend_from_slice(&chunk);
        }
        Ok(bytes)
    }
}

impl std::fmt::Debug for AssetStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetStream")
            .field("key", &self.key)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("transformed", &self.transformed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_collect_concatenates_chunks() {
        let body = stream::iter(vec![Ok(vec![1, 2]), Ok(vec![3]), Ok(vec![4, 5, 6])]).boxed();
        let asset = AssetStream::new("k", body);
        assert_eq!(asset.collect(1024).await.unwrap(), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_dimensions_need_both_sides() {
        let asset = AssetStream::from_bytes("k", vec![]);
        assert_eq!(asset.dimensions(), None);
        assert_eq!(asset.with_dimensions(640, 480).dimensions(), Some((640, 480)));
    }

    #[tokio::test]
    async fn test_collect_stops_at_limit() {
        let asset = AssetStream::from_bytes("big", vec![0; 64]);
        let err = asset.collect(32).await.unwrap_err();
        assert!(matches!(err, PipelineError::AssetTooLarge { ref key, .. } if key == "big"));
    }

    #[tokio::test]
    async fn test_collect_propagates_chunk_error() {
        let body = stream::iter(vec![
            Ok(vec![1]),
            Err(PipelineError::Fetch {
                key: "k".to_string(),
                message: "connection reset".to_string(),
                status_code: None,
            }),
        ])
        .boxed();
        let err = AssetStream::new("k", body).collect(1024).await.unwrap_err();
        assert!(matches!(err, PipelineError::Fetch { .. }));
    }
}
