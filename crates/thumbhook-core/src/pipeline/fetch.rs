//! Asset retrieval with server-side or client-side bounding.

use crate::config::{BoundsConfig, FetchStrategy, TransformConfig};
use crate::error::PipelineResult;
use crate::host::{AssetSource, AssetStream};
use crate::types::{TransformationParams, UploadEvent};

/// Opens the asset stream for an upload event.
pub struct AssetFetcher {
    bounds: BoundsConfig,
    transform: TransformConfig,
}

impl AssetFetcher {
    pub fn new(bounds: BoundsConfig, transform: TransformConfig) -> Self {
        Self { bounds, transform }
    }

    /// Parameters that make the service return an image within the bound.
    ///
    /// Both sides are set with `fit=inside`, so whichever side is the longer
    /// one ends up at the bound and the other follows the aspect ratio.
    pub fn transformation_params(&self) -> TransformationParams {
        TransformationParams {
            width: Some(self.bounds.max_width),
            height: Some(self.bounds.max_height),
            fit: self.transform.fit.clone(),
            format: self.transform.format.clone(),
            quality: self.transform.quality,
            without_enlargement: true,
        }
    }

    /// Whether this fetch should ask `source` to do the resize.
    pub fn uses_server_transform(&self, source: &dyn AssetSource) -> bool {
        match self.transform.strategy {
            FetchStrategy::Client => false,
            FetchStrategy::Auto => source.supports_transforms(),
            FetchStrategy::Server => {
                if !source.supports_transforms() {
                    tracing::warn!(
                        "Asset source '{}' cannot transform; resizing locally",
                        source.name()
                    );
                }
                source.supports_transforms()
            }
        }
    }

    /// Open the asset for `event`.
    ///
    /// In client mode the payload's dimensions are attached when the source
    /// does not report its own.
    pub async fn fetch(
        &self,
        source: &dyn AssetSource,
        event: &UploadEvent,
    ) -> PipelineResult<AssetStream> {
        let stream = if self.uses_server_transform(source) {
            let params = self.transformation_params();
            tracing::debug!(key = %event.key, source = source.name(), "Fetching transformed asset");
            source
                .get_asset(&event.key, Some(&params), &event.accountability)
                .await?
                .transformed(true)
        } else {
            tracing::debug!(key = %event.key, source = source.name(), "Fetching original asset");
            source
                .get_asset(&event.key, None, &event.accountability)
                .await?
        };

        Ok(match (stream.width, stream.height, event.payload.width, event.payload.height) {
            (None, None, Some(width), Some(height)) if !stream.transformed => {
                stream.with_dimensions(width, height)
            }
            _ => stream,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryBackend;

    fn fetcher(strategy: FetchStrategy) -> AssetFetcher {
        AssetFetcher::new(
            BoundsConfig::default(),
            TransformConfig {
                strategy,
                ..TransformConfig::default()
            },
        )
    }

    #[test]
    fn test_transformation_params_from_config() {
        let params = fetcher(FetchStrategy::Auto).transformation_params();
        assert_eq!(params.width, Some(100));
        assert_eq!(params.height, Some(100));
        assert_eq!(params.fit, "inside");
        assert_eq!(params.format, "png");
        assert_eq!(params.quality, 30);
        assert!(params.without_enlargement);
    }

    #[test]
    fn test_strategy_selection() {
        let transforming = MemoryBackend::new().with_transforms(true);
        let plain = MemoryBackend::new();

        assert!(fetcher(FetchStrategy::Auto).uses_server_transform(&transforming));
        assert!(!fetcher(FetchStrategy::Auto).uses_server_transform(&plain));
        assert!(!fetcher(FetchStrategy::Client).uses_server_transform(&transforming));
        assert!(!fetcher(FetchStrategy::Server).uses_server_transform(&plain));
    }

    #[tokio::test]
    async fn test_client_fetch_attaches_payload_dimensions() {
        let backend = MemoryBackend::new().with_asset("k1", vec![1, 2, 3]);
        let event = UploadEvent::new("k1").with_dimensions(640, 480);

        let stream = fetcher(FetchStrategy::Client)
            .fetch(&backend, &event)
            .await
            .unwrap();
        assert!(!stream.transformed);
        assert_eq!((stream.width, stream.height), (Some(640), Some(480)));
    }

    #[tokio::test]
    async fn test_missing_asset_is_fetch_error() {
        let backend = MemoryBackend::new();
        let err = fetcher(FetchStrategy::Auto)
            .fetch(&backend, &UploadEvent::new("nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::PipelineError::Fetch { .. }));
    }
}
