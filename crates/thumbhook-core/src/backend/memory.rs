//! In-process host backend.
//!
//! Holds schema, asset bytes and records in memory. Optionally performs the
//! bounding transform itself so both fetch strategies can be exercised
//! without a running asset service.

use std::collections::{BTreeMap, HashMap};
use std::io::Cursor;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::{GenericImageView, ImageFormat};

use crate::error::{PipelineError, PipelineResult};
use crate::host::{AssetSource, AssetStream, RecordStore, SchemaSource};
use crate::pipeline::normalize::fit_within;
use crate::types::{Accountability, RecordPatch, SchemaSnapshot, TransformationParams};

#[derive(Default)]
struct State {
    schema: Option<SchemaSnapshot>,
    assets: HashMap<String, Vec<u8>>,
    records: HashMap<(String, String), BTreeMap<String, String>>,
    write_count: usize,
    fetch_count: usize,
    last_transform: Option<TransformationParams>,
    last_write_accountability: Option<Accountability>,
}

/// Schema source, asset source and record store backed by memory.
#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
    transforms: bool,
    write_error: Option<String>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve this schema to every event until changed.
    pub fn with_schema(self, schema: SchemaSnapshot) -> Self {
        self.lock().schema = Some(schema);
        self
    }

    pub fn with_asset(self, key: &str, bytes: Vec<u8>) -> Self {
        self.lock().assets.insert(key.to_string(), bytes);
        self
    }

    pub fn with_record(self, collection: &str, key: &str, field: &str, value: &str) -> Self {
        self.lock()
            .records
            .entry((collection.to_string(), key.to_string()))
            .or_default()
            .insert(field.to_string(), value.to_string());
        self
    }

    /// Honour transformation parameters on `get_asset`.
    pub fn with_transforms(mut self, enabled: bool) -> Self {
        self.transforms = enabled;
        self
    }

    /// Make every `update_one` fail with `message`.
    pub fn failing_writes(mut self, message: &str) -> Self {
        self.write_error = Some(message.to_string());
        self
    }

    /// Replace the schema seen by subsequent events.
    pub fn set_schema(&self, schema: Option<SchemaSnapshot>) {
        self.lock().schema = schema;
    }

    pub fn field(&self, collection: &str, key: &str, field: &str) -> Option<String> {
        self.lock()
            .records
            .get(&(collection.to_string(), key.to_string()))
            .and_then(|record| record.get(field).cloned())
    }

    pub fn write_count(&self) -> usize {
        self.lock().write_count
    }

    pub fn fetch_count(&self) -> usize {
        self.lock().fetch_count
    }

    pub fn last_transform(&self) -> Option<TransformationParams> {
        self.lock().last_transform.clone()
    }

    pub fn last_write_accountability(&self) -> Option<Accountability> {
        self.lock().last_write_accountability.clone()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panic while holding the lock leaves plain data behind; keep going
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Resize and re-encode like an asset service would.
fn apply_transform(
    key: &str,
    bytes: &[u8],
    params: &TransformationParams,
) -> PipelineResult<(Vec<u8>, u32, u32)> {
    let transform_error = |message: String| PipelineError::Fetch {
        key: key.to_string(),
        message,
        status_code: Some(500),
    };

    let image = image::load_from_memory(bytes).map_err(|e| transform_error(e.to_string()))?;
    let (width, height) = image.dimensions();
    let (target_w, target_h) = fit_within(
        width,
        height,
        params.width.unwrap_or(width),
        params.height.unwrap_or(height),
    );
    let resized = if (target_w, target_h) == (width, height) {
        image
    } else {
        image.resize_exact(
            target_w.max(1),
            target_h.max(1),
            image::imageops::FilterType::Triangle,
        )
    };

    let mut buffer = Cursor::new(Vec::new());
    match params.format.as_str() {
        "jpg" | "jpeg" => {
            let encoder = JpegEncoder::new_with_quality(&mut buffer, params.quality.max(1));
            resized
                .to_rgb8()
                .write_with_encoder(encoder)
                .map_err(|e| transform_error(e.to_string()))?;
        }
        "webp" => resized
            .write_to(&mut buffer, ImageFormat::WebP)
            .map_err(|e| transform_error(e.to_string()))?,
        _ => resized
            .write_to(&mut buffer, ImageFormat::Png)
            .map_err(|e| transform_error(e.to_string()))?,
    }

    Ok((buffer.into_inner(), resized.width(), resized.height()))
}

#[async_trait]
impl SchemaSource for MemoryBackend {
    async fn snapshot(&self, _collection: &str) -> PipelineResult<Option<SchemaSnapshot>> {
        Ok(self.lock().schema.clone())
    }
}

#[async_trait]
impl AssetSource for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    fn supports_transforms(&self) -> bool {
        self.transforms
    }

    async fn get_asset(
        &self,
        key: &str,
        transform: Option<&TransformationParams>,
        _accountability: &Accountability,
    ) -> PipelineResult<AssetStream> {
        let bytes = {
            let mut state = self.lock();
            state.fetch_count += 1;
            state.last_transform = transform.cloned();
            state.assets.get(key).cloned()
        };
        let bytes = bytes.ok_or_else(|| PipelineError::Fetch {
            key: key.to_string(),
            message: "asset not found".to_string(),
            status_code: Some(404),
        })?;

        match transform {
            Some(params) if self.transforms => {
                let (bytes, width, height) = apply_transform(key, &bytes, params)?;
                Ok(AssetStream::from_bytes(key, bytes).with_dimensions(width, height))
            }
            _ => Ok(AssetStream::from_bytes(key, bytes)),
        }
    }
}

#[async_trait]
impl RecordStore for MemoryBackend {
    async fn update_one(
        &self,
        collection: &str,
        key: &str,
        patch: &RecordPatch,
        accountability: &Accountability,
    ) -> PipelineResult<()> {
        if let Some(message) = &self.write_error {
            return Err(PipelineError::Persist {
                key: key.to_string(),
                message: message.clone(),
                status_code: None,
            });
        }

        let mut state = self.lock();
        state
            .records
            .entry((collection.to_string(), key.to_string()))
            .or_default()
            .insert(patch.field.clone(), patch.value.clone());
        state.write_count += 1;
        state.last_write_accountability = Some(accountability.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([5, 6, 7])));
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, ImageFormat::Png).unwrap();
        buffer.into_inner()
    }

    fn params() -> TransformationParams {
        TransformationParams {
            width: Some(100),
            height: Some(100),
            fit: "inside".to_string(),
            format: "jpg".to_string(),
            quality: 30,
            without_enlargement: true,
        }
    }

    #[tokio::test]
    async fn test_transform_bounds_and_reencodes() {
        let backend = MemoryBackend::new()
            .with_asset("k", png(400, 200))
            .with_transforms(true);

        let stream = backend
            .get_asset("k", Some(&params()), &Accountability::Anonymous)
            .await
            .unwrap();
        assert_eq!((stream.width, stream.height), (Some(100), Some(50)));

        let bytes = stream.collect(usize::MAX).await.unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Jpeg);
        assert_eq!(backend.last_transform(), Some(params()));
    }

    #[tokio::test]
    async fn test_transform_ignored_when_disabled() {
        let original = png(400, 200);
        let backend = MemoryBackend::new().with_asset("k", original.clone());

        let stream = backend
            .get_asset("k", Some(&params()), &Accountability::Anonymous)
            .await
            .unwrap();
        assert_eq!(stream.width, None);
        assert_eq!(stream.collect(usize::MAX).await.unwrap(), original);
    }

    #[tokio::test]
    async fn test_transform_does_not_enlarge() {
        let backend = MemoryBackend::new()
            .with_asset("k", png(40, 20))
            .with_transforms(true);

        let stream = backend
            .get_asset("k", Some(&params()), &Accountability::Anonymous)
            .await
            .unwrap();
        assert_eq!((stream.width, stream.height), (Some(40), Some(20)));
    }

    #[tokio::test]
    async fn test_schema_can_change_between_calls() {
        let backend = MemoryBackend::new();
        assert!(backend.snapshot("directus_files").await.unwrap().is_none());

        backend.set_schema(Some(
            SchemaSnapshot::default().with_field("directus_files", "thumbhash"),
        ));
        assert!(backend.snapshot("directus_files").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_records_keep_other_fields() {
        let backend =
            MemoryBackend::new().with_record("directus_files", "k", "title", "Sunset");
        let patch = RecordPatch {
            field: "thumbhash".to_string(),
            value: "abc=".to_string(),
        };
        backend
            .update_one("directus_files", "k", &patch, &Accountability::System)
            .await
            .unwrap();

        assert_eq!(
            backend.field("directus_files", "k", "title").as_deref(),
            Some("Sunset")
        );
        assert_eq!(
            backend.field("directus_files", "k", "thumbhash").as_deref(),
            Some("abc=")
        );
    }
}
