//! Decode an asset and bound it to a small RGBA buffer.
//!
//! The bound is applied in two independent steps, width first and then
//! height, and both results are rounded to the nearest pixel:
//!
//! ```text
//! 4000x2000 @ 100x100  ->  100x50
//! 2000x4000 @ 100x100  ->  100x200  ->  50x100
//!   50x80   @ 100x100  ->  50x80  (never upscaled)
//! ```
//!
//! For very wide or very tall sources this can leave one side short of the
//! bound; that is accepted, exceeding the bound is not.

use std::io::Cursor;
use std::time::Duration;

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageReader, Limits};
use tokio::time::timeout;

use crate::config::{BoundsConfig, LimitsConfig};
use crate::error::{PipelineError, PipelineResult};
use crate::types::PixelBuffer;

/// Compute output dimensions for a `width`x`height` source under the bound.
///
/// Never upscales. May return a zero side for extreme aspect ratios; callers
/// treat that as an error.
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    let aspect_ratio = width as f64 / height as f64;
    let mut w = width as f64;
    let mut h = height as f64;

    if w > max_width as f64 {
        w = max_width as f64;
        h = w / aspect_ratio;
    }
    if h > max_height as f64 {
        h = max_height as f64;
        w = h * aspect_ratio;
    }

    (w.round() as u32, h.round() as u32)
}

/// Turns encoded image bytes into a bounded RGBA buffer.
#[derive(Debug, Clone)]
pub struct PixelNormalizer {
    bounds: BoundsConfig,
    limits: LimitsConfig,
    filter: FilterType,
}

impl PixelNormalizer {
    /// Create a normalizer. An unknown filter name falls back to triangle.
    pub fn new(bounds: BoundsConfig, limits: LimitsConfig) -> Self {
        let filter = bounds.filter_type().unwrap_or(FilterType::Triangle);
        Self {
            bounds,
            limits,
            filter,
        }
    }

    /// Normalize on the blocking pool, bounded by the decode timeout.
    ///
    /// `reported` is the size the host or asset service claimed for these
    /// bytes; see [`PixelNormalizer::normalize_reported`].
    pub async fn normalize(
        &self,
        key: &str,
        bytes: Vec<u8>,
        reported: Option<(u32, u32)>,
    ) -> PipelineResult<PixelBuffer> {
        let normalizer = self.clone();
        let key_owned = key.to_string();
        let timeout_duration = Duration::from_millis(self.limits.decode_timeout_ms);

        let result = timeout(timeout_duration, async {
            tokio::task::spawn_blocking(move || {
                normalizer.normalize_reported(&key_owned, &bytes, reported)
            })
            .await
        })
        .await;

        match result {
            Ok(Ok(buffer)) => buffer,
            Ok(Err(e)) => Err(PipelineError::Decode {
                key: key.to_string(),
                message: format!("Task join error: {}", e),
            }),
            Err(_) => Err(PipelineError::Timeout {
                key: key.to_string(),
                stage: "normalize".to_string(),
                timeout_ms: self.limits.decode_timeout_ms,
            }),
        }
    }

    /// Synchronous decode + resize + RGBA conversion.
    pub fn normalize_bytes(&self, key: &str, bytes: &[u8]) -> PipelineResult<PixelBuffer> {
        self.normalize_reported(key, bytes, None)
    }

    /// Like [`PixelNormalizer::normalize_bytes`], checking the decoded size
    /// against `reported`.
    ///
    /// A disagreement is logged and the decoded size wins; the bound is
    /// always applied to what was actually decoded.
    pub fn normalize_reported(
        &self,
        key: &str,
        bytes: &[u8],
        reported: Option<(u32, u32)>,
    ) -> PipelineResult<PixelBuffer> {
        let image = self.decode(key, bytes)?;
        let decoded = image.dimensions();
        if let Some((width, height)) = reported.filter(|&r| r != decoded) {
            tracing::warn!(
                key,
                reported_width = width,
                reported_height = height,
                decoded_width = decoded.0,
                decoded_height = decoded.1,
                "Asset dimensions differ from reported size"
            );
        }
        self.normalize_image(key, &image)
    }

    /// Bound an already-decoded image and convert it to RGBA8.
    ///
    /// Sources without an alpha channel come out fully opaque; sources with
    /// one keep their alpha values untouched.
    pub fn normalize_image(&self, key: &str, image: &DynamicImage) -> PipelineResult<PixelBuffer> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(PipelineError::InvalidDimensions {
                key: key.to_string(),
                width,
                height,
            });
        }

        let (target_w, target_h) =
            fit_within(width, height, self.bounds.max_width, self.bounds.max_height);
        if target_w == 0 || target_h == 0 {
            return Err(PipelineError::InvalidDimensions {
                key: key.to_string(),
                width: target_w,
                height: target_h,
            });
        }

        let rgba = if (target_w, target_h) == (width, height) {
            image.to_rgba8()
        } else {
            image
                .resize_exact(target_w, target_h, self.filter)
                .to_rgba8()
        };
        tracing::trace!(key, width, height, target_w, target_h, "Normalized pixels");

        PixelBuffer::new(target_w, target_h, rgba.into_raw())
    }

    fn decode(&self, key: &str, bytes: &[u8]) -> PipelineResult<DynamicImage> {
        let mut reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| PipelineError::Decode {
                key: key.to_string(),
                message: format!("Cannot detect image format: {}", e),
            })?;
        if reader.format().is_none() {
            return Err(PipelineError::Decode {
                key: key.to_string(),
                message: "Unrecognized image format".to_string(),
            });
        }

        // A small compressed file can expand to an enormous buffer
        let mut limits = Limits::default();
        limits.max_image_width = Some(self.limits.max_image_dimension);
        limits.max_image_height = Some(self.limits.max_image_dimension);
        reader.limits(limits);

        reader.decode().map_err(|e| PipelineError::Decode {
            key: key.to_string(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};

    fn normalizer() -> PixelNormalizer {
        PixelNormalizer::new(BoundsConfig::default(), LimitsConfig::default())
    }

    fn encode(image: &DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, format).unwrap();
        buffer.into_inner()
    }

    #[test]
    fn test_fit_within_landscape() {
        assert_eq!(fit_within(4000, 2000, 100, 100), (100, 50));
    }

    #[test]
    fn test_fit_within_portrait_clamps_height_second() {
        assert_eq!(fit_within(2000, 4000, 100, 100), (50, 100));
    }

    #[test]
    fn test_fit_within_never_upscales() {
        assert_eq!(fit_within(50, 80, 100, 100), (50, 80));
        assert_eq!(fit_within(100, 100, 100, 100), (100, 100));
    }

    #[test]
    fn test_fit_within_rounds_to_nearest() {
        // 150x101 -> 100x67.33
        assert_eq!(fit_within(150, 101, 100, 100), (100, 67));
        // 101x150 -> 100x148.5 -> 67.33x100
        assert_eq!(fit_within(101, 150, 100, 100), (67, 100));
    }

    #[test]
    fn test_fit_within_non_square_bound() {
        assert_eq!(fit_within(1000, 1000, 100, 40), (40, 40));
        assert_eq!(fit_within(3000, 1000, 100, 40), (100, 33));
    }

    #[test]
    fn test_fit_within_bound_property() {
        for w in (1..=1200).step_by(7) {
            for h in (1..=1200).step_by(11) {
                let (fw, fh) = fit_within(w, h, 100, 100);
                assert!(fw <= 100 && fh <= 100, "{w}x{h} -> {fw}x{fh}");
                assert!(fw <= w && fh <= h, "{w}x{h} upscaled to {fw}x{fh}");
                if w > 100 || h > 100 {
                    assert!(fw == 100 || fh == 100, "{w}x{h} -> {fw}x{fh}");
                } else {
                    assert_eq!((fw, fh), (w, h));
                }
            }
        }
    }

    #[test]
    fn test_fit_within_extreme_ratio_can_round_to_zero() {
        assert_eq!(fit_within(10_000, 1, 100, 100), (100, 0));
    }

    #[test]
    fn test_normalize_large_jpeg() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(4000, 2000, Rgb([200, 40, 90])));
        let bytes = encode(&img, ImageFormat::Jpeg);

        let buffer = normalizer().normalize_bytes("k", &bytes).unwrap();
        assert_eq!((buffer.width(), buffer.height()), (100, 50));
        assert_eq!(buffer.pixels().len(), 100 * 50 * 4);
        // JPEG has no alpha: every pixel is opaque
        assert!(buffer.pixels().chunks_exact(4).all(|px| px[3] == 255));
    }

    #[test]
    fn test_normalize_keeps_small_png_and_alpha() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(50, 80, Rgba([10, 20, 30, 0])));
        let bytes = encode(&img, ImageFormat::Png);

        let buffer = normalizer().normalize_bytes("k", &bytes).unwrap();
        assert_eq!((buffer.width(), buffer.height()), (50, 80));
        assert!(buffer.pixels().chunks_exact(4).all(|px| px[3] == 0));
        assert_eq!(&buffer.pixels()[..4], &[10, 20, 30, 0]);
    }

    #[test]
    fn test_normalize_rgb_png_becomes_opaque_rgba() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 4, Rgb([1, 2, 3])));
        let bytes = encode(&img, ImageFormat::Png);

        let buffer = normalizer().normalize_bytes("k", &bytes).unwrap();
        assert_eq!(&buffer.pixels()[..4], &[1, 2, 3, 255]);
    }

    #[test]
    fn test_normalize_rejects_corrupt_bytes() {
        let err = normalizer()
            .normalize_bytes("k", b"definitely not an image")
            .unwrap_err();
        assert!(matches!(err, PipelineError::Decode { .. }));
    }

    #[test]
    fn test_normalize_rejects_truncated_png() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 64, Rgb([9, 9, 9])));
        let bytes = encode(&img, ImageFormat::Png);
        let truncated = &bytes[..bytes.len() / 2];

        let err = normalizer().normalize_bytes("k", truncated).unwrap_err();
        assert!(matches!(err, PipelineError::Decode { .. }));
    }

    #[test]
    fn test_normalize_rejects_zero_side_after_clamp() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(1000, 1));
        let err = normalizer().normalize_image("k", &img).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InvalidDimensions { height: 0, .. }
        ));
    }

    #[test]
    fn test_normalize_respects_decode_limits() {
        let limits = LimitsConfig {
            max_image_dimension: 32,
            ..LimitsConfig::default()
        };
        let normalizer = PixelNormalizer::new(BoundsConfig::default(), limits);
        let img = DynamicImage::ImageRgb8(RgbImage::new(64, 16));
        let bytes = encode(&img, ImageFormat::Png);

        assert!(normalizer.normalize_bytes("k", &bytes).is_err());
    }

    #[test]
    fn test_reported_mismatch_uses_decoded_size() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(400, 200, Rgb([4, 5, 6])));
        let bytes = encode(&img, ImageFormat::Png);

        let buffer = normalizer()
            .normalize_reported("k", &bytes, Some((200, 400)))
            .unwrap();
        assert_eq!((buffer.width(), buffer.height()), (100, 50));
    }

    #[tokio::test]
    async fn test_normalize_times_out() {
        let limits = LimitsConfig {
            decode_timeout_ms: 1,
            ..LimitsConfig::default()
        };
        let normalizer = PixelNormalizer::new(BoundsConfig::default(), limits);
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(4000, 2000, Rgb([1, 2, 3])));
        let bytes = encode(&img, ImageFormat::Jpeg);

        let err = normalizer.normalize("k", bytes, None).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Timeout { ref stage, timeout_ms: 1, .. } if stage == "normalize"
        ));
    }

    #[tokio::test]
    async fn test_normalize_async_matches_sync() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(300, 120, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        }));
        let bytes = encode(&img, ImageFormat::Png);
        let n = normalizer();

        let sync = n.normalize_bytes("k", &bytes).unwrap();
        let from_pool = n.normalize("k", bytes, Some((300, 120))).await.unwrap();
        assert_eq!(sync, from_pool);
        assert_eq!((from_pool.width(), from_pool.height()), (100, 40));
    }
}
