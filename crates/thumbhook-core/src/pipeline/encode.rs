//! ThumbHash encoding of normalized pixel buffers.

use serde::Serialize;

use crate::config::MAX_HASH_INPUT_DIMENSION;
use crate::error::{PipelineError, PipelineResult};
use crate::types::{PerceptualHash, PixelBuffer};

/// Upper bound on encoded hash length in bytes.
pub const MAX_HASH_LEN: usize = 25;

/// Coarse information recoverable from a stored hash.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HashSummary {
    /// Average colour as RGBA in 0.0..=1.0
    pub average_rgba: [f32; 4],
    /// Approximate width / height of the source image
    pub aspect_ratio: f32,
}

/// Deterministic ThumbHash encoder.
pub struct HashEncoder;

impl HashEncoder {
    /// Encode a raw RGBA buffer.
    ///
    /// Requires `pixels.len() == width * height * 4` and both sides in
    /// `1..=100`.
    pub fn encode(width: u32, height: u32, pixels: &[u8]) -> PipelineResult<PerceptualHash> {
        if width == 0
            || height == 0
            || width > MAX_HASH_INPUT_DIMENSION
            || height > MAX_HASH_INPUT_DIMENSION
        {
            return Err(PipelineError::Encode(format!(
                "dimensions {width}x{height} outside 1..={MAX_HASH_INPUT_DIMENSION}"
            )));
        }
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(PipelineError::Encode(format!(
                "expected {expected} RGBA bytes for {width}x{height}, got {}",
                pixels.len()
            )));
        }

        let bytes = thumbhash::rgba_to_thumb_hash(width as usize, height as usize, pixels);
        Ok(PerceptualHash::from_bytes(bytes))
    }

    /// Encode a normalized buffer.
    pub fn encode_buffer(buffer: &PixelBuffer) -> PipelineResult<PerceptualHash> {
        Self::encode(buffer.width(), buffer.height(), buffer.pixels())
    }

    /// Read the average colour and aspect ratio back out of a hash.
    pub fn inspect(hash: &PerceptualHash) -> PipelineResult<HashSummary> {
        let (r, g, b, a) = thumbhash::thumb_hash_to_average_rgba(hash.as_bytes())
            .map_err(|_| PipelineError::Encode("malformed thumbhash".to_string()))?;
        let aspect_ratio = thumbhash::thumb_hash_to_approximate_aspect_ratio(hash.as_bytes())
            .map_err(|_| PipelineError::Encode("malformed thumbhash".to_string()))?;
        Ok(HashSummary {
            average_rgba: [r, g, b, a],
            aspect_ratio,
        })
    }
}
