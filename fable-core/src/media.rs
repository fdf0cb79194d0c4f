//! Media normalization.
//!
//! Stories are persisted as a single blob, so embedded images must stay
//! bounded: on import and manual upload, assets run through
//! [`normalize_image`], which downscales to a maximum dimension and
//! re-encodes. Failures here are reported, never fatal - a story plays
//! and edits fine without its pictures.

use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use thiserror::Error;
use tracing::debug;

/// Default bound on the longer image dimension, in pixels.
pub const DEFAULT_MAX_DIMENSION: u32 = 512;

/// Errors from media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("failed to encode image: {0}")]
    Encode(#[source] image::ImageError),
}

/// A normalized, bounded-size image.
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    /// JPEG-encoded bytes.
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Decode an image, downscale it so neither dimension exceeds
/// `max_dimension` (preserving aspect ratio), and re-encode as JPEG.
/// Images already within bounds are still re-encoded, so the stored
/// size stays predictable regardless of the input format.
pub fn normalize_image(bytes: &[u8], max_dimension: u32) -> Result<NormalizedImage, MediaError> {
    let decoded = image::load_from_memory(bytes).map_err(MediaError::Decode)?;

    let image = if decoded.width().max(decoded.height()) > max_dimension {
        decoded.thumbnail(max_dimension, max_dimension)
    } else {
        decoded
    };

    // JPEG carries no alpha channel.
    let image = DynamicImage::ImageRgb8(image.to_rgb8());

    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, ImageFormat::Jpeg)
        .map_err(MediaError::Encode)?;

    let normalized = NormalizedImage {
        bytes: out.into_inner(),
        width: image.width(),
        height: image.height(),
    };
    debug!(
        input_bytes = bytes.len(),
        output_bytes = normalized.bytes.len(),
        width = normalized.width,
        height = normalized.height,
        "normalized image"
    );
    Ok(normalized)
}
