//! Surface encoding: RGBA surface → PNG bytes.
//!
//! PNG is lossless, so quality only selects how hard the encoder works.
//! At [`crate::config::PNG_QUALITY`] (1.0) we use the best compression with
//! adaptive filtering; below that, the encoder defaults.

use crate::pipeline::surface::Surface;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ExtendedColorType, ImageEncoder, ImageError};
use tracing::debug;

/// Serialises a rendered surface.
///
/// An `Ok` with an empty buffer counts as "no data" and fails the conversion
/// the same way an `Err` does.
pub trait SurfaceEncoder: Send + Sync {
    fn encode(&self, surface: &Surface, quality: f32) -> Result<Vec<u8>, ImageError>;
}

/// The default PNG encoder backed by the `image` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct PngSurfaceEncoder;

impl SurfaceEncoder for PngSurfaceEncoder {
    fn encode(&self, surface: &Surface, quality: f32) -> Result<Vec<u8>, ImageError> {
        let mut buf = Vec::new();
        let encoder = if quality >= 1.0 {
            PngEncoder::new_with_quality(&mut buf, CompressionType::Best, FilterType::Adaptive)
        } else {
            PngEncoder::new(&mut buf)
        };

        let pixels = surface.pixels();
        encoder.write_image(
            pixels.as_raw(),
            pixels.width(),
            pixels.height(),
            ExtendedColorType::Rgba8,
        )?;

        debug!(
            width = pixels.width(),
            height = pixels.height(),
            bytes = buf.len(),
            "Encoded surface as PNG"
        );
        Ok(buf)
    }
}
