//! The in-memory drawing surface a page is rasterised into.
//!
//! A [`Surface`] is sized once from the viewport (ceil of each dimension) and
//! never resized. Engines draw into it through [`Surface::draw`]; anything
//! outside the surface bounds is clipped.

use image::{Rgba, RgbaImage};

/// Smoothing quality hint passed to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SmoothingQuality {
    Low,
    #[default]
    Medium,
    High,
}

/// Drawing state an engine should honour while rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderHints {
    pub smoothing: bool,
    pub quality: SmoothingQuality,
}

/// An RGBA raster plus the hints that apply to drawing on it.
#[derive(Debug, Clone)]
pub struct Surface {
    pixels: RgbaImage,
    hints: RenderHints,
}

impl Surface {
    /// Obtain a transparent surface of `width × height` pixels.
    ///
    /// Returns `None` when no drawing context can be provided: either
    /// dimension is zero, or the area exceeds `max_pixels`.
    pub fn allocate(width: u32, height: u32, max_pixels: u64) -> Option<Self> {
        let area = u64::from(width) * u64::from(height);
        if area == 0 || area > max_pixels {
            return None;
        }
        // Guard the RGBA byte length against usize overflow on 32-bit hosts.
        usize::try_from(area.checked_mul(4)?).ok()?;

        Some(Self {
            pixels: RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0])),
            hints: RenderHints::default(),
        })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn hints(&self) -> RenderHints {
        self.hints
    }

    pub fn set_smoothing(&mut self, enabled: bool) {
        self.hints.smoothing = enabled;
    }

    pub fn set_smoothing_quality(&mut self, quality: SmoothingQuality) {
        self.hints.quality = quality;
    }

    /// Copy `image` onto the surface with its top-left corner at the origin.
    pub fn draw(&mut self, image: &RgbaImage) {
        image::imageops::replace(&mut self.pixels, image, 0, 0);
    }

    /// Fill the whole surface with one colour.
    pub fn fill(&mut self, colour: Rgba<u8>) {
        for px in self.pixels.pixels_mut() {
            *px = colour;
        }
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }
}
