//! Configuration for the PDF-to-image converter.
//!
//! Rendering policy is fixed: pages are rasterised at [`RENDER_SCALE`] and
//! encoded at [`PNG_QUALITY`]. What *is* configurable lives in
//! [`ConverterConfig`], built via [`ConverterConfigBuilder`]. It covers host
//! limits, timeouts, and where the engine's worker endpoint points.

use crate::error::ConvertError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Raster scale applied to the page's native size (1 unit = 1 PDF point).
///
/// 2× keeps résumé text legible in a preview while bounding the surface at
/// roughly 1224 × 1584 px for a US Letter page.
pub const RENDER_SCALE: f32 = 2.0;

/// Encoder quality hint. PNG is lossless; 1.0 selects the best compression.
pub const PNG_QUALITY: f32 = 1.0;

/// MIME type of every produced image.
pub const PNG_MIME: &str = "image/png";

/// Placeholder substituted with the engine version in
/// [`ConverterConfig::worker_url_template`].
pub const VERSION_PLACEHOLDER: &str = "{version}";

/// Converter configuration.
///
/// # Example
/// ```rust
/// use pdf2img::ConverterConfig;
///
/// let config = ConverterConfig::builder()
///     .render_timeout_secs(30)
///     .max_surface_pixels(8192 * 8192)
///     .build()
///     .unwrap();
/// assert_eq!(config.render_timeout(), Some(std::time::Duration::from_secs(30)));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Largest surface area, in pixels, the host can provide. Default: 16384².
    ///
    /// A page whose 2× viewport exceeds this fails with
    /// "Failed to get 2D rendering context for canvas".
    pub max_surface_pixels: u64,

    /// Upper bound on engine bootstrap. Default: unbounded.
    pub engine_load_timeout_secs: Option<u64>,

    /// Upper bound on each of the render and encode steps. Default: unbounded.
    pub render_timeout_secs: Option<u64>,

    /// Remote worker endpoint used when the engine reports a version.
    /// Must contain `{version}`.
    pub worker_url_template: String,

    /// Local worker endpoint used when the engine reports no version.
    pub local_worker_path: PathBuf,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            max_surface_pixels: 16_384 * 16_384,
            engine_load_timeout_secs: None,
            render_timeout_secs: None,
            worker_url_template: pdfium_auto::release_url(VERSION_PLACEHOLDER),
            local_worker_path: PathBuf::from("pdfium"),
        }
    }
}

impl ConverterConfig {
    /// Create a new builder starting from the defaults.
    pub fn builder() -> ConverterConfigBuilder {
        ConverterConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn engine_load_timeout(&self) -> Option<Duration> {
        self.engine_load_timeout_secs.map(Duration::from_secs)
    }

    pub fn render_timeout(&self) -> Option<Duration> {
        self.render_timeout_secs.map(Duration::from_secs)
    }

    /// Check invariants that serde or direct field access may have broken.
    pub fn validate(&self) -> Result<(), ConvertError> {
        if self.max_surface_pixels == 0 {
            return Err(ConvertError::InvalidConfig("max_surface_pixels must be ≥ 1".into()));
        }
        if !self.worker_url_template.contains(VERSION_PLACEHOLDER) {
            return Err(ConvertError::InvalidConfig(format!(
                "worker_url_template must contain {VERSION_PLACEHOLDER}, got '{}'",
                self.worker_url_template
            )));
        }
        let zero_timeout = matches!(self.engine_load_timeout_secs, Some(0))
            || matches!(self.render_timeout_secs, Some(0));
        if zero_timeout {
            return Err(ConvertError::InvalidConfig("timeouts must be ≥ 1s".into()));
        }
        Ok(())
    }
}

/// Builder for [`ConverterConfig`].
#[derive(Debug)]
pub struct ConverterConfigBuilder {
    config: ConverterConfig,
}

impl ConverterConfigBuilder {
    pub fn max_surface_pixels(mut self, px: u64) -> Self {
        self.config.max_surface_pixels = px;
        self
    }

    pub fn engine_load_timeout_secs(mut self, secs: u64) -> Self {
        self.config.engine_load_timeout_secs = Some(secs);
        self
    }

    pub fn render_timeout_secs(mut self, secs: u64) -> Self {
        self.config.render_timeout_secs = Some(secs);
        self
    }

    pub fn worker_url_template(mut self, template: impl Into<String>) -> Self {
        self.config.worker_url_template = template.into();
        self
    }

    pub fn local_worker_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.local_worker_path = path.into();
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConverterConfig, ConvertError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
