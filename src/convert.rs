//! The converter: engine bootstrap, page-1 render, PNG encode, and result
//! assembly.
//!
//! [`Converter::convert`] never fails outright. Every error is logged and
//! returned as [`ConversionResult::Failed`], so callers branch on the result
//! instead of handling `Err`.

use crate::config::{ConverterConfig, PNG_MIME, PNG_QUALITY};
use crate::display::DisplayRegistry;
use crate::engine::loader::EngineLoader;
use crate::engine::pdfium::{default_sources, DownloadProgress};
use crate::engine::{EngineHandle, EngineSource};
use crate::error::ConvertError;
use crate::output::{
    output_file_name, ConversionFailure, ConversionRequest, ConversionResult, ConvertedImage,
    ImageFile,
};
use crate::pipeline::encode::{PngSurfaceEncoder, SurfaceEncoder};
use crate::pipeline::render;
use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Converts the first page of PDFs to PNG.
///
/// Owns its [`EngineLoader`], so every converter has its own single-flight
/// engine cache. Clone the converter (cheap, `Arc`-backed) to share one cache.
///
/// # Example
/// ```rust,no_run
/// use pdf2img::{Converter, ConverterConfig};
///
/// # #[tokio::main]
/// # async fn main() {
/// let converter = Converter::new(ConverterConfig::default());
/// let bytes = std::fs::read("Resume.pdf").unwrap();
/// let result = converter.convert(bytes, "Resume.pdf").await;
/// match result.error() {
///     None => println!("wrote {}", result.file().unwrap().name()),
///     Some(msg) => eprintln!("{msg}"),
/// }
/// # }
/// ```
#[derive(Clone)]
pub struct Converter {
    loader: Arc<EngineLoader>,
    encoder: Arc<dyn SurfaceEncoder>,
    display: Arc<DisplayRegistry>,
    config: Arc<ConverterConfig>,
}

impl Converter {
    /// A converter backed by PDFium (auto-resolved, then system library).
    pub fn new(config: ConverterConfig) -> Self {
        Self::with_sources(default_sources(None), config)
    }

    /// Like [`Converter::new`], reporting engine download progress.
    pub fn with_download_progress(config: ConverterConfig, progress: DownloadProgress) -> Self {
        Self::with_sources(default_sources(Some(progress)), config)
    }

    /// A converter that acquires its engine from `sources`, tried in order.
    pub fn with_sources(sources: Vec<Arc<dyn EngineSource>>, config: ConverterConfig) -> Self {
        let config = Arc::new(config);
        Self {
            loader: Arc::new(EngineLoader::new(sources, Arc::clone(&config))),
            encoder: Arc::new(PngSurfaceEncoder),
            display: Arc::new(DisplayRegistry::new()),
            config,
        }
    }

    /// Replace the surface encoder.
    pub fn with_encoder(mut self, encoder: Arc<dyn SurfaceEncoder>) -> Self {
        self.encoder = encoder;
        self
    }

    /// Share an existing display registry (e.g. one per UI session).
    pub fn with_display_registry(mut self, display: Arc<DisplayRegistry>) -> Self {
        self.display = display;
        self
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    pub fn loader(&self) -> &EngineLoader {
        &self.loader
    }

    /// Registry holding the display references this converter hands out.
    pub fn display(&self) -> &Arc<DisplayRegistry> {
        &self.display
    }

    /// Load the engine ahead of the first conversion.
    pub async fn prewarm(&self) -> Result<Arc<EngineHandle>, ConvertError> {
        self.load_engine().await
    }

    /// Convert page 1 of `document` to PNG.
    ///
    /// `filename` only determines the output name (`<stem>.png`).
    pub async fn convert(&self, document: impl Into<Vec<u8>>, filename: &str) -> ConversionResult {
        let started = Instant::now();
        match self.try_convert(document.into(), filename).await {
            Ok(image) => {
                info!(
                    filename,
                    output = image.file.name(),
                    bytes = image.file.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "PDF converted"
                );
                ConversionResult::Converted(image)
            }
            Err(e) => {
                error!(filename, error = ?e, "PDF conversion failed");
                ConversionResult::Failed(ConversionFailure::from(&e))
            }
        }
    }

    pub async fn convert_request(&self, request: ConversionRequest) -> ConversionResult {
        self.convert(request.bytes, &request.filename).await
    }

    async fn load_engine(&self) -> Result<Arc<EngineHandle>, ConvertError> {
        bounded("engine load", self.config.engine_load_timeout(), self.loader.load())
            .await?
            .map_err(ConvertError::from)
    }

    async fn try_convert(
        &self,
        document: Vec<u8>,
        filename: &str,
    ) -> Result<ConvertedImage, ConvertError> {
        let handle = self.load_engine().await?;
        let bytes: Arc<[u8]> = document.into();

        let surface = bounded(
            "render",
            self.config.render_timeout(),
            render::render_first_page(
                Arc::clone(&handle.engine),
                bytes,
                self.config.max_surface_pixels,
            ),
        )
        .await??;
        let (width, height) = (surface.width(), surface.height());

        let encoder = Arc::clone(&self.encoder);
        let encoded = bounded(
            "encode",
            self.config.render_timeout(),
            tokio::task::spawn_blocking(move || encoder.encode(&surface, PNG_QUALITY)),
        )
        .await?
        .map_err(|e| ConvertError::Internal(format!("Encode task panicked: {e}")))?;

        let png = match encoded {
            Ok(png) if !png.is_empty() => png,
            Ok(_) => {
                warn!(filename, "PNG encoder produced no data");
                return Err(ConvertError::EncodingFailed);
            }
            Err(e) => {
                warn!(filename, error = %e, "PNG encoding failed");
                return Err(ConvertError::EncodingFailed);
            }
        };

        let png: Arc<[u8]> = png.into();
        let file = ImageFile::png(output_file_name(filename), Arc::clone(&png));
        let image_url = self.display.create(png, PNG_MIME);

        Ok(ConvertedImage {
            image_url,
            file,
            width,
            height,
        })
    }
}

/// Await `fut`, giving up after `limit` when one is set.
async fn bounded<F: Future>(
    stage: &'static str,
    limit: Option<Duration>,
    fut: F,
) -> Result<F::Output, ConvertError> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| ConvertError::Timeout {
                stage,
                secs: limit.as_secs(),
            }),
        None => Ok(fut.await),
    }
}

// ── Process-wide convenience ─────────────────────────────────────────────

static GLOBAL: OnceLock<Converter> = OnceLock::new();

/// The process-wide default converter, created on first use.
///
/// Prefer constructing a [`Converter`] and passing it around; this exists for
/// callers that want one implicit engine for the whole process.
pub fn global() -> &'static Converter {
    GLOBAL.get_or_init(|| Converter::new(ConverterConfig::default()))
}

/// Convert with the [`global`] converter.
pub async fn convert_pdf_to_image(
    document: impl Into<Vec<u8>>,
    filename: &str,
) -> ConversionResult {
    global().convert(document, filename).await
}

/// Synchronous wrapper around [`Converter::convert`].
///
/// Creates a temporary tokio runtime internally; do not call from inside an
/// async context.
pub fn convert_sync(
    converter: &Converter,
    document: impl Into<Vec<u8>>,
    filename: &str,
) -> ConversionResult {
    match tokio::runtime::Runtime::new() {
        Ok(rt) => rt.block_on(converter.convert(document, filename)),
        Err(e) => {
            let e = ConvertError::Internal(format!("Failed to create tokio runtime: {e}"));
            error!(filename, error = ?e, "PDF conversion failed");
            ConversionResult::Failed(ConversionFailure::from(&e))
        }
    }
}
