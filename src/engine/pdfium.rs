//! PDFium-backed engine and its acquisition strategies.
//!
//! Two sources are tried in order by [`default_sources`]:
//!
//! 1. [`AutoPdfiumSource`]: the library resolved by `pdfium-auto`
//!    (`PDFIUM_LIB_PATH`, cache, or download). Reports the pinned build as
//!    its version unless the library came from the env override.
//! 2. [`SystemPdfiumSource`]: whatever `libpdfium` the OS loader finds.
//!    Version unknown.
//!
//! `pdfium-render` is built with `sync`, which makes [`Pdfium`] `Send + Sync`
//! and serialises every call into the library behind one lock. One instance
//! is shared by every conversion; calls are made from blocking tasks.

use crate::engine::{
    EngineDocument, EnginePage, EngineSource, RenderEngine, Viewport, WorkerEndpoint,
};
use crate::error::{EngineError, EngineLoadError};
use crate::pipeline::surface::{SmoothingQuality, Surface};
use parking_lot::Mutex;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Download progress callback: `(bytes_downloaded, total_bytes)`.
pub type DownloadProgress = Arc<dyn Fn(u64, Option<u64>) + Send + Sync>;

/// A bound PDFium library.
pub struct PdfiumEngine {
    pdfium: Pdfium,
    version: Option<String>,
    endpoint: Mutex<Option<WorkerEndpoint>>,
}

impl PdfiumEngine {
    pub fn new(pdfium: Pdfium, version: Option<String>) -> Self {
        Self {
            pdfium,
            version,
            endpoint: Mutex::new(None),
        }
    }

    /// The endpoint set by the loader, if any.
    pub fn worker_endpoint(&self) -> Option<WorkerEndpoint> {
        self.endpoint.lock().clone()
    }
}

impl RenderEngine for PdfiumEngine {
    fn version(&self) -> Option<String> {
        self.version.clone()
    }

    fn set_worker_endpoint(&self, endpoint: &WorkerEndpoint) {
        debug!(%endpoint, "PDFium worker endpoint set");
        *self.endpoint.lock() = Some(endpoint.clone());
    }

    fn open_document<'a>(
        &'a self,
        bytes: &'a [u8],
    ) -> Result<Box<dyn EngineDocument + 'a>, EngineError> {
        let document = self
            .pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(|e| EngineError::InvalidDocument(e.to_string()))?;
        Ok(Box::new(PdfiumDocument { document }))
    }
}

struct PdfiumDocument<'a> {
    document: PdfDocument<'a>,
}

impl EngineDocument for PdfiumDocument<'_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn page<'b>(&'b self, number: usize) -> Result<Box<dyn EnginePage + 'b>, EngineError> {
        let total = self.page_count();
        if number == 0 || number > total {
            return Err(EngineError::PageOutOfRange { page: number, total });
        }
        let page = self
            .document
            .pages()
            .get((number - 1) as u16)
            .map_err(|e| EngineError::Render(format!("page {number}: {e}")))?;
        Ok(Box::new(PdfiumPage { page }))
    }
}

struct PdfiumPage<'a> {
    page: PdfPage<'a>,
}

impl EnginePage for PdfiumPage<'_> {
    fn native_size(&self) -> (f32, f32) {
        (self.page.width().value, self.page.height().value)
    }

    fn render(&self, surface: &mut Surface, viewport: &Viewport) -> Result<(), EngineError> {
        let hints = surface.hints();
        let (width, height) = viewport.surface_size();
        let config = PdfRenderConfig::new()
            .set_target_width(width as i32)
            .set_target_height(height as i32)
            .set_text_smoothing(hints.smoothing)
            .set_image_smoothing(hints.smoothing)
            .set_path_smoothing(hints.smoothing)
            .use_print_quality(hints.quality == SmoothingQuality::High);

        let bitmap = self
            .page
            .render_with_config(&config)
            .map_err(|e| EngineError::Render(e.to_string()))?;
        let image = bitmap.as_image().to_rgba8();
        debug!(
            width = image.width(),
            height = image.height(),
            "PDFium rendered page"
        );
        surface.draw(&image);
        Ok(())
    }
}

// ── Sources ──────────────────────────────────────────────────────────────

/// Binds the library resolved by `pdfium-auto`, downloading it if needed.
#[derive(Default)]
pub struct AutoPdfiumSource {
    progress: Option<DownloadProgress>,
}

impl AutoPdfiumSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report download progress while the library is fetched.
    pub fn with_progress(progress: DownloadProgress) -> Self {
        Self {
            progress: Some(progress),
        }
    }
}

impl EngineSource for AutoPdfiumSource {
    fn name(&self) -> &str {
        "pdfium-auto"
    }

    fn acquire(&self) -> Result<Arc<dyn RenderEngine>, EngineLoadError> {
        let progress = self.progress.as_deref().map(|cb| cb as &dyn Fn(u64, Option<u64>));
        let (pdfium, library) =
            pdfium_auto::bind_resolved(progress).map_err(|e| EngineLoadError::Unavailable {
                source_name: self.name().to_string(),
                reason: e.to_string(),
            })?;
        debug!(path = %library.path.display(), origin = ?library.origin, "Bound PDFium");
        Ok(Arc::new(PdfiumEngine::new(
            pdfium,
            library.version().map(String::from),
        )))
    }
}

/// Binds the system PDFium library, or one in an explicit directory.
#[derive(Debug, Default, Clone)]
pub struct SystemPdfiumSource {
    dir: Option<PathBuf>,
}

impl SystemPdfiumSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look for the platform library name inside `dir` instead of the
    /// loader's search path.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }
}

impl EngineSource for SystemPdfiumSource {
    fn name(&self) -> &str {
        "system"
    }

    fn acquire(&self) -> Result<Arc<dyn RenderEngine>, EngineLoadError> {
        let bindings = match &self.dir {
            Some(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir)),
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| EngineLoadError::Unavailable {
            source_name: self.name().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Arc::new(PdfiumEngine::new(Pdfium::new(bindings), None)))
    }
}

/// Primary then fallback: auto-resolved PDFium, then the system library.
pub fn default_sources(progress: Option<DownloadProgress>) -> Vec<Arc<dyn EngineSource>> {
    let auto = match progress {
        Some(cb) => AutoPdfiumSource::with_progress(cb),
        None => AutoPdfiumSource::new(),
    };
    vec![Arc::new(auto), Arc::new(SystemPdfiumSource::new())]
}
