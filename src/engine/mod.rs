//! The rendering-engine boundary.
//!
//! The converter only needs a handful of engine operations, captured by three
//! small traits:
//!
//! ```text
//! RenderEngine ──open_document──▶ EngineDocument ──page(n)──▶ EnginePage
//!   version()                       page_count()                native_size()
//!   set_worker_endpoint()                                       viewport(scale)
//!                                                               render(surface)
//! ```
//!
//! Engines are obtained through an [`EngineSource`]; the [`loader`] tries
//! sources in order and shares one in-flight acquisition between callers.
//! [`pdfium`] provides the production implementations.

pub mod loader;
pub mod pdfium;

use crate::config::{ConverterConfig, VERSION_PLACEHOLDER};
use crate::error::{EngineError, EngineLoadError};
use crate::pipeline::surface::Surface;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Raster geometry for a page at a given scale, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
    pub scale: f32,
}

impl Viewport {
    /// Scale a native page size (PDF points).
    pub fn from_native(width: f32, height: f32, scale: f32) -> Self {
        Self {
            width: width * scale,
            height: height * scale,
            scale,
        }
    }

    /// Surface dimensions: each side rounded up to a whole pixel.
    pub fn surface_size(&self) -> (u32, u32) {
        (ceil_px(self.width), ceil_px(self.height))
    }
}

fn ceil_px(v: f32) -> u32 {
    if v.is_finite() && v > 0.0 {
        v.ceil().min(u32::MAX as f32) as u32
    } else {
        0
    }
}

/// Where the engine's background worker is served from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEndpoint {
    /// Version-matched remote endpoint.
    Remote(String),
    /// Fixed path deployed alongside the application.
    Local(PathBuf),
}

impl WorkerEndpoint {
    /// Prefer the remote template when the engine reports a non-empty
    /// version; otherwise use the local path.
    pub fn resolve(version: Option<&str>, config: &ConverterConfig) -> Self {
        match version.map(str::trim).filter(|v| !v.is_empty()) {
            Some(v) => {
                WorkerEndpoint::Remote(config.worker_url_template.replace(VERSION_PLACEHOLDER, v))
            }
            None => WorkerEndpoint::Local(config.local_worker_path.clone()),
        }
    }
}

impl fmt::Display for WorkerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerEndpoint::Remote(url) => f.write_str(url),
            WorkerEndpoint::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

/// A loaded PDF rendering engine.
///
/// Implementations are shared across threads and called from blocking tasks.
pub trait RenderEngine: Send + Sync {
    /// Engine build identifier, if the engine reports one.
    fn version(&self) -> Option<String>;

    /// Point the engine at its background worker.
    fn set_worker_endpoint(&self, endpoint: &WorkerEndpoint);

    /// Parse a document from raw bytes. The bytes are not modified.
    fn open_document<'a>(
        &'a self,
        bytes: &'a [u8],
    ) -> Result<Box<dyn EngineDocument + 'a>, EngineError>;
}

/// An open document.
pub trait EngineDocument {
    fn page_count(&self) -> usize;

    /// Fetch a page by 1-based number.
    fn page<'a>(&'a self, number: usize) -> Result<Box<dyn EnginePage + 'a>, EngineError>;
}

/// A single page of an open document.
pub trait EnginePage {
    /// Native page size in PDF points (width, height).
    fn native_size(&self) -> (f32, f32);

    fn viewport(&self, scale: f32) -> Viewport {
        let (width, height) = self.native_size();
        Viewport::from_native(width, height, scale)
    }

    /// Draw the page into `surface` at `viewport`, honouring
    /// [`Surface::hints`].
    fn render(&self, surface: &mut Surface, viewport: &Viewport) -> Result<(), EngineError>;
}

/// One strategy for acquiring an engine (bind a library, load a module, …).
///
/// `acquire` blocks; the loader runs it on the blocking thread pool.
pub trait EngineSource: Send + Sync {
    fn name(&self) -> &str;

    fn acquire(&self) -> Result<Arc<dyn RenderEngine>, EngineLoadError>;
}

/// A loaded engine together with the endpoint it was configured with.
pub struct EngineHandle {
    pub engine: Arc<dyn RenderEngine>,
    pub endpoint: WorkerEndpoint,
    /// Name of the [`EngineSource`] that produced the engine.
    pub source: String,
}

impl fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineHandle")
            .field("engine", &"<dyn RenderEngine>")
            .field("endpoint", &self.endpoint)
            .field("source", &self.source)
            .finish()
    }
}
