//! # pdf2img
//!
//! Render the first page of a PDF to a PNG preview.
//!
//! The rendering engine (PDFium) is loaded lazily on first use and shared by
//! every later call. Callers that arrive while it is still loading wait on the
//! same load instead of starting their own. If the primary engine build cannot
//! be bound, the system library is tried next.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF bytes
//!  │
//!  ├─ 1. Engine   load once (single-flight), primary → fallback source
//!  ├─ 2. Parse    open the document from memory
//!  ├─ 3. Page     page 1 only, viewport at 2× native size
//!  ├─ 4. Surface  ceil(w) × ceil(h) RGBA, smoothing on, quality High
//!  ├─ 5. Render   draw page into surface (spawn_blocking)
//!  └─ 6. Encode   PNG → ImageFile `<stem>.png` + session DisplayUrl
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2img::{Converter, ConverterConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let converter = Converter::new(ConverterConfig::default());
//!     let bytes = std::fs::read("Resume.pdf")?;
//!     let image = converter.convert(bytes, "Resume.pdf").await.into_result()?;
//!     image.file.save_in("previews").await?;
//!     println!("{} ({}x{})", image.image_url, image.width, image.height);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2img` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod display;
pub mod engine;
pub mod error;
pub mod output;
pub mod pipeline;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConverterConfig, ConverterConfigBuilder, PNG_MIME, PNG_QUALITY, RENDER_SCALE};
pub use convert::{convert_pdf_to_image, convert_sync, global, Converter};
pub use display::{DisplayEntry, DisplayRegistry, DisplayUrl};
pub use engine::loader::{EngineLoader, LoadPhase};
pub use engine::{
    EngineDocument, EngineHandle, EnginePage, EngineSource, RenderEngine, Viewport, WorkerEndpoint,
};
pub use error::{ConvertError, EngineError, EngineLoadError, FailureKind};
pub use output::{
    output_file_name, ConversionFailure, ConversionRequest, ConversionResult, ConvertedImage,
    ImageFile,
};
pub use pipeline::encode::{PngSurfaceEncoder, SurfaceEncoder};
pub use pipeline::surface::{RenderHints, SmoothingQuality, Surface};
