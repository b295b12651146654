//! Error types for the pdf2img library.
//!
//! Three layers, from the inside out:
//!
//! * [`EngineError`]: a rendering engine rejected a document, a page lookup,
//!   or a render call.
//! * [`EngineLoadError`]: no rendering engine could be acquired.
//! * [`ConvertError`]: everything that can stop a single conversion. Its
//!   `Display` text is the user-facing message carried by
//!   [`crate::output::ConversionFailure`].
//!
//! [`crate::Converter::convert`] never returns `Err`: every [`ConvertError`]
//! is logged and folded into a failed [`crate::ConversionResult`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Failures reported by a [`crate::engine::RenderEngine`] implementation.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// The byte buffer could not be parsed as a PDF.
    #[error("{0}")]
    InvalidDocument(String),

    /// The requested 1-based page does not exist.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    /// The engine failed while drawing the page.
    #[error("{0}")]
    Render(String),
}

/// Failures acquiring a rendering engine.
#[derive(Debug, Clone, Error)]
pub enum EngineLoadError {
    /// One acquisition strategy could not provide an engine.
    #[error("engine source '{source_name}' is unavailable: {reason}")]
    Unavailable { source_name: String, reason: String },

    /// The loader was built with an empty source list.
    #[error("no rendering engine sources are configured")]
    NoSources,

    /// Every configured source failed; `last` is the final failure.
    #[error("{last}")]
    Exhausted {
        tried: usize,
        last: Box<EngineLoadError>,
    },

    /// An acquisition task panicked before reporting.
    #[error("engine acquisition task panicked: {0}")]
    Panicked(String),
}

/// The failure taxonomy exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Neither the primary nor the fallback engine could be loaded.
    EngineLoad,
    /// The host could not provide a drawing surface of the requested size.
    RenderContextUnavailable,
    /// The surface could not be serialised to PNG bytes.
    Encoding,
    /// Parse errors, malformed documents, timeouts and anything else.
    Conversion,
}

/// Everything that can stop a single conversion.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("Failed to convert PDF: {0}")]
    EngineLoad(#[source] Arc<EngineLoadError>),

    #[error("Failed to get 2D rendering context for canvas")]
    ContextUnavailable { width: u32, height: u32 },

    #[error("Failed to create image blob")]
    EncodingFailed,

    #[error("Failed to convert PDF: {0}")]
    Engine(#[from] EngineError),

    #[error("Failed to convert PDF: {stage} timed out after {secs}s")]
    Timeout { stage: &'static str, secs: u64 },

    /// Builder or config-file validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to write image file '{path}': {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to convert PDF: {0}")]
    Internal(String),
}

impl ConvertError {
    /// Classify this error into the caller-facing taxonomy.
    pub fn kind(&self) -> FailureKind {
        match self {
            ConvertError::EngineLoad(_) => FailureKind::EngineLoad,
            ConvertError::ContextUnavailable { .. } => FailureKind::RenderContextUnavailable,
            ConvertError::EncodingFailed => FailureKind::Encoding,
            ConvertError::Engine(_)
            | ConvertError::Timeout { .. }
            | ConvertError::InvalidConfig(_)
            | ConvertError::WriteFailed { .. }
            | ConvertError::Internal(_) => FailureKind::Conversion,
        }
    }
}

impl From<Arc<EngineLoadError>> for ConvertError {
    fn from(e: Arc<EngineLoadError>) -> Self {
        ConvertError::EngineLoad(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_and_blob_messages_are_exact() {
        let ctx = ConvertError::ContextUnavailable {
            width: 0,
            height: 10,
        };
        assert_eq!(ctx.to_string(), "Failed to get 2D rendering context for canvas");
        assert_eq!(ctx.kind(), FailureKind::RenderContextUnavailable);

        assert_eq!(
            ConvertError::EncodingFailed.to_string(),
            "Failed to create image blob"
        );
    }

    #[test]
    fn engine_errors_are_wrapped() {
        let e: ConvertError = EngineError::InvalidDocument("Invalid PDF structure".into()).into();
        assert_eq!(e.to_string(), "Failed to convert PDF: Invalid PDF structure");
        assert_eq!(e.kind(), FailureKind::Conversion);
    }

    #[test]
    fn exhausted_load_surfaces_last_failure() {
        let e = EngineLoadError::Exhausted {
            tried: 2,
            last: Box::new(EngineLoadError::Unavailable {
                source_name: "system".into(),
                reason: "libpdfium.so: cannot open shared object file".into(),
            }),
        };
        let msg = ConvertError::from(Arc::new(e)).to_string();
        assert!(msg.starts_with("Failed to convert PDF: engine source 'system'"), "got: {msg}");
        assert!(msg.contains("cannot open shared object"));
    }

    #[test]
    fn invalid_config_is_not_a_conversion_message() {
        let e = ConvertError::InvalidConfig("max_surface_pixels must be ≥ 1".into());
        assert_eq!(e.to_string(), "Invalid configuration: max_surface_pixels must be ≥ 1");
    }

    #[test]
    fn timeout_display() {
        let e = ConvertError::Timeout {
            stage: "render",
            secs: 30,
        };
        assert_eq!(e.to_string(), "Failed to convert PDF: render timed out after 30s");
    }
}
