//! Conversion outputs: the tagged [`ConversionResult`] and the values it
//! carries.

use crate::config::PNG_MIME;
use crate::display::DisplayUrl;
use crate::error::{ConvertError, FailureKind};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A PDF to convert: raw bytes plus the name it was uploaded under.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub bytes: Vec<u8>,
    pub filename: String,
}

impl ConversionRequest {
    pub fn new(bytes: impl Into<Vec<u8>>, filename: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            filename: filename.into(),
        }
    }

    /// Read a request from disk; the filename is the path's final component.
    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self { bytes, filename })
    }
}

/// Derive the image filename: drop a trailing `.pdf` (any case), add `.png`.
pub fn output_file_name(filename: &str) -> String {
    let stem = filename
        .len()
        .checked_sub(4)
        .and_then(|cut| {
            let (stem, ext) = (filename.get(..cut)?, filename.get(cut..)?);
            ext.eq_ignore_ascii_case(".pdf").then_some(stem)
        })
        .unwrap_or(filename);
    format!("{stem}.png")
}

/// A durable, named PNG file held in memory.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageFile {
    name: String,
    mime_type: String,
    bytes: Arc<[u8]>,
}

impl ImageFile {
    pub fn png(name: impl Into<String>, bytes: Arc<[u8]>) -> Self {
        Self {
            name: name.into(),
            mime_type: PNG_MIME.to_string(),
            bytes,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn bytes(&self) -> &Arc<[u8]> {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Inline `data:` URL form, for embedding in HTML or JSON.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.bytes))
    }

    /// Write the file into `dir` under its own name.
    ///
    /// Uses atomic write (temp file + rename) so readers never observe a
    /// partial PNG.
    pub async fn save_in(&self, dir: impl AsRef<Path>) -> Result<PathBuf, ConvertError> {
        let dir = dir.as_ref();
        let path = dir.join(&self.name);
        let write_err = |source| ConvertError::WriteFailed {
            path: path.clone(),
            source,
        };

        tokio::fs::create_dir_all(dir).await.map_err(write_err)?;
        let tmp_path = path.with_extension("png.tmp");
        tokio::fs::write(&tmp_path, &self.bytes[..])
            .await
            .map_err(write_err)?;
        tokio::fs::rename(&tmp_path, &path).await.map_err(write_err)?;
        Ok(path)
    }
}

impl fmt::Debug for ImageFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageFile")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// A successful conversion.
#[derive(Debug, Clone)]
pub struct ConvertedImage {
    /// Session-scoped reference to the PNG bytes.
    pub image_url: DisplayUrl,
    pub file: ImageFile,
    /// Surface size in pixels.
    pub width: u32,
    pub height: u32,
}

/// A failed conversion: the user-facing message and its classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct ConversionFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl From<&ConvertError> for ConversionFailure {
    fn from(e: &ConvertError) -> Self {
        Self {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

/// Outcome of [`crate::Converter::convert`]: exactly one of an image or an
/// error.
#[derive(Debug, Clone)]
pub enum ConversionResult {
    Converted(ConvertedImage),
    Failed(ConversionFailure),
}

impl ConversionResult {
    pub fn is_converted(&self) -> bool {
        matches!(self, ConversionResult::Converted(_))
    }

    pub fn image(&self) -> Option<&ConvertedImage> {
        match self {
            ConversionResult::Converted(img) => Some(img),
            ConversionResult::Failed(_) => None,
        }
    }

    pub fn image_url(&self) -> Option<&DisplayUrl> {
        self.image().map(|img| &img.image_url)
    }

    pub fn file(&self) -> Option<&ImageFile> {
        self.image().map(|img| &img.file)
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ConversionResult::Converted(_) => None,
            ConversionResult::Failed(f) => Some(&f.message),
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            ConversionResult::Converted(_) => None,
            ConversionResult::Failed(f) => Some(f.kind),
        }
    }

    pub fn into_result(self) -> Result<ConvertedImage, ConversionFailure> {
        match self {
            ConversionResult::Converted(img) => Ok(img),
            ConversionResult::Failed(f) => Err(f),
        }
    }
}
