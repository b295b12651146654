//! Session-scoped displayable references to encoded images.
//!
//! A [`DisplayUrl`] is an opaque `blob:` style handle into a
//! [`DisplayRegistry`]. UI layers resolve it to bytes without writing a file.
//! References are never released automatically; call
//! [`DisplayRegistry::revoke`] once an image is no longer shown, or the
//! registry grows for the life of the session.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

const SCHEME_PREFIX: &str = "blob:pdf2img/";

/// Handle to bytes held by a [`DisplayRegistry`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DisplayUrl(String);

impl DisplayUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DisplayUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A registered image: its bytes and MIME type.
#[derive(Debug, Clone)]
pub struct DisplayEntry {
    pub bytes: Arc<[u8]>,
    pub mime_type: String,
}

/// In-memory table of live display references.
#[derive(Debug, Default)]
pub struct DisplayRegistry {
    entries: Mutex<HashMap<DisplayUrl, DisplayEntry>>,
}

impl DisplayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `bytes` and return a fresh reference to them.
    pub fn create(&self, bytes: Arc<[u8]>, mime_type: &str) -> DisplayUrl {
        let url = DisplayUrl(format!("{SCHEME_PREFIX}{}", Uuid::new_v4()));
        debug!(%url, bytes = bytes.len(), "Display reference created");
        self.entries.lock().insert(
            url.clone(),
            DisplayEntry {
                bytes,
                mime_type: mime_type.to_string(),
            },
        );
        url
    }

    pub fn resolve(&self, url: &DisplayUrl) -> Option<DisplayEntry> {
        self.entries.lock().get(url).cloned()
    }

    /// Release a reference. Returns `false` if it was unknown or already
    /// revoked.
    pub fn revoke(&self, url: &DisplayUrl) -> bool {
        let removed = self.entries.lock().remove(url).is_some();
        if removed {
            debug!(%url, "Display reference revoked");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
