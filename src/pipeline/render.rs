//! Page rasterisation: bytes → [`Surface`] holding page 1 at 2×.
//!
//! Engines such as PDFium are CPU-bound and not async-aware, so
//! [`render_first_page`] moves the work onto the blocking pool with
//! `spawn_blocking`, as the encode step does.

use crate::config::RENDER_SCALE;
use crate::engine::RenderEngine;
use crate::error::ConvertError;
use crate::pipeline::surface::{SmoothingQuality, Surface};
use std::sync::Arc;
use tracing::{debug, info};

/// The only page ever rendered.
pub const FIRST_PAGE: usize = 1;

/// Render page 1 of `bytes` on the blocking pool.
pub async fn render_first_page(
    engine: Arc<dyn RenderEngine>,
    bytes: Arc<[u8]>,
    max_surface_pixels: u64,
) -> Result<Surface, ConvertError> {
    tokio::task::spawn_blocking(move || {
        render_first_page_blocking(engine.as_ref(), &bytes, max_surface_pixels)
    })
    .await
    .map_err(|e| ConvertError::Internal(format!("Render task panicked: {e}")))?
}

/// Blocking implementation: parse → page 1 → viewport → surface → render.
pub fn render_first_page_blocking(
    engine: &dyn RenderEngine,
    bytes: &[u8],
    max_surface_pixels: u64,
) -> Result<Surface, ConvertError> {
    let document = engine.open_document(bytes)?;
    info!("PDF loaded: {} pages", document.page_count());

    let page = document.page(FIRST_PAGE)?;
    let viewport = page.viewport(RENDER_SCALE);
    let (width, height) = viewport.surface_size();
    debug!(
        page_width = viewport.width,
        page_height = viewport.height,
        width,
        height,
        "Computed viewport"
    );

    let mut surface = Surface::allocate(width, height, max_surface_pixels)
        .ok_or(ConvertError::ContextUnavailable { width, height })?;
    surface.set_smoothing(true);
    surface.set_smoothing_quality(SmoothingQuality::High);

    page.render(&mut surface, &viewport)?;
    debug!("Rendered page {} → {}x{} px", FIRST_PAGE, width, height);
    Ok(surface)
}
