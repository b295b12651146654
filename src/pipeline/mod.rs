//! Pipeline stages for PDF-to-image conversion.
//!
//! ```text
//! bytes ──▶ render ──▶ encode ──▶ ImageFile + DisplayUrl
//!          (page 1, 2×) (PNG)
//! ```
//!
//! 1. [`surface`]: the RGBA drawing surface and its smoothing hints
//! 2. [`render`]: parse the document and draw page 1 into a surface; runs
//!    in `spawn_blocking`
//! 3. [`encode`]: serialise the surface as PNG

pub mod encode;
pub mod render;
pub mod surface;
