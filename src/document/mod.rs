//! Access to the pages of a label PDF.
//!
//! The pipeline only talks to [`LabelDocument`]. The production backend is
//! [`poppler::PopplerDocument`], which shells out to `poppler-utils`; tests use
//! an in-memory document.

use image::DynamicImage;

use crate::{geometry::PointRect, prelude::*};

pub mod poppler;

/// Size of a page in PDF points.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

/// An open document. The handle owns any scratch resources and is consumed
/// by [`LabelDocument::close`].
///
/// Page indices are 0-based.
pub trait LabelDocument {
    /// Number of pages. Always at least 1 for an opened document.
    fn page_count(&self) -> usize;

    /// Page size in points.
    fn page_size(&self, page_idx: usize) -> Result<PageSize>;

    /// Plain text of a page, in content order.
    fn page_text(&self, page_idx: usize) -> Result<String>;

    /// Rasterize a whole page at `dpi`.
    fn render_page(&self, page_idx: usize, dpi: u32) -> Result<DynamicImage>;

    /// Rasterize only `clip` (in points, top-left origin) at `dpi`.
    fn render_clip(&self, page_idx: usize, dpi: u32, clip: &PointRect) -> Result<DynamicImage>;

    /// Release the document.
    fn close(self) -> Result<()>
    where
        Self: Sized;
}
