//! Labels at fixed, pre-measured row positions.

use image::{DynamicImage, GrayImage};

use super::{RasterLocator, RegionLocator, crop_from_raster};
use crate::{
    document::LabelDocument,
    geometry::{POINTS_PER_INCH, PointRect, Region},
    prelude::*,
};

/// Resolution the grid constants were measured at.
pub const GRID_REFERENCE_DPI: u32 = 200;

/// Row geometry of a one-column label sheet, in pixels at
/// [`GRID_REFERENCE_DPI`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridLayout {
    /// Top of the first row.
    pub first_row: f64,
    /// Distance between the tops of consecutive rows.
    pub row_spacing: f64,
    /// Height of one row.
    pub row_height: f64,
    /// Left and right margin.
    pub side_margin: f64,
    /// A row running off the page ends this far above the bottom edge.
    pub bottom_inset: f64,
    pub max_rows: usize,
}

impl Default for GridLayout {
    fn default() -> Self {
        Self {
            first_row: 12.0,
            row_spacing: 376.0,
            row_height: 355.0,
            side_margin: 29.0,
            bottom_inset: 5.0,
            max_rows: 6,
        }
    }
}

impl GridLayout {
    /// Pixel regions for the first `count` rows of a `width` x `height` page
    /// rendered at `dpi`.
    pub fn pixel_rows(&self, width: u32, height: u32, dpi: u32, count: usize) -> Vec<Region> {
        let scale = f64::from(dpi) / f64::from(GRID_REFERENCE_DPI);
        let margin = (self.side_margin * scale) as u32;
        let row_height = (self.row_height * scale) as u32;
        let inset = (self.bottom_inset * scale) as u32;
        (0..count.min(self.max_rows))
            .filter_map(|i| {
                let top = ((self.first_row + i as f64 * self.row_spacing) * scale) as u32;
                let mut bottom = top + row_height;
                if bottom > height {
                    bottom = height.saturating_sub(inset);
                }
                Region::new(margin, top, width.saturating_sub(margin), bottom)
            })
            .collect()
    }

    /// The first `count` rows in PDF points, clipped to the page.
    pub fn point_rows(&self, page_width: f64, page_height: f64, count: usize) -> Vec<PointRect> {
        let scale = POINTS_PER_INCH / f64::from(GRID_REFERENCE_DPI);
        let margin = self.side_margin * scale;
        (0..count.min(self.max_rows))
            .filter_map(|i| {
                PointRect {
                    x: margin,
                    y: (self.first_row + i as f64 * self.row_spacing) * scale,
                    width: page_width - 2.0 * margin,
                    height: self.row_height * scale,
                }
                .clip_to_page(page_width, page_height)
            })
            .collect()
    }
}

/// Crop fixed rows out of a full-page render. No detection at all.
#[derive(Clone, Debug)]
pub struct FixedGrid {
    dpi: u32,
    layout: GridLayout,
}

impl FixedGrid {
    pub fn new(dpi: u32, layout: GridLayout) -> Self {
        Self { dpi, layout }
    }
}

impl RasterLocator for FixedGrid {
    fn dpi(&self) -> u32 {
        self.dpi
    }

    fn locate(&self, page: &GrayImage, expected: usize) -> Vec<Region> {
        self.layout
            .pixel_rows(page.width(), page.height(), self.dpi, expected)
    }
}

impl RegionLocator for FixedGrid {
    fn name(&self) -> &'static str {
        "fixed-grid"
    }

    fn crop_labels(
        &self,
        document: &dyn LabelDocument,
        page_idx: usize,
        expected: usize,
    ) -> Result<Vec<DynamicImage>> {
        crop_from_raster(self, document, page_idx, expected)
    }
}
