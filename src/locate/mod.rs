//! Finding the labels on a page.
//!
//! Every strategy returns label images in top-to-bottom order, so the i-th
//! image can be paired with the i-th identifier in the page text. Raster
//! strategies work on a full-page render; [`VectorClip`] renders each label
//! rectangle on its own.

use clap::ValueEnum;
use image::{DynamicImage, GrayImage};
use schemars::JsonSchema;

use crate::{document::LabelDocument, geometry::Region, prelude::*};

pub mod divider;
pub mod fixed_grid;
pub mod uniform_band;
pub mod vector_clip;

pub use self::{
    divider::{DividerDetect, DividerOptions},
    fixed_grid::{FixedGrid, GridLayout},
    uniform_band::UniformBandTrim,
    vector_clip::VectorClip,
};

/// Which [`RegionLocator`] a run uses.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize, ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum LocatorKind {
    /// Fixed rows at known offsets.
    #[default]
    FixedGrid,
    /// Equal-height bands, trimmed to their content.
    UniformBand,
    /// Bands split at near-blank rows, trimmed to their content.
    Divider,
    /// Fixed rows computed in PDF points and rendered one by one.
    VectorClip,
}

/// A strategy for cutting the labels out of one page.
pub trait RegionLocator: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Crop at most `expected` labels from page `page_idx`, top to bottom.
    fn crop_labels(
        &self,
        document: &dyn LabelDocument,
        page_idx: usize,
        expected: usize,
    ) -> Result<Vec<DynamicImage>>;
}

/// A strategy that only needs the rendered page.
pub trait RasterLocator {
    /// Render resolution.
    fn dpi(&self) -> u32;

    /// At most `expected` regions, top to bottom, inside `page`.
    fn locate(&self, page: &GrayImage, expected: usize) -> Vec<Region>;
}

/// Render a page once, then crop every region a [`RasterLocator`] finds.
fn crop_from_raster(
    locator: &impl RasterLocator,
    document: &dyn LabelDocument,
    page_idx: usize,
    expected: usize,
) -> Result<Vec<DynamicImage>> {
    let page = document.render_page(page_idx, locator.dpi())?;
    let gray = page.to_luma8();
    let regions = locator.locate(&gray, expected);
    debug!(
        page = page_idx + 1,
        width = page.width(),
        height = page.height(),
        regions = regions.len(),
        "located regions"
    );
    regions.iter().map(|region| region.crop(&page)).collect()
}

/// Split `height` rows into `count` equal bands, each widened by `overlap`
/// rows on both sides and clipped to the page.
pub fn uniform_bands(width: u32, height: u32, count: usize, overlap: u32) -> Vec<Region> {
    let count = count as u64;
    (0..count)
        .filter_map(|i| {
            let top = (i * u64::from(height) / count) as u32;
            let bottom = ((i + 1) * u64::from(height) / count) as u32;
            Region::new(
                0,
                top.saturating_sub(overlap),
                width,
                bottom.saturating_add(overlap).min(height),
            )
        })
        .collect()
}
