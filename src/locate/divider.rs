//! Bands split at near-blank rows.

use image::{DynamicImage, GrayImage};

use super::{RasterLocator, RegionLocator, crop_from_raster, uniform_bands};
use crate::{
    document::LabelDocument,
    geometry::Region,
    prelude::*,
    trim::{TrimOptions, trim, trim_or_keep},
};

/// Tuning for divider detection, in pixels at the render DPI.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DividerOptions {
    /// Pixels strictly brighter than this count as blank.
    pub light_threshold: u8,
    /// A row is a divider candidate when more than this share of it is blank.
    pub min_bright_fraction: f64,
    /// Shortest run of candidate rows that counts as a gap.
    pub min_gap_height: u32,
    /// A divider closer than this to the last accepted one is dropped.
    pub min_distance: u32,
}

impl Default for DividerOptions {
    fn default() -> Self {
        Self {
            light_threshold: 240,
            min_bright_fraction: 0.95,
            min_gap_height: 12,
            min_distance: 100,
        }
    }
}

impl DividerOptions {
    fn is_blank_row(&self, row: &[u8]) -> bool {
        let bright = row.iter().filter(|&&v| v > self.light_threshold).count();
        bright as f64 > self.min_bright_fraction * row.len() as f64
    }
}

/// Row positions of the gaps between labels, top to bottom.
///
/// Each run of blank rows becomes one divider at its midpoint. A divider
/// within `min_distance` of the previously accepted one is dropped, which
/// absorbs the extra runs anti-aliased rules and stray specks produce.
pub fn find_dividers(page: &GrayImage, options: &DividerOptions) -> Vec<u32> {
    let width = page.width() as usize;
    if width == 0 {
        return vec![];
    }

    let mut runs = vec![];
    let mut run_start = None;
    for (y, row) in page.as_raw().chunks_exact(width).enumerate() {
        let y = y as u32;
        match (options.is_blank_row(row), run_start) {
            (true, None) => run_start = Some(y),
            (false, Some(start)) => {
                runs.push((start, y));
                run_start = None;
            }
            _ => {}
        }
    }
    if let Some(start) = run_start {
        runs.push((start, page.height()));
    }

    let mut dividers: Vec<u32> = vec![];
    for (start, end) in runs {
        if end - start < options.min_gap_height {
            continue;
        }
        let midpoint = start + (end - start) / 2;
        match dividers.last() {
            Some(&last) if midpoint - last <= options.min_distance => {
                trace!(midpoint, last, "dropping divider too close to the previous one");
            }
            _ => dividers.push(midpoint),
        }
    }
    dividers
}

/// The bands between consecutive dividers. The page edges act as extra
/// dividers when the nearest detected one is far enough away.
pub fn divider_bands(width: u32, height: u32, dividers: &[u32], min_distance: u32) -> Vec<Region> {
    let mut edges = Vec::with_capacity(dividers.len() + 2);
    if dividers.first().is_none_or(|&first| first > min_distance) {
        edges.push(0);
    }
    edges.extend_from_slice(dividers);
    if dividers
        .last()
        .is_none_or(|&last| height.saturating_sub(last) > min_distance)
    {
        edges.push(height);
    }
    edges
        .windows(2)
        .filter_map(|pair| Region::new(0, pair[0], width, pair[1]))
        .collect()
}

/// Split at detected gaps, falling back to uniform bands when fewer labels
/// are found than the page text promises.
#[derive(Clone, Debug)]
pub struct DividerDetect {
    dpi: u32,
    options: DividerOptions,
    fallback_overlap: u32,
    trim: TrimOptions,
}

impl DividerDetect {
    pub fn new(dpi: u32, options: DividerOptions, fallback_overlap: u32, trim: TrimOptions) -> Self {
        Self {
            dpi,
            options,
            fallback_overlap,
            trim,
        }
    }
}

impl RasterLocator for DividerDetect {
    fn dpi(&self) -> u32 {
        self.dpi
    }

    fn locate(&self, page: &GrayImage, expected: usize) -> Vec<Region> {
        if expected == 0 {
            return vec![];
        }
        let dividers = find_dividers(page, &self.options);
        let labels: Vec<Region> =
            divider_bands(page.width(), page.height(), &dividers, self.options.min_distance)
                .iter()
                .filter_map(|band| trim(page, band, &self.trim))
                .collect();

        if labels.len() < expected {
            debug!(
                dividers = dividers.len(),
                found = labels.len(),
                expected,
                "too few labels between dividers, using uniform bands"
            );
            return uniform_bands(page.width(), page.height(), expected, self.fallback_overlap)
                .iter()
                .map(|band| trim_or_keep(page, band, &self.trim))
                .collect();
        }
        labels.into_iter().take(expected).collect()
    }
}

impl RegionLocator for DividerDetect {
    fn name(&self) -> &'static str {
        "divider"
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
