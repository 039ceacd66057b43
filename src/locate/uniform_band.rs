//! Equal-height bands, each trimmed to its content.

use image::{DynamicImage, GrayImage};

use super::{RasterLocator, RegionLocator, crop_from_raster, uniform_bands};
use crate::{
    document::LabelDocument,
    geometry::Region,
    prelude::*,
    trim::{TrimOptions, trim_or_keep},
};

/// Divide the page into one band per expected label. Bands overlap their
/// neighbours by `overlap` pixels so a label that drifts a few rows is not
/// cut in half.
#[derive(Clone, Debug)]
pub struct UniformBandTrim {
    dpi: u32,
    overlap: u32,
    trim: TrimOptions,
}

impl UniformBandTrim {
    pub fn new(dpi: u32, overlap: u32, trim: TrimOptions) -> Self {
        Self { dpi, overlap, trim }
    }
}

impl RasterLocator for UniformBandTrim {
    fn dpi(&self) -> u32 {
        self.dpi
    }

    fn locate(&self, page: &GrayImage, expected: usize) -> Vec<Region> {
        uniform_bands(page.width(), page.height(), expected, self.overlap)
            .iter()
            .map(|band| trim_or_keep(page, band, &self.trim))
            .collect()
    }
}

impl RegionLocator for UniformBandTrim {
    fn name(&self) -> &'static str {
        "uniform-band"
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locate::test_support::{assert_top_to_bottom, page_with_labels};

    fn locator() -> UniformBandTrim {
        UniformBandTrim::new(
            300,
            10,
            TrimOptions {
                threshold: 250,
                padding: 5,
            },
        )
    }

    #[test]
    fn trims_each_band_to_its_label() {
        let page = page_with_labels(400, 900, &[(50, 200), (350, 500), (650, 800)]);
        let regions = locator().locate(&page, 3);
        assert_eq!(
            regions,
            vec![
                Region::new(25, 45, 375, 205).unwrap(),
                Region::new(25, 345, 375, 505).unwrap(),
                Region::new(25, 645, 375, 805).unwrap(),
            ]
        );
    }

    #[test]
    fn keeps_blank_bands_whole() {
        let page = page_with_labels(400, 900, &[(50, 200)]);
        let regions = locator().locate(&page, 3);
        assert_eq!(regions.len(), 3);
        assert_eq!(regions[1], Region::new(0, 290, 400, 610).unwrap());
        assert_eq!(regions[2], Region::new(0, 590, 400, 900).unwrap());
        assert_top_to_bottom(&regions);
    }

    #[test]
    fn returns_one_region_per_expected_label() {
        let page = page_with_labels(400, 1200, &[(10, 100)]);
        for expected in 0..8 {
            assert_eq!(locator().locate(&page, expected).len(), expected);
        }
    }
}
