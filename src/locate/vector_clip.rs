//! Fixed rows computed in PDF space and rendered one rectangle at a time.

use image::DynamicImage;

use super::{GridLayout, RegionLocator};
use crate::{
    document::LabelDocument,
    geometry::Region,
    prelude::*,
    trim::{TrimOptions, trim_or_keep},
};

/// Trusts the PDF's own geometry: each label rectangle is laid out in points,
/// clipped to the page box, and only that rectangle is rasterized.
#[derive(Clone, Debug)]
pub struct VectorClip {
    dpi: u32,
    layout: GridLayout,
    trim: TrimOptions,
}

impl VectorClip {
    pub fn new(dpi: u32, layout: GridLayout, trim: TrimOptions) -> Self {
        Self { dpi, layout, trim }
    }
}

impl RegionLocator for VectorClip {
    fn name(&self) -> &'static str {
        "vector-clip"
    }

    fn crop_labels(
        &self,
        document: &dyn LabelDocument,
        page_idx: usize,
        expected: usize,
    ) -> Result<Vec<DynamicImage>> {
        let size = document.page_size(page_idx)?;
        let rects = self.layout.point_rows(size.width, size.height, expected);
        debug!(page = page_idx + 1, rects = rects.len(), "clipping label rectangles");

        let mut labels = Vec::with_capacity(rects.len());
        for rect in &rects {
            let image = document.render_clip(page_idx, self.dpi, rect)?;
            let gray = image.to_luma8();
            let Some(full) = Region::full(gray.width(), gray.height()) else {
                warn!(page = page_idx + 1, ?rect, "clip rendered as an empty image");
                continue;
            };
            let region = trim_or_keep(&gray, &full, &self.trim);
            labels.push(region.crop(&image)?);
        }
        Ok(labels)
    }
}
