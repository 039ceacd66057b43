//! Finding the ink inside a region.
//!
//! Pages are scanned one row slice at a time: a row is content if any of its
//! pixels is darker than the threshold, and columns are OR-ed together only
//! for content rows.

use image::GrayImage;

use crate::{geometry::Region, prelude::*};

/// Brightness threshold and padding used when trimming.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrimOptions {
    /// Pixels strictly darker than this are content.
    pub threshold: u8,
    /// Extra pixels kept around the content, clipped to the region.
    pub padding: u32,
}

impl Default for TrimOptions {
    fn default() -> Self {
        Self {
            threshold: 250,
            padding: 8,
        }
    }
}

/// The tight box around all pixels darker than `threshold` within `region`,
/// ignoring padding. `None` when the region is pure background.
pub fn content_bounds(image: &GrayImage, region: &Region, threshold: u8) -> Option<Region> {
    let region = region.clip(image.width(), image.height())?;
    let stride = image.width() as usize;
    let raw = image.as_raw();
    let left = region.left as usize;
    let right = region.right as usize;

    let mut columns = vec![false; right - left];
    let mut top = None;
    let mut bottom = 0;
    for y in region.top..region.bottom {
        let start = y as usize * stride;
        let row = &raw[start + left..start + right];
        if !row.iter().any(|&value| value < threshold) {
            continue;
        }
        top.get_or_insert(y);
        bottom = y + 1;
        for (column, &value) in columns.iter_mut().zip(row) {
            *column |= value < threshold;
        }
    }

    let top = top?;
    let first = columns.iter().position(|&c| c)?;
    let last = columns.iter().rposition(|&c| c)?;
    Region::new(
        region.left + first as u32,
        top,
        region.left + last as u32 + 1,
        bottom,
    )
}

/// Content bounds grown by the configured padding, clipped to `region`.
pub fn trim(image: &GrayImage, region: &Region, options: &TrimOptions) -> Option<Region> {
    let bounds = content_bounds(image, region, options.threshold)?;
    Some(bounds.expand_within(options.padding, region))
}

/// Trim, keeping the whole region when it holds no content.
pub fn trim_or_keep(image: &GrayImage, region: &Region, options: &TrimOptions) -> Region {
    trim(image, region, options).unwrap_or_else(|| {
        trace!(?region, "no content found, keeping full region");
        *region
    })
}

#[cfg(test)]
mod tests {
    use image::Luma;

    use super::*;

    fn page_with_box(width: u32, height: u32, ink: Region) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            if x >= ink.left && x < ink.right && y >= ink.top && y < ink.bottom {
                Luma([20])
            } else {
                Luma([255])
            }
        })
    }

    #[test]
    fn finds_tight_bounds() {
        let ink = Region::new(40, 30, 70, 90).unwrap();
        let image = page_with_box(200, 150, ink);
        let full = Region::full(200, 150).unwrap();
        assert_eq!(content_bounds(&image, &full, 250), Some(ink));
    }

    #[test]
    fn blank_region_has_no_bounds() {
        let image = GrayImage::from_pixel(64, 64, Luma([255]));
        let full = Region::full(64, 64).unwrap();
        assert_eq!(trim(&image, &full, &TrimOptions::default()), None);
        assert_eq!(trim_or_keep(&image, &full, &TrimOptions::default()), full);
    }

    #[test]
    fn threshold_is_strict() {
        let mut image = GrayImage::from_pixel(10, 10, Luma([255]));
        image.put_pixel(3, 3, Luma([250]));
        let full = Region::full(10, 10).unwrap();
        assert_eq!(content_bounds(&image, &full, 250), None);
        image.put_pixel(3, 3, Luma([249]));
        assert_eq!(content_bounds(&image, &full, 250), Region::new(3, 3, 4, 4));
    }

    #[test]
    fn only_looks_inside_the_region() {
        let ink = Region::new(10, 10, 20, 20).unwrap();
        let mut image = page_with_box(100, 100, ink);
        image.put_pixel(80, 80, Luma([0]));
        let band = Region::new(0, 0, 50, 50).unwrap();
        assert_eq!(content_bounds(&image, &band, 250), Some(ink));
    }

    #[test]
    fn padding_is_clipped_to_the_region() {
        let ink = Region::new(2, 50, 60, 70).unwrap();
        let image = page_with_box(100, 100, ink);
        let band = Region::new(0, 40, 100, 100).unwrap();
        let options = TrimOptions {
            threshold: 250,
            padding: 8,
        };
        assert_eq!(trim(&image, &band, &options), Region::new(0, 42, 68, 78));
    }

    #[test]
    fn trimming_is_idempotent() {
        let ink = Region::new(25, 35, 75, 60).unwrap();
        let image = page_with_box(120, 120, ink);
        let options = TrimOptions {
            threshold: 250,
            padding: 5,
        };
        let full = Region::full(120, 120).unwrap();
        let once = trim(&image, &full, &options).unwrap();
        let twice = trim(&image, &once, &options).unwrap();
        assert_eq!(once, twice);

        let tight = content_bounds(&image, &full, options.threshold).unwrap();
        assert_eq!(content_bounds(&image, &tight, options.threshold), Some(tight));
    }
}
