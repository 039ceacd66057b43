//! Rectangles in pixel space and in PDF point space.

use image::DynamicImage;

use crate::prelude::*;

/// PDF user space is defined at 72 points per inch.
pub const POINTS_PER_INCH: f64 = 72.0;

/// A rectangle in pixel coordinates. `right` and `bottom` are exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Region {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl Region {
    /// Build a region, returning `None` unless `right > left` and
    /// `bottom > top`.
    pub fn new(left: u32, top: u32, right: u32, bottom: u32) -> Option<Self> {
        if right > left && bottom > top {
            Some(Self {
                left,
                top,
                right,
                bottom,
            })
        } else {
            None
        }
    }

    /// The region covering an entire `width` x `height` image.
    pub fn full(width: u32, height: u32) -> Option<Self> {
        Self::new(0, 0, width, height)
    }

    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }

    /// Clip to a `width` x `height` image. `None` if nothing is left.
    pub fn clip(&self, width: u32, height: u32) -> Option<Self> {
        Self::new(
            self.left.min(width),
            self.top.min(height),
            self.right.min(width),
            self.bottom.min(height),
        )
    }

    /// Grow by `padding` on every side, then clip to `bounds`.
    pub fn expand_within(&self, padding: u32, bounds: &Region) -> Region {
        Region {
            left: self.left.saturating_sub(padding).max(bounds.left),
            top: self.top.saturating_sub(padding).max(bounds.top),
            right: self.right.saturating_add(padding).min(bounds.right),
            bottom: self.bottom.saturating_add(padding).min(bounds.bottom),
        }
    }

    /// Copy this region out of `image`.
    pub fn crop(&self, image: &DynamicImage) -> Result<DynamicImage> {
        let clipped = self.clip(image.width(), image.height()).ok_or_else(|| {
            anyhow!(
                "region {:?} lies outside a {}x{} image",
                self,
                image.width(),
                image.height()
            )
        })?;
        Ok(image.crop_imm(
            clipped.left,
            clipped.top,
            clipped.width(),
            clipped.height(),
        ))
    }
}

/// A rectangle in PDF points, measured from the top-left corner of the page
/// (the orientation `pdftocairo` uses for cropping).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PointRect {
    /// Intersect with a page of `page_width` x `page_height` points.
    pub fn clip_to_page(&self, page_width: f64, page_height: f64) -> Option<Self> {
        let x0 = self.x.max(0.0);
        let y0 = self.y.max(0.0);
        let x1 = (self.x + self.width).min(page_width);
        let y1 = (self.y + self.height).min(page_height);
        if x1 > x0 && y1 > y0 {
            Some(Self {
                x: x0,
                y: y0,
                width: x1 - x0,
                height: y1 - y0,
            })
        } else {
            None
        }
    }

    /// Convert to a pixel region at `dpi`. The origin rounds down and the far
    /// edge rounds up, so the pixel region always covers the point rectangle.
    pub fn to_pixels(&self, dpi: u32) -> Option<Region> {
        let scale = f64::from(dpi) / POINTS_PER_INCH;
        let left = (self.x * scale).floor().max(0.0) as u32;
        let top = (self.y * scale).floor().max(0.0) as u32;
        let right = ((self.x + self.width) * scale).ceil().max(0.0) as u32;
        let bottom = ((self.y + self.height) * scale).ceil().max(0.0) as u32;
        Region::new(left, top, right, bottom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_rejects_empty_rectangles() {
        assert!(Region::new(10, 10, 10, 20).is_none());
        assert!(Region::new(10, 20, 30, 5).is_none());
        assert!(Region::new(0, 0, 1, 1).is_some());
    }

    #[test]
    fn clip_keeps_regions_inside_image() {
        let region = Region::new(50, 80, 500, 400).unwrap();
        assert_eq!(region.clip(300, 200), Region::new(50, 80, 300, 200));
        assert_eq!(region.clip(40, 200), None);
    }

    #[test]
    fn expand_within_is_bounded() {
        let bounds = Region::new(0, 0, 100, 100).unwrap();
        let inner = Region::new(3, 40, 98, 60).unwrap();
        assert_eq!(
            inner.expand_within(5, &bounds),
            Region::new(0, 35, 100, 65).unwrap()
        );
    }

    #[test]
    fn point_rect_clips_and_converts() {
        let rect = PointRect {
            x: -10.0,
            y: 700.0,
            width: 100.0,
            height: 200.0,
        };
        let clipped = rect.clip_to_page(612.0, 792.0).unwrap();
        assert_eq!(clipped.x, 0.0);
        assert_eq!(clipped.height, 92.0);

        let pixels = clipped.to_pixels(144).unwrap();
        assert_eq!(pixels, Region::new(0, 1400, 180, 1584).unwrap());
    }
}
