//! Placing a trimmed label on a fixed-size white canvas.

use clap::ValueEnum;
use image::{DynamicImage, Rgba, RgbaImage, RgbImage, imageops::FilterType};
use schemars::JsonSchema;

use crate::prelude::*;

/// How content is scaled into the canvas.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize, ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum FitPolicy {
    /// Shrink to fit, but never enlarge.
    #[default]
    Fit,
    /// Scale up or down until one axis reaches the margin.
    Fill,
}

/// Canvas size and margin, in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
    pub margin: u32,
}

impl Canvas {
    /// The area inside the margin.
    fn available(&self) -> (u32, u32) {
        (
            self.width.saturating_sub(self.margin.saturating_mul(2)),
            self.height.saturating_sub(self.margin.saturating_mul(2)),
        )
    }

    /// The scale that fits a `width` x `height` image under `policy`.
    pub fn scale_for(&self, width: u32, height: u32, policy: FitPolicy) -> f64 {
        let (avail_w, avail_h) = self.available();
        let scale_x = f64::from(avail_w) / f64::from(width);
        let scale_y = f64::from(avail_h) / f64::from(height);
        let scale = scale_x.min(scale_y);
        match policy {
            FitPolicy::Fit => scale.min(1.0),
            FitPolicy::Fill => scale,
        }
    }
}

/// Scale `content` onto a white `canvas`, centered. Transparent pixels are
/// blended onto the white background.
pub fn compose(content: &DynamicImage, canvas: &Canvas, policy: FitPolicy) -> Result<RgbImage> {
    let (avail_w, avail_h) = canvas.available();
    if avail_w == 0 || avail_h == 0 {
        return Err(anyhow!(
            "margin {} leaves no room on a {}x{} canvas",
            canvas.margin,
            canvas.width,
            canvas.height
        ));
    }
    if content.width() == 0 || content.height() == 0 {
        return Err(anyhow!("cannot place an empty image on the canvas"));
    }

    let scale = canvas.scale_for(content.width(), content.height(), policy);
    let scaled_w = scaled_length(content.width(), scale, avail_w);
    let scaled_h = scaled_length(content.height(), scale, avail_h);
    trace!(scale, scaled_w, scaled_h, "composing label");

    let rgba = content.to_rgba8();
    let scaled = if (scaled_w, scaled_h) == rgba.dimensions() {
        rgba
    } else {
        image::imageops::resize(&rgba, scaled_w, scaled_h, FilterType::Lanczos3)
    };

    let mut background = RgbaImage::from_pixel(canvas.width, canvas.height, Rgba([255; 4]));
    let x = (canvas.width - scaled_w) / 2;
    let y = (canvas.height - scaled_h) / 2;
    image::imageops::overlay(&mut background, &scaled, i64::from(x), i64::from(y));
    Ok(DynamicImage::ImageRgba8(background).to_rgb8())
}

/// Round a scaled side, keeping at least one pixel and never spilling past
/// the available area.
fn scaled_length(length: u32, scale: f64, available: u32) -> u32 {
    ((f64::from(length) * scale).round() as u32).clamp(1, available)
}
