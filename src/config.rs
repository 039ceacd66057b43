//! Run configuration: built-in profiles, profile files and command-line
//! overrides, resolved into one [`RunConfig`].

use clap::{Args, ValueEnum};
use schemars::JsonSchema;

use crate::{
    compose::{Canvas, FitPolicy},
    error::LabelError,
    locate::{
        DividerDetect, DividerOptions, FixedGrid, GridLayout, LocatorKind, RegionLocator,
        UniformBandTrim, VectorClip,
    },
    prelude::*,
    trim::TrimOptions,
};

/// Environment variable that overrides the output base directory.
pub const BASE_DIR_ENV: &str = "LABEL_SPLITTER_BASE_DIR";

/// Built-in configurations, one per label layout we have met in practice.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize, ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum LabelProfile {
    /// Fixed grid at 200 DPI. Small labels are never enlarged.
    #[default]
    Grid,
    /// Uniform bands trimmed to content at 300 DPI.
    Bands,
    /// Divider detection at 300 DPI, tuned for low-contrast scans.
    Dividers,
    /// Label rectangles clipped in PDF space at 300 DPI.
    Vector,
}

/// What to do when one page cannot be processed.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize, ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum PageErrorPolicy {
    /// Fail the whole run.
    #[default]
    Abort,
    /// Report the page and keep going.
    Skip,
}

/// Physical canvas size.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CanvasSpec {
    pub width_in: f64,
    pub height_in: f64,
    pub margin_in: f64,
}

impl Default for CanvasSpec {
    fn default() -> Self {
        Self {
            width_in: 6.0,
            height_in: 4.0,
            margin_in: 0.1,
        }
    }
}

impl CanvasSpec {
    /// The canvas in pixels at `dpi`.
    pub fn to_pixels(&self, dpi: u32) -> Canvas {
        let px = |inches: f64| (inches * f64::from(dpi)).round() as u32;
        Canvas {
            width: px(self.width_in),
            height: px(self.height_in),
            margin: px(self.margin_in),
        }
    }
}

/// Largest canvas side, in pixels, that a run will allocate.
pub const MAX_CANVAS_SIDE: u32 = 20_000;

/// Everything one run needs. Passed by value into the run; there is no
/// process-wide state.
#[derive(Clone, Debug, PartialEq)]
pub struct RunConfig {
    pub dpi: u32,
    pub locator: LocatorKind,
    pub canvas: CanvasSpec,
    pub fit: FitPolicy,
    pub trim: TrimOptions,
    /// Overlap between uniform bands, in pixels.
    pub band_overlap: u32,
    pub divider: DividerOptions,
    pub jpeg_quality: u8,
    pub on_page_error: PageErrorPolicy,
    /// Labels are written below `<base_dir>/etiquetas`.
    pub base_dir: PathBuf,
}

impl RunConfig {
    /// The settings of a built-in profile.
    pub fn from_profile(profile: LabelProfile, base_dir: impl Into<PathBuf>) -> Self {
        let base = Self {
            dpi: 300,
            locator: LocatorKind::FixedGrid,
            canvas: CanvasSpec::default(),
            fit: FitPolicy::Fill,
            trim: TrimOptions::default(),
            band_overlap: 10,
            divider: DividerOptions::default(),
            jpeg_quality: 95,
            on_page_error: PageErrorPolicy::Abort,
            base_dir: base_dir.into(),
        };
        match profile {
            LabelProfile::Grid => Self {
                dpi: 200,
                fit: FitPolicy::Fit,
                ..base
            },
            LabelProfile::Bands => Self {
                locator: LocatorKind::UniformBand,
                trim: TrimOptions {
                    threshold: 250,
                    padding: 8,
                },
                ..base
            },
            LabelProfile::Dividers => Self {
                locator: LocatorKind::Divider,
                trim: TrimOptions {
                    threshold: 245,
                    padding: 5,
                },
                ..base
            },
            LabelProfile::Vector => Self {
                locator: LocatorKind::VectorClip,
                trim: TrimOptions {
                    threshold: 250,
                    padding: 5,
                },
                ..base
            },
        }
    }

    /// Reject settings that cannot produce images.
    pub fn validate(&self) -> Result<(), LabelError> {
        if !(1..=1200).contains(&self.dpi) {
            return Err(LabelError::invalid_config(format!(
                "DPI must be between 1 and 1200, got {}",
                self.dpi
            )));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(LabelError::invalid_config(format!(
                "JPEG quality must be between 1 and 100, got {}",
                self.jpeg_quality
            )));
        }
        let CanvasSpec {
            width_in,
            height_in,
            margin_in,
        } = self.canvas;
        if [width_in, height_in, margin_in]
            .iter()
            .any(|v| !v.is_finite() || *v < 0.0)
        {
            return Err(LabelError::invalid_config(
                "canvas dimensions must be finite and non-negative",
            ));
        }
        let canvas = self.canvas_pixels();
        if canvas.width > MAX_CANVAS_SIDE || canvas.height > MAX_CANVAS_SIDE {
            return Err(LabelError::invalid_config(format!(
                "a {}x{} px canvas is larger than {} px on a side",
                canvas.width, canvas.height, MAX_CANVAS_SIDE
            )));
        }
        let margins = canvas.margin.saturating_mul(2);
        if canvas.width <= margins || canvas.height <= margins {
            return Err(LabelError::invalid_config(format!(
                "a {}x{} px canvas with a {} px margin has no room for a label",
                canvas.width, canvas.height, canvas.margin
            )));
        }
        if !(0.0..=1.0).contains(&self.divider.min_bright_fraction) {
            return Err(LabelError::invalid_config(
                "divider brightness fraction must be between 0 and 1",
            ));
        }
        Ok(())
    }

    /// The canvas in pixels at the run DPI.
    pub fn canvas_pixels(&self) -> Canvas {
        self.canvas.to_pixels(self.dpi)
    }

    /// The configured locator strategy.
    pub fn build_locator(&self) -> Box<dyn RegionLocator> {
        match self.locator {
            LocatorKind::FixedGrid => Box::new(FixedGrid::new(self.dpi, GridLayout::default())),
            LocatorKind::UniformBand => {
                Box::new(UniformBandTrim::new(self.dpi, self.band_overlap, self.trim))
            }
            LocatorKind::Divider => Box::new(DividerDetect::new(
                self.dpi,
                self.divider,
                self.band_overlap,
                self.trim,
            )),
            LocatorKind::VectorClip => Box::new(VectorClip::new(
                self.dpi,
                GridLayout::default(),
                self.trim,
            )),
        }
    }
}

/// Partial settings layered over a profile. Every field is optional; unset
/// fields keep the profile's value.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(deny_unknown_fields, rename_all = "snake_case")]
pub struct ProfileFile {
    /// Built-in profile to start from.
    pub profile: Option<LabelProfile>,
    /// Render resolution.
    pub dpi: Option<u32>,
    /// Region locator strategy.
    pub locator: Option<LocatorKind>,
    /// Canvas width in inches.
    pub canvas_width_in: Option<f64>,
    /// Canvas height in inches.
    pub canvas_height_in: Option<f64>,
    /// Canvas margin in inches.
    pub canvas_margin_in: Option<f64>,
    /// How labels are scaled onto the canvas.
    pub fit: Option<FitPolicy>,
    /// Pixels darker than this are label content.
    pub trim_threshold: Option<u8>,
    /// Padding around trimmed content, in pixels.
    pub trim_padding: Option<u32>,
    /// Overlap between uniform bands, in pixels.
    pub band_overlap: Option<u32>,
    /// Pixels brighter than this count as blank when looking for dividers.
    pub divider_light_threshold: Option<u8>,
    /// Share of blank pixels that makes a row a divider candidate.
    pub divider_min_bright_fraction: Option<f64>,
    /// Shortest blank run that counts as a gap, in pixels.
    pub divider_min_gap_height: Option<u32>,
    /// Minimum distance between accepted dividers, in pixels.
    pub divider_min_distance: Option<u32>,
    /// JPEG quality, 1 to 100.
    pub jpeg_quality: Option<u8>,
    /// What to do when a page cannot be processed.
    pub on_page_error: Option<PageErrorPolicy>,
}

impl ProfileFile {
    /// Read a profile from a `.json` or `.toml` file.
    pub fn read(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read profile file {:?}", path))?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            serde_json::from_str(&data)
                .with_context(|| format!("Failed to parse JSON from profile file {:?}", path))
        } else {
            toml::from_str(&data)
                .with_context(|| format!("Failed to parse TOML from profile file {:?}", path))
        }
    }

    /// Overwrite every field of `config` that is set here.
    pub fn apply(&self, config: &mut RunConfig) {
        fn set<T: Copy>(slot: &mut T, value: Option<T>) {
            if let Some(value) = value {
                *slot = value;
            }
        }
        set(&mut config.dpi, self.dpi);
        set(&mut config.locator, self.locator);
        set(&mut config.canvas.width_in, self.canvas_width_in);
        set(&mut config.canvas.height_in, self.canvas_height_in);
        set(&mut config.canvas.margin_in, self.canvas_margin_in);
        set(&mut config.fit, self.fit);
        set(&mut config.trim.threshold, self.trim_threshold);
        set(&mut config.trim.padding, self.trim_padding);
        set(&mut config.band_overlap, self.band_overlap);
        set(&mut config.divider.light_threshold, self.divider_light_threshold);
        set(
            &mut config.divider.min_bright_fraction,
            self.divider_min_bright_fraction,
        );
        set(&mut config.divider.min_gap_height, self.divider_min_gap_height);
        set(&mut config.divider.min_distance, self.divider_min_distance);
        set(&mut config.jpeg_quality, self.jpeg_quality);
        set(&mut config.on_page_error, self.on_page_error);
    }
}

/// Command-line configuration options.
#[derive(Args, Clone, Debug, Default)]
pub struct ConfigOpts {
    /// Built-in profile to start from.
    #[clap(long, value_enum)]
    pub profile: Option<LabelProfile>,

    /// A `.toml` or `.json` file with settings layered over the profile.
    #[clap(long, value_name = "PATH")]
    pub profile_file: Option<PathBuf>,

    /// Directory that receives the `etiquetas` folder. Defaults to the
    /// directory containing this executable.
    #[clap(long, env = BASE_DIR_ENV, value_name = "DIR")]
    pub base_dir: Option<PathBuf>,

    /// Render resolution.
    #[clap(long)]
    pub dpi: Option<u32>,

    /// Region locator strategy.
    #[clap(long, value_enum)]
    pub locator: Option<LocatorKind>,

    /// Canvas width in inches.
    #[clap(long, value_name = "INCHES")]
    pub canvas_width: Option<f64>,

    /// Canvas height in inches.
    #[clap(long, value_name = "INCHES")]
    pub canvas_height: Option<f64>,

    /// Canvas margin in inches.
    #[clap(long, value_name = "INCHES")]
    pub canvas_margin: Option<f64>,

    /// How labels are scaled onto the canvas.
    #[clap(long, value_enum)]
    pub fit: Option<FitPolicy>,

    /// Pixels darker than this are label content.
    #[clap(long)]
    pub trim_threshold: Option<u8>,

    /// Padding around trimmed content, in pixels.
    #[clap(long)]
    pub trim_padding: Option<u32>,

    /// JPEG quality, 1 to 100.
    #[clap(long)]
    pub jpeg_quality: Option<u8>,

    /// What to do when a page cannot be processed.
    #[clap(long, value_enum)]
    pub on_page_error: Option<PageErrorPolicy>,
}

impl ConfigOpts {
    fn overrides(&self) -> ProfileFile {
        ProfileFile {
            profile: self.profile,
            dpi: self.dpi,
            locator: self.locator,
            canvas_width_in: self.canvas_width,
            canvas_height_in: self.canvas_height,
            canvas_margin_in: self.canvas_margin,
            fit: self.fit,
            trim_threshold: self.trim_threshold,
            trim_padding: self.trim_padding,
            jpeg_quality: self.jpeg_quality,
            on_page_error: self.on_page_error,
            ..ProfileFile::default()
        }
    }

    /// Resolve profile, profile file and flags, in that order of
    /// precedence from lowest to highest.
    #[instrument(level = "debug", skip_all)]
    pub fn resolve(&self) -> Result<RunConfig> {
        let file = self
            .profile_file
            .as_deref()
            .map(ProfileFile::read)
            .transpose()?
            .unwrap_or_default();
        let flags = self.overrides();

        let profile = flags.profile.or(file.profile).unwrap_or_default();
        let base_dir = match &self.base_dir {
            Some(dir) => dir.clone(),
            None => default_base_dir()?,
        };
        let mut config = RunConfig::from_profile(profile, base_dir);
        file.apply(&mut config);
        flags.apply(&mut config);
        config.validate()?;
        debug!(?profile, ?config, "resolved run configuration");
        Ok(config)
    }
}

/// The directory containing the running executable.
pub fn default_base_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("could not locate the running executable")?;
    exe.parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| anyhow!("executable {:?} has no parent directory", exe))
}
