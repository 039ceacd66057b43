//! Writing label images to disk.

use std::{
    fs::{self, File},
    io::{BufWriter, Write as _},
};

use image::{
    RgbImage,
    codecs::jpeg::{JpegEncoder, PixelDensity},
};

use crate::{error::LabelError, prelude::*};

/// Name of the folder below the base directory that holds all runs.
pub const OUTPUT_ROOT: &str = "etiquetas";

/// `<base_dir>/etiquetas/<folder>`.
pub fn output_dir(base_dir: &Path, folder: &str) -> PathBuf {
    base_dir.join(OUTPUT_ROOT).join(folder)
}

/// Create `dir` and any missing parents.
pub fn create_output_dir(dir: &Path) -> Result<(), LabelError> {
    fs::create_dir_all(dir).map_err(|err| LabelError::Write {
        path: dir.to_owned(),
        source: anyhow::Error::new(err).context("could not create output directory"),
    })
}

/// Save `image` as `<dir>/<name>.jpg`, replacing any file already there.
#[instrument(level = "trace", skip(image))]
pub fn write_label(
    image: &RgbImage,
    dir: &Path,
    name: &str,
    quality: u8,
    dpi: u32,
) -> Result<PathBuf, LabelError> {
    let path = dir.join(format!("{}.jpg", name));
    encode_jpeg(image, &path, quality, dpi).map_err(|source| LabelError::Write {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

fn encode_jpeg(image: &RgbImage, path: &Path, quality: u8, dpi: u32) -> Result<()> {
    let file = File::create(path).context("could not create file")?;
    let mut writer = BufWriter::new(file);
    let mut encoder = JpegEncoder::new_with_quality(&mut writer, quality);
    let density = u16::try_from(dpi).unwrap_or(u16::MAX);
    encoder.set_pixel_density(PixelDensity::dpi(density));
    encoder
        .encode_image(image)
        .context("could not encode JPEG")?;
    writer.flush().context("could not flush JPEG")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use image::Rgb;

    use super::*;

    #[test]
    fn writes_a_decodable_jpeg() {
        let base = tempfile::tempdir().unwrap();
        let dir = output_dir(base.path(), "2026-01-21");
        create_output_dir(&dir).unwrap();
        let image = RgbImage::from_pixel(120, 80, Rgb([200, 10, 10]));
        let path = write_label(&image, &dir, "S00123", 95, 300).unwrap();

        assert_eq!(path, base.path().join("etiquetas/2026-01-21/S00123.jpg"));
        let decoded = image::open(&path).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (120, 80));
    }

    #[test]
    fn overwrites_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("S1.jpg");
        fs::write(&path, b"stale").unwrap();
        let image = RgbImage::from_pixel(10, 10, Rgb([255, 255, 255]));
        write_label(&image, dir.path(), "S1", 95, 200).unwrap();
        assert_eq!(image::open(&path).unwrap().width(), 10);
    }

    #[test]
    fn reports_unwritable_directories() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("etiquetas");
        fs::write(&blocker, b"not a directory").unwrap();
        let err = create_output_dir(&output_dir(dir.path(), "sin_fecha")).unwrap_err();
        assert!(matches!(err, LabelError::Write { .. }));
    }
}
