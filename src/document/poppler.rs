//! A [`LabelDocument`] backed by Poppler's `pdfinfo`, `pdftotext` and
//! `pdftocairo` CLI tools.

use std::{collections::BTreeMap, fs, process::Command, sync::LazyLock};

use image::DynamicImage;
use regex::Regex;

use super::{LabelDocument, PageSize};
use crate::{
    async_utils::check_for_command_failure, error::LabelError, geometry::PointRect,
    prelude::*,
};

/// A default error regex for checking command output.
static ERROR_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)error").expect("failed to compile regex"));

static DOWNGRADE_TO_WARNING_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)error: xref num").expect("failed to compile regex")
});

/// Per-page size lines printed by `pdfinfo -f 1 -l N`.
static PAGE_SIZE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Page\s+(\d+)\s+size:\s+([\d.]+)\s+x\s+([\d.]+)\s+pts")
        .expect("failed to compile regex")
});

static PAGE_ROT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Page\s+(\d+)\s+rot:\s+(\d+)").expect("failed to compile regex")
});

/// Does this line contain an error?
fn is_error_line(line: &str) -> bool {
    ERROR_REGEX.is_match(line) && !DOWNGRADE_TO_WARNING_REGEX.is_match(line)
}

/// An open PDF, plus a scratch directory for rendered pages.
#[derive(Debug)]
pub struct PopplerDocument {
    path: PathBuf,
    page_sizes: Vec<PageSize>,
    /// Released exactly once, by [`LabelDocument::close`] or by [`Drop`].
    scratch: Option<tempfile::TempDir>,
}

impl PopplerDocument {
    /// Open and validate a PDF.
    #[instrument(level = "debug", skip_all, fields(path = %path.display()))]
    pub fn open(path: &Path) -> Result<Self, LabelError> {
        if !path.is_file() {
            return Err(LabelError::InputNotFound {
                path: path.to_owned(),
            });
        }
        let mime_type = infer::get_from_path(path)
            .with_context(|| format!("failed to read {:?}", path.display()))
            .map_err(|err| LabelError::corrupt(path, err))?
            .map(|kind| kind.mime_type());
        if mime_type != Some("application/pdf") {
            return Err(LabelError::corrupt(
                path,
                anyhow!(
                    "expected a PDF, found {}",
                    mime_type.unwrap_or("an unknown file type")
                ),
            ));
        }

        let page_count =
            get_pdf_page_count(path).map_err(|err| LabelError::corrupt(path, err))?;
        if page_count == 0 {
            return Err(LabelError::EmptyDocument {
                path: path.to_owned(),
            });
        }
        let page_sizes = get_pdf_page_sizes(path, page_count)
            .map_err(|err| LabelError::corrupt(path, err))?;

        let scratch = tempfile::TempDir::with_prefix("label-pages")
            .context("failed to create scratch directory")
            .map_err(|err| LabelError::corrupt(path, err))?;
        debug!(page_count, scratch = %scratch.path().display(), "opened PDF");
        Ok(Self {
            path: path.to_owned(),
            page_sizes,
            scratch: Some(scratch),
        })
    }

    fn scratch_dir(&self) -> Result<&Path> {
        self.scratch
            .as_ref()
            .map(|dir| dir.path())
            .ok_or_else(|| anyhow!("document is already closed"))
    }

    /// Run `pdftocairo` for one page, with optional extra arguments, and load
    /// the PNG it writes.
    fn run_pdftocairo(&self, page_idx: usize, dpi: u32, extra: &[String]) -> Result<DynamicImage> {
        let page_number = (page_idx + 1).to_string();
        let out_base = self.scratch_dir()?.join(format!("page-{page_number}"));
        let output = Command::new("pdftocairo")
            .arg("-png")
            .arg("-r")
            .arg(dpi.to_string())
            .args(["-f", page_number.as_str(), "-l", page_number.as_str()])
            .arg("-singlefile")
            .args(extra)
            .arg(&self.path)
            .arg(&out_base)
            .output()
            .with_context(|| format!("failed to run pdftocairo on {:?}", self.path.display()))?;
        check_for_command_failure("pdftocairo", &output, Some(&is_error_line))?;

        let png_path = out_base.with_extension("png");
        let image = image::open(&png_path)
            .with_context(|| format!("failed to decode {:?}", png_path.display()))?;
        // Delete the file to recover space a bit early.
        fs::remove_file(&png_path)
            .with_context(|| format!("failed to delete file {:?}", png_path.display()))?;
        Ok(image)
    }

    /// Delete the scratch directory, if it still exists.
    fn release(&mut self) -> Result<()> {
        if let Some(scratch) = self.scratch.take() {
            let scratch_path = scratch.path().to_owned();
            scratch.close().with_context(|| {
                format!(
                    "failed to delete temporary directory {:?}",
                    scratch_path.display()
                )
            })?;
            debug!(path = %self.path.display(), "closed PDF");
        }
        Ok(())
    }
}

impl LabelDocument for PopplerDocument {
    fn page_count(&self) -> usize {
        self.page_sizes.len()
    }

    fn page_size(&self, page_idx: usize) -> Result<PageSize> {
        self.page_sizes
            .get(page_idx)
            .copied()
            .ok_or_else(|| anyhow!("page index {} out of range", page_idx))
    }

    #[instrument(level = "debug", skip_all, fields(page = page_idx + 1))]
    fn page_text(&self, page_idx: usize) -> Result<String> {
        let page_number = (page_idx + 1).to_string();
        let output = Command::new("pdftotext")
            .args(["-raw", "-enc", "UTF-8"])
            .args(["-f", page_number.as_str(), "-l", page_number.as_str()])
            .arg(&self.path)
            .arg("-")
            .output()
            .with_context(|| format!("failed to run pdftotext on {:?}", self.path.display()))?;
        check_for_command_failure("pdftotext", &output, Some(&is_error_line))?;
        String::from_utf8(output.stdout).context("pdftotext output was not valid UTF-8")
    }

    #[instrument(level = "debug", skip_all, fields(page = page_idx + 1, dpi = dpi))]
    fn render_page(&self, page_idx: usize, dpi: u32) -> Result<DynamicImage> {
        self.run_pdftocairo(page_idx, dpi, &[])
    }

    #[instrument(level = "debug", skip_all, fields(page = page_idx + 1, dpi = dpi))]
    fn render_clip(&self, page_idx: usize, dpi: u32, clip: &PointRect) -> Result<DynamicImage> {
        let pixels = clip
            .to_pixels(dpi)
            .ok_or_else(|| anyhow!("clip rectangle {:?} is empty", clip))?;
        let extra = [
            "-x".to_owned(),
            pixels.left.to_string(),
            "-y".to_owned(),
            pixels.top.to_string(),
            "-W".to_owned(),
            pixels.width().to_string(),
            "-H".to_owned(),
            pixels.height().to_string(),
        ];
        self.run_pdftocairo(page_idx, dpi, &extra)
    }

    fn close(mut self) -> Result<()> {
        self.release()
    }
}

impl Drop for PopplerDocument {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            error!("{:#}", err);
        }
    }
}

/// Run `pdfinfo` and parse its `Key: value` lines.
fn run_pdfinfo(path: &Path, extra: &[String]) -> Result<(BTreeMap<String, String>, String)> {
    let output = Command::new("pdfinfo")
        .args(extra)
        .arg(path)
        .output()
        .with_context(|| format!("failed to run pdfinfo on {:?}", path.display()))?;
    check_for_command_failure("pdfinfo", &output, None)?;

    let output =
        String::from_utf8(output.stdout).context("pdfinfo output was not valid UTF-8")?;
    let mut properties = BTreeMap::new();
    for line in output.lines() {
        let mut parts = line.splitn(2, ':');
        let key = parts.next().unwrap_or("").trim();
        let value = parts.next().unwrap_or("").trim();
        properties.insert(key.to_string(), value.to_string());
    }
    Ok((properties, output))
}

/// Get the number of pages in a PDF file.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub fn get_pdf_page_count(path: &Path) -> Result<usize> {
    let (properties, _) = run_pdfinfo(path, &[])?;
    let page_count_str = properties
        .get("Pages")
        .ok_or_else(|| anyhow!("failed to find page count in pdfinfo output"))?;
    page_count_str.parse::<usize>().with_context(|| {
        format!(
            "failed to parse page count for {:?} from pdfinfo output",
            path.display()
        )
    })
}

/// Get the media size of every page.
fn get_pdf_page_sizes(path: &Path, page_count: usize) -> Result<Vec<PageSize>> {
    let extra = [
        "-f".to_owned(),
        "1".to_owned(),
        "-l".to_owned(),
        page_count.to_string(),
    ];
    let (_, output) = run_pdfinfo(path, &extra)?;
    parse_page_sizes(&output, page_count)
}

/// Parse `Page    N size: W x H pts` lines, requiring one per page.
fn parse_page_sizes(output: &str, page_count: usize) -> Result<Vec<PageSize>> {
    let mut sizes = vec![None; page_count];
    let mut quarter_turned = vec![false; page_count];
    for line in output.lines() {
        if let Some(caps) = PAGE_ROT_REGEX.captures(line) {
            let page_number: usize = caps[1].parse().context("bad page number from pdfinfo")?;
            let rotation: u32 = caps[2].parse().context("bad page rotation from pdfinfo")?;
            if let Some(slot) = page_number
                .checked_sub(1)
                .and_then(|idx| quarter_turned.get_mut(idx))
            {
                *slot = rotation % 180 == 90;
            }
            continue;
        }
        let Some(caps) = PAGE_SIZE_REGEX.captures(line) else {
            continue;
        };
        let page_number: usize = caps[1].parse().context("bad page number from pdfinfo")?;
        let width: f64 = caps[2].parse().context("bad page width from pdfinfo")?;
        let height: f64 = caps[3].parse().context("bad page height from pdfinfo")?;
        if let Some(slot) = page_number.checked_sub(1).and_then(|idx| sizes.get_mut(idx)) {
            *slot = Some(PageSize { width, height });
        }
    }
    // Sizes are reported unrotated, but pages render with /Rotate applied.
    sizes
        .into_iter()
        .zip(quarter_turned)
        .enumerate()
        .map(|(idx, (size, turned))| {
            let size = size
                .ok_or_else(|| anyhow!("pdfinfo did not report a size for page {}", idx + 1))?;
            Ok(if turned {
                PageSize {
                    width: size.height,
                    height: size.width,
                }
            } else {
                size
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::*;

    #[test]
    fn is_error_line_works() {
        assert!(is_error_line("error: something went wrong"));
        assert!(is_error_line("Syntax Error: Couldn't find trailer dictionary"));
        assert!(!is_error_line("Warning: something is odd"));
        assert!(!is_error_line(
            "Internal Error: xref num 1234 not found but needed, document has changes, reconstruct aborted"
        ));
    }

    #[test]
    fn parses_page_sizes() {
        let output = "\
Title:          labels
Pages:          2
Page    1 size: 612 x 792 pts (letter)
Page    1 rot:  0
Page    2 size: 595.276 x 841.89 pts (A4)
Page    2 rot:  0
";
        let sizes = parse_page_sizes(output, 2).unwrap();
        assert_eq!(
            sizes[0],
            PageSize {
                width: 612.0,
                height: 792.0
            }
        );
        assert_eq!(sizes[1].width, 595.276);
        assert!(parse_page_sizes(output, 3).is_err());
    }

    #[test]
    fn quarter_turned_pages_swap_their_sides() {
        let output = "\
Pages:          3
Page    1 size: 612 x 792 pts (letter)
Page    1 rot:  0
Page    2 size: 612 x 792 pts (letter)
Page    2 rot:  90
Page    3 size: 612 x 792 pts (letter)
Page    3 rot:  270
";
        let sizes = parse_page_sizes(output, 3).unwrap();
        assert_eq!((sizes[0].width, sizes[0].height), (612.0, 792.0));
        assert_eq!((sizes[1].width, sizes[1].height), (792.0, 612.0));
        assert_eq!((sizes[2].width, sizes[2].height), (792.0, 612.0));
    }

    #[test]
    fn missing_input_is_reported() {
        let err = PopplerDocument::open(Path::new("does/not/exist.pdf")).unwrap_err();
        assert!(matches!(err, LabelError::InputNotFound { .. }));

        let dir = tempfile::tempdir().unwrap();
        let err = PopplerDocument::open(dir.path()).unwrap_err();
        assert!(matches!(err, LabelError::InputNotFound { .. }));
    }

    #[test]
    fn non_pdf_input_is_corrupt() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"just some text, not a PDF").unwrap();
        let err = PopplerDocument::open(file.path()).unwrap_err();
        assert!(matches!(err, LabelError::CorruptDocument { .. }));
    }
}
