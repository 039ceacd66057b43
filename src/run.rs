//! One label run, as a lazy sequence of events.
//!
//! A [`LabelRun`] is an [`Iterator`] of [`RunEvent`]s. Each call to `next`
//! does one step of work: open the document, process one page, assign names,
//! write one label, or report the outcome. The caller decides where that
//! work runs; the CLI moves it onto a blocking worker thread.
//!
//! The document is closed exactly once, after the last page and before the
//! terminal event, whether the run succeeds, fails, or is dropped early.

use std::fmt;

use image::RgbImage;
use schemars::JsonSchema;

use crate::{
    compose::{Canvas, compose},
    config::{PageErrorPolicy, RunConfig},
    document::{LabelDocument, poppler::PopplerDocument},
    error::LabelError,
    locate::RegionLocator,
    naming::assign_output_names,
    output::{OUTPUT_ROOT, create_output_dir, output_dir, write_label},
    prelude::*,
    text::{UNDATED_FOLDER, extract_identifiers, folder_name},
};

/// Something a collaborator can observe about a run.
#[derive(Clone, Debug, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunEvent {
    /// Work in progress. `fraction` never decreases over a run.
    Progress { fraction: f64, message: String },
    /// The run finished. `count` labels were written to `output_dir`.
    Completed {
        count: usize,
        output_dir: PathBuf,
        notices: Vec<Notice>,
    },
    /// The run stopped on a fatal error.
    Failed { error: String },
}

/// Labels or pages that did not produce output, and why.
#[derive(Clone, Debug, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    /// The page text has no sale identifiers, so the page was not rendered.
    NoIdentifiers { page: usize },
    /// More labels were found than identifiers. The extra labels were dropped.
    UnpairedRegions { page: usize, count: usize },
    /// More identifiers were found than labels. These identifiers have no
    /// image.
    UnpairedIdentifiers {
        page: usize,
        identifiers: Vec<String>,
    },
    /// The page failed and the run was configured to skip it.
    PageSkipped { page: usize, error: String },
    /// The whole document produced no labels.
    NoLabelsDetected,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::NoIdentifiers { page } => {
                write!(f, "page {}: no \"Venta: S...\" identifiers, page skipped", page)
            }
            Notice::UnpairedRegions { page, count } => {
                write!(f, "page {}: {} label(s) had no identifier", page, count)
            }
            Notice::UnpairedIdentifiers { page, identifiers } => write!(
                f,
                "page {}: no label found for {}",
                page,
                identifiers.join(", ")
            ),
            Notice::PageSkipped { page, error } => {
                write!(f, "page {}: skipped after error: {}", page, error)
            }
            Notice::NoLabelsDetected => write!(f, "no labels were found in the document"),
        }
    }
}

/// A composed label waiting to be written.
pub struct LabelRecord {
    pub image: RgbImage,
    pub identifier: String,
    /// 1-based source page.
    pub page: usize,
}

type Opener<D> = Box<dyn FnOnce() -> Result<D, LabelError> + Send>;

enum Step {
    Open,
    Page(usize),
    Name,
    Write(usize),
    Complete,
    Finished,
}

/// A run over one document. See the module docs.
pub struct LabelRun<D: LabelDocument> {
    source: PathBuf,
    config: RunConfig,
    locator: Box<dyn RegionLocator>,
    canvas: Canvas,
    opener: Option<Opener<D>>,
    document: Option<D>,
    step: Step,
    page_count: usize,
    first_page_text: Option<String>,
    output_dir: PathBuf,
    records: Vec<LabelRecord>,
    names: Vec<String>,
    notices: Vec<Notice>,
}

impl LabelRun<PopplerDocument> {
    /// Prepare a run over the PDF at `path`. Nothing happens until the first
    /// call to `next`.
    pub fn open(path: impl Into<PathBuf>, config: RunConfig) -> Self {
        let path = path.into();
        let source = path.clone();
        Self::from_opener(source, config, move || PopplerDocument::open(&path))
    }
}

impl<D: LabelDocument> LabelRun<D> {
    /// Prepare a run over whatever document `opener` returns. `source` names
    /// the document in errors.
    pub fn from_opener(
        source: impl Into<PathBuf>,
        config: RunConfig,
        opener: impl FnOnce() -> Result<D, LabelError> + Send + 'static,
    ) -> Self {
        let locator = config.build_locator();
        let canvas = config.canvas_pixels();
        let output_dir = config.base_dir.join(OUTPUT_ROOT);
        Self {
            source: source.into(),
            config,
            locator,
            canvas,
            opener: Some(Box::new(opener)),
            document: None,
            step: Step::Open,
            page_count: 0,
            first_page_text: None,
            output_dir,
            records: vec![],
            names: vec![],
            notices: vec![],
        }
    }

    fn open_document(&mut self) -> Result<RunEvent, LabelError> {
        self.config.validate()?;
        let opener = self
            .opener
            .take()
            .ok_or_else(|| LabelError::invalid_config("the run was already started"))?;
        let document = opener()?;
        self.page_count = document.page_count();
        if self.page_count == 0 {
            if let Err(err) = document.close() {
                warn!("could not release document: {:#}", err);
            }
            return Err(LabelError::EmptyDocument {
                path: self.source.clone(),
            });
        }
        let first_page_text = document.page_text(0);
        self.document = Some(document);

        let folder = match first_page_text {
            Ok(text) => {
                let folder = folder_name(&text);
                self.first_page_text = Some(text);
                folder
            }
            Err(err) => match self.config.on_page_error {
                PageErrorPolicy::Abort => {
                    return Err(LabelError::PageFailed {
                        page: 1,
                        source: err,
                    });
                }
                PageErrorPolicy::Skip => {
                    warn!("could not read page 1 text, output will be undated: {:#}", err);
                    UNDATED_FOLDER.to_owned()
                }
            },
        };
        self.output_dir = output_dir(&self.config.base_dir, &folder);
        create_output_dir(&self.output_dir)?;
        info!(
            pages = self.page_count,
            locator = self.locator.name(),
            output_dir = %self.output_dir.display(),
            "opened document"
        );

        self.step = Step::Page(0);
        Ok(RunEvent::Progress {
            fraction: 0.0,
            message: format!(
                "Opened {} page(s), writing to {}/{}",
                self.page_count, OUTPUT_ROOT, folder
            ),
        })
    }

    fn process_page(&mut self, page_idx: usize) -> Result<RunEvent, LabelError> {
        let page = page_idx + 1;
        let found = match self.crop_page(page_idx) {
            Ok((records, notices)) => {
                let found = records.len();
                self.records.extend(records);
                self.notices.extend(notices);
                found
            }
            Err(err) => match self.config.on_page_error {
                PageErrorPolicy::Abort => return Err(LabelError::PageFailed { page, source: err }),
                PageErrorPolicy::Skip => {
                    warn!(page, "skipping page: {:#}", err);
                    self.notices.push(Notice::PageSkipped {
                        page,
                        error: format!("{:#}", err),
                    });
                    0
                }
            },
        };
        info!(page, labels = found, "processed page");

        if page == self.page_count {
            self.release_document();
            self.step = Step::Name;
        } else {
            self.step = Step::Page(page);
        }
        Ok(RunEvent::Progress {
            fraction: page as f64 / self.page_count as f64 * 0.5,
            message: format!("Page {}/{} processed, {} label(s)", page, self.page_count, found),
        })
    }

    /// Crop and compose every label on one page.
    fn crop_page(&mut self, page_idx: usize) -> Result<(Vec<LabelRecord>, Vec<Notice>)> {
        let page = page_idx + 1;
        let document = self
            .document
            .as_ref()
            .ok_or_else(|| anyhow!("document is not open"))?;
        let text = match (page_idx, self.first_page_text.take()) {
            (0, Some(text)) => text,
            _ => document
                .page_text(page_idx)
                .context("could not extract page text")?,
        };
        let identifiers = extract_identifiers(&text);
        if identifiers.is_empty() {
            debug!(page, "no identifiers on page");
            return Ok((vec![], vec![Notice::NoIdentifiers { page }]));
        }

        let crops = self
            .locator
            .crop_labels(document, page_idx, identifiers.len())
            .with_context(|| format!("{} locator failed", self.locator.name()))?;

        // Labels and identifiers pair by position. Whatever is left over on
        // either side is reported.
        let mut notices = vec![];
        if crops.len() < identifiers.len() {
            let unpaired = identifiers[crops.len()..].to_vec();
            warn!(page, ?unpaired, "identifiers without a label");
            notices.push(Notice::UnpairedIdentifiers {
                page,
                identifiers: unpaired,
            });
        } else if crops.len() > identifiers.len() {
            let count = crops.len() - identifiers.len();
            warn!(page, count, "labels without an identifier");
            notices.push(Notice::UnpairedRegions { page, count });
        }

        let records = crops
            .iter()
            .zip(identifiers)
            .map(|(crop, identifier)| {
                let image = compose(crop, &self.canvas, self.config.fit)
                    .with_context(|| format!("could not compose label {}", identifier))?;
                Ok(LabelRecord {
                    image,
                    identifier,
                    page,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok((records, notices))
    }

    fn assign_names(&mut self) -> RunEvent {
        let identifiers: Vec<&str> = self
            .records
            .iter()
            .map(|record| record.identifier.as_str())
            .collect();
        self.names = assign_output_names(&identifiers);
        if self.records.is_empty() {
            warn!("no labels found in the document");
            self.notices.push(Notice::NoLabelsDetected);
            self.step = Step::Complete;
            return RunEvent::Progress {
                fraction: 1.0,
                message: "No labels to save".to_owned(),
            };
        }
        self.step = Step::Write(0);
        RunEvent::Progress {
            fraction: 0.5,
            message: format!("Saving {} label(s)", self.records.len()),
        }
    }

    fn write_record(&mut self, idx: usize) -> Result<RunEvent, LabelError> {
        let total = self.records.len();
        let name = &self.names[idx];
        let record = &mut self.records[idx];
        let image = std::mem::take(&mut record.image);
        let path = write_label(
            &image,
            &self.output_dir,
            name,
            self.config.jpeg_quality,
            self.config.dpi,
        )?;
        debug!(page = record.page, path = %path.display(), "wrote label");

        self.step = if idx + 1 == total {
            Step::Complete
        } else {
            Step::Write(idx + 1)
        };
        Ok(RunEvent::Progress {
            fraction: 0.5 + (idx + 1) as f64 / total as f64 * 0.5,
            message: format!("Saved {}.jpg", name),
        })
    }

    fn complete(&mut self) -> RunEvent {
        self.step = Step::Finished;
        info!(
            count = self.records.len(),
            output_dir = %self.output_dir.display(),
            "run completed"
        );
        RunEvent::Completed {
            count: self.records.len(),
            output_dir: self.output_dir.clone(),
            notices: std::mem::take(&mut self.notices),
        }
    }

    /// Close the document if it is still open.
    fn release_document(&mut self) {
        if let Some(document) = self.document.take() {
            if let Err(err) = document.close() {
                warn!("could not release document: {:#}", err);
            }
        }
    }

    fn fail(&mut self, err: LabelError) -> RunEvent {
        self.step = Step::Finished;
        self.release_document();
        error!("run failed: {}", err);
        RunEvent::Failed {
            error: err.to_string(),
        }
    }
}

impl<D: LabelDocument> Iterator for LabelRun<D> {
    type Item = RunEvent;

    fn next(&mut self) -> Option<RunEvent> {
        let result = match self.step {
            Step::Open => self.open_document(),
            Step::Page(idx) => self.process_page(idx),
            Step::Name => Ok(self.assign_names()),
            Step::Write(idx) => self.write_record(idx),
            Step::Complete => Ok(self.complete()),
            Step::Finished => return None,
        };
        Some(result.unwrap_or_else(|err| self.fail(err)))
    }
}

impl<D: LabelDocument> Drop for LabelRun<D> {
    fn drop(&mut self) {
        self.release_document();
    }
}
