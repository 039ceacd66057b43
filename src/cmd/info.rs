//! The `info` subcommand.

use clap::Args;

use crate::{
    async_utils::blocking_iter_streams::spawn_blocking_propagating_panics,
    document::{LabelDocument, poppler::PopplerDocument},
    error::LabelError,
    prelude::*,
    text::{extract_identifiers, folder_name},
};

/// Info command line arguments.
#[derive(Debug, Args)]
pub struct InfoOpts {
    /// The label PDF to inspect.
    #[clap(value_name = "PDF")]
    pub input_path: PathBuf,
}

/// What a run over a document would produce, without rendering anything.
#[derive(Debug, PartialEq, Serialize)]
pub struct DocumentInfo {
    pub pages: usize,
    /// Folder below `etiquetas` that labels would be written to.
    pub output_folder: String,
    pub identifiers: Vec<PageIdentifiers>,
}

/// The identifiers on one page.
#[derive(Debug, PartialEq, Serialize)]
pub struct PageIdentifiers {
    pub page: usize,
    pub identifiers: Vec<String>,
}

/// Read the text of every page of `document`.
pub fn describe(document: &impl LabelDocument) -> Result<DocumentInfo> {
    let mut output_folder = None;
    let mut identifiers = Vec::with_capacity(document.page_count());
    for page_idx in 0..document.page_count() {
        let text = document
            .page_text(page_idx)
            .map_err(|source| LabelError::PageFailed {
                page: page_idx + 1,
                source,
            })?;
        output_folder.get_or_insert_with(|| folder_name(&text));
        identifiers.push(PageIdentifiers {
            page: page_idx + 1,
            identifiers: extract_identifiers(&text),
        });
    }
    Ok(DocumentInfo {
        pages: document.page_count(),
        output_folder: output_folder.unwrap_or_else(|| folder_name("")),
        identifiers,
    })
}

/// The `info` subcommand.
#[instrument(level = "debug", skip_all, fields(input = %opts.input_path.display()))]
pub async fn cmd_info(opts: &InfoOpts) -> Result<()> {
    let path = opts.input_path.clone();
    let info = spawn_blocking_propagating_panics(move || -> Result<DocumentInfo> {
        let document = PopplerDocument::open(&path)?;
        let info = describe(&document);
        document.close()?;
        info
    })
    .await?;

    let json = serde_json::to_string_pretty(&info).context("failed to serialize info")?;
    println!("{}", json);
    Ok(())
}

#[cfg(test)]
mod tests {
    use image::{GrayImage, Luma};

    use super::*;
    use crate::document::test_support::{MemoryDocument, MemoryPage};

    fn blank() -> GrayImage {
        GrayImage::from_pixel(10, 10, Luma([255]))
    }

    #[test]
    fn lists_identifiers_per_page() {
        let document = MemoryDocument::new(
            200,
            vec![
                MemoryPage::new("Fecha 3/2/2026 Venta: S1 Venta: S2", blank()),
                MemoryPage::new("", blank()),
                MemoryPage::new("Venta: S1", blank()),
            ],
        );
        let info = describe(&document).unwrap();
        assert_eq!(info.pages, 3);
        assert_eq!(info.output_folder, "2026-02-03");
        assert_eq!(info.identifiers[0].identifiers, ["S1", "S2"]);
        assert!(info.identifiers[1].identifiers.is_empty());
        assert_eq!(info.identifiers[2].page, 3);
    }

    #[test]
    fn reports_the_failing_page() {
        let document = MemoryDocument::new(
            200,
            vec![MemoryPage::new("Venta: S1", blank()), MemoryPage::broken()],
        );
        let err = describe(&document).unwrap_err();
        assert!(err.to_string().starts_with("failed to process page 2"));
    }
}
