//! Errors that end a run.

use std::path::PathBuf;

/// A fatal error in a label run. Each variant renders as a single
/// human-readable message.
#[derive(Debug, thiserror::Error)]
pub enum LabelError {
    /// The input path does not exist or is not a regular file.
    #[error("input file not found: {}", path.display())]
    InputNotFound { path: PathBuf },

    /// The PDF opened correctly but has no pages.
    #[error("the PDF has no pages: {}", path.display())]
    EmptyDocument { path: PathBuf },

    /// The file is not a PDF, or poppler could not parse or render it.
    #[error("could not read PDF {}: {source:#}", path.display())]
    CorruptDocument {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// Text extraction, rendering or region detection failed on one page.
    #[error("failed to process page {page}: {source:#}")]
    PageFailed {
        /// 1-based page number.
        page: usize,
        #[source]
        source: anyhow::Error,
    },

    /// The run configuration cannot be used.
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// An output directory or label image could not be written.
    #[error("could not write {}: {source:#}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
}

impl LabelError {
    pub fn corrupt(path: impl Into<PathBuf>, source: anyhow::Error) -> Self {
        Self::CorruptDocument {
            path: path.into(),
            source,
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_distinct_and_readable() {
        let missing = LabelError::InputNotFound {
            path: "labels.pdf".into(),
        };
        let empty = LabelError::EmptyDocument {
            path: "labels.pdf".into(),
        };
        let corrupt = LabelError::corrupt(
            "labels.pdf",
            anyhow::anyhow!("pdfinfo failed").context("could not inspect PDF"),
        );
        assert_eq!(missing.to_string(), "input file not found: labels.pdf");
        assert_eq!(empty.to_string(), "the PDF has no pages: labels.pdf");
        assert_eq!(
            corrupt.to_string(),
            "could not read PDF labels.pdf: could not inspect PDF: pdfinfo failed"
        );
    }
}
