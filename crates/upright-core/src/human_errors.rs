// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable failure reports.
//
// Every fatal error is mapped to a plain message, a suggestion, and the
// stage and page (if any) where the run stopped.

use serde::Serialize;

use crate::error::{Stage, UprightError};
use crate::types::PageIndex;

/// A failed run, explained for the person who started it.
#[derive(Debug, Clone, Serialize)]
pub struct HumanError {
    /// Plain summary (shown as a heading).
    pub message: String,
    /// What to try next.
    pub suggestion: String,
    /// Stage where the run stopped.
    pub stage: Stage,
    /// Page being processed when it stopped, if the failure is page-bound.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<PageIndex>,
    /// The underlying technical error.
    pub detail: String,
}

impl std::fmt::Display for HumanError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.page {
            Some(page) => write!(f, "[{} stage, page {}] {}", self.stage, page, self.message)?,
            None => write!(f, "[{} stage] {}", self.stage, self.message)?,
        }
        write!(f, " {}", self.suggestion)
    }
}

/// Convert an `UprightError` into a [`HumanError`].
pub fn humanize_error(err: &UprightError) -> HumanError {
    let (message, suggestion): (&str, String) = match err {
        UprightError::Open { .. } | UprightError::PdfError(_) => (
            "The input document could not be opened.",
            "Check that the path is right and the file is a valid, unencrypted PDF.".into(),
        ),

        UprightError::Rasterize { detail, .. } => {
            if detail.contains("pdftoppm") {
                (
                    "A page could not be rendered.",
                    "Make sure poppler-utils (pdftoppm) is installed and on PATH.".into(),
                )
            } else {
                (
                    "A page could not be rendered.",
                    "The document may be damaged or use an unsupported feature.".into(),
                )
            }
        }

        UprightError::ImageError(_) => (
            "A page image could not be decoded.",
            "Try converting the images to PNG or JPEG first.".into(),
        ),

        UprightError::OcrEngine(_) => (
            "The OCR engine could not be started.",
            "Check the OCR model directory; pages without a text layer will be reported as UNREADABLE until it is fixed.".into(),
        ),

        UprightError::IncompletePages { missing } => (
            "The upright document could not be assembled.",
            format!(
                "{} page(s) were not processed; re-run without cancelling to produce the output.",
                missing.len()
            ),
        ),

        UprightError::WriterFinalized => (
            "The output document was already written.",
            "This is a bug; please report it.".into(),
        ),

        UprightError::Config(_) => (
            "The configuration is invalid.",
            "Fix the value named below in the config file or command-line flags.".into(),
        ),

        UprightError::Io(io_err) => match io_err.kind() {
            std::io::ErrorKind::NotFound => (
                "A file couldn't be found.",
                "It may have been moved or deleted.".into(),
            ),
            std::io::ErrorKind::PermissionDenied => (
                "Permission denied reading or writing a file.",
                "Check the file permissions of the input and output paths.".into(),
            ),
            _ => (
                "There was a problem reading or writing a file.",
                "Try again; if it persists, check free disk space.".into(),
            ),
        },

        UprightError::Serialization(_) => (
            "A JSON file could not be read or written.",
            "Check the config file syntax.".into(),
        ),
    };

    HumanError {
        message: message.into(),
        suggestion,
        stage: err.stage(),
        page: err.page(),
        detail: err.to_string(),
    }
}
