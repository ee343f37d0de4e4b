// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for upright.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::PageIndex;

/// Top-level error type for all upright operations.
///
/// Everything here is fatal for the run that raised it. Per-page OCR problems
/// are modelled separately by [`OcrFailure`] and never surface as an
/// `UprightError`.
#[derive(Debug, Error)]
pub enum UprightError {
    // -- Input errors --
    #[error("cannot open input document {path}: {detail}")]
    Open { path: String, detail: String },

    #[error("failed to rasterise page {page}: {detail}")]
    Rasterize { page: PageIndex, detail: String },

    #[error("PDF operation failed: {0}")]
    PdfError(String),

    #[error("image processing failed: {0}")]
    ImageError(String),

    // -- OCR engine setup --
    #[error("OCR engine could not be initialised: {0}")]
    OcrEngine(String),

    // -- Output errors --
    #[error("normalised output is missing pages {missing:?}")]
    IncompletePages { missing: Vec<PageIndex> },

    #[error("document writer was already finalised")]
    WriterFinalized,

    // -- Configuration / persistence --
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Pipeline stage an error belongs to, for user-facing reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Open,
    Rasterize,
    Classify,
    Normalize,
    Write,
    Configure,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Open => "open",
            Self::Rasterize => "rasterize",
            Self::Classify => "classify",
            Self::Normalize => "normalize",
            Self::Write => "write",
            Self::Configure => "configure",
        };
        f.write_str(name)
    }
}

impl UprightError {
    /// The pipeline stage that produced this error.
    pub fn stage(&self) -> Stage {
        match self {
            Self::Open { .. } | Self::PdfError(_) => Stage::Open,
            Self::Rasterize { .. } | Self::ImageError(_) => Stage::Rasterize,
            Self::OcrEngine(_) => Stage::Classify,
            Self::IncompletePages { .. } => Stage::Normalize,
            Self::WriterFinalized | Self::Io(_) => Stage::Write,
            Self::Config(_) | Self::Serialization(_) => Stage::Configure,
        }
    }

    /// The page the error is tied to, when there is one.
    pub fn page(&self) -> Option<PageIndex> {
        match self {
            Self::Rasterize { page, .. } => Some(*page),
            Self::IncompletePages { missing } => missing.first().copied(),
            _ => None,
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, UprightError>;

// -- Per-page OCR failures ----------------------------------------------------

/// Why an OCR probe did not produce a result for a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OcrFailureKind {
    /// The probe exceeded the per-page timeout.
    Timeout,
    /// No engine is configured, or its models could not be loaded.
    EngineUnavailable,
    /// The engine ran but could not recognise the page.
    RecognitionFailed,
}

/// A failed OCR probe. Absorbed by the classifier; never fatal.
#[derive(Debug, Clone, Error)]
pub enum OcrFailure {
    #[error("OCR probe timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("OCR engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("OCR recognition failed: {0}")]
    RecognitionFailed(String),
}

impl OcrFailure {
    pub fn kind(&self) -> OcrFailureKind {
        match self {
            Self::Timeout { .. } => OcrFailureKind::Timeout,
            Self::EngineUnavailable(_) => OcrFailureKind::EngineUnavailable,
            Self::RecognitionFailed(_) => OcrFailureKind::RecognitionFailed,
        }
    }
}
