// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// upright-document — page orientation estimation, readability
// classification, and the PDF plumbing around them.
//
// Provides the pixel pipeline (mask preparation, 360-candidate orientation
// search, fixed-canvas normalisation), the three-tier page classifier, PDF
// text-layer reading, rasterising and writing, and the whole-document
// pipelines that run them in parallel.

pub mod classify;
pub mod image;
pub mod integrity;
pub mod pdf;
pub mod pipeline;
pub mod scan;
pub mod stub;
pub mod traits;

// Re-export the primary structs so callers can use `upright_document::PdfReader` etc.
pub use crate::classify::{ClassifierPage, PageClassifier};
pub use crate::image::{BinaryMask, PageImage};
pub use crate::pdf::{ImageSetRasterizer, PdfReader, PdfWriter, PdftoppmRasterizer};
pub use crate::pipeline::{ClassificationOutcome, OrientationOutcome, OrientationPipeline, classify_document};
pub use crate::scan::{NormalizedPages, OrientationEstimator, Preprocessor, RotationNormalizer};
pub use crate::stub::{NoTextLayer, UnavailableProbe};
pub use crate::traits::{DocumentWriter, OcrProbe, Rasterizer, TextLayerReader};

#[cfg(feature = "ocr")]
pub use crate::scan::ocr::OcrsProbe;
