// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Collaborator traits for the pipeline.
//
// Rasterising, text-layer reading, OCR, and document writing are external
// concerns with narrow contracts. The pipeline only talks to these traits;
// concrete backends live in `pdf` and `scan`, and no-op variants in `stub`.

use upright_core::error::{OcrFailure, Result};
use upright_core::{PageGeometry, PageIndex, Viewport};

use crate::image::page::PageImage;

/// Turns document pages into pixel buffers.
pub trait Rasterizer: Send + Sync {
    /// Number of pages in the source.
    fn page_count(&self) -> usize;

    /// Render one page. A failure here is fatal for the run.
    fn render(&self, page: PageIndex) -> Result<PageImage>;
}

/// Reads a page's embedded text layer.
pub trait TextLayerReader: Send + Sync {
    /// Page size in points.
    fn geometry(&self, page: PageIndex) -> Result<PageGeometry>;

    /// Text whose position falls inside `viewport`. May be empty.
    fn read_text(&self, page: PageIndex, viewport: &Viewport) -> Result<String>;
}

/// Optical character recognition over a page image.
///
/// Called from a blocking thread, so implementations may take as long as
/// the engine needs; the caller enforces the timeout.
pub trait OcrProbe: Send + Sync {
    fn recognize(&self, page: &PageImage) -> std::result::Result<String, OcrFailure>;
}

/// Accumulates upright pages into an output document.
pub trait DocumentWriter {
    /// Add the next page. Pages are appended in page order.
    fn append(&mut self, page: PageImage) -> Result<()>;

    /// Produce the document bytes. Valid once; later calls fail with
    /// `UprightError::WriterFinalized`.
    fn finalize(&mut self) -> Result<Vec<u8>>;
}
