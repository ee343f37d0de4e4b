// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// No-op collaborators for inputs or builds that lack a capability.
//
// Image inputs have no text layer, and builds without the `ocr` feature (or
// without models on disk) have no OCR engine.

use upright_core::error::{OcrFailure, Result};
use upright_core::{PageGeometry, PageIndex, Viewport};

use crate::image::page::PageImage;
use crate::traits::{OcrProbe, TextLayerReader};

/// Text-layer reader for sources that carry none, such as scanned images.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTextLayer;

impl TextLayerReader for NoTextLayer {
    /// Images have no user space; the body viewport is computed on Letter.
    fn geometry(&self, _page: PageIndex) -> Result<PageGeometry> {
        Ok(PageGeometry::LETTER)
    }

    fn read_text(&self, _page: PageIndex, _viewport: &Viewport) -> Result<String> {
        Ok(String::new())
    }
}

/// OCR probe used when no engine is configured. Every call fails with
/// `EngineUnavailable`, which the classifier resolves to UNREADABLE.
#[derive(Debug, Clone)]
pub struct UnavailableProbe {
    reason: String,
}

impl UnavailableProbe {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Default for UnavailableProbe {
    fn default() -> Self {
        Self::new("no OCR engine configured")
    }
}

impl OcrProbe for UnavailableProbe {
    fn recognize(&self, _page: &PageImage) -> std::result::Result<String, OcrFailure> {
        tracing::debug!(reason = %self.reason, "OCR probe called without an engine");
        Err(OcrFailure::EngineUnavailable(self.reason.clone()))
    }
}
