// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Rotation normalisation — apply an estimated angle to the colour page and
// collect the upright pages for output.

use tracing::{debug, info, instrument};
use upright_core::PageIndex;
use upright_core::PageSlots;
use upright_core::error::Result;

use crate::image::page::PageImage;
use crate::traits::DocumentWriter;

/// Applies an orientation angle to the original page image.
///
/// Uses the same clockwise, fixed-canvas convention as the estimator, so an
/// estimated angle fed back here makes the text horizontal. Never
/// re-estimates.
#[derive(Debug, Clone, Copy, Default)]
pub struct RotationNormalizer;

impl RotationNormalizer {
    pub fn new() -> Self {
        Self
    }

    #[instrument(skip(self, page), fields(width = page.width(), height = page.height()))]
    pub fn normalize(&self, page: &PageImage, angle: u16) -> PageImage {
        debug!(angle, "Normalising page");
        page.rotated(angle)
    }
}

/// Upright pages collected by index, written out once all are present.
#[derive(Debug)]
pub struct NormalizedPages {
    slots: PageSlots<PageImage>,
}

impl NormalizedPages {
    pub fn new(page_count: usize) -> Self {
        Self {
            slots: PageSlots::new(page_count),
        }
    }

    /// Store the upright image for `page`. Returns `false` on a duplicate or
    /// out-of-range index.
    pub fn commit(&mut self, page: PageIndex, image: PageImage) -> bool {
        self.slots.commit(page, image)
    }

    pub fn is_complete(&self) -> bool {
        self.slots.is_complete()
    }

    pub fn missing(&self) -> Vec<PageIndex> {
        self.slots.missing()
    }

    /// Feed every page to `writer` in page order and finalise it.
    ///
    /// Fails with `IncompletePages` before touching the writer if any page is
    /// missing, so no partial document is produced.
    #[instrument(skip_all, fields(pages = self.slots.len()))]
    pub fn write_to(self, writer: &mut dyn DocumentWriter) -> Result<Vec<u8>> {
        let pages = self.slots.into_complete()?;
        for page in pages {
            writer.append(page)?;
        }
        let bytes = writer.finalize()?;
        info!(bytes = bytes.len(), "Upright document written");
        Ok(bytes)
    }
}
