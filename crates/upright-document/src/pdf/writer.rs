// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF writer — assemble upright page images into one document using
// `printpdf` 0.8.
//
// printpdf 0.8 uses a data-oriented API: documents are built by constructing
// `PdfPage` structs containing `Vec<Op>` operation lists, then serialised via
// `PdfDocument::save()`.

use printpdf::{
    Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Pt, RawImage, RawImageData,
    RawImageFormat, XObjectTransform,
};
use tracing::{debug, info, instrument};
use upright_core::error::{Result, UprightError};

use crate::image::page::PageImage;
use crate::traits::DocumentWriter;

/// Millimetres per inch.
const MM_PER_INCH: f32 = 25.4;

/// Writes one full-bleed page per appended image.
///
/// Each page is sized to its image at the writer's DPI, so a page rasterised
/// at the PDF point grid (72 DPI) keeps its original page size.
pub struct PdfWriter {
    document: PdfDocument,
    pages: Vec<PdfPage>,
    dpi: f32,
    finalized: bool,
}

impl PdfWriter {
    /// Create a writer placing images at `dpi` pixels per inch.
    pub fn new(title: &str, dpi: u32) -> Self {
        Self {
            document: PdfDocument::new(title),
            pages: Vec::new(),
            dpi: dpi.max(1) as f32,
            finalized: false,
        }
    }

    /// Pages appended so far.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Page size in millimetres for an image of the given pixel size.
    fn page_size(&self, width_px: u32, height_px: u32) -> (Mm, Mm) {
        (
            Mm(width_px as f32 / self.dpi * MM_PER_INCH),
            Mm(height_px as f32 / self.dpi * MM_PER_INCH),
        )
    }
}

impl DocumentWriter for PdfWriter {
    #[instrument(skip_all, fields(width = page.width(), height = page.height()))]
    fn append(&mut self, page: PageImage) -> Result<()> {
        if self.finalized {
            return Err(UprightError::WriterFinalized);
        }

        let (width, height) = (page.width(), page.height());
        let (page_w, page_h) = self.page_size(width, height);

        let raw = RawImage {
            pixels: RawImageData::U8(page.into_rgb().into_raw()),
            width: width as usize,
            height: height as usize,
            data_format: RawImageFormat::RGB8,
            tag: Vec::new(),
        };
        let xobject_id = self.document.add_image(&raw);

        let ops = vec![Op::UseXobject {
            id: xobject_id,
            transform: XObjectTransform {
                translate_x: Some(Pt(0.0)),
                translate_y: Some(Pt(0.0)),
                scale_x: None,
                scale_y: None,
                dpi: Some(self.dpi),
                rotate: None,
            },
        }];
        self.pages.push(PdfPage::new(page_w, page_h, ops));

        debug!(pages = self.pages.len(), "Page appended");
        Ok(())
    }

    #[instrument(skip_all, fields(pages = self.pages.len()))]
    fn finalize(&mut self) -> Result<Vec<u8>> {
        if self.finalized {
            return Err(UprightError::WriterFinalized);
        }
        self.finalized = true;

        self.document.with_pages(std::mem::take(&mut self.pages));

        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let output = self.document.save(&PdfSaveOptions::default(), &mut warnings);
        if !warnings.is_empty() {
            debug!(warnings = warnings.len(), "printpdf reported warnings");
        }

        info!(bytes = output.len(), "PDF document finalised");
        Ok(output)
    }
}
