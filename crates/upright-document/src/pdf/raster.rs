// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Rasterisers — turn PDF pages (via poppler's `pdftoppm`) or image files
// into page buffers.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, instrument};
use upright_core::PageIndex;
use upright_core::error::{Result, UprightError};

use crate::image::page::PageImage;
use crate::traits::Rasterizer;

/// Renders PDF pages by invoking `pdftoppm` once per page.
///
/// Each page is written as PNG into a private temporary directory and
/// decoded from there; nothing is left behind.
#[derive(Debug, Clone)]
pub struct PdftoppmRasterizer {
    pdf_path: PathBuf,
    page_count: usize,
    dpi: u32,
    program: OsString,
}

impl PdftoppmRasterizer {
    /// `page_count` comes from the document's page tree (see
    /// [`PdfReader::page_count`](crate::pdf::PdfReader::page_count)).
    pub fn new(pdf_path: impl Into<PathBuf>, page_count: usize, dpi: u32) -> Self {
        Self {
            pdf_path: pdf_path.into(),
            page_count,
            dpi,
            program: OsString::from("pdftoppm"),
        }
    }

    /// Use a different `pdftoppm` binary.
    pub fn with_program(mut self, program: impl Into<OsString>) -> Self {
        self.program = program.into();
        self
    }
}

impl Rasterizer for PdftoppmRasterizer {
    fn page_count(&self) -> usize {
        self.page_count
    }

    #[instrument(skip(self), fields(page = %page, dpi = self.dpi))]
    fn render(&self, page: PageIndex) -> Result<PageImage> {
        let fail = |detail: String| UprightError::Rasterize { page, detail };
        if page.0 >= self.page_count {
            return Err(fail(format!(
                "page out of range (document has {} pages)",
                self.page_count
            )));
        }

        let workdir = tempfile::tempdir()?;
        let prefix = workdir.path().join("page");
        // pdftoppm uses 1-based page indices
        let page_number = page.number().to_string();

        let output = Command::new(&self.program)
            .arg("-png")
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg("-f")
            .arg(&page_number)
            .arg("-l")
            .arg(&page_number)
            .arg("-singlefile")
            .arg(&self.pdf_path)
            .arg(&prefix)
            .output()
            .map_err(|err| fail(format!("failed to invoke pdftoppm: {}", err)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(fail(format!(
                "pdftoppm exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        // -singlefile writes exactly `<prefix>.png`.
        let image_path = prefix.with_extension("png");
        let image = PageImage::open(&image_path).map_err(|err| fail(err.to_string()))?;
        debug!(width = image.width(), height = image.height(), "Page rendered");
        Ok(image)
    }
}

enum PageSource {
    File(PathBuf),
    Memory(PageImage),
}

/// Pages supplied directly as images, one image per page, in order.
pub struct ImageSetRasterizer {
    pages: Vec<PageSource>,
}

impl ImageSetRasterizer {
    /// Pages decoded lazily from image files.
    pub fn from_paths<P: AsRef<Path>>(paths: impl IntoIterator<Item = P>) -> Self {
        Self {
            pages: paths
                .into_iter()
                .map(|path| PageSource::File(path.as_ref().to_path_buf()))
                .collect(),
        }
    }

    /// Pages already in memory.
    pub fn from_images(images: impl IntoIterator<Item = PageImage>) -> Self {
        Self {
            pages: images.into_iter().map(PageSource::Memory).collect(),
        }
    }
}

impl Rasterizer for ImageSetRasterizer {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn render(&self, page: PageIndex) -> Result<PageImage> {
        match self.pages.get(page.0) {
            Some(PageSource::Memory(image)) => Ok(image.clone()),
            Some(PageSource::File(path)) => {
                PageImage::open(path).map_err(|err| UprightError::Rasterize {
                    page,
                    detail: err.to_string(),
                })
            }
            None => Err(UprightError::Rasterize {
                page,
                detail: format!("page out of range ({} images)", self.pages.len()),
            }),
        }
    }
}
