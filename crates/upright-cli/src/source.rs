// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Input wiring — pick the rasteriser, text-layer reader, and OCR probe for
// the given input files.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;
use upright_core::error::{Result, UprightError};
use upright_core::{PipelineConfig, RunReport};
use upright_document::integrity::hash_file;
use upright_document::{
    ImageSetRasterizer, NoTextLayer, OcrProbe, PdfReader, PdftoppmRasterizer, Rasterizer,
    TextLayerReader,
};

/// An opened input: pages to render plus their text layer.
pub struct Source {
    pub label: String,
    pub rasterizer: Arc<dyn Rasterizer>,
    pub text_layer: Arc<dyn TextLayerReader>,
    pub sha256: Option<String>,
}

impl Source {
    /// A single `.pdf` input is rendered with pdftoppm and read through its
    /// text layer; anything else is a list of page images with no text layer.
    pub fn open(inputs: &[PathBuf], config: &PipelineConfig) -> Result<Self> {
        match inputs {
            [] => Err(UprightError::Config("no input files given".into())),
            [single] if is_pdf(single) => Self::open_pdf(single, config),
            paths => {
                if let Some(pdf) = paths.iter().find(|path| is_pdf(path)) {
                    return Err(UprightError::Config(format!(
                        "{} is a PDF; PDFs cannot be mixed with other inputs",
                        pdf.display()
                    )));
                }
                Self::open_images(paths)
            }
        }
    }

    fn open_pdf(path: &Path, config: &PipelineConfig) -> Result<Self> {
        let reader = PdfReader::open(path)?;
        let page_count = reader.page_count();
        let sha256 = hash_file(path).map_err(|err| UprightError::Open {
            path: path.display().to_string(),
            detail: err.to_string(),
        })?;
        info!(path = %path.display(), page_count, "PDF input opened");

        Ok(Self {
            label: path.display().to_string(),
            rasterizer: Arc::new(PdftoppmRasterizer::new(path, page_count, config.render_dpi)),
            text_layer: Arc::new(reader),
            sha256: Some(sha256),
        })
    }

    fn open_images(paths: &[PathBuf]) -> Result<Self> {
        if let Some(missing) = paths.iter().find(|path| !path.is_file()) {
            return Err(UprightError::Open {
                path: missing.display().to_string(),
                detail: "no such file".into(),
            });
        }
        let sha256 = match paths {
            [single] => Some(hash_file(single)?),
            _ => None,
        };
        let label = match paths {
            [single] => single.display().to_string(),
            [first, ..] => format!("{} (+{} more)", first.display(), paths.len() - 1),
            [] => String::new(),
        };
        info!(pages = paths.len(), "Image input opened");

        Ok(Self {
            label,
            rasterizer: Arc::new(ImageSetRasterizer::from_paths(paths)),
            text_layer: Arc::new(NoTextLayer),
            sha256,
        })
    }

    pub fn page_count(&self) -> usize {
        self.rasterizer.page_count()
    }

    pub fn begin_report(&self) -> RunReport {
        let mut report = RunReport::begin(self.label.clone(), self.page_count());
        report.source_sha256 = self.sha256.clone();
        report
    }
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// The OCR engine if it can be loaded; otherwise a probe that always reports
/// the engine as unavailable, so affected pages become UNREADABLE.
#[cfg(feature = "ocr")]
pub fn build_probe(config: &PipelineConfig) -> Arc<dyn OcrProbe> {
    use upright_document::OcrsProbe;
    use upright_document::UnavailableProbe;

    match OcrsProbe::from_model_dir(config.ocr_model_dir.as_deref()) {
        Ok(probe) => Arc::new(probe),
        Err(err) => {
            tracing::warn!(%err, "OCR engine unavailable; pages without a text layer will be UNREADABLE");
            Arc::new(UnavailableProbe::new(err.to_string()))
        }
    }
}

#[cfg(not(feature = "ocr"))]
pub fn build_probe(_config: &PipelineConfig) -> Arc<dyn OcrProbe> {
    tracing::warn!("Built without the `ocr` feature; pages without a text layer will be UNREADABLE");
    Arc::new(upright_document::UnavailableProbe::new(
        "built without the `ocr` feature",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdf_detection_ignores_case() {
        assert!(is_pdf(Path::new("scan.PDF")));
        assert!(is_pdf(Path::new("scan.pdf")));
        assert!(!is_pdf(Path::new("scan.png")));
    }

    #[test]
    fn pdfs_cannot_be_mixed_with_images() {
        let inputs = vec![PathBuf::from("a.png"), PathBuf::from("b.pdf")];
        let err = Source::open(&inputs, &PipelineConfig::default()).err().unwrap();
        assert!(matches!(err, UprightError::Config(_)));
    }

    #[test]
    fn missing_image_is_an_open_error() {
        let inputs = vec![PathBuf::from("/nonexistent/page.png")];
        let err = Source::open(&inputs, &PipelineConfig::default()).err().unwrap();
        assert!(matches!(err, UprightError::Open { .. }));
    }

    #[test]
    fn image_pages_keep_input_order() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<PathBuf> = (0..3)
            .map(|i| {
                let path = dir.path().join(format!("page-{i}.png"));
                image::RgbImage::new(4 + i, 4).save(&path).unwrap();
                path
            })
            .collect();
        let source = Source::open(&paths, &PipelineConfig::default()).unwrap();
        assert_eq!(source.page_count(), 3);
        assert!(source.sha256.is_none());
        let second = source.rasterizer.render(upright_core::PageIndex(1)).unwrap();
        assert_eq!(second.width(), 5);
        assert_eq!(source.begin_report().page_count, 3);
    }
}
