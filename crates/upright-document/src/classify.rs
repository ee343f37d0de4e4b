// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page classification — decide whether a page's body is machine-readable,
// recoverable through OCR, or unreadable.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument, warn};
use upright_core::error::OcrFailure;
use upright_core::{ClassificationResult, PageClass, PageIndex, PipelineConfig};

use crate::image::page::PageImage;
use crate::traits::{OcrProbe, TextLayerReader};

/// One page handed to the classifier.
///
/// The image is shared so the OCR probe can run on a blocking thread without
/// copying the buffer.
#[derive(Debug, Clone)]
pub struct ClassifierPage {
    pub index: PageIndex,
    pub image: Arc<PageImage>,
}

impl ClassifierPage {
    pub fn new(index: PageIndex, image: PageImage) -> Self {
        Self {
            index,
            image: Arc::new(image),
        }
    }
}

/// Three-tier readability classifier.
///
/// Decision order, first match wins:
///
/// 1. the text layer inside the body viewport (page minus header and footer
///    bands) has non-whitespace text: `MachineReadable`, OCR is not run;
/// 2. the OCR probe succeeds within the timeout: `OcrRecoverable`;
/// 3. otherwise `Unreadable`.
///
/// Every page resolves in a single pass; nothing is retried.
#[derive(Clone)]
pub struct PageClassifier {
    text_layer: Arc<dyn TextLayerReader>,
    probe: Arc<dyn OcrProbe>,
    header_height: f32,
    footer_height: f32,
    ocr_timeout: Duration,
    require_ocr_text: bool,
}

impl PageClassifier {
    pub fn new(
        text_layer: Arc<dyn TextLayerReader>,
        probe: Arc<dyn OcrProbe>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            text_layer,
            probe,
            header_height: config.header_height,
            footer_height: config.footer_height,
            ocr_timeout: Duration::from_secs(config.ocr_timeout_secs),
            require_ocr_text: config.require_ocr_text,
        }
    }

    /// Override the per-page OCR timeout.
    pub fn with_ocr_timeout(mut self, timeout: Duration) -> Self {
        self.ocr_timeout = timeout;
        self
    }

    #[instrument(skip_all, fields(page = %page.index))]
    pub async fn classify(&self, page: &ClassifierPage) -> ClassificationResult {
        if self.has_body_text(page.index) {
            debug!("Body text layer present");
            return ClassificationResult {
                page: page.index,
                class: PageClass::MachineReadable,
                ocr_failure: None,
            };
        }

        match self.probe(page).await {
            Ok(()) => {
                debug!("OCR probe succeeded");
                ClassificationResult {
                    page: page.index,
                    class: PageClass::OcrRecoverable,
                    ocr_failure: None,
                }
            }
            Err(failure) => {
                warn!(kind = ?failure.kind(), %failure, "OCR probe failed; page is unreadable");
                ClassificationResult {
                    page: page.index,
                    class: PageClass::Unreadable,
                    ocr_failure: Some(failure.kind()),
                }
            }
        }
    }

    /// Whether the body viewport carries any visible text.
    ///
    /// A failed read counts as no text: the OCR probe decides instead.
    fn has_body_text(&self, page: PageIndex) -> bool {
        let geometry = match self.text_layer.geometry(page) {
            Ok(geometry) => geometry,
            Err(err) => {
                warn!(%err, "Cannot read page geometry; treating text layer as empty");
                return false;
            }
        };
        // Transient view; the page itself is never cropped.
        let body = geometry.body(self.header_height, self.footer_height);
        if body.is_empty() {
            return false;
        }
        match self.text_layer.read_text(page, &body) {
            Ok(text) => !text.trim().is_empty(),
            Err(err) => {
                warn!(%err, "Cannot read text layer; treating it as empty");
                false
            }
        }
    }

    /// Run the OCR probe on the full page under the timeout.
    ///
    /// On timeout the blocking thread is abandoned, not interrupted; its
    /// result is discarded when it eventually returns.
    async fn probe(&self, page: &ClassifierPage) -> Result<(), OcrFailure> {
        let probe = Arc::clone(&self.probe);
        let image = Arc::clone(&page.image);
        let task = tokio::task::spawn_blocking(move || probe.recognize(&image));

        let text = match tokio::time::timeout(self.ocr_timeout, task).await {
            Err(_) => {
                return Err(OcrFailure::Timeout {
                    seconds: self.ocr_timeout.as_secs(),
                });
            }
            Ok(Err(join_err)) => {
                return Err(OcrFailure::RecognitionFailed(format!(
                    "OCR task aborted: {}",
                    join_err
                )));
            }
            Ok(Ok(result)) => result?,
        };

        if self.require_ocr_text && text.trim().is_empty() {
            return Err(OcrFailure::RecognitionFailed("no text recognised".into()));
        }
        Ok(())
    }
}
