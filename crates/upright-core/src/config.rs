// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pipeline configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, UprightError};

/// Constants for turning a page image into a text-line mask.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Canny hysteresis low threshold.
    pub canny_low: f32,
    /// Canny hysteresis high threshold.
    pub canny_high: f32,
    /// Dilation passes with a 3x3 element.
    pub dilate_iterations: u8,
    /// Erosion passes with a 3x3 element (at least one). More than one
    /// erases single-pixel edge lines on sparse pages.
    pub erode_iterations: u8,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            canny_low: 50.0,
            canny_high: 150.0,
            dilate_iterations: 1,
            erode_iterations: 1,
        }
    }
}

/// Settings for one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Height of the header band ignored by the text-layer check (points).
    pub header_height: f32,
    /// Height of the footer band ignored by the text-layer check (points).
    pub footer_height: f32,
    /// Rasterisation resolution. 72 keeps one pixel per PDF point.
    pub render_dpi: u32,
    pub preprocess: PreprocessConfig,
    /// Orientation worker threads; 0 uses one per CPU core.
    pub estimator_workers: usize,
    /// Pages classified concurrently (bounds concurrent OCR probes).
    pub classifier_workers: usize,
    /// Per-page OCR probe timeout in seconds.
    pub ocr_timeout_secs: u64,
    /// Treat an OCR result with no visible characters as a failure.
    pub require_ocr_text: bool,
    /// Directory holding the OCR models; `None` uses the engine default.
    pub ocr_model_dir: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            header_height: 100.0,
            footer_height: 100.0,
            render_dpi: 72,
            preprocess: PreprocessConfig::default(),
            estimator_workers: 0,
            classifier_workers: 2,
            ocr_timeout_secs: 30,
            require_ocr_text: false,
            ocr_model_dir: None,
        }
    }
}

impl PipelineConfig {
    /// Load a config from a JSON file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the config as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        let band_ok = |h: f32| h.is_finite() && h >= 0.0;
        if !band_ok(self.header_height) || !band_ok(self.footer_height) {
            return Err(UprightError::Config(
                "header and footer heights must be non-negative".into(),
            ));
        }
        if self.render_dpi == 0 {
            return Err(UprightError::Config("render_dpi must be positive".into()));
        }
        if self.preprocess.erode_iterations == 0 {
            return Err(UprightError::Config(
                "at least one erosion pass is required".into(),
            ));
        }
        if self.classifier_workers == 0 {
            return Err(UprightError::Config(
                "classifier_workers must be at least 1".into(),
            ));
        }
        if self.ocr_timeout_secs == 0 {
            return Err(UprightError::Config(
                "ocr_timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
