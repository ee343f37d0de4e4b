// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Text-line mask preparation — grayscale, Otsu binarisation, edge
// extraction, and a morphological close that fuses glyph strokes into line
// segments for orientation scoring.

use image::GrayImage;
use imageproc::contrast::{ThresholdType, otsu_level, threshold};
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::morphology::{dilate, erode};
use tracing::{debug, instrument};
use upright_core::PreprocessConfig;

use crate::image::page::{BinaryMask, PageImage};

/// Turns a page image into a [`BinaryMask`] that emphasises text lines.
///
/// Each step is a pure transform; the page is only read.
#[derive(Debug, Clone, Default)]
pub struct Preprocessor {
    config: PreprocessConfig,
}

impl Preprocessor {
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    /// Run the full pipeline:
    ///
    /// 1. grayscale conversion
    /// 2. Otsu threshold, dark pixels become foreground
    /// 3. Canny edges (thin strokes sharpen the row profile)
    /// 4. one dilation, then one or more erosions, 3x3 element
    ///
    /// Always produces a mask. A blank page gives an all-zero mask.
    #[instrument(skip_all, fields(width = page.width(), height = page.height()))]
    pub fn prepare(&self, page: &PageImage) -> BinaryMask {
        let gray = page.to_luma();
        let foreground = dark_foreground(&gray);

        let edges = canny(&foreground, self.config.canny_low, self.config.canny_high);

        let mut closed = edges;
        for _ in 0..self.config.dilate_iterations {
            closed = dilate(&closed, Norm::LInf, 1);
        }
        for _ in 0..self.config.erode_iterations.max(1) {
            closed = erode(&closed, Norm::LInf, 1);
        }

        let mask = BinaryMask::from_foreground(&closed);
        debug!(foreground = mask.foreground_count(), "Text-line mask prepared");
        mask
    }
}

/// Inverse Otsu binarisation: pixels at or below the Otsu level become 255.
///
/// Text is dark on a light page, so the darker class is the mask. A uniform
/// page has level 0 and, unless it is black, no foreground.
fn dark_foreground(gray: &GrayImage) -> GrayImage {
    let level = otsu_level(gray);
    debug!(level, "Otsu level");
    threshold(gray, level, ThresholdType::BinaryInverted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb, RgbImage};

    /// White page with rows of short dark strokes, like lines of glyphs.
    fn text_like_page(width: u32, height: u32) -> PageImage {
        let img = RgbImage::from_fn(width, height, |x, y| {
            let in_line = (20..height - 20).contains(&y) && (y % 20) < 8;
            let in_glyph = (10..width - 10).contains(&x) && (x % 6) < 3;
            if in_line && in_glyph {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        });
        PageImage::from_rgb(img)
    }

    #[test]
    fn dark_class_becomes_foreground() {
        let gray = GrayImage::from_fn(10, 10, |x, _| Luma([if x < 5 { 40 } else { 210 }]));
        let foreground = dark_foreground(&gray);
        assert_eq!(foreground.get_pixel(0, 0).0[0], 255);
        assert_eq!(foreground.get_pixel(4, 9).0[0], 255);
        assert_eq!(foreground.get_pixel(5, 0).0[0], 0);
        assert_eq!(foreground.get_pixel(9, 9).0[0], 0);
    }

    #[test]
    fn uniform_white_page_has_no_foreground() {
        let gray = GrayImage::from_pixel(8, 8, Luma([255]));
        assert!(dark_foreground(&gray).pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn blank_page_gives_empty_mask() {
        let mask = Preprocessor::default().prepare(&PageImage::blank(64, 48));
        assert_eq!((mask.width(), mask.height()), (64, 48));
        assert_eq!(mask.foreground_count(), 0);
    }

    #[test]
    fn mask_keeps_page_dimensions() {
        let page = text_like_page(120, 100);
        let mask = Preprocessor::default().prepare(&page);
        assert_eq!((mask.width(), mask.height()), (120, 100));
    }

    #[test]
    fn text_rows_carry_more_foreground_than_gaps() {
        let page = text_like_page(160, 160);
        let mask = Preprocessor::default().prepare(&page);
        let rows = mask.row_sums();
        assert!(mask.foreground_count() > 0, "text page should leave foreground");

        // Text lines span y % 20 in 0..8; their edges sit on and just
        // outside that band. Gap centres (y % 20 in 12..16) carry no ink.
        let band = |k: usize, offsets: std::ops::Range<usize>| -> u64 {
            offsets.map(|o| rows[k * 20 + o]).sum()
        };
        let line_total: u64 = (1..7).map(|k| band(k, 0..10)).sum();
        let gap_total: u64 = (1..7).map(|k| band(k, 12..16)).sum();
        assert!(
            line_total > gap_total,
            "line rows ({line_total}) should outweigh gap rows ({gap_total})"
        );
    }
}
