// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page buffers — the RGB page image produced by a rasteriser and the binary
// mask derived from it for orientation scoring.

use std::path::Path;

use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use tracing::{debug, instrument};
use upright_core::error::UprightError;

use super::processor::{self, Sampling};

/// A rasterised page: `height x width x 3` RGB pixels.
///
/// Immutable once produced; every transform returns a new `PageImage`.
#[derive(Debug, Clone, PartialEq)]
pub struct PageImage {
    pixels: RgbImage,
}

impl PageImage {
    /// Wrap an RGB buffer.
    pub fn from_rgb(pixels: RgbImage) -> Self {
        Self { pixels }
    }

    /// Convert any decoded image to RGB.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self {
            pixels: image.to_rgb8(),
        }
    }

    /// Decode a page from encoded bytes (PNG, JPEG, TIFF, ...).
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self, UprightError> {
        let image = image::load_from_memory(data).map_err(|err| {
            UprightError::ImageError(format!("failed to decode page image: {}", err))
        })?;
        debug!(width = image.width(), height = image.height(), "Page decoded");
        Ok(Self::from_dynamic(image))
    }

    /// Load a page from an image file.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self, UprightError> {
        let image = image::open(path.as_ref()).map_err(|err| {
            UprightError::ImageError(format!(
                "failed to open {}: {}",
                path.as_ref().display(),
                err
            ))
        })?;
        Ok(Self::from_dynamic(image))
    }

    /// Blank white page.
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            pixels: RgbImage::from_pixel(width, height, Rgb([255, 255, 255])),
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn as_rgb(&self) -> &RgbImage {
        &self.pixels
    }

    pub fn into_rgb(self) -> RgbImage {
        self.pixels
    }

    /// Luma conversion (ITU-R 601 weights, as `image` computes them).
    pub fn to_luma(&self) -> GrayImage {
        DynamicImage::ImageRgb8(self.pixels.clone()).to_luma8()
    }

    /// Rotate clockwise about the centre on the same canvas.
    ///
    /// Corners that leave the frame are lost and uncovered areas become
    /// white. Bilinear sampling keeps photographs and text smooth.
    pub fn rotated(&self, degrees: u16) -> Self {
        Self {
            pixels: processor::rotate_fixed(
                &self.pixels,
                degrees,
                Sampling::Bilinear,
                Rgb([255, 255, 255]),
            ),
        }
    }
}

/// Single-channel text-foreground mask with values in `{0, 1}`.
///
/// Same spatial dimensions as the page it came from. Never mutated in place.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryMask {
    pixels: GrayImage,
}

impl BinaryMask {
    /// Build a mask from any grayscale image: non-zero pixels are foreground.
    pub fn from_foreground(image: &GrayImage) -> Self {
        let pixels = GrayImage::from_fn(image.width(), image.height(), |x, y| {
            Luma([u8::from(image.get_pixel(x, y).0[0] > 0)])
        });
        Self { pixels }
    }

    /// Build a mask from a predicate over pixel coordinates.
    pub fn from_fn(width: u32, height: u32, mut foreground: impl FnMut(u32, u32) -> bool) -> Self {
        let pixels = GrayImage::from_fn(width, height, |x, y| Luma([u8::from(foreground(x, y))]));
        Self { pixels }
    }

    /// All-background mask.
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            pixels: GrayImage::new(width, height),
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn is_foreground(&self, x: u32, y: u32) -> bool {
        self.pixels.get_pixel(x, y).0[0] != 0
    }

    /// Number of foreground pixels.
    pub fn foreground_count(&self) -> u64 {
        self.pixels.as_raw().iter().map(|&v| v as u64).sum()
    }

    /// Foreground pixel count of each row, top to bottom.
    pub fn row_sums(&self) -> Vec<u64> {
        let width = self.pixels.width() as usize;
        if width == 0 {
            return vec![0; self.pixels.height() as usize];
        }
        self.pixels
            .as_raw()
            .chunks_exact(width)
            .map(|row| row.iter().map(|&v| v as u64).sum())
            .collect()
    }

    /// Rotate clockwise about the centre on the same canvas.
    ///
    /// Nearest-neighbour sampling keeps values in `{0, 1}`; content rotated
    /// out of the frame is dropped and uncovered pixels are background.
    pub fn rotated(&self, degrees: u16) -> Self {
        Self {
            pixels: processor::rotate_fixed(&self.pixels, degrees, Sampling::Nearest, Luma([0])),
        }
    }
}
