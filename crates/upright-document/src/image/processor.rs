// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Fixed-canvas rotation shared by the orientation search and the page
// normaliser. Both must use the same convention, so it lives in one place.

use image::{ImageBuffer, Pixel, imageops};
use imageproc::geometric_transformations::{self, Interpolation};

/// Pixel sampling used when an angle is not a lossless quarter turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sampling {
    /// Keeps values exact; used for binary masks.
    Nearest,
    /// Smooth output; used for page images.
    Bilinear,
}

impl From<Sampling> for Interpolation {
    fn from(sampling: Sampling) -> Self {
        match sampling {
            Sampling::Nearest => Interpolation::Nearest,
            Sampling::Bilinear => Interpolation::Bilinear,
        }
    }
}

/// Rotate `image` clockwise by `degrees` about its centre.
///
/// The output has the input's dimensions: content rotated outside the frame
/// is dropped and uncovered pixels are filled with `background`. Angles are
/// taken modulo 360. 0 and 180 are exact pixel permutations, as are 90 and
/// 270 on square canvases; everything else is resampled.
pub fn rotate_fixed<P>(
    image: &ImageBuffer<P, Vec<u8>>,
    degrees: u16,
    sampling: Sampling,
    background: P,
) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8> + Send + Sync + 'static,
{
    let normalised = degrees % 360;
    let square = image.width() == image.height();

    match normalised {
        0 => image.clone(),
        180 => imageops::rotate180(image),
        90 if square => imageops::rotate90(image),
        270 if square => imageops::rotate270(image),
        _ => {
            let radians = (normalised as f32).to_radians();
            geometric_transformations::rotate_about_center(
                image,
                radians,
                sampling.into(),
                background,
            )
        }
    }
}
