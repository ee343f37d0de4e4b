// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanning pipeline — text-line mask preparation, orientation search,
// rotation normalisation, and optical character recognition (OCR).

pub mod normalize;
pub mod orientation;
pub mod preprocess;

#[cfg(feature = "ocr")]
pub mod ocr;

pub use normalize::{NormalizedPages, RotationNormalizer};
pub use orientation::OrientationEstimator;
pub use preprocess::Preprocessor;

#[cfg(feature = "ocr")]
pub use ocr::OcrsProbe;
