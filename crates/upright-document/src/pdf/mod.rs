// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module — text-layer reading, page rasterising, and upright document
// output.

pub mod raster;
pub mod reader;
pub mod writer;

pub use raster::{ImageSetRasterizer, PdftoppmRasterizer};
pub use reader::PdfReader;
pub use writer::PdfWriter;
