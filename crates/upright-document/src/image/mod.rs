// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image module — page and mask buffers and fixed-canvas rotation.

pub mod page;
pub mod processor;

pub use page::{BinaryMask, PageImage};
