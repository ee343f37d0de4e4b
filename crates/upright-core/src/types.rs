// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the upright page pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{OcrFailureKind, Result, UprightError};

/// Zero-based position of a page in its source document.
///
/// Page order is the join key between orientation results, classification
/// results, and the reassembled output, so every per-page value carries one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageIndex(pub usize);

impl PageIndex {
    /// One-based page number, as shown to users.
    pub fn number(&self) -> usize {
        self.0 + 1
    }
}

impl std::fmt::Display for PageIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Unique identifier for a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// -- Orientation --------------------------------------------------------------

/// One scored angle from the orientation search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RotationCandidate {
    /// Clockwise rotation in whole degrees, `0..360`.
    pub angle: u16,
    /// Zebra score (variance of per-row foreground sums) at that angle.
    pub score: f64,
}

/// Estimated upright angle for one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrientationResult {
    pub page: PageIndex,
    /// Clockwise rotation in whole degrees, always `< 360`.
    pub angle: u16,
}

// -- Classification -----------------------------------------------------------

/// Readability tier of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PageClass {
    /// The page body carries an embedded text layer.
    MachineReadable,
    /// No text layer, but an OCR probe succeeded.
    OcrRecoverable,
    /// No text layer and OCR failed; needs manual handling.
    Unreadable,
}

impl PageClass {
    /// Numeric code used by downstream routing (0, 1, 2).
    pub fn code(&self) -> u8 {
        match self {
            Self::MachineReadable => 0,
            Self::OcrRecoverable => 1,
            Self::Unreadable => 2,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::MachineReadable => "MACHINE_READABLE",
            Self::OcrRecoverable => "OCR_RECOVERABLE",
            Self::Unreadable => "UNREADABLE",
        }
    }
}

impl std::fmt::Display for PageClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Classification outcome for one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub page: PageIndex,
    pub class: PageClass,
    /// Why the OCR probe failed, when the page ended up `Unreadable`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocr_failure: Option<OcrFailureKind>,
}

// -- Page geometry ------------------------------------------------------------

/// Page size in PDF user-space units (points), origin at the bottom-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
}

impl PageGeometry {
    /// US Letter, used when a page declares no MediaBox.
    pub const LETTER: Self = Self {
        width: 612.0,
        height: 792.0,
    };

    /// Full-page viewport.
    pub fn full(&self) -> Viewport {
        Viewport {
            x0: 0.0,
            y0: 0.0,
            x1: self.width,
            y1: self.height,
        }
    }

    /// Viewport covering the page body between a header band at the top and
    /// a footer band at the bottom. Empty if the bands overlap.
    pub fn body(&self, header_height: f32, footer_height: f32) -> Viewport {
        let y0 = footer_height.max(0.0).min(self.height);
        let y1 = (self.height - header_height.max(0.0)).max(y0);
        Viewport {
            x0: 0.0,
            y0,
            x1: self.width,
            y1,
        }
    }
}

/// A scoped sub-rectangle of a page, used for a single read.
///
/// Coordinates are PDF user space (y grows upwards). The rectangle is
/// half-open on the top edge so that adjacent viewports do not overlap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Viewport {
    pub fn is_empty(&self) -> bool {
        self.x1 <= self.x0 || self.y1 <= self.y0
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x0 && x < self.x1 && y >= self.y0 && y < self.y1
    }
}

// -- Ordered accumulation -----------------------------------------------------

/// Output accumulator written by page index rather than completion order.
///
/// Parallel workers commit into their own slot; readers see results in page
/// order no matter which worker finished first.
#[derive(Debug, Clone)]
pub struct PageSlots<T> {
    slots: Vec<Option<T>>,
}

impl<T> PageSlots<T> {
    pub fn new(page_count: usize) -> Self {
        Self {
            slots: (0..page_count).map(|_| None).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Store the value for `page`, replacing nothing: a page commits once.
    ///
    /// Returns `false` if the index is out of range or already committed.
    pub fn commit(&mut self, page: PageIndex, value: T) -> bool {
        match self.slots.get_mut(page.0) {
            Some(slot) if slot.is_none() => {
                *slot = Some(value);
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, page: PageIndex) -> Option<&T> {
        self.slots.get(page.0).and_then(Option::as_ref)
    }

    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    /// Indices that have not been committed yet, in page order.
    pub fn missing(&self) -> Vec<PageIndex> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_none())
            .map(|(index, _)| PageIndex(index))
            .collect()
    }

    /// Committed values in page order, skipping gaps.
    pub fn committed(&self) -> impl Iterator<Item = (PageIndex, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|value| (PageIndex(index), value)))
    }

    /// Every slot's value, in page order. Fails if any page is missing.
    pub fn into_complete(self) -> Result<Vec<T>> {
        let missing = self.missing();
        if !missing.is_empty() {
            return Err(UprightError::IncompletePages { missing });
        }
        Ok(self.slots.into_iter().flatten().collect())
    }
}

// -- Run report ---------------------------------------------------------------

/// Per-page line of a [`RunReport`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageReport {
    pub page: PageIndex,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angle: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<PageClass>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_code: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocr_failure: Option<OcrFailureKind>,
}

/// Summary of one pipeline run, emitted as JSON by the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub source: String,
    /// SHA-256 of the source bytes (hex), when the source is a single file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_sha256: Option<String>,
    pub page_count: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Ordered angles; present only when orientation ran to completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angles: Option<Vec<u16>>,
    /// Ordered classes; present only when classification ran to completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classes: Option<Vec<PageClass>>,
    pub pages: Vec<PageReport>,
    pub cancelled: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_pages: Vec<PageIndex>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl RunReport {
    /// Start a report for `page_count` pages read from `source`.
    pub fn begin(source: impl Into<String>, page_count: usize) -> Self {
        let now = Utc::now();
        Self {
            run_id: RunId::new(),
            source: source.into(),
            source_sha256: None,
            page_count,
            started_at: now,
            finished_at: now,
            angles: None,
            classes: None,
            pages: (0..page_count)
                .map(|index| PageReport {
                    page: PageIndex(index),
                    angle: None,
                    class: None,
                    class_code: None,
                    ocr_failure: None,
                })
                .collect(),
            cancelled: false,
            missing_pages: Vec::new(),
            output: None,
        }
    }

    /// Fold orientation results into the report.
    pub fn record_orientation(&mut self, slots: &PageSlots<OrientationResult>) {
        for (page, result) in slots.committed() {
            if let Some(line) = self.pages.get_mut(page.0) {
                line.angle = Some(result.angle);
            }
        }
        if slots.is_complete() {
            self.angles = Some(slots.committed().map(|(_, r)| r.angle).collect());
        }
        self.note_missing(slots.missing());
    }

    /// Fold classification results into the report.
    pub fn record_classification(&mut self, slots: &PageSlots<ClassificationResult>) {
        for (page, result) in slots.committed() {
            if let Some(line) = self.pages.get_mut(page.0) {
                line.class = Some(result.class);
                line.class_code = Some(result.class.code());
                line.ocr_failure = result.ocr_failure;
            }
        }
        if slots.is_complete() {
            self.classes = Some(slots.committed().map(|(_, r)| r.class).collect());
        }
        self.note_missing(slots.missing());
    }

    /// Stamp the finish time.
    pub fn finish(&mut self) {
        self.finished_at = Utc::now();
    }

    fn note_missing(&mut self, missing: Vec<PageIndex>) {
        for page in missing {
            if !self.missing_pages.contains(&page) {
                self.missing_pages.push(page);
            }
        }
        self.missing_pages.sort();
    }
}
