// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Orientation estimation — exhaustive per-degree search scored by the
// "zebra" row-periodicity metric.
//
// A page whose text lines run horizontally has rows that alternate between
// dense ink and empty gaps, so the per-row foreground sums vary a lot. The
// estimator rotates the mask through every whole degree and keeps the angle
// whose row profile has the greatest variance.

use rayon::prelude::*;
use tracing::{debug, instrument};
use upright_core::RotationCandidate;

use crate::image::page::BinaryMask;

/// Number of candidate angles (whole degrees).
pub const CANDIDATE_COUNT: u16 = 360;

/// Searches candidate rotations of a [`BinaryMask`] for the upright angle.
///
/// Candidates are scored in parallel on the current rayon pool, then reduced
/// sequentially in increasing angle order with a strict greater-than, so the
/// lowest angle wins every tie regardless of scheduling.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrientationEstimator;

impl OrientationEstimator {
    pub fn new() -> Self {
        Self
    }

    /// Clockwise rotation in `0..360` that makes the mask's text horizontal.
    ///
    /// Never fails. A mask without foreground scores zero at every angle and
    /// yields 0.
    #[instrument(skip_all, fields(width = mask.width(), height = mask.height()))]
    pub fn estimate(&self, mask: &BinaryMask) -> u16 {
        if mask.foreground_count() == 0 {
            debug!("Mask has no foreground; keeping angle 0");
            return 0;
        }
        let best = select_best(&self.score_all(mask));
        debug!(angle = best.angle, score = best.score, "Orientation estimated");
        best.angle
    }

    /// Score every candidate angle, in increasing angle order.
    ///
    /// Each candidate is rotated from the original mask; rotations are not
    /// chained, since resampling error would accumulate.
    pub fn score_all(&self, mask: &BinaryMask) -> Vec<RotationCandidate> {
        (0..CANDIDATE_COUNT)
            .into_par_iter()
            .map(|angle| RotationCandidate {
                angle,
                score: zebra_score(&mask.rotated(angle)),
            })
            .collect()
    }
}

/// Population variance of the per-row foreground sums.
///
/// Sums are accumulated as exact integers so that two masks with the same
/// multiset of row sums score bit-identically, whatever the row order.
pub fn zebra_score(mask: &BinaryMask) -> f64 {
    let rows = mask.row_sums();
    let n = rows.len() as u128;
    if n == 0 {
        return 0.0;
    }
    let sum: u128 = rows.iter().map(|&r| r as u128).sum();
    let sum_sq: u128 = rows.iter().map(|&r| (r as u128) * (r as u128)).sum();
    // n * sum_sq >= sum^2 by Cauchy-Schwarz.
    let numerator = n * sum_sq - sum * sum;
    numerator as f64 / (n * n) as f64
}

/// Pick the highest-scoring candidate, keeping the earliest on ties.
///
/// Candidates are visited in the order given (increasing angle from
/// [`OrientationEstimator::score_all`]). An empty slice or all-equal scores
/// yields the first angle, or 0.
pub fn select_best(candidates: &[RotationCandidate]) -> RotationCandidate {
    let mut best: Option<RotationCandidate> = None;
    for candidate in candidates {
        match best {
            Some(current) if candidate.score > current.score => best = Some(*candidate),
            None => best = Some(*candidate),
            _ => {}
        }
    }
    best.unwrap_or(RotationCandidate {
        angle: 0,
        score: 0.0,
    })
}
