// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use chrono::{DateTime, Utc};
use insight_core::{EngineError, Severity};
use serde::{Deserialize, Serialize};

/// Divergence above which drift is reported at all.
pub const DRIFT_MEDIUM_THRESHOLD: f64 = 0.1;
/// Divergence above which drift is reported as high severity.
pub const DRIFT_HIGH_THRESHOLD: f64 = 0.3;

/// A detected distribution shift between two prediction samples.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DriftEvent {
    pub model: String,
    pub statistic: f64,
    pub severity: Severity,
    pub reference_size: usize,
    pub current_size: usize,
    pub at: DateTime<Utc>,
}

/// Two-sample Kolmogorov–Smirnov statistic: the maximum gap between the
/// empirical cumulative distributions.
pub fn ks_statistic(reference: &[f64], current: &[f64]) -> Result<f64, EngineError> {
    if reference.is_empty() || current.is_empty() {
        return Err(EngineError::invalid_input(
            "KS statistic requires two non-empty samples",
        ));
    }
    for (label, sample) in [("reference", reference), ("current", current)] {
        if sample.iter().any(|v| !v.is_finite()) {
            return Err(EngineError::invalid_input(format!(
                "KS {label} sample contains non-finite values"
            )));
        }
    }

    let mut a = reference.to_vec();
    let mut b = current.to_vec();
    a.sort_by(|x, y| x.total_cmp(y));
    b.sort_by(|x, y| x.total_cmp(y));

    let n_a = a.len() as f64;
    let n_b = b.len() as f64;
    let mut i = 0usize;
    let mut j = 0usize;
    let mut max_gap = 0.0f64;
    while i < a.len() && j < b.len() {
        let x = a[i];
        let y = b[j];
        if x < y {
            i += 1;
        } else if y < x {
            j += 1;
        } else {
            // Ties advance both CDFs together.
            while i < a.len() && a[i] == x {
                i += 1;
            }
            while j < b.len() && b[j] == x {
                j += 1;
            }
        }
        let gap = (i as f64 / n_a - j as f64 / n_b).abs();
        max_gap = max_gap.max(gap);
    }
    Ok(max_gap)
}

/// Maps a KS statistic onto the drift severity tiers; below the medium
/// threshold no drift is reported.
pub fn drift_severity(statistic: f64) -> Option<Severity> {
    if statistic >= DRIFT_HIGH_THRESHOLD {
        Some(Severity::High)
    } else if statistic >= DRIFT_MEDIUM_THRESHOLD {
        Some(Severity::Medium)
    } else {
        None
    }
}
