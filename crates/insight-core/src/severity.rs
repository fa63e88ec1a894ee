// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

const CRITICAL_CUTOFF: f64 = 0.9;
const HIGH_CUTOFF: f64 = 0.7;
const MEDIUM_CUTOFF: f64 = 0.5;

/// Severity tier shared by anomaly reports and drift events.
#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Maps a unit-interval score onto the fixed severity cutoffs.
    ///
    /// Non-finite scores fall to `Low`; the caller is expected to have
    /// clamped the score already.
    pub fn from_score(score: f64) -> Self {
        if !score.is_finite() {
            return Self::Low;
        }
        if score >= CRITICAL_CUTOFF {
            Self::Critical
        } else if score >= HIGH_CUTOFF {
            Self::High
        } else if score >= MEDIUM_CUTOFF {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}
