// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use insight_core::Severity;
use serde::{Deserialize, Serialize};

/// Closed set of detection algorithms; dispatch is exhaustive at compile
/// time rather than falling back on a string tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyAlgorithm {
    IsolationForest,
    LocalOutlierFactor,
    ZScore,
}

impl AnomalyAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IsolationForest => "isolation_forest",
            Self::LocalOutlierFactor => "local_outlier_factor",
            Self::ZScore => "z_score",
        }
    }
}

/// Why an entity was flagged.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyType {
    /// Flagged by the numeric algorithm that ran.
    Statistical,
    SpamTrapPattern,
    DisposableDomain,
    BotPattern,
    NonAsciiContent,
}

impl AnomalyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Statistical => "statistical",
            Self::SpamTrapPattern => "spam_trap_pattern",
            Self::DisposableDomain => "disposable_domain",
            Self::BotPattern => "bot_pattern",
            Self::NonAsciiContent => "non_ascii_content",
        }
    }
}

/// One flagged entity and why.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRecord {
    pub entity_id: String,
    pub score: f64,
    pub confidence: f64,
    pub types: Vec<AnomalyType>,
    pub severity: Severity,
    pub reasons: Vec<String>,
}

/// Output of one detection run; not retained by the engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnomalyReport {
    pub algorithm: AnomalyAlgorithm,
    pub evaluated: usize,
    /// Flagged entities, sorted descending by score.
    pub records: Vec<AnomalyRecord>,
}

#[cfg(test)]
mod tests {
    use super::{AnomalyAlgorithm, AnomalyType};

    #[test]
    fn labels_are_stable_snake_case() {
        assert_eq!(AnomalyAlgorithm::IsolationForest.as_str(), "isolation_forest");
        assert_eq!(AnomalyType::SpamTrapPattern.as_str(), "spam_trap_pattern");
        let encoded = serde_json::to_value(AnomalyAlgorithm::ZScore).unwrap();
        assert_eq!(encoded, serde_json::json!("z_score"));
    }
}
