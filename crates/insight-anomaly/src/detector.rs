// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::isolation::IsolationForest;
use crate::lof::lof_scores;
use crate::patterns::pattern_checks;
use crate::report::{AnomalyAlgorithm, AnomalyRecord, AnomalyReport, AnomalyType};
use crate::zscore::z_score_findings;
use insight_core::{clamp_unit, mean, EngineError, Record, Severity};
use insight_features::{email_features, FeatureSet, FeatureVector};
use tracing::debug;

const DEFAULT_TREE_COUNT: usize = 100;
const DEFAULT_NEIGHBORS: usize = 5;
const DEFAULT_SENSITIVITY: f64 = 0.5;
const DEFAULT_SEED: u64 = 0x1757;

/// Score at which an entity is included in the report even without a
/// pattern hit.
const FLAG_CUTOFF: f64 = 0.5;

#[derive(Clone, Debug)]
pub struct AnomalyConfig {
    pub feature_set: FeatureSet,
    /// Scales the statistical threshold: higher sensitivity flags more.
    pub sensitivity: f64,
    pub tree_count: usize,
    pub neighbors: usize,
    pub seed: u64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            feature_set: email_features(),
            sensitivity: DEFAULT_SENSITIVITY,
            tree_count: DEFAULT_TREE_COUNT,
            neighbors: DEFAULT_NEIGHBORS,
            seed: DEFAULT_SEED,
        }
    }
}

/// Entry point shared by the three interchangeable algorithms.
///
/// Whatever algorithm runs, the fixed pattern checks always execute and
/// merge their labels and reasons into the flagged entities.
pub struct AnomalyDetector {
    config: AnomalyConfig,
}

impl AnomalyDetector {
    pub fn new(config: AnomalyConfig) -> Result<Self, EngineError> {
        if !(0.0..=1.0).contains(&config.sensitivity) || !config.sensitivity.is_finite() {
            return Err(EngineError::invalid_input(format!(
                "sensitivity must be within [0, 1], got {}",
                config.sensitivity
            )));
        }
        if config.tree_count == 0 {
            return Err(EngineError::invalid_input("tree_count must be >= 1"));
        }
        if config.neighbors == 0 {
            return Err(EngineError::invalid_input("neighbors must be >= 1"));
        }
        Ok(Self { config })
    }

    pub fn detect(
        &self,
        records: &[Record],
        algorithm: AnomalyAlgorithm,
    ) -> Result<AnomalyReport, EngineError> {
        let vectors: Vec<FeatureVector> = records
            .iter()
            .map(|r| self.config.feature_set.extract(r))
            .collect();
        let (matrix, feature_names) = build_matrix(&self.config.feature_set, &vectors);

        let mut scores = match algorithm {
            AnomalyAlgorithm::IsolationForest => {
                let forest =
                    IsolationForest::fit(&matrix, self.config.tree_count, self.config.seed);
                (0..matrix.len())
                    .map(|row| (forest.score(&matrix, row), vec![]))
                    .collect::<Vec<(f64, Vec<String>)>>()
            }
            AnomalyAlgorithm::LocalOutlierFactor => lof_scores(&matrix, self.config.neighbors)
                .into_iter()
                .map(|score| (score, vec![]))
                .collect(),
            AnomalyAlgorithm::ZScore => z_score_findings(&matrix, self.config.sensitivity)
                .into_iter()
                .map(|finding| {
                    let reasons = finding
                        .exceeded
                        .iter()
                        .map(|(feature, z)| {
                            format!(
                                "feature {} deviates {z:.1} sigma from the batch",
                                feature_names
                                    .get(*feature)
                                    .map(String::as_str)
                                    .unwrap_or("?")
                            )
                        })
                        .collect();
                    (finding.score, reasons)
                })
                .collect(),
        };

        let mut flagged = Vec::new();
        for (index, record) in records.iter().enumerate() {
            let (algo_score, mut reasons) = std::mem::take(&mut scores[index]);
            let mut score = clamp_unit(algo_score);
            let mut types = Vec::new();
            if score >= FLAG_CUTOFF {
                types.push(AnomalyType::Statistical);
                if reasons.is_empty() {
                    reasons.push(format!(
                        "{} score {score:.2} above threshold",
                        algorithm.as_str()
                    ));
                }
            }

            let hits = pattern_checks(record);
            let pattern_count = hits.len();
            for hit in hits {
                score = score.max(hit.base_score);
                if !types.contains(&hit.anomaly_type) {
                    types.push(hit.anomaly_type);
                }
                reasons.push(hit.reason);
            }

            if types.is_empty() {
                continue;
            }

            let score = clamp_unit(score);
            let algo_bonus = if algo_score >= FLAG_CUTOFF { 0.2 } else { 0.0 };
            let confidence = clamp_unit(0.5 + algo_bonus + 0.15 * pattern_count as f64);
            flagged.push(AnomalyRecord {
                entity_id: record.id.clone(),
                score,
                confidence,
                types,
                severity: Severity::from_score(score),
                reasons,
            });
        }

        flagged.sort_by(|a, b| b.score.total_cmp(&a.score));
        debug!(
            algorithm = algorithm.as_str(),
            evaluated = records.len(),
            flagged = flagged.len(),
            "anomaly detection run complete"
        );
        Ok(AnomalyReport {
            algorithm,
            evaluated: records.len(),
            records: flagged,
        })
    }
}

/// Aligns sparse feature vectors into a dense matrix; holes are filled with
/// the feature's batch mean so distances stay defined.
fn build_matrix(set: &FeatureSet, vectors: &[FeatureVector]) -> (Vec<Vec<f64>>, Vec<String>) {
    let names: Vec<String> = set.features().iter().map(|f| f.name.clone()).collect();
    let fills: Vec<f64> = names
        .iter()
        .map(|name| {
            let present: Vec<f64> = vectors.iter().filter_map(|v| v.get(name)).collect();
            mean(&present).unwrap_or(0.0)
        })
        .collect();

    let matrix = vectors
        .iter()
        .map(|vector| {
            names
                .iter()
                .zip(&fills)
                .map(|(name, fill)| vector.get(name).unwrap_or(*fill))
                .collect()
        })
        .collect();
    (matrix, names)
}
