// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::defs::{FeatureKind, FeatureSet};
use crate::extract::FeatureVector;
use insight_core::{mean, median, population_stddev, EngineError, Record};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const DEFAULT_OUTLIER_Z_THRESHOLD: f64 = 3.0;

/// Blend weight for mixup copies. Kept close to 1.0 so augmented rows stay
/// near-copies of the source record; the full convex-combination behavior is
/// a known limitation carried over from the original contract.
const MIXUP_LAMBDA: f64 = 0.95;

/// Strategy for features absent from an extracted vector.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingValuePolicy {
    /// Fill with the batch mean of the feature.
    Mean,
    /// Fill with the batch median of the feature.
    Median,
    /// Drop any record missing a defined feature.
    Drop,
    /// Fill with a fixed constant.
    Constant(f64),
}

/// Optional synthetic augmentation applied after cleaning.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Augmentation {
    /// Additive uniform noise on numeric features.
    Noise { sigma: f64, copies: usize, seed: u64 },
    /// Convex combination of record pairs.
    Mixup { copies: usize, seed: u64 },
}

#[derive(Clone, Debug, PartialEq)]
pub struct BatchConfig {
    pub missing: MissingValuePolicy,
    pub outlier_z_threshold: f64,
    pub normalize: bool,
    pub augmentation: Option<Augmentation>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            missing: MissingValuePolicy::Mean,
            outlier_z_threshold: DEFAULT_OUTLIER_Z_THRESHOLD,
            normalize: true,
            augmentation: None,
        }
    }
}

/// Counts for every reduction the batch pass applied.
///
/// Callers must inspect these: a dropped record or rejected outlier is
/// otherwise invisible to downstream models.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub records_in: usize,
    pub records_out: usize,
    pub values_imputed: usize,
    pub records_dropped_missing: usize,
    pub outliers_rejected: usize,
    pub non_finite_repaired: usize,
    pub augmented_added: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ProcessedBatch {
    pub vectors: Vec<FeatureVector>,
    pub report: BatchReport,
}

/// Extraction plus cleaning for a whole batch: imputation, z-score outlier
/// rejection against the batch's own statistics, per-feature min-max
/// normalization, and optional augmentation.
#[derive(Clone, Debug)]
pub struct BatchProcessor {
    set: FeatureSet,
    config: BatchConfig,
}

impl BatchProcessor {
    pub fn new(set: FeatureSet, config: BatchConfig) -> Result<Self, EngineError> {
        if !config.outlier_z_threshold.is_finite() || config.outlier_z_threshold <= 0.0 {
            return Err(EngineError::invalid_input(format!(
                "outlier_z_threshold must be finite and > 0, got {}",
                config.outlier_z_threshold
            )));
        }
        if let Some(Augmentation::Noise { sigma, .. }) = config.augmentation {
            if !sigma.is_finite() || sigma < 0.0 {
                return Err(EngineError::invalid_input(format!(
                    "augmentation sigma must be finite and >= 0, got {sigma}"
                )));
            }
        }
        Ok(Self { set, config })
    }

    pub fn feature_set(&self) -> &FeatureSet {
        &self.set
    }

    /// Extracts and cleans a batch of raw records.
    pub fn process(&self, records: &[Record]) -> Result<ProcessedBatch, EngineError> {
        let vectors = records.iter().map(|r| self.set.extract(r)).collect();
        self.process_vectors(vectors)
    }

    /// Cleans already-extracted vectors; entry point for callers that manage
    /// extraction themselves.
    pub fn process_vectors(
        &self,
        mut vectors: Vec<FeatureVector>,
    ) -> Result<ProcessedBatch, EngineError> {
        let mut report = BatchReport {
            records_in: vectors.len(),
            ..BatchReport::default()
        };
        if vectors.is_empty() {
            return Ok(ProcessedBatch { vectors, report });
        }

        report.non_finite_repaired = repair_non_finite(&mut vectors);
        if report.non_finite_repaired > 0 {
            warn!(
                repaired = report.non_finite_repaired,
                entity_type = self.set.entity_type(),
                "dropped non-finite feature values before imputation"
            );
        }

        self.impute(&mut vectors, &mut report);
        self.reject_outliers(&mut vectors, &mut report);
        if self.config.normalize {
            self.normalize(&mut vectors);
        }
        if let Some(augmentation) = self.config.augmentation {
            report.augmented_added = self.augment(&mut vectors, augmentation);
        }

        report.records_out = vectors.len();
        debug!(
            records_in = report.records_in,
            records_out = report.records_out,
            outliers = report.outliers_rejected,
            imputed = report.values_imputed,
            "batch processing complete"
        );
        Ok(ProcessedBatch { vectors, report })
    }

    fn impute(&self, vectors: &mut Vec<FeatureVector>, report: &mut BatchReport) {
        if self.config.missing == MissingValuePolicy::Drop {
            let names: Vec<String> = self
                .set
                .features()
                .iter()
                .map(|f| f.name.clone())
                .collect();
            let before = vectors.len();
            vectors.retain(|v| names.iter().all(|n| v.values.contains_key(n)));
            report.records_dropped_missing = before - vectors.len();
            return;
        }

        for def in self.set.features() {
            let present: Vec<f64> = vectors.iter().filter_map(|v| v.get(&def.name)).collect();
            let fill = match self.config.missing {
                MissingValuePolicy::Mean => mean(&present),
                MissingValuePolicy::Median => median(&present),
                MissingValuePolicy::Constant(c) => Some(c),
                MissingValuePolicy::Drop => unreachable!("handled above"),
            }
            .unwrap_or_else(|| neutral_fill(&def.kind));

            for vector in vectors.iter_mut() {
                if !vector.values.contains_key(&def.name) {
                    vector.values.insert(def.name.clone(), fill);
                    report.values_imputed += 1;
                }
            }
        }
    }

    fn reject_outliers(&self, vectors: &mut Vec<FeatureVector>, report: &mut BatchReport) {
        let numeric: Vec<&str> = self
            .set
            .features()
            .iter()
            .filter(|f| matches!(f.kind, FeatureKind::Numeric { .. }))
            .map(|f| f.name.as_str())
            .collect();

        let mut bounds = Vec::with_capacity(numeric.len());
        for name in &numeric {
            let values: Vec<f64> = vectors.iter().filter_map(|v| v.get(name)).collect();
            let mu = mean(&values);
            let sigma = population_stddev(&values);
            bounds.push((name.to_string(), mu, sigma));
        }

        let threshold = self.config.outlier_z_threshold;
        let before = vectors.len();
        vectors.retain(|vector| {
            !bounds.iter().any(|(name, mu, sigma)| {
                match (vector.get(name), mu, sigma) {
                    (Some(value), Some(mu), Some(sigma)) if *sigma > 0.0 => {
                        ((value - mu) / sigma).abs() > threshold
                    }
                    _ => false,
                }
            })
        });
        report.outliers_rejected = before - vectors.len();
    }

    fn normalize(&self, vectors: &mut [FeatureVector]) {
        for def in self.set.features() {
            if !matches!(def.kind, FeatureKind::Numeric { .. }) {
                continue;
            }
            let values: Vec<f64> = vectors.iter().filter_map(|v| v.get(&def.name)).collect();
            let Some((lo, hi)) = insight_core::min_max(&values) else {
                continue;
            };
            let range = hi - lo;
            for vector in vectors.iter_mut() {
                if let Some(value) = vector.values.get_mut(&def.name) {
                    // Zero-range features collapse to the midpoint.
                    *value = if range > 0.0 {
                        (*value - lo) / range
                    } else {
                        0.5
                    };
                }
            }
        }
    }

    fn augment(&self, vectors: &mut Vec<FeatureVector>, augmentation: Augmentation) -> usize {
        if vectors.is_empty() {
            return 0;
        }
        match augmentation {
            Augmentation::Noise {
                sigma,
                copies,
                seed,
            } => {
                let mut rng = StdRng::seed_from_u64(seed);
                let mut added = Vec::new();
                for round in 0..copies {
                    for source in vectors.iter() {
                        let mut copy = source.clone();
                        copy.entity_id = format!("{}-noise{round}", source.entity_id);
                        for (name, value) in copy.values.iter_mut() {
                            if self.is_numeric(name) {
                                *value += rng.gen_range(-sigma..=sigma);
                                if self.config.normalize {
                                    *value = value.clamp(0.0, 1.0);
                                }
                            }
                        }
                        added.push(copy);
                    }
                }
                let count = added.len();
                vectors.extend(added);
                count
            }
            Augmentation::Mixup { copies, seed } => {
                let mut rng = StdRng::seed_from_u64(seed);
                let mut added = Vec::new();
                for round in 0..copies {
                    for source in vectors.iter() {
                        let partner = &vectors[rng.gen_range(0..vectors.len())];
                        let mut copy = source.clone();
                        copy.entity_id = format!("{}-mix{round}", source.entity_id);
                        for (name, value) in copy.values.iter_mut() {
                            if let Some(other) = partner.get(name) {
                                *value = MIXUP_LAMBDA * *value + (1.0 - MIXUP_LAMBDA) * other;
                            }
                        }
                        added.push(copy);
                    }
                }
                let count = added.len();
                vectors.extend(added);
                count
            }
        }
    }

    fn is_numeric(&self, name: &str) -> bool {
        self.set
            .get(name)
            .is_some_and(|def| matches!(def.kind, FeatureKind::Numeric { .. }))
    }
}

fn repair_non_finite(vectors: &mut [FeatureVector]) -> usize {
    let mut repaired = 0;
    for vector in vectors.iter_mut() {
        let before = vector.values.len();
        vector.values.retain(|_, v| v.is_finite());
        repaired += before - vector.values.len();
    }
    repaired
}

fn neutral_fill(kind: &FeatureKind) -> f64 {
    match kind {
        FeatureKind::Numeric { min, max } => (min + max) * 0.5,
        FeatureKind::Boolean | FeatureKind::Categorical { .. } => 0.0,
    }
}
