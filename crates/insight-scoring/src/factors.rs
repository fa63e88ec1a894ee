// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use insight_core::{clamp_unit, EngineError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// A score that stood notably above this is worth calling out.
pub const NOTABLY_HIGH: f64 = 0.8;
/// A score at or below this is worth calling out.
pub const NOTABLY_LOW: f64 = 0.3;

/// Neutral baseline substituted when a factor's input signal is missing.
pub const NEUTRAL_BASELINE: f64 = 0.5;

/// Named factor weights, validated to sum to 1.0 (± rounding tolerance).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FactorWeights {
    weights: BTreeMap<String, f64>,
}

impl FactorWeights {
    pub fn new(weights: BTreeMap<String, f64>) -> Result<Self, EngineError> {
        if weights.is_empty() {
            return Err(EngineError::invalid_input(
                "factor weights must not be empty",
            ));
        }
        let mut sum = 0.0;
        for (name, weight) in &weights {
            if !weight.is_finite() || *weight < 0.0 {
                return Err(EngineError::invalid_input(format!(
                    "factor weight {name} must be finite and >= 0, got {weight}"
                )));
            }
            sum += weight;
        }
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(EngineError::invalid_input(format!(
                "factor weights must sum to 1.0 (tolerance {WEIGHT_SUM_TOLERANCE}), got {sum}"
            )));
        }
        Ok(Self { weights })
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.weights.get(name).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.weights.keys().map(String::as_str)
    }

    pub fn sum(&self) -> f64 {
        self.weights.values().sum()
    }
}

/// One factor's contribution to a score.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FactorScore {
    pub name: String,
    pub value: f64,
    pub weight: f64,
    pub weighted: f64,
    /// True when the input signal was absent and the neutral baseline
    /// substituted for it.
    pub imputed: bool,
}

/// A multi-factor score for one entity; stateless output.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub entity_id: String,
    pub total: f64,
    pub tier: String,
    pub factors: Vec<FactorScore>,
    pub reasons: Vec<String>,
    pub recommendation: String,
}

/// Combines factor values as `Σ(weight × value)` then applies multiplicative
/// bonuses. The result may exceed the plain weighted sum but never drops
/// below zero.
pub fn combine(
    weights: &FactorWeights,
    values: &BTreeMap<String, Option<f64>>,
    bonuses: &[(String, f64)],
) -> Result<(f64, Vec<FactorScore>), EngineError> {
    let mut factors = Vec::with_capacity(values.len());
    let mut total = 0.0;
    for name in weights.names() {
        let weight = weights.get(name).unwrap_or(0.0);
        let (value, imputed) = match values.get(name) {
            Some(Some(value)) => (clamp_unit(*value), false),
            Some(None) | None => (NEUTRAL_BASELINE, true),
        };
        let weighted = weight * value;
        total += weighted;
        factors.push(FactorScore {
            name: name.to_string(),
            value,
            weight,
            weighted,
            imputed,
        });
    }

    for (name, multiplier) in bonuses {
        if !multiplier.is_finite() || *multiplier < 0.0 {
            return Err(EngineError::invalid_input(format!(
                "bonus multiplier {name} must be finite and >= 0, got {multiplier}"
            )));
        }
        total *= multiplier;
    }

    Ok((total.max(0.0), factors))
}

/// Builds the human-readable reason list from notably-high/low factors.
pub fn reasons_from_factors(factors: &[FactorScore]) -> Vec<String> {
    let mut reasons = Vec::new();
    for factor in factors {
        if factor.imputed {
            continue;
        }
        if factor.value >= NOTABLY_HIGH {
            reasons.push(format!("strong {}: {:.2}", factor.name, factor.value));
        } else if factor.value <= NOTABLY_LOW {
            reasons.push(format!("weak {}: {:.2}", factor.name, factor.value));
        }
    }
    reasons
}

#[cfg(test)]
mod tests {
    use super::{combine, reasons_from_factors, FactorWeights, NEUTRAL_BASELINE};
    use std::collections::BTreeMap;

    fn weights(pairs: &[(&str, f64)]) -> FactorWeights {
        FactorWeights::new(pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()).unwrap()
    }

    #[test]
    fn weights_must_sum_to_one() {
        assert!(FactorWeights::new(
            [("a".to_string(), 0.6), ("b".to_string(), 0.39)]
                .into_iter()
                .collect()
        )
        .is_err());

        let ok = weights(&[("a", 0.6), ("b", 0.4)]);
        assert!((ok.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn negative_and_non_finite_weights_are_rejected() {
        assert!(FactorWeights::new(
            [("a".to_string(), -0.5), ("b".to_string(), 1.5)]
                .into_iter()
                .collect()
        )
        .is_err());
        assert!(FactorWeights::new([("a".to_string(), f64::NAN)].into_iter().collect()).is_err());
    }

    #[test]
    fn combine_applies_weights_and_bonuses() {
        let weights = weights(&[("a", 0.5), ("b", 0.5)]);
        let values: BTreeMap<String, Option<f64>> = [
            ("a".to_string(), Some(0.8)),
            ("b".to_string(), Some(0.4)),
        ]
        .into_iter()
        .collect();
        let (total, factors) =
            combine(&weights, &values, &[("boost".to_string(), 1.1)]).unwrap();
        assert!((total - 0.66).abs() < 1e-12, "total={total}");
        assert_eq!(factors.len(), 2);
    }

    #[test]
    fn missing_signal_falls_back_to_neutral_baseline() {
        let weights = weights(&[("a", 1.0)]);
        let values: BTreeMap<String, Option<f64>> = BTreeMap::new();
        let (total, factors) = combine(&weights, &values, &[]).unwrap();
        assert_eq!(total, NEUTRAL_BASELINE);
        assert!(factors[0].imputed);
    }

    #[test]
    fn bonuses_never_push_below_zero() {
        let weights = weights(&[("a", 1.0)]);
        let values: BTreeMap<String, Option<f64>> =
            [("a".to_string(), Some(0.5))].into_iter().collect();
        let (total, _) = combine(&weights, &values, &[("kill".to_string(), 0.0)]).unwrap();
        assert_eq!(total, 0.0);
    }

    #[test]
    fn reasons_flag_only_notable_observed_factors() {
        let weights = weights(&[("high", 0.4), ("low", 0.3), ("mid", 0.3)]);
        let values: BTreeMap<String, Option<f64>> = [
            ("high".to_string(), Some(0.9)),
            ("low".to_string(), Some(0.1)),
            ("mid".to_string(), Some(0.5)),
        ]
        .into_iter()
        .collect();
        let (_, factors) = combine(&weights, &values, &[]).unwrap();
        let reasons = reasons_from_factors(&factors);
        assert_eq!(reasons.len(), 2);
        assert!(reasons.iter().any(|r| r.contains("strong high")));
        assert!(reasons.iter().any(|r| r.contains("weak low")));
    }
}
