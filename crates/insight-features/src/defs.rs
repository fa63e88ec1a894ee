// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use insight_core::EngineError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Value family of a feature plus its expected scale.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    /// Continuous value expected inside `[min, max]` before normalization.
    Numeric { min: f64, max: f64 },
    /// Encoded as 0.0 / 1.0.
    Boolean,
    /// Encoded by lookup position, scaled into the unit interval.
    Categorical { levels: Vec<String> },
}

/// How a feature's value is derived from a raw record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureRule {
    /// Read a numeric field verbatim.
    NumericField { key: String },
    /// Read a boolean field as 0/1.
    BooleanField { key: String },
    /// Character length of a string field.
    StringLength { key: String },
    /// Fraction of ASCII digits in a string field.
    DigitRatio { key: String },
    /// 1.0 when the domain part of an email field is in the lookup set.
    DomainInSet { key: String, domains: Vec<String> },
    /// 1.0 when the local part of an email field matches one of the prefixes.
    LocalPartPrefix { key: String, prefixes: Vec<String> },
    /// Ratio of two numeric fields; missing/zero denominator counts as missing.
    Ratio { numerator: String, denominator: String },
    /// Position of a string field inside `levels`, scaled into [0, 1].
    CategoricalLevel { key: String, levels: Vec<String> },
}

/// One named feature: derivation rule, kind, and whether imputation applies.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureDef {
    pub name: String,
    pub kind: FeatureKind,
    pub required: bool,
    pub rule: FeatureRule,
}

/// Named set of feature definitions for one entity type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    entity_type: String,
    features: Vec<FeatureDef>,
}

impl FeatureSet {
    /// Registers a definition set, rejecting duplicate names and inverted
    /// numeric bounds up front.
    pub fn define(
        entity_type: impl Into<String>,
        features: Vec<FeatureDef>,
    ) -> Result<Self, EngineError> {
        let entity_type = entity_type.into();
        if features.is_empty() {
            return Err(EngineError::invalid_input(format!(
                "feature set for {entity_type} must define at least one feature"
            )));
        }

        let mut seen = BTreeSet::new();
        for def in &features {
            if !seen.insert(def.name.as_str()) {
                return Err(EngineError::invalid_input(format!(
                    "duplicate feature name in {entity_type} set: {}",
                    def.name
                )));
            }
            if let FeatureKind::Numeric { min, max } = def.kind {
                if !min.is_finite() || !max.is_finite() || min >= max {
                    return Err(EngineError::invalid_input(format!(
                        "feature {} must satisfy min < max with finite bounds, got min={min}, max={max}",
                        def.name
                    )));
                }
            }
            if let FeatureKind::Categorical { levels } = &def.kind {
                if levels.is_empty() {
                    return Err(EngineError::invalid_input(format!(
                        "categorical feature {} must list at least one level",
                        def.name
                    )));
                }
            }
        }

        Ok(Self {
            entity_type,
            features,
        })
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn features(&self) -> &[FeatureDef] {
        &self.features
    }

    pub fn feature_names(&self) -> Vec<&str> {
        self.features.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&FeatureDef> {
        self.features.iter().find(|f| f.name == name)
    }
}
