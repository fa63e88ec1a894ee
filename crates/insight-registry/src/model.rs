// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use chrono::{DateTime, Utc};
use insight_core::EngineError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A computational unit served by the registry.
///
/// "Training" is out of scope: implementations carry handcrafted or
/// externally-fitted parameters and only run inference.
pub trait Model: Send + Sync {
    fn infer(&self, input: &Value) -> Result<Value, EngineError>;
}

/// Descriptive metadata recorded per version.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub model_type: String,
    pub input_shape: Vec<usize>,
    pub output_shape: Vec<usize>,
    pub reported_accuracy: Option<f64>,
}

/// One immutable version record. Appended, never mutated.
#[derive(Clone)]
pub struct ModelVersion {
    pub version: String,
    pub metadata: ModelMetadata,
    pub created_at: DateTime<Utc>,
    pub model: Arc<dyn Model>,
}

impl std::fmt::Debug for ModelVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelVersion")
            .field("version", &self.version)
            .field("metadata", &self.metadata)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// Weighted sum over named inputs plus an intercept.
///
/// The reference `Model` implementation; also the shape model-source
/// documents deserialize into.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub weights: BTreeMap<String, f64>,
    pub intercept: f64,
}

impl LinearModel {
    pub fn new(weights: BTreeMap<String, f64>, intercept: f64) -> Result<Self, EngineError> {
        for (name, weight) in &weights {
            if !weight.is_finite() {
                return Err(EngineError::invalid_input(format!(
                    "linear model weight {name} must be finite, got {weight}"
                )));
            }
        }
        if !intercept.is_finite() {
            return Err(EngineError::invalid_input(format!(
                "linear model intercept must be finite, got {intercept}"
            )));
        }
        Ok(Self { weights, intercept })
    }

    /// Parses a structured model-source document.
    ///
    /// Expected shape:
    /// `{"model_type": "linear", "weights": {..}, "intercept": n, "metadata": {..}}`.
    /// Anything else is a load failure, never silently ignored.
    pub fn from_document(document: &Value) -> Result<(Self, ModelMetadata), EngineError> {
        let object = document
            .as_object()
            .ok_or_else(|| EngineError::load_failure("model document is not an object"))?;

        let model_type = object
            .get("model_type")
            .and_then(Value::as_str)
            .ok_or_else(|| EngineError::load_failure("model document missing model_type"))?;
        if model_type != "linear" {
            return Err(EngineError::load_failure(format!(
                "unsupported model_type: {model_type}"
            )));
        }

        let raw_weights = object
            .get("weights")
            .and_then(Value::as_object)
            .ok_or_else(|| EngineError::load_failure("model document missing weights object"))?;
        let mut weights = BTreeMap::new();
        for (name, value) in raw_weights {
            let weight = value.as_f64().filter(|w| w.is_finite()).ok_or_else(|| {
                EngineError::load_failure(format!("weight {name} is not a finite number"))
            })?;
            weights.insert(name.clone(), weight);
        }

        let intercept = object
            .get("intercept")
            .map(|v| {
                v.as_f64().filter(|i| i.is_finite()).ok_or_else(|| {
                    EngineError::load_failure("intercept is not a finite number")
                })
            })
            .transpose()?
            .unwrap_or(0.0);

        let metadata = match object.get("metadata") {
            Some(raw) => serde_json::from_value(raw.clone())
                .map_err(|err| EngineError::load_failure(format!("malformed metadata: {err}")))?,
            None => ModelMetadata {
                model_type: "linear".to_string(),
                input_shape: vec![weights.len()],
                output_shape: vec![1],
                reported_accuracy: None,
            },
        };

        let model = Self::new(weights, intercept)
            .map_err(|err| EngineError::load_failure(err.to_string()))?;
        Ok((model, metadata))
    }
}

impl Model for LinearModel {
    fn infer(&self, input: &Value) -> Result<Value, EngineError> {
        let fields = input
            .as_object()
            .ok_or_else(|| EngineError::inference("linear model input must be an object"))?;

        let mut score = self.intercept;
        for (name, weight) in &self.weights {
            let value = fields
                .get(name)
                .and_then(Value::as_f64)
                .filter(|v| v.is_finite())
                .unwrap_or(0.0);
            score += weight * value;
        }
        Ok(json!({ "score": score }))
    }
}

#[cfg(test)]
mod tests {
    use super::{LinearModel, Model};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn weights(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn infer_computes_weighted_sum_with_intercept() {
        let model = LinearModel::new(weights(&[("a", 2.0), ("b", -1.0)]), 0.5).unwrap();
        let out = model.infer(&json!({"a": 3.0, "b": 1.0})).unwrap();
        assert_eq!(out["score"], json!(5.5));
    }

    #[test]
    fn absent_inputs_contribute_zero() {
        let model = LinearModel::new(weights(&[("a", 2.0)]), 1.0).unwrap();
        let out = model.infer(&json!({})).unwrap();
        assert_eq!(out["score"], json!(1.0));
    }

    #[test]
    fn non_object_input_is_an_inference_error() {
        let model = LinearModel::new(weights(&[("a", 1.0)]), 0.0).unwrap();
        assert!(model.infer(&json!([1, 2, 3])).is_err());
    }

    #[test]
    fn from_document_parses_weights_and_metadata() {
        let document = json!({
            "model_type": "linear",
            "weights": {"open_rate": 0.6, "bounce_rate": -0.4},
            "intercept": 0.1,
            "metadata": {
                "model_type": "linear",
                "input_shape": [2],
                "output_shape": [1],
                "reported_accuracy": 0.87
            }
        });
        let (model, metadata) = LinearModel::from_document(&document).unwrap();
        assert_eq!(model.weights.len(), 2);
        assert_eq!(model.intercept, 0.1);
        assert_eq!(metadata.reported_accuracy, Some(0.87));
    }

    #[test]
    fn malformed_documents_are_load_failures() {
        for document in [
            json!("not an object"),
            json!({"weights": {"a": 1.0}}),
            json!({"model_type": "quadratic", "weights": {}}),
            json!({"model_type": "linear", "weights": {"a": "high"}}),
        ] {
            let err = LinearModel::from_document(&document)
                .expect_err("malformed document should fail to load");
            assert!(
                err.to_string().starts_with("model load failed"),
                "unexpected error: {err}"
            );
        }
    }
}
