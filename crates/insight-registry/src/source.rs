// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::model::LinearModel;
use crate::registry::ModelRegistry;
use async_trait::async_trait;
use insight_core::EngineError;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// External origin of model definitions.
///
/// Fetching is the engine's single suspension point: one request/response
/// exchange returning a structured document. Everything after the await is
/// synchronous.
#[async_trait]
pub trait ModelSource: Send + Sync {
    async fn fetch(&self, name: &str) -> Result<Value, EngineError>;
}

/// In-memory source for fixtures and tests.
#[derive(Clone, Debug, Default)]
pub struct StaticSource {
    documents: HashMap<String, Value>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, name: impl Into<String>, document: Value) -> Self {
        self.documents.insert(name.into(), document);
        self
    }
}

#[async_trait]
impl ModelSource for StaticSource {
    async fn fetch(&self, name: &str) -> Result<Value, EngineError> {
        self.documents
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::load_failure(format!("source has no document for {name}")))
    }
}

impl ModelRegistry {
    /// Fetches a model definition and registers it under `name`/`version`.
    ///
    /// A failed fetch or malformed document increments the load-failure
    /// counter and propagates; there is no automatic retry.
    pub async fn load_from_source(
        &self,
        source: &dyn ModelSource,
        name: &str,
        version: &str,
    ) -> Result<(), EngineError> {
        let document = match source.fetch(name).await {
            Ok(document) => document,
            Err(err) => {
                self.note_load_failure();
                warn!(model = name, error = %err, "model source fetch failed");
                return Err(err);
            }
        };

        let (model, metadata) = match LinearModel::from_document(&document) {
            Ok(parsed) => parsed,
            Err(err) => {
                self.note_load_failure();
                warn!(model = name, error = %err, "model document was malformed");
                return Err(err);
            }
        };

        self.register(name, version, Arc::new(model), metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::{ModelSource, StaticSource};
    use crate::cache::CacheConfig;
    use crate::registry::ModelRegistry;
    use insight_core::EngineError;
    use serde_json::json;

    fn linear_document() -> serde_json::Value {
        json!({
            "model_type": "linear",
            "weights": {"x": 2.0},
            "intercept": 1.0
        })
    }

    #[tokio::test]
    async fn load_registers_a_servable_model() {
        let registry = ModelRegistry::new(CacheConfig::default()).unwrap();
        let source = StaticSource::new().with_document("m", linear_document());

        registry.load_from_source(&source, "m", "1.0.0").await.unwrap();
        let out = registry.predict("m", &json!({"x": 4.0})).unwrap();
        assert_eq!(out["score"], json!(9.0));
        assert_eq!(registry.get_statistics().load_failures, 0);
    }

    #[tokio::test]
    async fn missing_document_counts_a_load_failure() {
        let registry = ModelRegistry::new(CacheConfig::default()).unwrap();
        let source = StaticSource::new();

        let err = registry
            .load_from_source(&source, "ghost", "1.0.0")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::LoadFailure(_)));
        assert_eq!(registry.get_statistics().load_failures, 1);
    }

    #[tokio::test]
    async fn malformed_document_counts_a_load_failure() {
        let registry = ModelRegistry::new(CacheConfig::default()).unwrap();
        let source =
            StaticSource::new().with_document("m", json!({"model_type": "linear"}));

        let err = registry
            .load_from_source(&source, "m", "1.0.0")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::LoadFailure(_)));
        assert_eq!(registry.get_statistics().load_failures, 1);
    }

    #[tokio::test]
    async fn fetch_returns_the_stored_document() {
        let source = StaticSource::new().with_document("m", linear_document());
        let document = source.fetch("m").await.unwrap();
        assert_eq!(document["model_type"], json!("linear"));
    }
}
