// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::cache::{fingerprint, CacheConfig, InferenceCache};
use crate::model::{Model, ModelMetadata, ModelVersion};
use chrono::Utc;
use insight_core::{EngineError, EngineEvent, EventSink, RunningStats};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

const DEFAULT_BATCH_CHUNK: usize = 100;
const AB_SIGNIFICANCE_Z: f64 = 1.96;

/// Which side of an A/B split served (or should be credited for) a call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbArm {
    A,
    B,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
struct ArmCounters {
    outcomes: u64,
    correct: u64,
}

impl ArmCounters {
    fn rate(&self) -> f64 {
        if self.outcomes == 0 {
            0.0
        } else {
            self.correct as f64 / self.outcomes as f64
        }
    }
}

#[derive(Clone, Debug)]
struct AbTest {
    version_a: String,
    version_b: String,
    split_ratio: f64,
    a: ArmCounters,
    b: ArmCounters,
}

/// Outcome of concluding an A/B test.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AbTestOutcome {
    pub model: String,
    pub version_a: String,
    pub version_b: String,
    pub rate_a: f64,
    pub rate_b: f64,
    pub z_score: f64,
    pub significant: bool,
    pub winner: Option<String>,
}

struct ModelEntry {
    versions: Vec<ModelVersion>,
    active: usize,
    inference_count: u64,
    error_count: u64,
    latency_us: RunningStats,
    last_prediction: Option<Value>,
    ab_test: Option<AbTest>,
}

impl ModelEntry {
    fn version_index(&self, version: &str) -> Option<usize> {
        self.versions.iter().position(|v| v.version == version)
    }

    fn active_version(&self) -> &ModelVersion {
        &self.versions[self.active]
    }
}

/// Per-model statistics snapshot.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelStatistics {
    pub active_version: String,
    pub version_count: usize,
    pub inference_count: u64,
    pub error_count: u64,
    pub mean_latency_us: f64,
}

/// Registry-wide statistics snapshot; pure accessor output.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryStatistics {
    pub models: BTreeMap<String, ModelStatistics>,
    pub total_inferences: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub load_failures: u64,
}

/// Result of one batch run: per-item results in input order.
///
/// A single item's inference error does not abort the remaining items;
/// side effects of earlier chunks (cache writes, statistics) persist
/// regardless of later failures.
pub type BatchOutcome = Vec<Result<Value, EngineError>>;

#[derive(Default)]
struct GlobalCounters {
    total_inferences: u64,
    cache_hits: u64,
    cache_misses: u64,
    load_failures: u64,
}

/// Owns named, versioned models and serves cached inference.
pub struct ModelRegistry {
    entries: RwLock<HashMap<String, ModelEntry>>,
    cache: InferenceCache,
    counters: Mutex<GlobalCounters>,
    events: Option<Arc<dyn EventSink>>,
}

impl ModelRegistry {
    pub fn new(cache_config: CacheConfig) -> Result<Self, EngineError> {
        Ok(Self {
            entries: RwLock::new(HashMap::new()),
            cache: InferenceCache::new(cache_config)?,
            counters: Mutex::new(GlobalCounters::default()),
            events: None,
        })
    }

    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = Some(sink);
        self
    }

    /// Registers a model version. The first version registered for a name
    /// becomes active; later versions are appended without activation.
    pub fn register(
        &self,
        name: &str,
        version: &str,
        model: Arc<dyn Model>,
        metadata: ModelMetadata,
    ) -> Result<(), EngineError> {
        if name.is_empty() || version.is_empty() {
            return Err(EngineError::invalid_input(
                "model name and version must be non-empty",
            ));
        }

        let mut entries = self.entries.write();
        let record = ModelVersion {
            version: version.to_string(),
            metadata,
            created_at: Utc::now(),
            model,
        };

        match entries.get_mut(name) {
            Some(entry) => {
                if entry.version_index(version).is_some() {
                    return Err(EngineError::invalid_input(format!(
                        "model {name} already has version {version}"
                    )));
                }
                entry.versions.push(record);
            }
            None => {
                entries.insert(
                    name.to_string(),
                    ModelEntry {
                        versions: vec![record],
                        active: 0,
                        inference_count: 0,
                        error_count: 0,
                        latency_us: RunningStats::new(),
                        last_prediction: None,
                        ab_test: None,
                    },
                );
            }
        }
        info!(model = name, version, "registered model version");
        Ok(())
    }

    /// Serves one prediction through the active version, consulting the
    /// inference cache first.
    pub fn predict(&self, name: &str, input: &Value) -> Result<Value, EngineError> {
        let (model, version) = {
            let entries = self.entries.read();
            let entry = entries
                .get(name)
                .ok_or_else(|| EngineError::model_not_found(name))?;
            let version = match &entry.ab_test {
                Some(test) => self.ab_route(name, test, input),
                None => entry.active_version().version.clone(),
            };
            let index = entry
                .version_index(&version)
                .ok_or_else(|| EngineError::version_not_found(name, &version))?;
            (Arc::clone(&entry.versions[index].model), version)
        };

        let key = fingerprint(name, &version, input);
        if let Some(cached) = self.cache.get(key) {
            self.counters.lock().cache_hits += 1;
            return Ok(cached);
        }
        self.counters.lock().cache_misses += 1;

        let started = Instant::now();
        let result = model.infer(input);
        let elapsed_us = started.elapsed().as_secs_f64() * 1e6;

        let mut entries = self.entries.write();
        let entry = entries
            .get_mut(name)
            .ok_or_else(|| EngineError::model_not_found(name))?;
        match result {
            Ok(value) => {
                entry.inference_count += 1;
                entry.latency_us.update(elapsed_us);
                entry.last_prediction = Some(value.clone());
                self.counters.lock().total_inferences += 1;
                self.cache.put(key, name, value.clone());
                Ok(value)
            }
            Err(err) => {
                entry.error_count += 1;
                warn!(model = name, version, error = %err, "inference failed");
                Err(err)
            }
        }
    }

    /// Processes inputs in fixed-size chunks, invoking `progress` with
    /// `(processed, total)` after each chunk. Chunking only bounds the work
    /// per scheduling slice; it carries no transactional guarantee.
    pub fn batch_predict(
        &self,
        name: &str,
        inputs: &[Value],
        chunk_size: Option<usize>,
        mut progress: impl FnMut(usize, usize),
    ) -> Result<BatchOutcome, EngineError> {
        if !self.entries.read().contains_key(name) {
            return Err(EngineError::model_not_found(name));
        }
        let chunk_size = chunk_size.unwrap_or(DEFAULT_BATCH_CHUNK).max(1);
        let total = inputs.len();
        let mut results = Vec::with_capacity(total);
        for chunk in inputs.chunks(chunk_size) {
            for input in chunk {
                results.push(self.predict(name, input));
            }
            progress(results.len(), total);
        }
        Ok(results)
    }

    /// Repoints the active version and purges the model's cache entries.
    ///
    /// Switching to the already-active version leaves cache and statistics
    /// untouched.
    pub fn switch_version(&self, name: &str, version: &str) -> Result<(), EngineError> {
        let mut entries = self.entries.write();
        let entry = entries
            .get_mut(name)
            .ok_or_else(|| EngineError::model_not_found(name))?;
        let index = entry
            .version_index(version)
            .ok_or_else(|| EngineError::version_not_found(name, version))?;
        if index == entry.active {
            debug!(model = name, version, "switch_version is a no-op");
            return Ok(());
        }
        entry.active = index;
        drop(entries);
        let purged = self.cache.purge_model(name);
        info!(model = name, version, purged, "switched active version");
        Ok(())
    }

    /// Repoints the active version to the previously registered one.
    pub fn rollback(&self, name: &str) -> Result<String, EngineError> {
        let mut entries = self.entries.write();
        let entry = entries
            .get_mut(name)
            .ok_or_else(|| EngineError::model_not_found(name))?;
        if entry.active == 0 {
            return Err(EngineError::invalid_input(format!(
                "model {name} has no prior version to roll back to"
            )));
        }
        entry.active -= 1;
        let version = entry.active_version().version.clone();
        drop(entries);
        let purged = self.cache.purge_model(name);
        info!(model = name, version, purged, "rolled back active version");
        Ok(version)
    }

    pub fn active_version(&self, name: &str) -> Result<String, EngineError> {
        let entries = self.entries.read();
        let entry = entries
            .get(name)
            .ok_or_else(|| EngineError::model_not_found(name))?;
        Ok(entry.active_version().version.clone())
    }

    /// Partitions subsequent `predict` calls between two versions.
    pub fn setup_ab_test(
        &self,
        name: &str,
        version_a: &str,
        version_b: &str,
        split_ratio: f64,
    ) -> Result<(), EngineError> {
        if !(0.0..=1.0).contains(&split_ratio) || !split_ratio.is_finite() {
            return Err(EngineError::invalid_input(format!(
                "split_ratio must be within [0, 1], got {split_ratio}"
            )));
        }
        let mut entries = self.entries.write();
        let entry = entries
            .get_mut(name)
            .ok_or_else(|| EngineError::model_not_found(name))?;
        for version in [version_a, version_b] {
            if entry.version_index(version).is_none() {
                return Err(EngineError::version_not_found(name, version));
            }
        }
        entry.ab_test = Some(AbTest {
            version_a: version_a.to_string(),
            version_b: version_b.to_string(),
            split_ratio,
            a: ArmCounters::default(),
            b: ArmCounters::default(),
        });
        info!(model = name, version_a, version_b, split_ratio, "A/B test armed");
        Ok(())
    }

    /// Credits one observed outcome to an arm of the running test.
    pub fn record_ab_outcome(
        &self,
        name: &str,
        arm: AbArm,
        correct: bool,
    ) -> Result<(), EngineError> {
        let mut entries = self.entries.write();
        let entry = entries
            .get_mut(name)
            .ok_or_else(|| EngineError::model_not_found(name))?;
        let test = entry.ab_test.as_mut().ok_or_else(|| {
            EngineError::invalid_input(format!("model {name} has no running A/B test"))
        })?;
        let counters = match arm {
            AbArm::A => &mut test.a,
            AbArm::B => &mut test.b,
        };
        counters.outcomes += 1;
        if correct {
            counters.correct += 1;
        }
        Ok(())
    }

    /// Ends the running test and reports pooled two-proportion significance.
    pub fn conclude_ab_test(&self, name: &str) -> Result<AbTestOutcome, EngineError> {
        let mut entries = self.entries.write();
        let entry = entries
            .get_mut(name)
            .ok_or_else(|| EngineError::model_not_found(name))?;
        let test = entry.ab_test.take().ok_or_else(|| {
            EngineError::invalid_input(format!("model {name} has no running A/B test"))
        })?;
        drop(entries);

        let z = pooled_z_score(
            test.a.correct,
            test.a.outcomes,
            test.b.correct,
            test.b.outcomes,
        );
        let significant = z.abs() > AB_SIGNIFICANCE_Z;
        let winner = if !significant {
            None
        } else if test.a.rate() > test.b.rate() {
            Some(test.version_a.clone())
        } else {
            Some(test.version_b.clone())
        };

        let outcome = AbTestOutcome {
            model: name.to_string(),
            version_a: test.version_a,
            version_b: test.version_b,
            rate_a: test.a.rate(),
            rate_b: test.b.rate(),
            z_score: z,
            significant,
            winner,
        };
        if let Some(sink) = &self.events {
            sink.on_event(&EngineEvent::AbTestComplete {
                model: outcome.model.clone(),
                winner: outcome.winner.clone(),
                z_score: outcome.z_score,
                significant: outcome.significant,
                at: Utc::now(),
            });
        }
        info!(
            model = %outcome.model,
            significant = outcome.significant,
            winner = outcome.winner.as_deref().unwrap_or("none"),
            "A/B test concluded"
        );
        Ok(outcome)
    }

    /// Pure accessor: statistics document for the dashboard.
    pub fn get_statistics(&self) -> RegistryStatistics {
        let entries = self.entries.read();
        let counters = self.counters.lock();
        let models = entries
            .iter()
            .map(|(name, entry)| {
                (
                    name.clone(),
                    ModelStatistics {
                        active_version: entry.active_version().version.clone(),
                        version_count: entry.versions.len(),
                        inference_count: entry.inference_count,
                        error_count: entry.error_count,
                        mean_latency_us: entry.latency_us.mean(),
                    },
                )
            })
            .collect();
        RegistryStatistics {
            models,
            total_inferences: counters.total_inferences,
            cache_hits: counters.cache_hits,
            cache_misses: counters.cache_misses,
            load_failures: counters.load_failures,
        }
    }

    /// Pure accessor: last successful prediction per model.
    pub fn get_all_predictions(&self) -> BTreeMap<String, Value> {
        self.entries
            .read()
            .iter()
            .filter_map(|(name, entry)| {
                entry
                    .last_prediction
                    .clone()
                    .map(|value| (name.clone(), value))
            })
            .collect()
    }

    pub(crate) fn note_load_failure(&self) {
        self.counters.lock().load_failures += 1;
    }

    fn ab_route(&self, name: &str, test: &AbTest, input: &Value) -> String {
        // Deterministic input-hash routing: the same input always lands on
        // the same arm, so repeated calls stay cache-coherent.
        let bucket = fingerprint(name, "ab-route", input) % 1_000;
        if (bucket as f64) < test.split_ratio * 1_000.0 {
            test.version_a.clone()
        } else {
            test.version_b.clone()
        }
    }
}

fn pooled_z_score(correct_a: u64, total_a: u64, correct_b: u64, total_b: u64) -> f64 {
    if total_a == 0 || total_b == 0 {
        return 0.0;
    }
    let p_a = correct_a as f64 / total_a as f64;
    let p_b = correct_b as f64 / total_b as f64;
    let pooled = (correct_a + correct_b) as f64 / (total_a + total_b) as f64;
    let variance = pooled * (1.0 - pooled) * (1.0 / total_a as f64 + 1.0 / total_b as f64);
    if variance <= 0.0 {
        return 0.0;
    }
    (p_a - p_b) / variance.sqrt()
}
