// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::drift::{drift_severity, ks_statistic, DriftEvent};
use crate::measures::{
    classification_metrics, regression_metrics, MetricKind, MetricSnapshot,
};
use chrono::{Duration, Utc};
use insight_core::{EngineError, EngineEvent, EventSink};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, info};

const DEFAULT_HISTORY_LIMIT: usize = 100;
const DEFAULT_DEGRADATION_THRESHOLD: f64 = 0.05;
const DEFAULT_HEALTH_PRIMARY_THRESHOLD: f64 = 0.7;
const HEALTH_PRIMARY_DEDUCTION: i64 = 30;
const HEALTH_DRIFT_DEDUCTION: i64 = 10;
const TREND_EPSILON: f64 = 0.01;
const REPORT_TOP_FEATURES: usize = 5;
const REPORT_RECENT_DRIFT: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackerConfig {
    pub history_limit: usize,
    pub degradation_threshold: f64,
    pub health_primary_threshold: f64,
    pub alerting: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            degradation_threshold: DEFAULT_DEGRADATION_THRESHOLD,
            health_primary_threshold: DEFAULT_HEALTH_PRIMARY_THRESHOLD,
            alerting: true,
        }
    }
}

/// Primary-score movement between the two most recent snapshots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Improving,
    Stable,
    Degrading,
}

/// Aggregated report for one model; pure accessor output.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelReport {
    pub model: String,
    pub latest: Option<MetricSnapshot>,
    pub trend: TrendDirection,
    pub top_features: Vec<(String, f64)>,
    pub recent_drift: Vec<DriftEvent>,
    pub health_score: u8,
}

#[derive(Default)]
struct ModelTrack {
    history: VecDeque<MetricSnapshot>,
    reference_distribution: Option<Vec<f64>>,
    drift_events: Vec<DriftEvent>,
    feature_importance: Vec<(String, f64)>,
}

/// Records time-stamped performance snapshots per model and raises advisory
/// degradation/drift events. History is append-only and trimmed from the
/// oldest end.
pub struct MetricsTracker {
    config: TrackerConfig,
    tracks: RwLock<HashMap<String, ModelTrack>>,
    events: Option<Arc<dyn EventSink>>,
}

impl MetricsTracker {
    pub fn new(config: TrackerConfig) -> Result<Self, EngineError> {
        if config.history_limit == 0 {
            return Err(EngineError::invalid_input(
                "tracker history_limit must be >= 1",
            ));
        }
        if !config.degradation_threshold.is_finite() || config.degradation_threshold <= 0.0 {
            return Err(EngineError::invalid_input(format!(
                "degradation_threshold must be finite and > 0, got {}",
                config.degradation_threshold
            )));
        }
        Ok(Self {
            config,
            tracks: RwLock::new(HashMap::new()),
            events: None,
        })
    }

    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = Some(sink);
        self
    }

    /// Computes classification metrics and appends a snapshot.
    pub fn track_classification(
        &self,
        model: &str,
        predictions: &[f64],
        actuals: &[f64],
        threshold: Option<f64>,
    ) -> Result<MetricSnapshot, EngineError> {
        let metrics = classification_metrics(predictions, actuals, threshold)?;
        self.append_snapshot(model, MetricKind::Classification(metrics), predictions.len())
    }

    /// Computes regression metrics and appends a snapshot.
    pub fn track_regression(
        &self,
        model: &str,
        predictions: &[f64],
        actuals: &[f64],
    ) -> Result<MetricSnapshot, EngineError> {
        let metrics = regression_metrics(predictions, actuals)?;
        self.append_snapshot(model, MetricKind::Regression(metrics), predictions.len())
    }

    fn append_snapshot(
        &self,
        model: &str,
        metrics: MetricKind,
        sample_count: usize,
    ) -> Result<MetricSnapshot, EngineError> {
        let snapshot = MetricSnapshot {
            model: model.to_string(),
            metrics,
            sample_count,
            at: Utc::now(),
        };

        let degradation = {
            let mut tracks = self.tracks.write();
            let track = tracks.entry(model.to_string()).or_default();
            let previous = track.history.back().map(|s| s.metrics.primary_score());
            track.history.push_back(snapshot.clone());
            while track.history.len() > self.config.history_limit {
                track.history.pop_front();
            }
            previous.and_then(|previous| {
                let current = snapshot.metrics.primary_score();
                (previous - current > self.config.degradation_threshold)
                    .then_some((previous, current))
            })
        };

        if let Some((previous, current)) = degradation {
            info!(
                model,
                previous, current, "primary score degraded past threshold"
            );
            if self.config.alerting {
                if let Some(sink) = &self.events {
                    sink.on_event(&EngineEvent::Degradation {
                        model: model.to_string(),
                        metric: "primary_score".to_string(),
                        previous,
                        current,
                        at: snapshot.at,
                    });
                }
            }
        }
        Ok(snapshot)
    }

    /// Runs a two-sample KS test of `current` against the previously stored
    /// prediction distribution, then stores `current` as the new reference.
    ///
    /// The first call for a model only seeds the reference and cannot drift.
    pub fn detect_drift(
        &self,
        model: &str,
        current: &[f64],
    ) -> Result<Option<DriftEvent>, EngineError> {
        if current.is_empty() {
            return Err(EngineError::invalid_input(
                "drift detection requires a non-empty sample",
            ));
        }
        if current.iter().any(|v| !v.is_finite()) {
            return Err(EngineError::invalid_input(
                "drift detection sample contains non-finite values",
            ));
        }

        let mut tracks = self.tracks.write();
        let track = tracks.entry(model.to_string()).or_default();
        let Some(reference) = track.reference_distribution.take() else {
            track.reference_distribution = Some(current.to_vec());
            debug!(model, "seeded drift reference distribution");
            return Ok(None);
        };

        let statistic = ks_statistic(&reference, current)?;
        track.reference_distribution = Some(current.to_vec());

        let Some(severity) = drift_severity(statistic) else {
            return Ok(None);
        };
        let event = DriftEvent {
            model: model.to_string(),
            statistic,
            severity,
            reference_size: reference.len(),
            current_size: current.len(),
            at: Utc::now(),
        };
        track.drift_events.push(event.clone());
        drop(tracks);

        info!(model, statistic, severity = severity.as_str(), "drift detected");
        if self.config.alerting {
            if let Some(sink) = &self.events {
                sink.on_event(&EngineEvent::Drift {
                    model: event.model.clone(),
                    statistic: event.statistic,
                    severity: event.severity,
                    at: event.at,
                });
            }
        }
        Ok(Some(event))
    }

    /// Registered importances feed report generation; highest weight first.
    pub fn register_feature_importance(&self, model: &str, importances: Vec<(String, f64)>) {
        let mut sorted = importances;
        sorted.sort_by(|a, b| b.1.total_cmp(&a.1));
        self.tracks
            .write()
            .entry(model.to_string())
            .or_default()
            .feature_importance = sorted;
    }

    /// Drops drift events older than `max_age`; returns how many were removed.
    pub fn prune_drift_events(&self, max_age: Duration) -> usize {
        let cutoff = Utc::now() - max_age;
        let mut removed = 0;
        for track in self.tracks.write().values_mut() {
            let before = track.drift_events.len();
            track.drift_events.retain(|event| event.at >= cutoff);
            removed += before - track.drift_events.len();
        }
        removed
    }

    pub fn drift_events(&self, model: &str) -> Vec<DriftEvent> {
        self.tracks
            .read()
            .get(model)
            .map(|track| track.drift_events.clone())
            .unwrap_or_default()
    }

    pub fn history(&self, model: &str) -> Vec<MetricSnapshot> {
        self.tracks
            .read()
            .get(model)
            .map(|track| track.history.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Pure accessor: aggregated report with a derived 0–100 health score.
    pub fn generate_report(&self, model: &str) -> ModelReport {
        let tracks = self.tracks.read();
        let Some(track) = tracks.get(model) else {
            return ModelReport {
                model: model.to_string(),
                latest: None,
                trend: TrendDirection::Stable,
                top_features: vec![],
                recent_drift: vec![],
                health_score: 100,
            };
        };

        let latest = track.history.back().cloned();
        let trend = match (
            track.history.len().checked_sub(2).map(|i| &track.history[i]),
            latest.as_ref(),
        ) {
            (Some(previous), Some(current)) => {
                let delta =
                    current.metrics.primary_score() - previous.metrics.primary_score();
                if delta > TREND_EPSILON {
                    TrendDirection::Improving
                } else if delta < -TREND_EPSILON {
                    TrendDirection::Degrading
                } else {
                    TrendDirection::Stable
                }
            }
            _ => TrendDirection::Stable,
        };

        let recent_drift: Vec<DriftEvent> = track
            .drift_events
            .iter()
            .rev()
            .take(REPORT_RECENT_DRIFT)
            .rev()
            .cloned()
            .collect();

        let mut health: i64 = 100;
        if let Some(snapshot) = &latest {
            if snapshot.metrics.primary_score() < self.config.health_primary_threshold {
                health -= HEALTH_PRIMARY_DEDUCTION;
            }
        }
        health -= HEALTH_DRIFT_DEDUCTION * recent_drift.len() as i64;

        ModelReport {
            model: model.to_string(),
            latest,
            trend,
            top_features: track
                .feature_importance
                .iter()
                .take(REPORT_TOP_FEATURES)
                .cloned()
                .collect(),
            recent_drift,
            health_score: health.clamp(0, 100) as u8,
        }
    }
}
