// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod drift;
pub mod measures;
pub mod tracker;

pub use drift::{drift_severity, ks_statistic, DriftEvent};
pub use measures::{
    classification_metrics, regression_metrics, ClassificationMetrics, MetricKind,
    MetricSnapshot, RegressionMetrics,
};
pub use tracker::{MetricsTracker, ModelReport, TrackerConfig, TrendDirection};
