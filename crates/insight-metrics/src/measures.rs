// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use chrono::{DateTime, Utc};
use insight_core::EngineError;
use serde::{Deserialize, Serialize};

const DEFAULT_DECISION_THRESHOLD: f64 = 0.5;

/// Binary classification summary at a fixed decision threshold.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub true_positives: usize,
    pub false_positives: usize,
    pub true_negatives: usize,
    pub false_negatives: usize,
}

/// Regression error summary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub mse: f64,
    pub rmse: f64,
    pub mae: f64,
    pub r2: f64,
    pub mape: f64,
}

/// The metric family a snapshot carries.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MetricKind {
    Classification(ClassificationMetrics),
    Regression(RegressionMetrics),
}

impl MetricKind {
    /// The single score degradation checks and health scoring key on:
    /// accuracy for classifiers, R² for regressors.
    pub fn primary_score(&self) -> f64 {
        match self {
            Self::Classification(m) => m.accuracy,
            Self::Regression(m) => m.r2,
        }
    }
}

/// One performance measurement of a model at a point in time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub model: String,
    pub metrics: MetricKind,
    pub sample_count: usize,
    pub at: DateTime<Utc>,
}

fn validate_shapes(
    context: &str,
    predictions: &[f64],
    actuals: &[f64],
) -> Result<(), EngineError> {
    if predictions.len() != actuals.len() {
        return Err(EngineError::shape_mismatch(
            context,
            predictions.len(),
            actuals.len(),
        ));
    }
    if predictions.is_empty() {
        return Err(EngineError::invalid_input(format!(
            "{context} requires at least one sample"
        )));
    }
    for (index, value) in predictions.iter().chain(actuals.iter()).enumerate() {
        if !value.is_finite() {
            return Err(EngineError::invalid_input(format!(
                "{context} input contains non-finite value at flat index {index}"
            )));
        }
    }
    Ok(())
}

/// Computes binary classification metrics; scores are thresholded at 0.5
/// unless `threshold` overrides it.
pub fn classification_metrics(
    predictions: &[f64],
    actuals: &[f64],
    threshold: Option<f64>,
) -> Result<ClassificationMetrics, EngineError> {
    validate_shapes("classification metrics", predictions, actuals)?;
    let threshold = threshold.unwrap_or(DEFAULT_DECISION_THRESHOLD);
    if !threshold.is_finite() {
        return Err(EngineError::invalid_input(
            "classification threshold must be finite",
        ));
    }

    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut tn = 0usize;
    let mut fn_ = 0usize;
    for (prediction, actual) in predictions.iter().zip(actuals) {
        let predicted_positive = *prediction >= threshold;
        let actually_positive = *actual >= threshold;
        match (predicted_positive, actually_positive) {
            (true, true) => tp += 1,
            (true, false) => fp += 1,
            (false, false) => tn += 1,
            (false, true) => fn_ += 1,
        }
    }

    let total = predictions.len() as f64;
    let accuracy = (tp + tn) as f64 / total;
    let precision = if tp + fp == 0 {
        0.0
    } else {
        tp as f64 / (tp + fp) as f64
    };
    let recall = if tp + fn_ == 0 {
        0.0
    } else {
        tp as f64 / (tp + fn_) as f64
    };
    let f1 = if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    };

    Ok(ClassificationMetrics {
        accuracy,
        precision,
        recall,
        f1,
        true_positives: tp,
        false_positives: fp,
        true_negatives: tn,
        false_negatives: fn_,
    })
}

/// Computes regression error metrics, including MAPE over non-zero actuals.
pub fn regression_metrics(
    predictions: &[f64],
    actuals: &[f64],
) -> Result<RegressionMetrics, EngineError> {
    validate_shapes("regression metrics", predictions, actuals)?;

    let n = predictions.len() as f64;
    let mut squared_error = 0.0;
    let mut absolute_error = 0.0;
    let mut percentage_error = 0.0;
    let mut percentage_count = 0usize;
    for (prediction, actual) in predictions.iter().zip(actuals) {
        let error = prediction - actual;
        squared_error += error * error;
        absolute_error += error.abs();
        if *actual != 0.0 {
            percentage_error += (error / actual).abs();
            percentage_count += 1;
        }
    }

    let mse = squared_error / n;
    let mae = absolute_error / n;
    let mape = if percentage_count == 0 {
        0.0
    } else {
        percentage_error / percentage_count as f64 * 100.0
    };

    let actual_mean = actuals.iter().sum::<f64>() / n;
    let total_variance = actuals
        .iter()
        .map(|a| (a - actual_mean) * (a - actual_mean))
        .sum::<f64>();
    // Constant actuals leave R² undefined; a perfect fit reports 1, anything
    // else reports 0.
    let r2 = if total_variance == 0.0 {
        if squared_error == 0.0 {
            1.0
        } else {
            0.0
        }
    } else {
        1.0 - squared_error / total_variance
    };

    Ok(RegressionMetrics {
        mse,
        rmse: mse.sqrt(),
        mae,
        r2,
        mape,
    })
}

#[cfg(test)]
mod tests {
    use super::{classification_metrics, regression_metrics, MetricKind};
    use insight_core::EngineError;

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "actual={actual}, expected={expected}, tol={tol}"
        );
    }

    #[test]
    fn unequal_lengths_are_a_shape_mismatch() {
        let err = classification_metrics(&[1.0, 0.0], &[1.0], None).unwrap_err();
        assert!(matches!(err, EngineError::ShapeMismatch { .. }));

        let err = regression_metrics(&[1.0], &[1.0, 2.0]).unwrap_err();
        assert!(matches!(err, EngineError::ShapeMismatch { .. }));
    }

    #[test]
    fn classification_counts_confusion_cells() {
        let predictions = [0.9, 0.8, 0.2, 0.1, 0.7, 0.3];
        let actuals = [1.0, 0.0, 0.0, 1.0, 1.0, 0.0];
        let m = classification_metrics(&predictions, &actuals, None).unwrap();
        assert_eq!(m.true_positives, 2);
        assert_eq!(m.false_positives, 1);
        assert_eq!(m.true_negatives, 2);
        assert_eq!(m.false_negatives, 1);
        assert_close(m.accuracy, 4.0 / 6.0, 1e-12);
        assert_close(m.precision, 2.0 / 3.0, 1e-12);
        assert_close(m.recall, 2.0 / 3.0, 1e-12);
        assert_close(m.f1, 2.0 / 3.0, 1e-12);
    }

    #[test]
    fn perfect_classifier_scores_one_everywhere() {
        let predictions = [1.0, 0.0, 1.0, 0.0];
        let actuals = [1.0, 0.0, 1.0, 0.0];
        let m = classification_metrics(&predictions, &actuals, None).unwrap();
        assert_eq!(m.accuracy, 1.0);
        assert_eq!(m.f1, 1.0);
    }

    #[test]
    fn degenerate_classifier_reports_zero_precision_and_recall() {
        // Never predicts positive; two positives exist.
        let predictions = [0.1, 0.2, 0.3];
        let actuals = [1.0, 1.0, 0.0];
        let m = classification_metrics(&predictions, &actuals, None).unwrap();
        assert_eq!(m.precision, 0.0);
        assert_eq!(m.recall, 0.0);
        assert_eq!(m.f1, 0.0);
    }

    #[test]
    fn regression_metrics_match_hand_computation() {
        let predictions = [2.5, 0.0, 2.0, 8.0];
        let actuals = [3.0, -0.5, 2.0, 7.0];
        let m = regression_metrics(&predictions, &actuals).unwrap();
        assert_close(m.mse, 0.375, 1e-12);
        assert_close(m.rmse, 0.375f64.sqrt(), 1e-12);
        assert_close(m.mae, 0.5, 1e-12);
        assert_close(m.r2, 0.9489, 1e-3);
    }

    #[test]
    fn mape_skips_zero_actuals() {
        let predictions = [1.1, 2.0];
        let actuals = [1.0, 0.0];
        let m = regression_metrics(&predictions, &actuals).unwrap();
        assert_close(m.mape, 10.0, 1e-9);
    }

    #[test]
    fn constant_actuals_keep_r2_bounded() {
        let m = regression_metrics(&[5.0, 5.0], &[5.0, 5.0]).unwrap();
        assert_eq!(m.r2, 1.0);
        let m = regression_metrics(&[4.0, 6.0], &[5.0, 5.0]).unwrap();
        assert_eq!(m.r2, 0.0);
    }

    #[test]
    fn non_finite_inputs_are_rejected() {
        let err = regression_metrics(&[f64::NAN], &[1.0]).unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[test]
    fn primary_score_selects_accuracy_or_r2() {
        let classification = classification_metrics(&[1.0, 0.0], &[1.0, 0.0], None).unwrap();
        assert_eq!(MetricKind::Classification(classification).primary_score(), 1.0);

        let regression = regression_metrics(&[1.0, 2.0], &[1.0, 2.0]).unwrap();
        assert_eq!(MetricKind::Regression(regression).primary_score(), 1.0);
    }
}
