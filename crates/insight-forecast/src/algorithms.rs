// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::series::{decompose, WEEKLY_PERIOD};
use chrono::NaiveDate;
use insight_core::{linear_fit, population_variance, EngineError};
use serde::{Deserialize, Serialize};

/// Holt smoothing constants, fixed by contract.
pub const SMOOTHING_ALPHA: f64 = 0.3;
pub const SMOOTHING_BETA: f64 = 0.1;

/// Auto-selection cutoffs.
const AUTO_SEASONAL_STRENGTH: f64 = 0.3;
const AUTO_TREND_STRENGTH: f64 = 0.6;

/// Closed set of forecasting techniques.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastAlgorithm {
    TrendExtrapolation,
    ExponentialSmoothing,
    SeasonalDecomposition,
    Ensemble,
    /// Resolved to a concrete technique from the series' shape.
    Auto,
}

impl ForecastAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TrendExtrapolation => "trend_extrapolation",
            Self::ExponentialSmoothing => "exponential_smoothing",
            Self::SeasonalDecomposition => "seasonal_decomposition",
            Self::Ensemble => "ensemble",
            Self::Auto => "auto",
        }
    }
}

/// Per-technique values behind an ensemble step.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepComponents {
    pub trend_extrapolation: f64,
    pub exponential_smoothing: f64,
    pub seasonal_decomposition: f64,
}

/// One step of a multi-step forecast.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForecastStep {
    pub step: usize,
    pub date: NaiveDate,
    pub forecast: f64,
    pub lower: f64,
    pub upper: f64,
    pub components: Option<StepComponents>,
}

/// A multi-step-ahead prediction series for one tracked entity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub entity_id: String,
    /// The technique that actually ran (never `Auto`).
    pub algorithm: ForecastAlgorithm,
    pub steps: Vec<ForecastStep>,
    pub residual_std: f64,
    pub confidence_level: f64,
}

/// Picks a concrete technique for `Auto`: strong weekly variance favors the
/// seasonal model, a strong linear fit favors trend extrapolation, and
/// exponential smoothing is the default.
pub fn resolve_algorithm(values: &[f64], requested: ForecastAlgorithm) -> ForecastAlgorithm {
    if requested != ForecastAlgorithm::Auto {
        return requested;
    }

    let total_variance = population_variance(values).unwrap_or(0.0);
    if total_variance <= f64::EPSILON {
        return ForecastAlgorithm::ExponentialSmoothing;
    }

    let decomposition = decompose(values);
    let seasonal_variance = decomposition
        .seasonal
        .iter()
        .map(|s| s * s)
        .sum::<f64>()
        / WEEKLY_PERIOD as f64;
    if seasonal_variance / total_variance >= AUTO_SEASONAL_STRENGTH {
        return ForecastAlgorithm::SeasonalDecomposition;
    }

    if trend_strength(values) >= AUTO_TREND_STRENGTH {
        return ForecastAlgorithm::TrendExtrapolation;
    }
    ForecastAlgorithm::ExponentialSmoothing
}

/// R² of the least-squares line through the series.
fn trend_strength(values: &[f64]) -> f64 {
    let samples: Vec<(f64, f64)> = values
        .iter()
        .enumerate()
        .map(|(t, v)| (t as f64, *v))
        .collect();
    let Some((intercept, slope)) = linear_fit(&samples) else {
        return 0.0;
    };
    let total = match population_variance(values) {
        Some(v) if v > 0.0 => v * values.len() as f64,
        _ => return 0.0,
    };
    let residual: f64 = samples
        .iter()
        .map(|(t, v)| {
            let fitted = intercept + slope * t;
            (v - fitted) * (v - fitted)
        })
        .sum();
    (1.0 - residual / total).clamp(0.0, 1.0)
}

/// Point forecasts plus in-sample residual std for one technique.
pub(crate) struct TechniqueFit {
    pub forecasts: Vec<f64>,
    pub residual_std: f64,
}

/// Differences the series, estimates a constant drift, and projects it
/// forward from the last observation.
pub(crate) fn trend_extrapolation(values: &[f64], horizon: usize) -> TechniqueFit {
    let n = values.len();
    let drift = if n < 2 {
        0.0
    } else {
        values
            .windows(2)
            .map(|w| w[1] - w[0])
            .sum::<f64>()
            / (n - 1) as f64
    };
    let last = values[n - 1];
    let forecasts = (0..horizon)
        .map(|h| last + drift * (h + 1) as f64)
        .collect();

    // One-step-ahead fit: previous value plus drift.
    let residual_std = one_step_residual_std(values, |t| values[t - 1] + drift);
    TechniqueFit {
        forecasts,
        residual_std,
    }
}

/// Holt double exponential smoothing with fixed constants.
pub(crate) fn exponential_smoothing(values: &[f64], horizon: usize) -> TechniqueFit {
    let mut level = values[0];
    let mut trend = if values.len() > 1 {
        values[1] - values[0]
    } else {
        0.0
    };

    let mut residual_sq = 0.0;
    let mut residual_count = 0usize;
    for value in values.iter().skip(1) {
        let predicted = level + trend;
        let residual = value - predicted;
        residual_sq += residual * residual;
        residual_count += 1;

        let previous_level = level;
        level = SMOOTHING_ALPHA * value + (1.0 - SMOOTHING_ALPHA) * (level + trend);
        trend = SMOOTHING_BETA * (level - previous_level) + (1.0 - SMOOTHING_BETA) * trend;
    }

    let forecasts = (0..horizon)
        .map(|h| level + trend * (h + 1) as f64)
        .collect();
    let residual_std = if residual_count == 0 {
        0.0
    } else {
        (residual_sq / residual_count as f64).sqrt()
    };
    TechniqueFit {
        forecasts,
        residual_std,
    }
}

/// Projects the decomposed trend linearly and re-applies the weekly offsets
/// cyclically.
pub(crate) fn seasonal_projection(values: &[f64], horizon: usize) -> TechniqueFit {
    let n = values.len();
    let decomposition = decompose(values);

    let samples: Vec<(f64, f64)> = decomposition
        .trend
        .iter()
        .enumerate()
        .map(|(t, v)| (t as f64, *v))
        .collect();
    let (intercept, slope) = linear_fit(&samples).unwrap_or((values[n - 1], 0.0));

    let forecasts = (0..horizon)
        .map(|h| {
            let t = (n + h) as f64;
            intercept + slope * t + decomposition.seasonal[(n + h) % WEEKLY_PERIOD]
        })
        .collect();
    TechniqueFit {
        forecasts,
        residual_std: decomposition.residual_std,
    }
}

fn one_step_residual_std(values: &[f64], predict: impl Fn(usize) -> f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mut residual_sq = 0.0;
    for t in 1..values.len() {
        let residual = values[t] - predict(t);
        residual_sq += residual * residual;
    }
    (residual_sq / (values.len() - 1) as f64).sqrt()
}

/// z multiplier for the configured confidence level.
pub(crate) fn z_for_confidence(confidence: f64) -> Result<f64, EngineError> {
    if !(0.5..1.0).contains(&confidence) {
        return Err(EngineError::invalid_input(format!(
            "confidence level must be within [0.5, 1), got {confidence}"
        )));
    }
    Ok(if confidence >= 0.99 {
        2.576
    } else if confidence >= 0.95 {
        1.96
    } else if confidence >= 0.90 {
        1.645
    } else {
        1.282
    })
}

#[cfg(test)]
mod tests {
    use super::{
        exponential_smoothing, resolve_algorithm, seasonal_projection, trend_extrapolation,
        z_for_confidence, ForecastAlgorithm,
    };

    #[test]
    fn flat_series_projects_flat_under_every_technique() {
        let values = vec![0.9; 14];
        for fit in [
            trend_extrapolation(&values, 5),
            exponential_smoothing(&values, 5),
            seasonal_projection(&values, 5),
        ] {
            for forecast in &fit.forecasts {
                assert!((forecast - 0.9).abs() < 1e-9, "forecast={forecast}");
            }
            assert!(fit.residual_std < 1e-9);
        }
    }

    #[test]
    fn linear_series_extrapolates_the_drift() {
        let values: Vec<f64> = (0..10).map(|t| 1.0 + 0.5 * t as f64).collect();
        let fit = trend_extrapolation(&values, 3);
        assert!((fit.forecasts[0] - 6.0).abs() < 1e-9);
        assert!((fit.forecasts[2] - 7.0).abs() < 1e-9);
    }

    #[test]
    fn smoothing_tracks_a_level_shift() {
        let mut values = vec![10.0; 10];
        values.extend(std::iter::repeat(20.0).take(10));
        let fit = exponential_smoothing(&values, 1);
        assert!(
            fit.forecasts[0] > 15.0,
            "forecast={} should have moved toward the new level",
            fit.forecasts[0]
        );
    }

    #[test]
    fn seasonal_projection_repeats_the_weekly_shape() {
        let values: Vec<f64> = (0..28)
            .map(|t| if t % 7 >= 5 { 0.6 } else { 0.9 })
            .collect();
        let fit = seasonal_projection(&values, 7);
        // Steps land at phases 0..6 of the week after the history ends;
        // weekend steps must come out below weekday steps.
        let weekend: f64 = (fit.forecasts[5] + fit.forecasts[6]) / 2.0;
        let weekday: f64 = fit.forecasts[..5].iter().sum::<f64>() / 5.0;
        assert!(weekend < weekday - 0.1, "weekend={weekend}, weekday={weekday}");
    }

    #[test]
    fn auto_resolution_prefers_shape_evidence() {
        let seasonal: Vec<f64> = (0..28)
            .map(|t| if t % 7 >= 5 { 0.3 } else { 0.9 })
            .collect();
        assert_eq!(
            resolve_algorithm(&seasonal, ForecastAlgorithm::Auto),
            ForecastAlgorithm::SeasonalDecomposition
        );

        let trending: Vec<f64> = (0..20).map(|t| t as f64 * 0.5).collect();
        assert_eq!(
            resolve_algorithm(&trending, ForecastAlgorithm::Auto),
            ForecastAlgorithm::TrendExtrapolation
        );

        let flat = vec![0.5; 20];
        assert_eq!(
            resolve_algorithm(&flat, ForecastAlgorithm::Auto),
            ForecastAlgorithm::ExponentialSmoothing
        );

        // Explicit requests pass through untouched.
        assert_eq!(
            resolve_algorithm(&flat, ForecastAlgorithm::Ensemble),
            ForecastAlgorithm::Ensemble
        );
    }

    #[test]
    fn confidence_z_lookup_matches_standard_values() {
        assert_eq!(z_for_confidence(0.95).unwrap(), 1.96);
        assert_eq!(z_for_confidence(0.99).unwrap(), 2.576);
        assert_eq!(z_for_confidence(0.90).unwrap(), 1.645);
        assert!(z_for_confidence(1.5).is_err());
        assert!(z_for_confidence(0.2).is_err());
    }
}
