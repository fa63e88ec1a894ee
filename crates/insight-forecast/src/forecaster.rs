// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::algorithms::{
    exponential_smoothing, resolve_algorithm, seasonal_projection, trend_extrapolation,
    z_for_confidence, Forecast, ForecastAlgorithm, ForecastStep, StepComponents, TechniqueFit,
};
use crate::series::{validate_series, SeriesPoint};
use chrono::Duration;
use insight_core::EngineError;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::debug;

const DEFAULT_MIN_HISTORY: usize = 7;
const DEFAULT_CONFIDENCE: f64 = 0.95;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ForecastConfig {
    pub min_history: usize,
    pub confidence: f64,
    /// Clamp forecasts and interval bounds into [0, 1]; on for rate series.
    pub unit_domain: bool,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            min_history: DEFAULT_MIN_HISTORY,
            confidence: DEFAULT_CONFIDENCE,
            unit_domain: true,
        }
    }
}

/// Forecasts validation-rate series per tracked entity.
///
/// A later forecast for the same entity supersedes the stored one; nothing
/// is merged.
pub struct ValidationForecaster {
    config: ForecastConfig,
    forecasts: RwLock<HashMap<String, Forecast>>,
}

impl ValidationForecaster {
    pub fn new(config: ForecastConfig) -> Result<Self, EngineError> {
        if config.min_history < 2 {
            return Err(EngineError::invalid_input(
                "min_history must be >= 2 to estimate any trend",
            ));
        }
        z_for_confidence(config.confidence)?;
        Ok(Self {
            config,
            forecasts: RwLock::new(HashMap::new()),
        })
    }

    /// Produces a `horizon`-step forecast from daily history.
    pub fn forecast(
        &self,
        entity_id: &str,
        history: &[SeriesPoint],
        horizon: usize,
        algorithm: ForecastAlgorithm,
    ) -> Result<Forecast, EngineError> {
        validate_series(history, self.config.min_history)?;
        if horizon == 0 {
            return Err(EngineError::invalid_input("horizon must be >= 1"));
        }

        let values: Vec<f64> = history.iter().map(|p| p.value).collect();
        let resolved = resolve_algorithm(&values, algorithm);
        let z = z_for_confidence(self.config.confidence)?;
        let last_date = history[history.len() - 1].date;

        let (fit, components) = match resolved {
            ForecastAlgorithm::TrendExtrapolation => (trend_extrapolation(&values, horizon), None),
            ForecastAlgorithm::ExponentialSmoothing => {
                (exponential_smoothing(&values, horizon), None)
            }
            ForecastAlgorithm::SeasonalDecomposition => {
                (seasonal_projection(&values, horizon), None)
            }
            ForecastAlgorithm::Ensemble => {
                let trend = trend_extrapolation(&values, horizon);
                let smoothed = exponential_smoothing(&values, horizon);
                let seasonal = seasonal_projection(&values, horizon);
                let forecasts: Vec<f64> = (0..horizon)
                    .map(|h| {
                        (trend.forecasts[h] + smoothed.forecasts[h] + seasonal.forecasts[h]) / 3.0
                    })
                    .collect();
                let residual_std = (trend.residual_std
                    + smoothed.residual_std
                    + seasonal.residual_std)
                    / 3.0;
                let components: Vec<StepComponents> = (0..horizon)
                    .map(|h| StepComponents {
                        trend_extrapolation: trend.forecasts[h],
                        exponential_smoothing: smoothed.forecasts[h],
                        seasonal_decomposition: seasonal.forecasts[h],
                    })
                    .collect();
                (
                    TechniqueFit {
                        forecasts,
                        residual_std,
                    },
                    Some(components),
                )
            }
            ForecastAlgorithm::Auto => unreachable!("auto is resolved above"),
        };

        let margin = z * fit.residual_std;
        let steps = (0..horizon)
            .map(|h| {
                let mut forecast = fit.forecasts[h];
                let mut lower = forecast - margin;
                let mut upper = forecast + margin;
                if self.config.unit_domain {
                    forecast = forecast.clamp(0.0, 1.0);
                    lower = lower.clamp(0.0, 1.0);
                    upper = upper.clamp(0.0, 1.0);
                }
                ForecastStep {
                    step: h + 1,
                    date: last_date + Duration::days((h + 1) as i64),
                    forecast,
                    lower,
                    upper,
                    components: components.as_ref().map(|c| c[h]),
                }
            })
            .collect();

        let forecast = Forecast {
            entity_id: entity_id.to_string(),
            algorithm: resolved,
            steps,
            residual_std: fit.residual_std,
            confidence_level: self.config.confidence,
        };
        debug!(
            entity = entity_id,
            algorithm = resolved.as_str(),
            horizon,
            "forecast produced"
        );
        self.forecasts
            .write()
            .insert(entity_id.to_string(), forecast.clone());
        Ok(forecast)
    }

    /// Pure accessor: the latest stored forecast for an entity.
    pub fn get_forecast(&self, entity_id: &str) -> Option<Forecast> {
        self.forecasts.read().get(entity_id).cloned()
    }

    /// Pure accessor: every entity's latest forecast.
    pub fn get_all_forecasts(&self) -> Vec<Forecast> {
        let mut all: Vec<Forecast> = self.forecasts.read().values().cloned().collect();
        all.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));
        all
    }
}

#[cfg(test)]
mod tests {
    use super::{ForecastConfig, ValidationForecaster};
    use crate::algorithms::ForecastAlgorithm;
    use crate::series::SeriesPoint;
    use chrono::NaiveDate;
    use insight_core::EngineError;

    fn day(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 1).unwrap() + chrono::Duration::days(offset)
    }

    fn series(values: &[f64]) -> Vec<SeriesPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| SeriesPoint::new(day(i as i64), *v))
            .collect()
    }

    fn forecaster() -> ValidationForecaster {
        ValidationForecaster::new(ForecastConfig::default()).unwrap()
    }

    #[test]
    fn flat_history_forecasts_within_tight_bounds() {
        let history = series(&vec![0.90; 14]);
        for algorithm in [
            ForecastAlgorithm::TrendExtrapolation,
            ForecastAlgorithm::ExponentialSmoothing,
            ForecastAlgorithm::SeasonalDecomposition,
            ForecastAlgorithm::Ensemble,
            ForecastAlgorithm::Auto,
        ] {
            let forecast = forecaster()
                .forecast("list-1", &history, 7, algorithm)
                .unwrap();
            for step in &forecast.steps {
                assert!(
                    (step.forecast - 0.90).abs() <= 0.05,
                    "{algorithm:?} step {} drifted to {}",
                    step.step,
                    step.forecast
                );
                assert!(step.lower <= step.forecast && step.forecast <= step.upper);
            }
        }
    }

    #[test]
    fn short_history_propagates_insufficient_history() {
        let err = forecaster()
            .forecast(
                "list-1",
                &series(&[0.9, 0.8, 0.9]),
                7,
                ForecastAlgorithm::Ensemble,
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::InsufficientHistory { .. }));
    }

    #[test]
    fn ensemble_exposes_per_component_values() {
        let values: Vec<f64> = (0..14).map(|t| 0.5 + 0.01 * t as f64).collect();
        let forecast = forecaster()
            .forecast("list-1", &series(&values), 3, ForecastAlgorithm::Ensemble)
            .unwrap();
        for step in &forecast.steps {
            let components = step.components.expect("ensemble reports components");
            let mean = (components.trend_extrapolation
                + components.exponential_smoothing
                + components.seasonal_decomposition)
                / 3.0;
            // Forecast is the per-step average (up to unit-domain clamping).
            assert!((step.forecast - mean.clamp(0.0, 1.0)).abs() < 1e-9);
        }
    }

    #[test]
    fn later_forecast_supersedes_the_stored_one() {
        let forecaster = forecaster();
        let first = forecaster
            .forecast(
                "list-1",
                &series(&vec![0.9; 14]),
                3,
                ForecastAlgorithm::ExponentialSmoothing,
            )
            .unwrap();
        let second = forecaster
            .forecast(
                "list-1",
                &series(&vec![0.5; 14]),
                5,
                ForecastAlgorithm::ExponentialSmoothing,
            )
            .unwrap();
        assert_ne!(first, second);
        let stored = forecaster.get_forecast("list-1").unwrap();
        assert_eq!(stored, second);
        assert_eq!(stored.steps.len(), 5);
        assert_eq!(forecaster.get_all_forecasts().len(), 1);
    }

    #[test]
    fn forecast_dates_continue_daily_from_history_end() {
        let forecast = forecaster()
            .forecast(
                "list-1",
                &series(&vec![0.8; 10]),
                3,
                ForecastAlgorithm::ExponentialSmoothing,
            )
            .unwrap();
        assert_eq!(forecast.steps[0].date, day(10));
        assert_eq!(forecast.steps[2].date, day(12));
    }

    #[test]
    fn intervals_widen_with_noisier_history() {
        let noisy: Vec<f64> = (0..20)
            .map(|t| 0.5 + if t % 2 == 0 { 0.2 } else { -0.2 })
            .collect();
        let quiet = vec![0.5; 20];

        let f = forecaster();
        let noisy_forecast = f
            .forecast("noisy", &series(&noisy), 2, ForecastAlgorithm::ExponentialSmoothing)
            .unwrap();
        let quiet_forecast = f
            .forecast("quiet", &series(&quiet), 2, ForecastAlgorithm::ExponentialSmoothing)
            .unwrap();

        let noisy_width = noisy_forecast.steps[0].upper - noisy_forecast.steps[0].lower;
        let quiet_width = quiet_forecast.steps[0].upper - quiet_forecast.steps[0].lower;
        assert!(noisy_width > quiet_width, "noisy={noisy_width}, quiet={quiet_width}");
    }

    #[test]
    fn zero_horizon_is_invalid() {
        let err = forecaster()
            .forecast(
                "list-1",
                &series(&vec![0.9; 14]),
                0,
                ForecastAlgorithm::Ensemble,
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }
}
