// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod algorithms;
pub mod campaign;
pub mod degradation;
pub mod forecaster;
pub mod series;

pub use algorithms::{Forecast, ForecastAlgorithm, ForecastStep, StepComponents};
pub use campaign::{
    AbTestEvaluation, BenchmarkRates, CampaignEconomics, CampaignForecast, CampaignPredictor,
};
pub use degradation::{
    DecayAssessment, DegradationConfig, DegradationTracker, RevalidationInterval,
};
pub use forecaster::{ForecastConfig, ValidationForecaster};
pub use series::{decompose, Decomposition, SeriesPoint, WEEKLY_PERIOD};
