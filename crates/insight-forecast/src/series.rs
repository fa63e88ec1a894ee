// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use chrono::NaiveDate;
use insight_core::EngineError;
use serde::{Deserialize, Serialize};

/// Weekly seasonality period used throughout the forecasting family.
pub const WEEKLY_PERIOD: usize = 7;

/// One dated observation of a tracked metric.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub value: f64,
}

impl SeriesPoint {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self { date, value }
    }
}

/// Validates a history series before any forecasting computation starts.
pub fn validate_series(points: &[SeriesPoint], min_len: usize) -> Result<(), EngineError> {
    if points.len() < min_len {
        return Err(EngineError::insufficient_history(min_len, points.len()));
    }
    for (index, point) in points.iter().enumerate() {
        if !point.value.is_finite() {
            return Err(EngineError::invalid_input(format!(
                "series value at index {index} is not finite"
            )));
        }
    }
    if points.windows(2).any(|w| w[1].date < w[0].date) {
        return Err(EngineError::invalid_input(
            "series points must be ordered by date",
        ));
    }
    Ok(())
}

/// Trend and weekly seasonal decomposition of a series.
#[derive(Clone, Debug, PartialEq)]
pub struct Decomposition {
    /// Centered moving-average trend, one value per observation.
    pub trend: Vec<f64>,
    /// Mean-centered weekly offsets indexed by `t % 7`.
    pub seasonal: [f64; WEEKLY_PERIOD],
    /// Std deviation of what trend + seasonal leave unexplained.
    pub residual_std: f64,
}

/// Decomposes values into a moving-average trend and a mean-centered weekly
/// profile; everything the two do not explain is residual.
pub fn decompose(values: &[f64]) -> Decomposition {
    let n = values.len();
    let trend = centered_moving_average(values, WEEKLY_PERIOD);

    let mut sums = [0.0f64; WEEKLY_PERIOD];
    let mut counts = [0usize; WEEKLY_PERIOD];
    for (t, value) in values.iter().enumerate() {
        let phase = t % WEEKLY_PERIOD;
        sums[phase] += value - trend[t];
        counts[phase] += 1;
    }
    let mut seasonal = [0.0f64; WEEKLY_PERIOD];
    for phase in 0..WEEKLY_PERIOD {
        if counts[phase] > 0 {
            seasonal[phase] = sums[phase] / counts[phase] as f64;
        }
    }
    let offset_mean = seasonal.iter().sum::<f64>() / WEEKLY_PERIOD as f64;
    for value in &mut seasonal {
        *value -= offset_mean;
    }

    let mut residual_sq = 0.0;
    for (t, value) in values.iter().enumerate() {
        let explained = trend[t] + seasonal[t % WEEKLY_PERIOD];
        let residual = value - explained;
        residual_sq += residual * residual;
    }
    let residual_std = if n == 0 {
        0.0
    } else {
        (residual_sq / n as f64).sqrt()
    };

    Decomposition {
        trend,
        seasonal,
        residual_std,
    }
}

/// Centered moving average with shrinking windows at the edges.
fn centered_moving_average(values: &[f64], window: usize) -> Vec<f64> {
    let n = values.len();
    if n == 0 {
        return vec![];
    }
    let half = window / 2;
    let mut out = Vec::with_capacity(n);
    for t in 0..n {
        let start = t.saturating_sub(half);
        let end = (t + half + 1).min(n);
        let slice = &values[start..end];
        out.push(slice.iter().sum::<f64>() / slice.len() as f64);
    }
    out
}
