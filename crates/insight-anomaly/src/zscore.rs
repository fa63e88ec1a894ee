// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use insight_core::{clamp_unit, mean, population_stddev};

/// Per-record z-score summary over one feature matrix.
#[derive(Clone, Debug, PartialEq)]
pub struct ZScoreFinding {
    pub score: f64,
    /// (feature index, |z|) for every feature that crossed the threshold.
    pub exceeded: Vec<(usize, f64)>,
}

/// The base z threshold scaled by sensitivity: `3 × (1 − sensitivity)`.
pub fn z_threshold(sensitivity: f64) -> f64 {
    3.0 * (1.0 - sensitivity.clamp(0.0, 1.0))
}

/// Flags records whose features deviate from the batch's own mean/stddev.
///
/// A record's score stays below 0.5 until some feature crosses the
/// threshold, then grows toward 1.0 as the worst deviation reaches twice
/// the threshold.
pub fn z_score_findings(matrix: &[Vec<f64>], sensitivity: f64) -> Vec<ZScoreFinding> {
    let n = matrix.len();
    if n < 2 {
        return vec![
            ZScoreFinding {
                score: 0.0,
                exceeded: vec![],
            };
            n
        ];
    }
    let dims = matrix[0].len();
    let threshold = z_threshold(sensitivity).max(f64::EPSILON);

    let mut stats = Vec::with_capacity(dims);
    for feature in 0..dims {
        let column: Vec<f64> = matrix.iter().map(|row| row[feature]).collect();
        stats.push((
            mean(&column).unwrap_or(0.0),
            population_stddev(&column).unwrap_or(0.0),
        ));
    }

    matrix
        .iter()
        .map(|row| {
            let mut worst = 0.0f64;
            let mut exceeded = Vec::new();
            for (feature, value) in row.iter().enumerate() {
                let (mu, sigma) = stats[feature];
                if sigma <= 0.0 {
                    continue;
                }
                let z = ((value - mu) / sigma).abs();
                worst = worst.max(z);
                if z > threshold {
                    exceeded.push((feature, z));
                }
            }
            let score = if exceeded.is_empty() {
                clamp_unit(0.3 * worst / threshold).min(0.49)
            } else {
                clamp_unit(0.5 + 0.5 * ((worst - threshold) / threshold))
            };
            ZScoreFinding { score, exceeded }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{z_score_findings, z_threshold};

    #[test]
    fn threshold_scales_with_sensitivity() {
        assert_eq!(z_threshold(0.0), 3.0);
        assert_eq!(z_threshold(0.5), 1.5);
        assert_eq!(z_threshold(1.0), 0.0);
        // Out-of-range sensitivity is clamped.
        assert_eq!(z_threshold(2.0), 0.0);
    }

    #[test]
    fn spike_crosses_threshold_and_names_the_feature() {
        let mut matrix: Vec<Vec<f64>> = (0..20).map(|i| vec![10.0 + (i % 3) as f64 * 0.1]).collect();
        matrix.push(vec![100.0]);
        let findings = z_score_findings(&matrix, 0.5);

        let spike = findings.last().unwrap();
        assert!(spike.score >= 0.5, "score={}", spike.score);
        assert_eq!(spike.exceeded.len(), 1);
        assert_eq!(spike.exceeded[0].0, 0);

        for finding in &findings[..findings.len() - 1] {
            assert!(finding.exceeded.is_empty());
            assert!(finding.score < 0.5);
        }
    }

    #[test]
    fn uniform_batch_produces_no_findings() {
        let matrix = vec![vec![1.0, 2.0]; 10];
        for finding in z_score_findings(&matrix, 0.5) {
            assert_eq!(finding.score, 0.0);
            assert!(finding.exceeded.is_empty());
        }
    }

    #[test]
    fn scores_stay_in_unit_interval() {
        let matrix: Vec<Vec<f64>> = (0..12)
            .map(|i| vec![i as f64 * i as f64, (12 - i) as f64])
            .collect();
        for finding in z_score_findings(&matrix, 0.9) {
            assert!((0.0..=1.0).contains(&finding.score), "score={}", finding.score);
        }
    }
}
