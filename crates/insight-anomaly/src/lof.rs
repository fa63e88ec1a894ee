// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use insight_core::clamp_unit;

/// LOF ratio at (or below) which a point looks like its neighborhood.
const LOF_BASELINE: f64 = 1.0;
/// LOF ratio mapped to the top of the unit scale.
const LOF_SATURATION: f64 = 3.0;

/// Local-outlier-factor scores for every row of the matrix.
///
/// Naive neighbor search by full pairwise Euclidean distance; the documented
/// simplified construction rather than a spatial index.
pub fn lof_scores(matrix: &[Vec<f64>], k: usize) -> Vec<f64> {
    let n = matrix.len();
    if n < 3 || k == 0 {
        return vec![0.0; n];
    }
    let k = k.min(n - 1);

    // Sorted neighbor lists per point.
    let mut neighbors: Vec<Vec<(f64, usize)>> = Vec::with_capacity(n);
    for i in 0..n {
        let mut distances: Vec<(f64, usize)> = (0..n)
            .filter(|&j| j != i)
            .map(|j| (euclidean(&matrix[i], &matrix[j]), j))
            .collect();
        distances.sort_by(|a, b| a.0.total_cmp(&b.0));
        distances.truncate(k);
        neighbors.push(distances);
    }

    let k_distance: Vec<f64> = neighbors
        .iter()
        .map(|list| list.last().map(|(d, _)| *d).unwrap_or(0.0))
        .collect();

    // Local reachability density per point.
    let mut lrd = vec![0.0f64; n];
    for i in 0..n {
        let reach_sum: f64 = neighbors[i]
            .iter()
            .map(|(distance, j)| distance.max(k_distance[*j]))
            .sum();
        let avg_reach = reach_sum / neighbors[i].len() as f64;
        // Coincident neighborhoods get an effectively infinite density.
        lrd[i] = if avg_reach <= f64::EPSILON {
            f64::INFINITY
        } else {
            1.0 / avg_reach
        };
    }

    (0..n)
        .map(|i| {
            if lrd[i].is_infinite() {
                return 0.0;
            }
            let neighbor_avg: f64 = neighbors[i]
                .iter()
                .map(|(_, j)| lrd[*j])
                .sum::<f64>()
                / neighbors[i].len() as f64;
            let ratio = if neighbor_avg.is_infinite() {
                LOF_SATURATION
            } else {
                neighbor_avg / lrd[i]
            };
            ratio_to_unit(ratio)
        })
        .collect()
}

/// Maps an LOF ratio onto [0, 1]: ratios at the baseline or below score 0,
/// the saturation ratio and beyond score 1.
pub fn ratio_to_unit(ratio: f64) -> f64 {
    if !ratio.is_finite() {
        return 1.0;
    }
    clamp_unit((ratio - LOF_BASELINE) / (LOF_SATURATION - LOF_BASELINE))
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::{lof_scores, ratio_to_unit};

    #[test]
    fn uniform_grid_has_low_scores_everywhere() {
        let matrix: Vec<Vec<f64>> = (0..25)
            .map(|i| vec![(i % 5) as f64, (i / 5) as f64])
            .collect();
        let scores = lof_scores(&matrix, 5);
        for score in &scores {
            assert!(*score < 0.4, "score={score}");
        }
    }

    #[test]
    fn isolated_point_scores_highest() {
        let mut matrix: Vec<Vec<f64>> = (0..20)
            .map(|i| vec![(i % 5) as f64 * 0.1, (i / 5) as f64 * 0.1])
            .collect();
        matrix.push(vec![10.0, 10.0]);
        let scores = lof_scores(&matrix, 5);
        let outlier = scores[scores.len() - 1];
        let max_inlier = scores[..scores.len() - 1]
            .iter()
            .fold(0.0f64, |acc, s| acc.max(*s));
        assert!(outlier > max_inlier, "outlier={outlier}, inliers={max_inlier}");
        assert!(outlier > 0.5, "outlier={outlier}");
    }

    #[test]
    fn scores_stay_in_unit_interval() {
        let matrix: Vec<Vec<f64>> = (0..15)
            .map(|i| vec![i as f64 * i as f64, (i % 3) as f64])
            .collect();
        for score in lof_scores(&matrix, 4) {
            assert!((0.0..=1.0).contains(&score), "score={score}");
        }
    }

    #[test]
    fn degenerate_inputs_score_zero() {
        assert_eq!(lof_scores(&[vec![1.0]], 3), vec![0.0]);
        let coincident = vec![vec![1.0, 1.0]; 5];
        let scores = lof_scores(&coincident, 2);
        assert!(scores.iter().all(|s| *s == 0.0), "scores={scores:?}");
    }

    #[test]
    fn ratio_mapping_is_anchored_at_baseline_and_saturation() {
        assert_eq!(ratio_to_unit(1.0), 0.0);
        assert_eq!(ratio_to_unit(0.5), 0.0);
        assert_eq!(ratio_to_unit(3.0), 1.0);
        assert_eq!(ratio_to_unit(5.0), 1.0);
        assert!((ratio_to_unit(2.0) - 0.5).abs() < 1e-12);
    }
}
