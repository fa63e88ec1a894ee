// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const EULER_MASCHERONI: f64 = 0.577_215_664_901_532_9;

/// Expected unsuccessful-search path length in a binary search tree of `n`
/// points; the normalizer in the isolation score.
pub fn average_path_length(n: usize) -> f64 {
    if n < 2 {
        return 0.0;
    }
    let n = n as f64;
    2.0 * ((n - 1.0).ln() + EULER_MASCHERONI) - 2.0 * (n - 1.0) / n
}

enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

/// Randomized partition forest over the full sample.
///
/// Deliberately the simplified construction: every tree sees every point
/// (no subsampling), and split features/thresholds are drawn uniformly over
/// the observed ranges.
pub struct IsolationForest {
    trees: Vec<Node>,
    sample_size: usize,
}

impl IsolationForest {
    pub fn fit(matrix: &[Vec<f64>], tree_count: usize, seed: u64) -> Self {
        let n = matrix.len();
        let mut rng = StdRng::seed_from_u64(seed);
        let max_depth = if n < 2 {
            0
        } else {
            (n as f64).log2().ceil() as usize
        };

        let indices: Vec<usize> = (0..n).collect();
        let trees = (0..tree_count)
            .map(|_| build_tree(matrix, &indices, 0, max_depth, &mut rng))
            .collect();
        Self {
            trees,
            sample_size: n,
        }
    }

    /// Anomaly score in [0, 1]: `2^(-avg_path / c(n))`. Shorter isolation
    /// paths score higher.
    pub fn score(&self, matrix: &[Vec<f64>], row: usize) -> f64 {
        if self.sample_size < 2 || self.trees.is_empty() {
            return 0.0;
        }
        let total: f64 = self
            .trees
            .iter()
            .map(|tree| path_length(tree, &matrix[row], 0))
            .sum();
        let avg = total / self.trees.len() as f64;
        let c = average_path_length(self.sample_size);
        if c <= 0.0 {
            return 0.0;
        }
        2f64.powf(-avg / c)
    }
}

fn build_tree(
    matrix: &[Vec<f64>],
    indices: &[usize],
    depth: usize,
    max_depth: usize,
    rng: &mut StdRng,
) -> Node {
    if indices.len() <= 1 || depth >= max_depth {
        return Node::Leaf {
            size: indices.len(),
        };
    }

    let dims = matrix[indices[0]].len();
    if dims == 0 {
        return Node::Leaf {
            size: indices.len(),
        };
    }

    // Pick a feature that still varies across this partition; give up after
    // a few draws so constant partitions terminate.
    for _ in 0..dims.max(4) {
        let feature = rng.gen_range(0..dims);
        let (lo, hi) = indices.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY),
            |(lo, hi), &i| {
                let v = matrix[i][feature];
                (lo.min(v), hi.max(v))
            },
        );
        if !(hi > lo) {
            continue;
        }
        let threshold = rng.gen_range(lo..hi);
        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .copied()
            .partition(|&i| matrix[i][feature] < threshold);
        if left.is_empty() || right.is_empty() {
            continue;
        }
        return Node::Split {
            feature,
            threshold,
            left: Box::new(build_tree(matrix, &left, depth + 1, max_depth, rng)),
            right: Box::new(build_tree(matrix, &right, depth + 1, max_depth, rng)),
        };
    }

    Node::Leaf {
        size: indices.len(),
    }
}

fn path_length(node: &Node, point: &[f64], depth: usize) -> f64 {
    match node {
        Node::Leaf { size } => depth as f64 + average_path_length(*size),
        Node::Split {
            feature,
            threshold,
            left,
            right,
        } => {
            if point[*feature] < *threshold {
                path_length(left, point, depth + 1)
            } else {
                path_length(right, point, depth + 1)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{average_path_length, IsolationForest};

    #[test]
    fn normalizer_matches_known_values() {
        assert_eq!(average_path_length(0), 0.0);
        assert_eq!(average_path_length(1), 0.0);
        // c(2) = 2*(ln(1) + gamma) - 2*(1/2) = 2*gamma - 1.
        let c2 = average_path_length(2);
        assert!((c2 - (2.0 * 0.5772156649 - 1.0)).abs() < 1e-9, "c2={c2}");
        assert!(average_path_length(256) > average_path_length(16));
    }

    #[test]
    fn clear_outlier_scores_higher_than_the_cluster() {
        // Tight cluster around (0, 0) and one point far away.
        let mut matrix: Vec<Vec<f64>> = (0..30)
            .map(|i| {
                let wobble = (i % 5) as f64 * 0.01;
                vec![wobble, 0.05 - wobble]
            })
            .collect();
        matrix.push(vec![5.0, 5.0]);

        let forest = IsolationForest::fit(&matrix, 100, 42);
        let outlier = forest.score(&matrix, matrix.len() - 1);
        let inlier_max = (0..matrix.len() - 1)
            .map(|row| forest.score(&matrix, row))
            .fold(0.0f64, f64::max);
        assert!(
            outlier > inlier_max,
            "outlier={outlier}, inlier_max={inlier_max}"
        );
        assert!(outlier > 0.6, "outlier={outlier}");
    }

    #[test]
    fn scores_stay_in_unit_interval() {
        let matrix: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64, (i * 7 % 5) as f64]).collect();
        let forest = IsolationForest::fit(&matrix, 50, 7);
        for row in 0..matrix.len() {
            let score = forest.score(&matrix, row);
            assert!((0.0..=1.0).contains(&score), "score={score}");
        }
    }

    #[test]
    fn tiny_samples_score_zero() {
        let matrix = vec![vec![1.0, 2.0]];
        let forest = IsolationForest::fit(&matrix, 10, 1);
        assert_eq!(forest.score(&matrix, 0), 0.0);
    }

    #[test]
    fn fixed_seed_is_reproducible() {
        let matrix: Vec<Vec<f64>> = (0..25).map(|i| vec![i as f64 * 0.1, 1.0]).collect();
        let a = IsolationForest::fit(&matrix, 30, 9);
        let b = IsolationForest::fit(&matrix, 30, 9);
        for row in 0..matrix.len() {
            assert_eq!(a.score(&matrix, row), b.score(&matrix, row));
        }
    }
}
