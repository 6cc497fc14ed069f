//! CART regression tree.
//!
//! Nodes live in a flat arena (`Vec<Node>`) with children referenced by
//! index, so a fitted tree serializes without nesting and is walked without
//! recursion. Children are always allocated after their parent.

use ndarray::{Array2, ArrayView1};
use rand::Rng;
use rand::seq::index;
use serde::{Deserialize, Serialize};

/// Growth limits shared by every tree of a forest.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TreeLimits {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features drawn at each split.
    pub max_features: usize,
}

/// Tree node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    /// Leaf node with the mean target of its samples
    Leaf { value: f64, n_samples: usize },
    /// Internal node: rows with `x[feature] <= threshold` go left
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        n_samples: usize,
    },
}

/// A fitted regression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

/// A node waiting to be grown.
struct Pending {
    node: usize,
    indices: Vec<usize>,
    depth: usize,
}

/// Best split found for one node.
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    /// Reduction of the sum of squared errors.
    gain: f64,
}

impl RegressionTree {
    /// Grow a tree on the rows `indices` of `x` (repeats allowed, as produced
    /// by bootstrap sampling). Impurity decreases are added to `importances`.
    pub(crate) fn fit<R: Rng>(
        x: &Array2<f64>,
        y: ArrayView1<'_, f64>,
        indices: Vec<usize>,
        limits: &TreeLimits,
        rng: &mut R,
        importances: &mut [f64],
    ) -> Self {
        let n_features = x.ncols();
        let mut nodes = vec![Node::Leaf {
            value: 0.0,
            n_samples: 0,
        }];
        let mut stack = vec![Pending {
            node: 0,
            indices,
            depth: 0,
        }];

        while let Some(Pending {
            node,
            indices,
            depth,
        }) = stack.pop()
        {
            let n_samples = indices.len();
            let mean = indices.iter().map(|&i| y[i]).sum::<f64>() / n_samples as f64;
            let leaf = Node::Leaf {
                value: mean,
                n_samples,
            };

            let should_stop = n_samples < limits.min_samples_split
                || n_samples < 2 * limits.min_samples_leaf
                || limits.max_depth.is_some_and(|d| depth >= d)
                || is_pure(y, &indices);

            if should_stop {
                nodes[node] = leaf;
                continue;
            }

            let features = draw_features(rng, n_features, limits.max_features);
            let Some(best) = best_split(x, y, &indices, mean, &features, limits.min_samples_leaf)
            else {
                nodes[node] = leaf;
                continue;
            };

            let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
                .into_iter()
                .partition(|&i| x[[i, best.feature]] <= best.threshold);

            importances[best.feature] += best.gain;

            let left = nodes.len();
            let right = left + 1;
            nodes.push(Node::Leaf {
                value: 0.0,
                n_samples: 0,
            });
            nodes.push(Node::Leaf {
                value: 0.0,
                n_samples: 0,
            });
            nodes[node] = Node::Split {
                feature: best.feature,
                threshold: best.threshold,
                left,
                right,
                n_samples,
            };

            stack.push(Pending {
                node: right,
                indices: right_indices,
                depth: depth + 1,
            });
            stack.push(Pending {
                node: left,
                indices: left_indices,
                depth: depth + 1,
            });
        }

        Self { nodes }
    }

    /// Predict one row.
    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        let mut current = 0;
        loop {
            match &self.nodes[current] {
                Node::Leaf { value, .. } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    current = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Number of leaves.
    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    /// Length of the longest root-to-leaf path.
    pub fn depth(&self) -> usize {
        let mut depths = vec![0usize; self.nodes.len()];
        let mut max_depth = 0;
        for (i, node) in self.nodes.iter().enumerate() {
            if let Node::Split { left, right, .. } = node {
                let child_depth = depths[i] + 1;
                depths[*left] = child_depth;
                depths[*right] = child_depth;
                max_depth = max_depth.max(child_depth);
            }
        }
        max_depth
    }

    /// Structural check for trees read from disk: children point forward and
    /// in range, features exist, leaf values are finite.
    pub fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        let n_nodes = self.nodes.len();
        for (i, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Leaf { value, .. } => {
                    if !value.is_finite() {
                        return Err(format!("leaf {} has non-finite value", i));
                    }
                }
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    if *feature >= n_features {
                        return Err(format!(
                            "node {} splits on feature {} of {}",
                            i, feature, n_features
                        ));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("node {} has non-finite threshold", i));
                    }
                    if *left <= i || *right <= i || *left >= n_nodes || *right >= n_nodes {
                        return Err(format!("node {} has invalid children", i));
                    }
                }
            }
        }
        Ok(())
    }
}

fn is_pure(y: ArrayView1<'_, f64>, indices: &[usize]) -> bool {
    let first = y[indices[0]];
    indices.iter().all(|&i| y[i] == first)
}

/// Feature indices to try at a split, in ascending order.
fn draw_features<R: Rng>(rng: &mut R, n_features: usize, max_features: usize) -> Vec<usize> {
    if max_features >= n_features {
        return (0..n_features).collect();
    }
    let mut features = index::sample(rng, n_features, max_features).into_vec();
    features.sort_unstable();
    features
}

/// Exhaustive search over midpoints between adjacent distinct values.
///
/// Targets are centered on the node mean before the prefix sums so the
/// squared-error arithmetic stays well conditioned.
fn best_split(
    x: &Array2<f64>,
    y: ArrayView1<'_, f64>,
    indices: &[usize],
    mean: f64,
    features: &[usize],
    min_samples_leaf: usize,
) -> Option<SplitCandidate> {
    let n = indices.len();
    let parent_sse: f64 = indices.iter().map(|&i| (y[i] - mean).powi(2)).sum();
    let total_sum: f64 = indices.iter().map(|&i| y[i] - mean).sum();

    let mut best: Option<SplitCandidate> = None;
    let mut pairs: Vec<(f64, f64)> = Vec::with_capacity(n);

    for &feature in features {
        pairs.clear();
        pairs.extend(indices.iter().map(|&i| (x[[i, feature]], y[i] - mean)));
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut left_sum = 0.0;
        let mut left_sq = 0.0;
        for i in 0..n - 1 {
            let (value, target) = pairs[i];
            left_sum += target;
            left_sq += target * target;

            let next_value = pairs[i + 1].0;
            if value >= next_value {
                continue;
            }

            let left_count = i + 1;
            let right_count = n - left_count;
            if left_count < min_samples_leaf || right_count < min_samples_leaf {
                continue;
            }

            let right_sum = total_sum - left_sum;
            let right_sq = (parent_sse + total_sum * total_sum / n as f64) - left_sq;
            let left_sse = (left_sq - left_sum * left_sum / left_count as f64).max(0.0);
            let right_sse = (right_sq - right_sum * right_sum / right_count as f64).max(0.0);
            let gain = parent_sse - left_sse - right_sse;

            if gain > f64::EPSILON * parent_sse.max(1.0)
                && best.as_ref().is_none_or(|b| gain > b.gain)
            {
                let mut threshold = (value + next_value) / 2.0;
                // Adjacent floats can round the midpoint up to the right value.
                if threshold >= next_value {
                    threshold = value;
                }
                best = Some(SplitCandidate {
                    feature,
                    threshold,
                    gain,
                });
            }
        }
    }

    best
}
