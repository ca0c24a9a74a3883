//! CART regression tree (squared-error splits), shared by the forest and
//! boosting estimators.
//!
//! Nodes are stored as parallel arrays indexed by node id, root at 0. A node
//! with `feature[i] == None` is a leaf predicting `value[i]`; otherwise rows
//! with `x[feature] <= threshold` go to `left[i]`, the rest to `right[i]`.

use serde::{Deserialize, Serialize};

use forecastlab_core::domain::FeatureMatrix;

/// Growth limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeParams {
    /// `None` grows until leaves are pure or too small to split.
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }
}

impl TreeParams {
    pub fn with_max_depth(depth: usize) -> Self {
        Self {
            max_depth: Some(depth),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    feature: Vec<Option<usize>>,
    threshold: Vec<f64>,
    left: Vec<u32>,
    right: Vec<u32>,
    value: Vec<f64>,
}

struct Split {
    feature: usize,
    threshold: f64,
    score: f64,
}

impl RegressionTree {
    /// Grow a tree on the rows of `x` named by `rows` (duplicates allowed,
    /// as in a bootstrap sample). `rows` must be non-empty.
    pub fn fit(x: &FeatureMatrix, y: &[f64], rows: &[usize], params: &TreeParams) -> Self {
        let mut tree = RegressionTree {
            feature: Vec::new(),
            threshold: Vec::new(),
            left: Vec::new(),
            right: Vec::new(),
            value: Vec::new(),
        };
        let root = tree.push_leaf(mean_of(y, rows));
        let mut pending: Vec<(usize, Vec<usize>, usize)> = vec![(root, rows.to_vec(), 0)];

        while let Some((node, samples, depth)) = pending.pop() {
            let Some(split) = best_split(x, y, &samples, depth, params) else {
                continue;
            };
            let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = samples
                .iter()
                .partition(|&&r| x.get(r, split.feature) <= split.threshold);

            let left = tree.push_leaf(mean_of(y, &left_rows));
            let right = tree.push_leaf(mean_of(y, &right_rows));
            tree.feature[node] = Some(split.feature);
            tree.threshold[node] = split.threshold;
            tree.left[node] = left as u32;
            tree.right[node] = right as u32;

            // right first so the left subtree is grown (and numbered) first
            pending.push((right, right_rows, depth + 1));
            pending.push((left, left_rows, depth + 1));
        }
        tree
    }

    fn push_leaf(&mut self, value: f64) -> usize {
        self.feature.push(None);
        self.threshold.push(0.0);
        self.left.push(0);
        self.right.push(0);
        self.value.push(value);
        self.value.len() - 1
    }

    pub fn n_nodes(&self) -> usize {
        self.value.len()
    }

    pub fn n_leaves(&self) -> usize {
        self.feature.iter().filter(|f| f.is_none()).count()
    }

    /// Longest root-to-leaf path, in edges.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((node, depth)) = stack.pop() {
            deepest = deepest.max(depth);
            if self.feature.get(node).copied().flatten().is_some() {
                stack.push((self.left[node] as usize, depth + 1));
                stack.push((self.right[node] as usize, depth + 1));
            }
        }
        deepest
    }

    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let mut node = 0;
        while let Some(feature) = self.feature[node] {
            node = if row[feature] <= self.threshold[node] {
                self.left[node] as usize
            } else {
                self.right[node] as usize
            };
        }
        self.value[node]
    }
}

fn mean_of(y: &[f64], rows: &[usize]) -> f64 {
    if rows.is_empty() {
        return 0.0;
    }
    rows.iter().map(|&r| y[r]).sum::<f64>() / rows.len() as f64
}

/// Split maximising `S_l²/n_l + S_r²/n_r`, i.e. minimising the summed
/// squared error of the children. `None` when the node must stay a leaf.
fn best_split(
    x: &FeatureMatrix,
    y: &[f64],
    samples: &[usize],
    depth: usize,
    params: &TreeParams,
) -> Option<Split> {
    let n = samples.len();
    let min_leaf = params.min_samples_leaf.max(1);
    if params.max_depth.is_some_and(|d| depth >= d)
        || n < params.min_samples_split.max(2)
        || n < 2 * min_leaf
    {
        return None;
    }
    let first = y[samples[0]];
    if samples.iter().all(|&r| y[r] == first) {
        return None;
    }

    let total: f64 = samples.iter().map(|&r| y[r]).sum();
    let parent_score = total * total / n as f64;
    let mut best: Option<Split> = None;
    let mut order = samples.to_vec();

    for feature in 0..x.n_cols() {
        order.sort_by(|&a, &b| x.get(a, feature).total_cmp(&x.get(b, feature)));
        let mut left_sum = 0.0;
        for i in 0..n - 1 {
            left_sum += y[order[i]];
            let left_n = i + 1;
            let right_n = n - left_n;
            let (lo, hi) = (x.get(order[i], feature), x.get(order[i + 1], feature));
            if lo == hi || !lo.is_finite() || !hi.is_finite() {
                continue;
            }
            if left_n < min_leaf || right_n < min_leaf {
                continue;
            }
            let right_sum = total - left_sum;
            let score = left_sum * left_sum / left_n as f64 + right_sum * right_sum / right_n as f64;
            if best.as_ref().map_or(true, |b| score > b.score) {
                let mut threshold = lo + (hi - lo) / 2.0;
                if threshold >= hi {
                    threshold = lo;
                }
                best = Some(Split {
                    feature,
                    threshold,
                    score,
                });
            }
        }
    }

    best.filter(|s| s.score > parent_score)
}
