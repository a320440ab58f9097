//! CART regression trees grown by variance reduction.

use ndarray::{ArrayView1, ArrayView2};

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
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

#[derive(Debug, Clone, PartialEq)]
struct SplitChoice {
    feature: usize,
    threshold: f64,
}

/// Nodes are stored in an arena; index 0 is the root.
#[derive(Debug, Clone, PartialEq)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    /// Grows a tree on the given row indices. Indices may repeat, as in a
    /// bootstrap sample.
    pub fn fit(
        features: ArrayView2<'_, f64>,
        targets: &[f64],
        rows: &[usize],
        params: &TreeParams,
    ) -> Self {
        let mut nodes = vec![Node::Leaf {
            value: mean_of(targets, rows),
        }];
        let mut pending = vec![(0usize, rows.to_vec(), 0usize)];

        while let Some((node_idx, node_rows, depth)) = pending.pop() {
            let value = mean_of(targets, &node_rows);
            let depth_reached = params.max_depth.is_some_and(|max| depth >= max);
            if depth_reached || node_rows.len() < params.min_samples_split.max(2) {
                nodes[node_idx] = Node::Leaf { value };
                continue;
            }

            let Some(choice) = best_split(features, targets, &node_rows, params.min_samples_leaf)
            else {
                nodes[node_idx] = Node::Leaf { value };
                continue;
            };

            let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = node_rows
                .iter()
                .partition(|&&r| features[[r, choice.feature]] <= choice.threshold);

            let left = nodes.len();
            let right = left + 1;
            nodes.push(Node::Leaf { value });
            nodes.push(Node::Leaf { value });
            nodes[node_idx] = Node::Split {
                feature: choice.feature,
                threshold: choice.threshold,
                left,
                right,
            };
            pending.push((left, left_rows, depth + 1));
            pending.push((right, right_rows, depth + 1));
        }

        Self { nodes }
    }

    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        walk(&self.nodes, 0)
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }
}

fn mean_of(targets: &[f64], rows: &[usize]) -> f64 {
    if rows.is_empty() {
        return 0.0;
    }
    rows.iter().map(|&r| targets[r]).sum::<f64>() / rows.len() as f64
}

/// Finds the threshold maximizing `sum_l²/n_l + sum_r²/n_r`, which is the
/// split with the largest reduction in squared error.
fn best_split(
    features: ArrayView2<'_, f64>,
    targets: &[f64],
    rows: &[usize],
    min_samples_leaf: usize,
) -> Option<SplitChoice> {
    let n = rows.len();
    let min_leaf = min_samples_leaf.max(1);
    let total: f64 = rows.iter().map(|&r| targets[r]).sum();
    let parent_score = total * total / n as f64;
    let mut best_score = parent_score;
    let mut best: Option<SplitChoice> = None;

    let mut pairs: Vec<(f64, f64)> = Vec::with_capacity(n);
    for feature in 0..features.ncols() {
        pairs.clear();
        pairs.extend(rows.iter().map(|&r| (features[[r, feature]], targets[r])));
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut left_sum = 0.0;
        for i in 0..n - 1 {
            left_sum += pairs[i].1;
            let (value, next) = (pairs[i].0, pairs[i + 1].0);
            if value == next {
                continue;
            }
            let left_n = i + 1;
            let right_n = n - left_n;
            if left_n < min_leaf || right_n < min_leaf {
                continue;
            }
            let right_sum = total - left_sum;
            let score = left_sum * left_sum / left_n as f64 + right_sum * right_sum / right_n as f64;
            // Relative tolerance keeps float noise from producing useless splits.
            if score > best_score + 1e-12 * best_score.abs().max(1.0) {
                best_score = score;
                let mid = value + (next - value) / 2.0;
                let threshold = if mid < next { mid } else { value };
                best = Some(SplitChoice { feature, threshold });
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    #[test]
    fn test_fits_step_exactly() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = [5.0, 5.0, 9.0, 9.0];
        let rows: Vec<usize> = (0..4).collect();
        let tree = RegressionTree::fit(x.view(), &y, &rows, &TreeParams::default());
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.predict_row(array![2.4].view()), 5.0);
        assert_eq!(tree.predict_row(array![2.6].view()), 9.0);
    }

    #[test]
    fn test_max_depth_limits_growth() {
        let x = Array2::from_shape_fn((32, 1), |(i, _)| i as f64);
        let y: Vec<f64> = (0..32).map(|i| (i * i) as f64).collect();
        let rows: Vec<usize> = (0..32).collect();
        let params = TreeParams {
            max_depth: Some(2),
            ..TreeParams::default()
        };
        let tree = RegressionTree::fit(x.view(), &y, &rows, &params);
        assert_eq!(tree.depth(), 2);
        assert!(tree.n_leaves() <= 4);

        let unbounded = RegressionTree::fit(x.view(), &y, &rows, &TreeParams::default());
        assert_eq!(unbounded.n_leaves(), 32);
    }

    #[test]
    fn test_constant_target_is_single_leaf() {
        let x = array![[1.0, 3.0], [2.0, 1.0], [3.0, 2.0]];
        let y = [4.0, 4.0, 4.0];
        let tree = RegressionTree::fit(x.view(), &y, &[0, 1, 2], &TreeParams::default());
        assert_eq!(tree.n_leaves(), 1);
        assert_eq!(tree.predict_row(array![9.0, 9.0].view()), 4.0);
    }

    #[test]
    fn test_duplicate_rows_from_bootstrap() {
        let x = array![[0.0], [1.0]];
        let y = [0.0, 10.0];
        let tree = RegressionTree::fit(x.view(), &y, &[0, 0, 0, 1], &TreeParams::default());
        assert_eq!(tree.predict_row(array![0.0].view()), 0.0);
        assert_eq!(tree.predict_row(array![1.0].view()), 10.0);
    }
}
