use ndarray::ArrayView2;
use rand::prelude::*;
use rayon::prelude::*;
use std::fmt;
use tracing::debug;

use super::traits::Regressor;
use super::tree::{RegressionTree, TreeParams};
use crate::error::{ClaimCostError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct RandomForestParams {
    pub n_estimators: usize,
    /// `None` grows trees until leaves are pure.
    pub max_depth: Option<usize>,
    pub seed: u64,
}

impl fmt::Display for RandomForestParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max_depth {
            Some(depth) => write!(f, "n_estimators={}, max_depth={}", self.n_estimators, depth),
            None => write!(f, "n_estimators={}, max_depth=None", self.n_estimators),
        }
    }
}

/// Bagged CART trees averaged at prediction time. Tree `t` draws its
/// bootstrap sample from a generator seeded with `seed + t`, so a fit does not
/// depend on how rayon schedules the trees.
pub struct RandomForestModel {
    params: RandomForestParams,
    trees: Vec<RegressionTree>,
}

impl RandomForestModel {
    pub fn new(params: RandomForestParams) -> Self {
        Self {
            params,
            trees: Vec::new(),
        }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Regressor for RandomForestModel {
    fn fit(&mut self, features: ArrayView2<'_, f64>, targets: &[f64]) -> Result<()> {
        let n = features.nrows();
        if n == 0 || n != targets.len() {
            return Err(ClaimCostError::Model(format!(
                "random forest needs matching non-empty rows, got {} features and {} targets",
                n,
                targets.len()
            )));
        }
        let tree_params = TreeParams {
            max_depth: self.params.max_depth,
            ..TreeParams::default()
        };
        let seed = self.params.seed;

        self.trees = (0..self.params.n_estimators)
            .into_par_iter()
            .map(|t| {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(t as u64));
                let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                RegressionTree::fit(features, targets, &sample, &tree_params)
            })
            .collect();
        debug!(
            trees = self.n_trees(),
            deepest = self.trees.iter().map(RegressionTree::depth).max().unwrap_or(0),
            max_leaves = self.trees.iter().map(RegressionTree::n_leaves).max().unwrap_or(0),
            "Fitted random forest"
        );
        Ok(())
    }

    fn predict(&self, features: ArrayView2<'_, f64>) -> Result<Vec<f64>> {
        if self.trees.is_empty() {
            return Err(ClaimCostError::Model("Model not trained".to_string()));
        }
        let n_trees = self.trees.len() as f64;
        let predictions = (0..features.nrows())
            .into_par_iter()
            .map(|i| {
                let row = features.row(i);
                self.trees.iter().map(|tree| tree.predict_row(row)).sum::<f64>() / n_trees
            })
            .collect();
        Ok(predictions)
    }
}
