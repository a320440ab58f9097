//! Gradient boosting over oblivious (symmetric) trees.
//!
//! Every level of a tree applies one split to all of its nodes, so a tree of
//! depth `d` is `d` split rules plus `2^d` leaf values, and a row's leaf is the
//! bit pattern of the rules it satisfies. Numeric features split on quantile
//! borders; label-encoded categorical features split one-hot style on
//! equality with a single category.

use ndarray::{ArrayView1, ArrayView2};
use rayon::prelude::*;
use std::fmt;
use tracing::trace;

use super::traits::Regressor;
use crate::error::{ClaimCostError, Result};

pub const DEFAULT_BORDER_COUNT: usize = 254;
pub const DEFAULT_L2_LEAF_REG: f64 = 3.0;
/// Deepest tree accepted; leaf histograms grow as `2^depth` times the bin count.
pub const MAX_DEPTH: usize = 16;

#[derive(Debug, Clone, PartialEq)]
pub struct ObliviousBoostingParams {
    pub iterations: usize,
    pub depth: usize,
    pub learning_rate: f64,
    pub l2_leaf_reg: f64,
    pub border_count: usize,
    /// Column indices holding label-encoded categories.
    pub categorical_features: Vec<usize>,
}

impl ObliviousBoostingParams {
    pub fn new(iterations: usize, depth: usize, learning_rate: f64) -> Self {
        Self {
            iterations,
            depth,
            learning_rate,
            l2_leaf_reg: DEFAULT_L2_LEAF_REG,
            border_count: DEFAULT_BORDER_COUNT,
            categorical_features: Vec::new(),
        }
    }

    pub fn with_categorical_features(mut self, features: Vec<usize>) -> Self {
        self.categorical_features = features;
        self
    }
}

impl fmt::Display for ObliviousBoostingParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "iterations={}, depth={}, learning_rate={}",
            self.iterations, self.depth, self.learning_rate
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum SplitRule {
    Above { feature: usize, border: f64 },
    Equals { feature: usize, value: f64 },
}

impl SplitRule {
    fn goes_right(&self, row: ArrayView1<'_, f64>) -> bool {
        match *self {
            SplitRule::Above { feature, border } => row[feature] > border,
            SplitRule::Equals { feature, value } => row[feature] == value,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct ObliviousTree {
    splits: Vec<SplitRule>,
    leaf_values: Vec<f64>,
}

impl ObliviousTree {
    fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        let leaf = self
            .splits
            .iter()
            .fold(0usize, |idx, rule| (idx << 1) | usize::from(rule.goes_right(row)));
        self.leaf_values[leaf]
    }
}

#[derive(Debug, Clone)]
enum BinKind {
    Borders(Vec<f64>),
    Categories(Vec<f64>),
}

/// Training-time quantization of one feature column.
#[derive(Debug, Clone)]
struct FeatureBins {
    feature: usize,
    kind: BinKind,
    bins: Vec<u16>,
}

impl FeatureBins {
    fn n_bins(&self) -> usize {
        match &self.kind {
            BinKind::Borders(borders) => borders.len() + 1,
            BinKind::Categories(categories) => categories.len(),
        }
    }

    fn build(features: ArrayView2<'_, f64>, feature: usize, categorical: bool, border_count: usize) -> Self {
        let column = features.column(feature);
        let mut sorted: Vec<f64> = column.iter().copied().collect();
        sorted.sort_by(f64::total_cmp);
        let mut distinct = sorted.clone();
        distinct.dedup();

        if categorical {
            let bins = column
                .iter()
                .map(|v| distinct.partition_point(|d| d < v) as u16)
                .collect();
            return Self {
                feature,
                kind: BinKind::Categories(distinct),
                bins,
            };
        }

        let borders = quantile_borders(&sorted, &distinct, border_count);
        let bins = column
            .iter()
            .map(|v| borders.partition_point(|b| b < v) as u16)
            .collect();
        Self {
            feature,
            kind: BinKind::Borders(borders),
            bins,
        }
    }

    /// Candidate splits: one per border, or one per category.
    fn n_candidates(&self) -> usize {
        match &self.kind {
            BinKind::Borders(borders) => borders.len(),
            BinKind::Categories(categories) => categories.len(),
        }
    }

    /// Whether training row `i` falls right of candidate `bin`.
    fn goes_right(&self, i: usize, bin: usize) -> bool {
        let row_bin = self.bins[i] as usize;
        match self.kind {
            BinKind::Borders(_) => row_bin > bin,
            BinKind::Categories(_) => row_bin == bin,
        }
    }

    fn rule(&self, bin: usize) -> SplitRule {
        match &self.kind {
            BinKind::Borders(borders) => SplitRule::Above {
                feature: self.feature,
                border: borders[bin],
            },
            BinKind::Categories(categories) => SplitRule::Equals {
                feature: self.feature,
                value: categories[bin],
            },
        }
    }
}

/// Midpoints between neighbouring distinct values, thinned to at most
/// `border_count` borders placed at row quantiles.
fn quantile_borders(sorted: &[f64], distinct: &[f64], border_count: usize) -> Vec<f64> {
    if distinct.len() <= border_count + 1 {
        return distinct.windows(2).map(|w| w[0] + (w[1] - w[0]) / 2.0).collect();
    }
    let mut borders = Vec::with_capacity(border_count);
    for k in 1..=border_count {
        let value = sorted[k * sorted.len() / (border_count + 1)];
        let upper = distinct.partition_point(|d| *d < value);
        if upper > 0 {
            let lower = distinct[upper - 1];
            borders.push(lower + (distinct[upper] - lower) / 2.0);
        }
    }
    borders.dedup();
    borders
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    score: f64,
    column: usize,
    bin: usize,
}

#[derive(Debug, Clone, Copy, Default)]
struct GradStats {
    sum: f64,
    count: f64,
}

impl GradStats {
    fn add(&mut self, g: f64) {
        self.sum += g;
        self.count += 1.0;
    }

    fn score(&self, l2: f64) -> f64 {
        self.sum * self.sum / (self.count + l2)
    }
}

/// Boosted oblivious trees on squared error, starting from the mean target.
pub struct ObliviousBoostingModel {
    params: ObliviousBoostingParams,
    base_score: f64,
    trees: Vec<ObliviousTree>,
}

impl ObliviousBoostingModel {
    pub fn new(params: ObliviousBoostingParams) -> Self {
        Self {
            params,
            base_score: 0.0,
            trees: Vec::new(),
        }
    }

    fn fit_tree(&self, quantized: &[FeatureBins], gradients: &[f64], leaf_of: &mut [usize]) -> ObliviousTree {
        let l2 = self.params.l2_leaf_reg;
        leaf_of.iter_mut().for_each(|leaf| *leaf = 0);
        let mut splits = Vec::with_capacity(self.params.depth);

        for level in 0..self.params.depth {
            let n_leaves = 1usize << level;
            let leaf_of_ref: &[usize] = &*leaf_of;
            let candidates: Vec<Option<Candidate>> = quantized
                .par_iter()
                .enumerate()
                .map(|(column, bins)| best_candidate(column, bins, gradients, leaf_of_ref, n_leaves, l2))
                .collect();

            // First best wins so the choice does not depend on rayon scheduling.
            let best = candidates
                .into_iter()
                .flatten()
                .fold(None::<Candidate>, |best, c| match best {
                    Some(b) if b.score >= c.score => Some(b),
                    _ => Some(c),
                });
            let Some(best) = best else { break };

            let bins = &quantized[best.column];
            for (i, leaf) in leaf_of.iter_mut().enumerate() {
                *leaf = (*leaf << 1) | usize::from(bins.goes_right(i, best.bin));
            }
            splits.push(bins.rule(best.bin));
        }

        let mut stats = vec![GradStats::default(); 1usize << splits.len()];
        for (leaf, g) in leaf_of.iter().zip(gradients) {
            stats[*leaf].add(*g);
        }
        let leaf_values = stats
            .iter()
            .map(|s| self.params.learning_rate * s.sum / (s.count + l2))
            .collect();

        ObliviousTree { splits, leaf_values }
    }
}

fn best_candidate(
    column: usize,
    bins: &FeatureBins,
    gradients: &[f64],
    leaf_of: &[usize],
    n_leaves: usize,
    l2: f64,
) -> Option<Candidate> {
    let n_bins = bins.n_bins();
    if n_bins < 2 {
        return None;
    }
    let mut hist = vec![GradStats::default(); n_leaves * n_bins];
    let mut totals = vec![GradStats::default(); n_leaves];
    for (i, g) in gradients.iter().enumerate() {
        let leaf = leaf_of[i];
        hist[leaf * n_bins + bins.bins[i] as usize].add(*g);
        totals[leaf].add(*g);
    }

    let split_score = |right: &[GradStats]| -> f64 {
        right
            .iter()
            .zip(&totals)
            .map(|(r, t)| {
                let left = GradStats {
                    sum: t.sum - r.sum,
                    count: t.count - r.count,
                };
                left.score(l2) + r.score(l2)
            })
            .sum()
    };

    let mut best: Option<Candidate> = None;
    let mut consider = |bin: usize, score: f64| {
        if best.map_or(true, |b| score > b.score) {
            best = Some(Candidate { score, column, bin });
        }
    };

    match bins.kind {
        BinKind::Borders(_) => {
            // Right side of border `b` holds bins b+1..; accumulate from the top.
            let mut right = vec![GradStats::default(); n_leaves];
            for bin in (0..n_bins - 1).rev() {
                for (leaf, r) in right.iter_mut().enumerate() {
                    let h = hist[leaf * n_bins + bin + 1];
                    r.sum += h.sum;
                    r.count += h.count;
                }
                consider(bin, split_score(&right));
            }
        }
        BinKind::Categories(_) => {
            for bin in 0..n_bins {
                let right: Vec<GradStats> = (0..n_leaves).map(|leaf| hist[leaf * n_bins + bin]).collect();
                consider(bin, split_score(&right));
            }
        }
    }
    best
}

impl Regressor for ObliviousBoostingModel {
    fn fit(&mut self, features: ArrayView2<'_, f64>, targets: &[f64]) -> Result<()> {
        let n = features.nrows();
        if n == 0 || n != targets.len() {
            return Err(ClaimCostError::Model(format!(
                "oblivious boosting needs matching non-empty rows, got {} features and {} targets",
                n,
                targets.len()
            )));
        }
        if self.params.depth == 0 || self.params.depth > MAX_DEPTH {
            return Err(ClaimCostError::Model(format!(
                "oblivious tree depth must be in 1..={MAX_DEPTH}, got {}",
                self.params.depth
            )));
        }
        if let Some(bad) = self
            .params
            .categorical_features
            .iter()
            .find(|&&c| c >= features.ncols())
        {
            return Err(ClaimCostError::Model(format!(
                "categorical feature index {bad} out of range for {} columns",
                features.ncols()
            )));
        }

        let quantized: Vec<FeatureBins> = (0..features.ncols())
            .into_par_iter()
            .map(|f| {
                let categorical = self.params.categorical_features.contains(&f);
                FeatureBins::build(features, f, categorical, self.params.border_count)
            })
            .collect();

        self.base_score = targets.iter().sum::<f64>() / n as f64;
        let mut predictions = vec![self.base_score; n];
        let mut gradients = vec![0.0; n];
        let mut leaf_of = vec![0usize; n];
        self.trees = Vec::with_capacity(self.params.iterations);

        for iteration in 0..self.params.iterations {
            for ((g, y), p) in gradients.iter_mut().zip(targets).zip(&predictions) {
                *g = y - p;
            }
            let tree = self.fit_tree(&quantized, &gradients, &mut leaf_of);
            for (p, leaf) in predictions.iter_mut().zip(&leaf_of) {
                *p += tree.leaf_values[*leaf];
            }
            trace!(iteration, splits = tree.splits.len(), "Fitted oblivious tree");
            self.trees.push(tree);
        }
        Ok(())
    }

    fn predict(&self, features: ArrayView2<'_, f64>) -> Result<Vec<f64>> {
        if self.trees.is_empty() {
            return Err(ClaimCostError::Model("Model not trained".to_string()));
        }
        Ok(features
            .outer_iter()
            .map(|row| {
                self.base_score + self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>()
            })
            .collect())
    }
}
