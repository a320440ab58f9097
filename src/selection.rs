//! Hold-out splitting, cross-validated grid search and model selection.

use ndarray::{Array2, ArrayView2, Axis};
use rand::prelude::*;
use rayon::prelude::*;
use tracing::{debug, info, instrument};

use crate::config::{GridParams, SearchParams};
use crate::error::{ClaimCostError, Result};
use crate::metrics::{rmse, RegressionMetrics};
use crate::models::{HyperParams, ModelFamily, Regressor};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoldoutSplit {
    pub train: Vec<usize>,
    pub validation: Vec<usize>,
}

/// Shuffles row indices with a seeded generator and holds out
/// `ceil(n_rows * validation_fraction)` of them.
pub fn train_validation_split(n_rows: usize, validation_fraction: f64, seed: u64) -> Result<HoldoutSplit> {
    let n_validation = (n_rows as f64 * validation_fraction).ceil() as usize;
    if n_validation == 0 || n_validation >= n_rows {
        return Err(ClaimCostError::InsufficientData(format!(
            "cannot hold out {validation_fraction} of {n_rows} rows"
        )));
    }
    let mut indices: Vec<usize> = (0..n_rows).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);
    let train = indices.split_off(n_validation);
    debug!(
        "Dataset split: {} training, {} validation",
        train.len(),
        indices.len()
    );
    Ok(HoldoutSplit {
        train,
        validation: indices,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Contiguous, unshuffled folds. The first `n_rows % folds` folds hold one
/// extra row.
pub fn kfold_indices(n_rows: usize, folds: usize) -> Result<Vec<Fold>> {
    if folds < 2 || n_rows < folds {
        return Err(ClaimCostError::InsufficientData(format!(
            "cannot split {n_rows} rows into {folds} folds"
        )));
    }
    let base = n_rows / folds;
    let extra = n_rows % folds;
    let mut start = 0;
    let mut out = Vec::with_capacity(folds);
    for f in 0..folds {
        let end = start + base + usize::from(f < extra);
        out.push(Fold {
            train: (0..start).chain(end..n_rows).collect(),
            test: (start..end).collect(),
        });
        start = end;
    }
    Ok(out)
}

/// Index of the lowest score. Ties keep the earliest; NaN never wins.
pub fn best_index(scores: &[f64]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, &score) in scores.iter().enumerate() {
        if score.is_nan() {
            continue;
        }
        if best.map_or(true, |b| score < scores[b]) {
            best = Some(i);
        }
    }
    best
}

pub fn select_rows(features: ArrayView2<'_, f64>, rows: &[usize]) -> Array2<f64> {
    features.select(Axis(0), rows)
}

pub fn gather(values: &[f64], rows: &[usize]) -> Vec<f64> {
    rows.iter().map(|&r| values[r]).collect()
}

pub struct GridSearchResult {
    pub params: HyperParams,
    /// Mean RMSE over the cross-validation folds.
    pub cv_rmse: f64,
    pub cv_scores: Vec<f64>,
    /// The best candidate refit on all rows passed to the search.
    pub model: Box<dyn Regressor>,
}

#[derive(Debug, Clone)]
pub struct GridSearch {
    folds: usize,
    parallel: bool,
}

impl GridSearch {
    pub fn new(params: &SearchParams) -> Self {
        Self {
            folds: params.folds,
            parallel: params.parallel,
        }
    }

    pub fn run(
        &self,
        candidates: &[HyperParams],
        features: ArrayView2<'_, f64>,
        targets: &[f64],
    ) -> Result<GridSearchResult> {
        if candidates.is_empty() {
            return Err(ClaimCostError::Model("empty hyperparameter grid".to_string()));
        }
        let folds = kfold_indices(features.nrows(), self.folds)?;
        info!(
            "Fitting {} folds for each of {} candidates, totalling {} fits",
            folds.len(),
            candidates.len(),
            folds.len() * candidates.len()
        );

        let tasks: Vec<(usize, usize)> = (0..candidates.len())
            .flat_map(|c| (0..folds.len()).map(move |f| (c, f)))
            .collect();
        let evaluate = |&(c, f): &(usize, usize)| -> Result<f64> {
            let fold = &folds[f];
            let mut model = candidates[c].build();
            model.fit(
                select_rows(features, &fold.train).view(),
                &gather(targets, &fold.train),
            )?;
            let predictions = model.predict(select_rows(features, &fold.test).view())?;
            Ok(rmse(&predictions, &gather(targets, &fold.test)))
        };
        let fold_scores: Vec<f64> = if self.parallel {
            tasks.par_iter().map(&evaluate).collect::<Result<_>>()?
        } else {
            tasks.iter().map(&evaluate).collect::<Result<_>>()?
        };

        let cv_scores: Vec<f64> = fold_scores
            .chunks(folds.len())
            .map(|chunk| chunk.iter().sum::<f64>() / chunk.len() as f64)
            .collect();
        for (params, score) in candidates.iter().zip(&cv_scores) {
            debug!(%params, cv_rmse = score, "Scored candidate");
        }

        let best = best_index(&cv_scores)
            .ok_or_else(|| ClaimCostError::Model("no candidate produced a finite score".to_string()))?;
        let params = candidates[best].clone();
        let mut model = params.build();
        model.fit(features, targets)?;

        Ok(GridSearchResult {
            params,
            cv_rmse: cv_scores[best],
            cv_scores,
            model,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FamilyReport {
    pub family: ModelFamily,
    pub params: HyperParams,
    pub cv_rmse: f64,
    pub holdout_rmse: f64,
}

/// The winning family's best estimator, fit on the training split only.
pub struct Selection {
    pub params: HyperParams,
    pub model: Box<dyn Regressor>,
    pub holdout_rmse: f64,
    pub reports: Vec<FamilyReport>,
}

impl Selection {
    pub fn family(&self) -> ModelFamily {
        self.params.family()
    }
}

pub struct ModelSelector {
    families: Vec<ModelFamily>,
    grids: GridParams,
    search: GridSearch,
    seed: u64,
    categorical_features: Vec<usize>,
}

impl ModelSelector {
    pub fn new(grids: GridParams, search: &SearchParams, seed: u64, categorical_features: Vec<usize>) -> Self {
        Self {
            families: ModelFamily::ALL.to_vec(),
            grids,
            search: GridSearch::new(search),
            seed,
            categorical_features,
        }
    }

    /// Restricts and orders the families to evaluate.
    pub fn with_families(mut self, families: Vec<ModelFamily>) -> Self {
        self.families = families;
        self
    }

    /// Grid-searches each family on the training split and keeps the family
    /// with the lowest hold-out RMSE. Ties go to the family evaluated first.
    #[instrument(skip_all, fields(train_rows = train_x.nrows(), validation_rows = validation_x.nrows()))]
    pub fn select(
        &self,
        train_x: ArrayView2<'_, f64>,
        train_y: &[f64],
        validation_x: ArrayView2<'_, f64>,
        validation_y: &[f64],
    ) -> Result<Selection> {
        let mut reports = Vec::with_capacity(self.families.len());
        let mut best: Option<(HyperParams, Box<dyn Regressor>, f64)> = None;

        for &family in &self.families {
            let candidates = family.candidates(&self.grids, self.seed, &self.categorical_features);
            info!(%family, candidates = candidates.len(), "Running grid search");
            let result = self.search.run(&candidates, train_x, train_y)?;
            info!(%family, params = %result.params, cv_rmse = result.cv_rmse, "Best hyperparameters");

            let predictions = result.model.predict(validation_x)?;
            let metrics = RegressionMetrics::compute(&predictions, validation_y);
            let holdout_rmse = metrics.rmse;
            info!(
                %family,
                holdout_rmse,
                mae = metrics.mae,
                r_squared = metrics.r_squared,
                "Hold-out evaluation"
            );

            reports.push(FamilyReport {
                family,
                params: result.params.clone(),
                cv_rmse: result.cv_rmse,
                holdout_rmse,
            });
            let improves = match &best {
                None => true,
                Some((_, _, current)) => holdout_rmse < *current || current.is_nan(),
            };
            if improves {
                best = Some((result.params, result.model, holdout_rmse));
            }
        }

        let (params, model, holdout_rmse) =
            best.ok_or_else(|| ClaimCostError::Model("no model family to evaluate".to_string()))?;
        info!(family = %params.family(), %params, holdout_rmse, "Selected model");
        Ok(Selection {
            params,
            model,
            holdout_rmse,
            reports,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GradientBoostingGrid, ObliviousBoostingGrid, RandomForestGrid};
    use crate::models::RandomForestParams;
    use proptest::prelude::*;

    #[test]
    fn test_split_sizes_and_determinism() {
        let split = train_validation_split(10, 0.2, 42).unwrap();
        assert_eq!(split.validation.len(), 2);
        assert_eq!(split.train.len(), 8);
        assert_eq!(split, train_validation_split(10, 0.2, 42).unwrap());

        let mut all: Vec<usize> = split.train.iter().chain(&split.validation).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_rounds_validation_up() {
        let split = train_validation_split(11, 0.2, 1).unwrap();
        assert_eq!(split.validation.len(), 3);
    }

    #[test]
    fn test_split_rejects_tiny_tables() {
        assert!(train_validation_split(1, 0.2, 0).is_err());
        assert!(train_validation_split(0, 0.2, 0).is_err());
    }

    #[test]
    fn test_kfold_sizes() {
        let folds = kfold_indices(12, 5).unwrap();
        let sizes: Vec<usize> = folds.iter().map(|f| f.test.len()).collect();
        assert_eq!(sizes, vec![3, 3, 2, 2, 2]);
        assert_eq!(folds[1].test, vec![3, 4, 5]);
        assert!(kfold_indices(3, 5).is_err());
        assert!(kfold_indices(10, 1).is_err());
    }

    #[test]
    fn test_best_index_first_wins_ties() {
        assert_eq!(best_index(&[3.0, 1.0, 1.0, 2.0]), Some(1));
        assert_eq!(best_index(&[f64::NAN, 5.0]), Some(1));
        assert_eq!(best_index(&[]), None);
    }

    proptest! {
        #[test]
        fn prop_folds_partition_rows(n_rows in 5usize..200, folds in 2usize..6) {
            let folds = kfold_indices(n_rows, folds).unwrap();
            let mut seen: Vec<usize> = folds.iter().flat_map(|f| f.test.iter().copied()).collect();
            seen.sort_unstable();
            prop_assert_eq!(seen, (0..n_rows).collect::<Vec<_>>());
            for fold in &folds {
                prop_assert_eq!(fold.train.len() + fold.test.len(), n_rows);
                prop_assert!(fold.train.iter().all(|r| !fold.test.contains(r)));
            }
        }
    }

    fn search_params(parallel: bool) -> SearchParams {
        SearchParams { folds: 5, parallel }
    }

    #[test]
    fn test_grid_search_prefers_deeper_forest() {
        let x = Array2::from_shape_fn((100, 1), |(i, _)| ((i * 37) % 100) as f64);
        let y: Vec<f64> = x.column(0).iter().map(|v| v * v).collect();
        let candidates = vec![
            HyperParams::RandomForest(RandomForestParams {
                n_estimators: 10,
                max_depth: Some(1),
                seed: 42,
            }),
            HyperParams::RandomForest(RandomForestParams {
                n_estimators: 10,
                max_depth: None,
                seed: 42,
            }),
        ];
        let result = GridSearch::new(&search_params(false))
            .run(&candidates, x.view(), &y)
            .unwrap();
        assert_eq!(result.params, candidates[1]);
        assert_eq!(result.cv_scores.len(), 2);
        assert!(result.cv_scores[1] < result.cv_scores[0]);
    }

    #[test]
    fn test_parallel_search_matches_sequential() {
        let x = Array2::from_shape_fn((40, 2), |(i, j)| ((i * (j + 5)) % 13) as f64);
        let y: Vec<f64> = (0..40).map(|i| (i % 4) as f64).collect();
        let candidates = ModelFamily::RandomForest.candidates(
            &GridParams {
                random_forest: RandomForestGrid {
                    n_estimators: vec![5],
                    max_depth: vec![0, 2],
                },
                ..GridParams::default()
            },
            3,
            &[],
        );
        let sequential = GridSearch::new(&search_params(false)).run(&candidates, x.view(), &y).unwrap();
        let parallel = GridSearch::new(&search_params(true)).run(&candidates, x.view(), &y).unwrap();
        assert_eq!(sequential.cv_scores, parallel.cv_scores);
        assert_eq!(sequential.params, parallel.params);
    }

    #[test]
    fn test_selector_picks_distinctly_better_family() {
        // Two well separated clusters in the first column decide the target.
        let x = Array2::from_shape_fn((100, 2), |(i, j)| {
            let v = (i * 37) % 100;
            match (j, v < 50) {
                (0, true) => v as f64,
                (0, false) => (v + 1000) as f64,
                _ => (i % 5) as f64,
            }
        });
        let y: Vec<f64> = x.column(0).iter().map(|&v| if v < 500.0 { 0.0 } else { 100.0 }).collect();
        let split = train_validation_split(100, 0.2, 42).unwrap();

        // Boosting families get a single tiny step, so they stay near the mean.
        let grids = GridParams {
            gradient_boosting: GradientBoostingGrid {
                n_estimators: vec![1],
                max_depth: vec![1],
                learning_rate: vec![0.01],
            },
            random_forest: RandomForestGrid {
                n_estimators: vec![10],
                max_depth: vec![0],
            },
            oblivious_boosting: ObliviousBoostingGrid {
                iterations: vec![1],
                depth: vec![1],
                learning_rate: vec![0.01],
            },
        };
        let selector = ModelSelector::new(grids, &search_params(true), 42, vec![1]);
        let selection = selector
            .select(
                select_rows(x.view(), &split.train).view(),
                &gather(&y, &split.train),
                select_rows(x.view(), &split.validation).view(),
                &gather(&y, &split.validation),
            )
            .unwrap();

        assert_eq!(selection.family(), ModelFamily::RandomForest);
        assert_eq!(selection.reports.len(), 3);
        let forest = &selection.reports[1];
        assert_eq!(forest.family, ModelFamily::RandomForest);
        assert_eq!(forest.holdout_rmse, selection.holdout_rmse);
        assert!(selection.holdout_rmse < 1.0);
        assert!(selection.reports[0].holdout_rmse > 40.0);
        assert!(selection.reports[2].holdout_rmse > 40.0);
    }

    #[test]
    fn test_selector_tie_keeps_first_family() {
        // Constant target: every family predicts it exactly.
        let x = Array2::from_shape_fn((30, 1), |(i, _)| i as f64);
        let y = vec![7.0; 30];
        let grids = GridParams {
            random_forest: RandomForestGrid {
                n_estimators: vec![3],
                max_depth: vec![0],
            },
            oblivious_boosting: ObliviousBoostingGrid {
                iterations: vec![2],
                depth: vec![1],
                learning_rate: vec![0.1],
            },
            ..GridParams::default()
        };
        let selector = ModelSelector::new(grids, &search_params(false), 0, vec![])
            .with_families(vec![ModelFamily::ObliviousBoosting, ModelFamily::RandomForest]);
        let selection = selector.select(x.view(), &y, x.view(), &y).unwrap();
        assert_eq!(selection.reports[0].holdout_rmse, 0.0);
        assert_eq!(selection.reports[1].holdout_rmse, 0.0);
        assert_eq!(selection.family(), ModelFamily::ObliviousBoosting);
    }
}
