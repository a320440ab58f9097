pub mod forest;
pub mod gbdt;
pub mod oblivious;
pub mod traits;
pub mod tree;

use std::fmt;

pub use self::forest::{RandomForestModel, RandomForestParams};
pub use self::gbdt::{GBDTModel, GradientBoostingParams};
pub use self::oblivious::{ObliviousBoostingModel, ObliviousBoostingParams};
pub use self::traits::Regressor;

use crate::config::GridParams;

/// The algorithm families compared by model selection, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelFamily {
    GradientBoosting,
    RandomForest,
    ObliviousBoosting,
}

impl ModelFamily {
    pub const ALL: [ModelFamily; 3] = [
        ModelFamily::GradientBoosting,
        ModelFamily::RandomForest,
        ModelFamily::ObliviousBoosting,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ModelFamily::GradientBoosting => "gradient_boosting",
            ModelFamily::RandomForest => "random_forest",
            ModelFamily::ObliviousBoosting => "oblivious_boosting",
        }
    }

    /// Every combination of the family's grid axes, last axis varying fastest.
    pub fn candidates(self, grids: &GridParams, seed: u64, categorical: &[usize]) -> Vec<HyperParams> {
        let mut out = Vec::new();
        match self {
            ModelFamily::GradientBoosting => {
                let grid = &grids.gradient_boosting;
                for &n_estimators in &grid.n_estimators {
                    for &max_depth in &grid.max_depth {
                        for &learning_rate in &grid.learning_rate {
                            out.push(HyperParams::GradientBoosting(GradientBoostingParams {
                                n_estimators,
                                max_depth,
                                learning_rate,
                            }));
                        }
                    }
                }
            }
            ModelFamily::RandomForest => {
                let grid = &grids.random_forest;
                for &n_estimators in &grid.n_estimators {
                    for &max_depth in &grid.max_depth {
                        out.push(HyperParams::RandomForest(RandomForestParams {
                            n_estimators,
                            max_depth: (max_depth > 0).then_some(max_depth),
                            seed,
                        }));
                    }
                }
            }
            ModelFamily::ObliviousBoosting => {
                let grid = &grids.oblivious_boosting;
                for &iterations in &grid.iterations {
                    for &depth in &grid.depth {
                        for &learning_rate in &grid.learning_rate {
                            out.push(HyperParams::ObliviousBoosting(
                                ObliviousBoostingParams::new(iterations, depth, learning_rate)
                                    .with_categorical_features(categorical.to_vec()),
                            ));
                        }
                    }
                }
            }
        }
        out
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One point of a family's grid. Building it yields an unfitted model, so the
/// same hyperparameters can be refit on other data.
#[derive(Debug, Clone, PartialEq)]
pub enum HyperParams {
    GradientBoosting(GradientBoostingParams),
    RandomForest(RandomForestParams),
    ObliviousBoosting(ObliviousBoostingParams),
}

impl HyperParams {
    pub fn family(&self) -> ModelFamily {
        match self {
            HyperParams::GradientBoosting(_) => ModelFamily::GradientBoosting,
            HyperParams::RandomForest(_) => ModelFamily::RandomForest,
            HyperParams::ObliviousBoosting(_) => ModelFamily::ObliviousBoosting,
        }
    }

    pub fn build(&self) -> Box<dyn Regressor> {
        match self {
            HyperParams::GradientBoosting(p) => Box::new(GBDTModel::new(p.clone())),
            HyperParams::RandomForest(p) => Box::new(RandomForestModel::new(p.clone())),
            HyperParams::ObliviousBoosting(p) => Box::new(ObliviousBoostingModel::new(p.clone())),
        }
    }
}

impl fmt::Display for HyperParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HyperParams::GradientBoosting(p) => fmt::Display::fmt(p, f),
            HyperParams::RandomForest(p) => fmt::Display::fmt(p, f),
            HyperParams::ObliviousBoosting(p) => fmt::Display::fmt(p, f),
        }
    }
}
