use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::encoding::UnseenCategoryPolicy;
use crate::error::{ClaimCostError, Result};
use crate::models::oblivious::MAX_DEPTH;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data: DataParams,
    pub split: SplitParams,
    pub search: SearchParams,
    pub encoding: EncodingParams,
    pub grids: GridParams,
    pub report: ReportParams,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataParams {
    pub train_path: PathBuf,
    pub test_path: PathBuf,
    pub submission_path: PathBuf,
    pub output_path: PathBuf,
    pub target_column: String,
}

impl Default for DataParams {
    fn default() -> Self {
        Self {
            train_path: PathBuf::from("data/train.csv"),
            test_path: PathBuf::from("data/test.csv"),
            submission_path: PathBuf::from("data/sample_submission.csv"),
            output_path: PathBuf::from("submission.csv"),
            target_column: "UltimateIncurredClaimCost".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SplitParams {
    pub validation_fraction: f64,
    pub seed: u64,
}

impl Default for SplitParams {
    fn default() -> Self {
        Self {
            validation_fraction: 0.2,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchParams {
    pub folds: usize,
    /// Run cross-validation fits on the rayon pool.
    pub parallel: bool,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            folds: 5,
            parallel: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EncodingParams {
    pub unseen_category: UnseenCategoryPolicy,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GridParams {
    pub gradient_boosting: GradientBoostingGrid,
    pub random_forest: RandomForestGrid,
    pub oblivious_boosting: ObliviousBoostingGrid,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GradientBoostingGrid {
    pub n_estimators: Vec<usize>,
    pub max_depth: Vec<u32>,
    pub learning_rate: Vec<f64>,
}

impl Default for GradientBoostingGrid {
    fn default() -> Self {
        Self {
            n_estimators: vec![100, 200],
            max_depth: vec![3, 4],
            learning_rate: vec![0.05, 0.1],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RandomForestGrid {
    pub n_estimators: Vec<usize>,
    /// `0` grows trees until leaves are pure.
    pub max_depth: Vec<usize>,
}

impl Default for RandomForestGrid {
    fn default() -> Self {
        Self {
            n_estimators: vec![100, 200],
            max_depth: vec![0, 10],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObliviousBoostingGrid {
    pub iterations: Vec<usize>,
    pub depth: Vec<usize>,
    pub learning_rate: Vec<f64>,
}

impl Default for ObliviousBoostingGrid {
    fn default() -> Self {
        Self {
            iterations: vec![100, 200],
            depth: vec![4, 6],
            learning_rate: vec![0.05, 0.1],
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReportParams {
    pub importance_path: Option<PathBuf>,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let fraction = self.split.validation_fraction;
        if !(fraction > 0.0 && fraction < 1.0) {
            return Err(ClaimCostError::InvalidConfig(format!(
                "split.validation_fraction must be in (0, 1), got {fraction}"
            )));
        }
        if self.search.folds < 2 {
            return Err(ClaimCostError::InvalidConfig(format!(
                "search.folds must be at least 2, got {}",
                self.search.folds
            )));
        }

        let gb = &self.grids.gradient_boosting;
        let rf = &self.grids.random_forest;
        let ob = &self.grids.oblivious_boosting;
        let axes: [(&str, bool); 8] = [
            ("gradient_boosting.n_estimators", gb.n_estimators.is_empty()),
            ("gradient_boosting.max_depth", gb.max_depth.is_empty()),
            ("gradient_boosting.learning_rate", gb.learning_rate.is_empty()),
            ("random_forest.n_estimators", rf.n_estimators.is_empty()),
            ("random_forest.max_depth", rf.max_depth.is_empty()),
            ("oblivious_boosting.iterations", ob.iterations.is_empty()),
            ("oblivious_boosting.depth", ob.depth.is_empty()),
            ("oblivious_boosting.learning_rate", ob.learning_rate.is_empty()),
        ];
        if let Some((name, _)) = axes.iter().find(|(_, empty)| *empty) {
            return Err(ClaimCostError::InvalidConfig(format!(
                "grids.{name} must not be empty"
            )));
        }
        if gb.n_estimators.contains(&0)
            || rf.n_estimators.contains(&0)
            || ob.iterations.contains(&0)
        {
            return Err(ClaimCostError::InvalidConfig(
                "estimator and iteration counts must be positive".to_string(),
            ));
        }
        if gb.max_depth.contains(&0) {
            return Err(ClaimCostError::InvalidConfig(
                "grids.gradient_boosting.max_depth values must be positive".to_string(),
            ));
        }
        if let Some(depth) = ob.depth.iter().find(|&&d| d == 0 || d > MAX_DEPTH) {
            return Err(ClaimCostError::InvalidConfig(format!(
                "grids.oblivious_boosting.depth must be in 1..={MAX_DEPTH}, got {depth}"
            )));
        }
        Ok(())
    }
}
