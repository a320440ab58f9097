use gbdt::{config::Config as GBDTConfig, gradient_boost::GBDT};
use ndarray::ArrayView2;
use std::fmt;

use super::traits::{IntoDataVec, Regressor};
use crate::error::{ClaimCostError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct GradientBoostingParams {
    pub n_estimators: usize,
    pub max_depth: u32,
    pub learning_rate: f64,
}

impl fmt::Display for GradientBoostingParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "n_estimators={}, max_depth={}, learning_rate={}",
            self.n_estimators, self.max_depth, self.learning_rate
        )
    }
}

/// Squared-error gradient boosting backed by the `gbdt` crate. Targets are
/// boosted as residuals around their mean.
pub struct GBDTModel {
    params: GradientBoostingParams,
    model: Option<GBDT>,
    base_score: f64,
}

impl GBDTModel {
    pub fn new(params: GradientBoostingParams) -> Self {
        Self {
            params,
            model: None,
            base_score: 0.0,
        }
    }

    fn config(&self, feature_size: usize) -> GBDTConfig {
        let mut config = GBDTConfig::new();
        config.set_feature_size(feature_size);
        config.set_max_depth(self.params.max_depth);
        config.set_iterations(self.params.n_estimators);
        config.set_shrinkage(self.params.learning_rate as f32);
        config.set_loss("SquaredError");
        config.set_debug(false);
        config.set_data_sample_ratio(1.0);
        config.set_feature_sample_ratio(1.0);
        config.set_training_optimization_level(2);
        config
    }
}

impl Regressor for GBDTModel {
    fn fit(&mut self, features: ArrayView2<'_, f64>, targets: &[f64]) -> Result<()> {
        if features.nrows() == 0 || features.nrows() != targets.len() {
            return Err(ClaimCostError::Model(format!(
                "gradient boosting needs matching non-empty rows, got {} features and {} targets",
                features.nrows(),
                targets.len()
            )));
        }
        self.base_score = targets.iter().sum::<f64>() / targets.len() as f64;
        let residuals: Vec<f64> = targets.iter().map(|t| t - self.base_score).collect();

        let mut train_data = features.into_data_vec(Some(&residuals));
        let mut gbdt = GBDT::new(&self.config(features.ncols()));
        gbdt.fit(&mut train_data);

        self.model = Some(gbdt);
        Ok(())
    }

    fn predict(&self, features: ArrayView2<'_, f64>) -> Result<Vec<f64>> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| ClaimCostError::Model("Model not trained".to_string()))?;

        let test_data = features.into_data_vec(None);
        let predictions = model.predict(&test_data);
        Ok(predictions
            .into_iter()
            .map(|p| self.base_score + f64::from(p))
            .collect())
    }
}
