use std::path::PathBuf;
use tracing::{info, instrument};

use crate::config::Config;
use crate::data_loader::DataLoader;
use crate::encoding::CategoricalEncoder;
use crate::error::Result;
use crate::feature_engineering::{impute_missing_with_zero, FeatureEngineer};
use crate::importance::{self, FeatureImportance};
use crate::models::{HyperParams, ModelFamily};
use crate::records::Feature;
use crate::selection::{gather, select_rows, train_validation_split, FamilyReport, ModelSelector};
use crate::submission::PredictionWriter;

/// Outcome of a full training and prediction run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub family: ModelFamily,
    pub params: HyperParams,
    pub holdout_rmse: f64,
    pub reports: Vec<FamilyReport>,
    /// Rows the final model was refit on: training and validation combined.
    pub retrain_rows: usize,
    pub predictions: usize,
    pub output_path: PathBuf,
    pub importance: Vec<FeatureImportance>,
}

pub struct Pipeline {
    config: Config,
}

impl Pipeline {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Load, engineer, encode, select, retrain, predict and save, in order.
    #[instrument(skip_all)]
    pub fn run(&self) -> Result<RunSummary> {
        let data = &self.config.data;
        let loader = DataLoader::new(data.target_column.clone());
        let tables =
            loader.load_tables(&data.train_path, &data.test_path, &data.submission_path)?;
        let train_records = loader.training_records(&tables.train)?;
        let test_records = loader.test_records(&tables.test)?;
        // `training_records` rejects rows without a target.
        let targets: Vec<f64> = train_records.iter().filter_map(|r| r.ultimate_cost).collect();

        let engineer = FeatureEngineer::new();
        let train_rows = engineer.select_features(&engineer.engineer(&train_records)?);
        let test_rows = engineer.select_features(&engineer.engineer(&test_records)?);
        info!(
            train_rows = train_rows.len(),
            test_rows = test_rows.len(),
            "Engineered features"
        );

        let encoder = CategoricalEncoder::fit(&train_rows);
        let policy = self.config.encoding.unseen_category;
        let (train_x, _) = impute_missing_with_zero(&encoder.transform(&train_rows, policy)?);
        let (test_x, _) = impute_missing_with_zero(&encoder.transform(&test_rows, policy)?);

        let split = train_validation_split(
            train_x.nrows(),
            self.config.split.validation_fraction,
            self.config.split.seed,
        )?;
        info!(
            train = split.train.len(),
            validation = split.validation.len(),
            "Split training data"
        );
        let fit_x = select_rows(train_x.view(), &split.train);
        let fit_y = gather(&targets, &split.train);
        let validation_x = select_rows(train_x.view(), &split.validation);
        let validation_y = gather(&targets, &split.validation);

        let selector = ModelSelector::new(
            self.config.grids.clone(),
            &self.config.search,
            self.config.split.seed,
            Feature::categorical_indices(),
        );
        let selection =
            selector.select(fit_x.view(), &fit_y, validation_x.view(), &validation_y)?;

        let writer = PredictionWriter::new(data.target_column.clone());
        let (retrain_x, retrain_y) = (train_x.view(), targets.as_slice());
        let model = writer.retrain(&selection.params, retrain_x, retrain_y)?;
        let predictions = model.predict(test_x.view())?;
        writer.write(&tables.submission, &predictions, &data.output_path)?;

        let ranking = importance::permutation_importance(
            model.as_ref(),
            train_x.view(),
            &targets,
            self.config.split.seed,
        )?;
        importance::log_bar_chart(&ranking);
        if let Some(path) = &self.config.report.importance_path {
            importance::write_importance_csv(&ranking, path)?;
            info!("Feature importance saved to {}", path.display());
        }

        Ok(RunSummary {
            family: selection.family(),
            params: selection.params,
            holdout_rmse: selection.holdout_rmse,
            reports: selection.reports,
            retrain_rows: retrain_y.len(),
            predictions: predictions.len(),
            output_path: data.output_path.clone(),
            importance: ranking,
        })
    }
}
