use ndarray::ArrayView2;
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use tracing::{debug, info, instrument};

use crate::error::{ClaimCostError, Result};
use crate::models::{HyperParams, Regressor};

/// Refits the selected hyperparameters and writes test predictions into the
/// submission template.
pub struct PredictionWriter {
    target_column: String,
}

impl PredictionWriter {
    pub fn new(target_column: impl Into<String>) -> Self {
        Self {
            target_column: target_column.into(),
        }
    }

    /// Fits a fresh model from `params` on the full training matrix.
    #[instrument(skip_all, fields(rows = features.nrows(), %params))]
    pub fn retrain(
        &self,
        params: &HyperParams,
        features: ArrayView2<'_, f64>,
        targets: &[f64],
    ) -> Result<Box<dyn Regressor>> {
        let mut model = params.build();
        model.fit(features, targets)?;
        info!(family = %params.family(), "Retrained on the full training set");
        Ok(model)
    }

    /// Replaces the target column of `template` with `predictions` and writes
    /// the table to `path`. Row order and every other column are kept as read.
    pub fn write<P: AsRef<Path>>(
        &self,
        template: &DataFrame,
        predictions: &[f64],
        path: P,
    ) -> Result<DataFrame> {
        if predictions.len() != template.height() {
            return Err(ClaimCostError::RowCountMismatch {
                expected: template.height(),
                actual: predictions.len(),
            });
        }

        let mut submission = template.clone();
        submission.with_column(Series::new(self.target_column.as_str().into(), predictions))?;

        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = File::create(path)?;
        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(&mut submission)?;
        debug!(rows = submission.height(), "Wrote {}", path.display());
        info!("Submission saved to {}", path.display());
        Ok(submission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_loader::DataLoader;
    use crate::models::RandomForestParams;
    use ndarray::Array2;
    use tempfile::tempdir;

    #[test]
    fn test_write_preserves_rows_and_other_columns() {
        let template = df!(
            "ClaimNumber" => &["WC8145235", "WC2004169", "WC6029424"],
            "UltimateIncurredClaimCost" => &["0", "0", "0"],
        )
        .unwrap();
        let dir = tempdir().unwrap();
        let path = dir.path().join("scenario.csv");

        let writer = PredictionWriter::new("UltimateIncurredClaimCost");
        writer.write(&template, &[1500.0, 250.5, 9000.0], &path).unwrap();

        let written = DataLoader::read_csv(&path).unwrap();
        assert_eq!(written.height(), 3);
        let names: Vec<&str> = written
            .get_column_names()
            .iter()
            .map(|name| name.as_str())
            .collect();
        assert_eq!(names, vec!["ClaimNumber", "UltimateIncurredClaimCost"]);
        let claims: Vec<&str> = written
            .column("ClaimNumber")
            .unwrap()
            .str()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(claims, vec!["WC8145235", "WC2004169", "WC6029424"]);
        let costs: Vec<f64> = written
            .column("UltimateIncurredClaimCost")
            .unwrap()
            .str()
            .unwrap()
            .into_no_null_iter()
            .map(|v| v.parse().unwrap())
            .collect();
        assert_eq!(costs, vec![1500.0, 250.5, 9000.0]);
    }

    #[test]
    fn test_write_rejects_row_count_mismatch() {
        let template = df!(
            "ClaimNumber" => &["WC1", "WC2"],
            "UltimateIncurredClaimCost" => &["0", "0"],
        )
        .unwrap();
        let dir = tempdir().unwrap();
        let path = dir.path().join("mismatch.csv");
        let writer = PredictionWriter::new("UltimateIncurredClaimCost");
        let err = writer.write(&template, &[1.0], &path).unwrap_err();
        assert!(matches!(
            err,
            ClaimCostError::RowCountMismatch {
                expected: 2,
                actual: 1
            }
        ));
        assert!(!path.exists());
    }

    #[test]
    fn test_retrain_fits_fresh_model() {
        let x = Array2::from_shape_fn((30, 2), |(i, j)| (i + j) as f64);
        let y: Vec<f64> = (0..30).map(|i| i as f64).collect();
        let params = HyperParams::RandomForest(RandomForestParams {
            n_estimators: 5,
            max_depth: Some(4),
            seed: 3,
        });
        let model = PredictionWriter::new("target")
            .retrain(&params, x.view(), &y)
            .unwrap();
        assert_eq!(model.predict(x.view()).unwrap().len(), 30);
    }
}
