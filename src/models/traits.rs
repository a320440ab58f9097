use gbdt::decision_tree::{Data, DataVec};
use ndarray::ArrayView2;

use crate::error::Result;

/// A regression estimator over a dense feature matrix.
pub trait Regressor {
    fn fit(&mut self, features: ArrayView2<'_, f64>, targets: &[f64]) -> Result<()>;
    fn predict(&self, features: ArrayView2<'_, f64>) -> Result<Vec<f64>>;
}

pub trait IntoDataVec {
    /// Converts to the row format expected by `gbdt`. Without targets the
    /// rows are built as test data.
    fn into_data_vec(self, targets: Option<&[f64]>) -> DataVec;
}

impl IntoDataVec for ArrayView2<'_, f64> {
    fn into_data_vec(self, targets: Option<&[f64]>) -> DataVec {
        let mut data_vec = DataVec::with_capacity(self.nrows());
        for (row_idx, row) in self.outer_iter().enumerate() {
            let row_data: Vec<f32> = row.iter().map(|&v| v as f32).collect();
            let data = match targets {
                Some(targets) => {
                    Data::new_training_data(row_data, 1.0, targets[row_idx] as f32, None)
                }
                None => Data::new_test_data(row_data, None),
            };
            data_vec.push(data);
        }
        data_vec
    }
}
