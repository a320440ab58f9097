use ndarray::{Array1, ArrayView2};
use polars::prelude::*;
use rand::prelude::*;
use std::fs::File;
use std::path::Path;
use tracing::info;

use crate::error::Result;
use crate::metrics::rmse;
use crate::models::Regressor;
use crate::records::Feature;

const BAR_WIDTH: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureImportance {
    pub feature: Feature,
    /// RMSE increase when the feature's column is shuffled.
    pub importance: f64,
}

/// Permutation importance of a fitted model, sorted most important first.
pub fn permutation_importance(
    model: &dyn Regressor,
    features: ArrayView2<'_, f64>,
    targets: &[f64],
    seed: u64,
) -> Result<Vec<FeatureImportance>> {
    let baseline = rmse(&model.predict(features)?, targets);
    let mut rng = StdRng::seed_from_u64(seed);
    let mut shuffled = features.to_owned();
    let mut ranking = Vec::with_capacity(Feature::ALL.len());

    for feature in Feature::ALL.into_iter().take(features.ncols()) {
        let column = feature.index();
        let original = features.column(column).to_owned();
        let mut permuted = original.to_vec();
        permuted.shuffle(&mut rng);
        shuffled
            .column_mut(column)
            .assign(&Array1::from(permuted));

        let score = rmse(&model.predict(shuffled.view())?, targets);
        ranking.push(FeatureImportance {
            feature,
            importance: score - baseline,
        });
        shuffled.column_mut(column).assign(&original);
    }

    ranking.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    Ok(ranking)
}

/// Horizontal bar chart lines, bars scaled to the largest importance.
pub fn render_bar_chart(ranking: &[FeatureImportance]) -> Vec<String> {
    let max = ranking
        .iter()
        .map(|r| r.importance)
        .fold(0.0f64, f64::max);
    ranking
        .iter()
        .map(|r| {
            let len = if max > 0.0 {
                ((r.importance.max(0.0) / max) * BAR_WIDTH as f64).round() as usize
            } else {
                0
            };
            format!(
                "{:<20} {:<width$} {:.4}",
                r.feature.name(),
                "#".repeat(len),
                r.importance,
                width = BAR_WIDTH
            )
        })
        .collect()
}

pub fn log_bar_chart(ranking: &[FeatureImportance]) {
    info!("Feature importance (RMSE increase when permuted):");
    for line in render_bar_chart(ranking) {
        info!("{}", line);
    }
}

pub fn write_importance_csv<P: AsRef<Path>>(ranking: &[FeatureImportance], path: P) -> Result<()> {
    let names: Vec<&str> = ranking.iter().map(|r| r.feature.name()).collect();
    let scores: Vec<f64> = ranking.iter().map(|r| r.importance).collect();
    let mut df = DataFrame::new(vec![
        Series::new("feature".into(), names).into(),
        Series::new("importance".into(), scores).into(),
    ])?;
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).include_header(true).finish(&mut df)?;
    Ok(())
}
