use anyhow::Context;
use claim_cost_predictor::{Config, Pipeline};
use std::env;
use tracing::{debug, info, instrument};

#[instrument]
fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    info!("Starting claim cost predictor");

    let config_path = env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    debug!("Loading config from path: {}", config_path);
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {config_path}"))?;
    debug!(?config, "Config loaded successfully");

    let summary = Pipeline::new(config)
        .run()
        .context("claim cost pipeline failed")?;

    for report in &summary.reports {
        info!(
            family = %report.family,
            params = %report.params,
            cv_rmse = report.cv_rmse,
            holdout_rmse = report.holdout_rmse,
            "Family result"
        );
    }
    info!(
        family = %summary.family,
        params = %summary.params,
        holdout_rmse = summary.holdout_rmse,
        predictions = summary.predictions,
        "Best model: {}, predictions written to {}",
        summary.family,
        summary.output_path.display()
    );

    Ok(())
}
