/// Root mean squared error: sqrt(mean((pred - actual)²)). Lower is better.
///
/// Returns 0.0 for empty input.
pub fn rmse(predictions: &[f64], actuals: &[f64]) -> f64 {
    debug_assert_eq!(predictions.len(), actuals.len());
    if predictions.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = predictions
        .iter()
        .zip(actuals)
        .map(|(p, a)| (p - a).powi(2))
        .sum();
    (sum_sq / predictions.len() as f64).sqrt()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegressionMetrics {
    pub rmse: f64,
    pub mae: f64,
    pub r_squared: f64,
}

impl RegressionMetrics {
    pub fn compute(predictions: &[f64], actuals: &[f64]) -> Self {
        let n = predictions.len().max(1) as f64;
        let mae = predictions
            .iter()
            .zip(actuals)
            .map(|(p, a)| (p - a).abs())
            .sum::<f64>()
            / n;

        let mean = actuals.iter().sum::<f64>() / actuals.len().max(1) as f64;
        let ss_tot: f64 = actuals.iter().map(|a| (a - mean).powi(2)).sum();
        let ss_res: f64 = predictions
            .iter()
            .zip(actuals)
            .map(|(p, a)| (a - p).powi(2))
            .sum();
        // A constant target has no variance to explain.
        let r_squared = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 };

        Self {
            rmse: rmse(predictions, actuals),
            mae,
            r_squared,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_rmse() {
        assert_abs_diff_eq!(rmse(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]), 0.0);
        assert_abs_diff_eq!(rmse(&[0.0, 0.0], &[3.0, 4.0]), (12.5f64).sqrt(), epsilon = 1e-12);
        assert_eq!(rmse(&[], &[]), 0.0);
    }

    #[test]
    fn test_regression_metrics() {
        let metrics = RegressionMetrics::compute(&[2.0, 4.0, 6.0], &[1.0, 4.0, 7.0]);
        assert_abs_diff_eq!(metrics.mae, 2.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(metrics.rmse, (2.0f64 / 3.0).sqrt(), epsilon = 1e-12);
        // ss_tot = 9 + 0 + 9, ss_res = 2
        assert_abs_diff_eq!(metrics.r_squared, 1.0 - 2.0 / 18.0, epsilon = 1e-12);
    }

    #[test]
    fn test_constant_target_r_squared() {
        let metrics = RegressionMetrics::compute(&[1.0, 1.0], &[1.0, 1.0]);
        assert_eq!(metrics.r_squared, 0.0);
    }
}
