//! Regression metrics for held-out evaluation

use crate::models::Metrics;

impl Metrics {
    /// Compute MAE, RMSE and R² for paired truth/prediction slices
    pub fn evaluate(y_true: &[f64], y_pred: &[f64]) -> Self {
        Self {
            mae: mean_absolute_error(y_true, y_pred),
            rmse: mean_squared_error(y_true, y_pred).sqrt(),
            r2: r_squared(y_true, y_pred),
        }
    }
}

/// Mean Absolute Error: (1/n) * Σ|y_true - y_pred|
pub fn mean_absolute_error(y_true: &[f64], y_pred: &[f64]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).abs())
        .sum::<f64>()
        / y_true.len() as f64
}

/// Mean Squared Error: (1/n) * Σ(y_true - y_pred)²
pub fn mean_squared_error(y_true: &[f64], y_pred: &[f64]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).powi(2))
        .sum::<f64>()
        / y_true.len() as f64
}

/// Coefficient of determination. A constant truth scores 1.0 when predicted
/// exactly and 0.0 otherwise.
pub fn r_squared(y_true: &[f64], y_pred: &[f64]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let mean = y_true.iter().sum::<f64>() / y_true.len() as f64;
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).powi(2))
        .sum();
    if ss_tot <= f64::EPSILON {
        return if ss_res <= f64::EPSILON { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_predictions() {
        let y = [1.0, 2.0, 3.0];
        let m = Metrics::evaluate(&y, &y);
        assert_eq!(m.mae, 0.0);
        assert_eq!(m.rmse, 0.0);
        assert_eq!(m.r2, 1.0);
    }

    #[test]
    fn test_known_values() {
        let y_true = [3.0, -0.5, 2.0, 7.0];
        let y_pred = [2.5, 0.0, 2.0, 8.0];
        let m = Metrics::evaluate(&y_true, &y_pred);
        assert!((m.mae - 0.5).abs() < 1e-12);
        assert!((m.rmse - 0.375f64.sqrt()).abs() < 1e-12);
        assert!((m.r2 - 0.948_608_137).abs() < 1e-6);
    }

    #[test]
    fn test_constant_truth() {
        assert_eq!(r_squared(&[2.0, 2.0], &[2.0, 2.0]), 1.0);
        assert_eq!(r_squared(&[2.0, 2.0], &[1.0, 3.0]), 0.0);
    }

    #[test]
    fn test_empty_inputs() {
        assert_eq!(mean_absolute_error(&[], &[]), 0.0);
        assert_eq!(mean_squared_error(&[], &[]), 0.0);
        assert_eq!(r_squared(&[], &[]), 0.0);
    }
}
