//! Pluggable regressors
//!
//! An [`Estimator`] turns an encoded design matrix into a [`FittedModel`].
//! Fitted models are plain data so they can live inside the serialized
//! artifact; new estimators add a `FittedModel` variant.

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{EstimationError, Result};

/// Jitter added to the normal-equation diagonal for numerical stability
const DIAGONAL_JITTER: f64 = 1e-10;

/// Trait for regression training implementations
pub trait Estimator: Send + Sync {
    /// Short identifier recorded in the manifest
    fn name(&self) -> &'static str;

    /// Fit on an encoded design matrix
    fn fit(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<FittedModel>;
}

/// Serializable fitted regressor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FittedModel {
    Linear(LinearModel),
    Constant { value: f64 },
}

impl FittedModel {
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            FittedModel::Linear(model) => model.predict(x),
            FittedModel::Constant { value } => Ok(Array1::from_elem(x.nrows(), *value)),
        }
    }

    /// Number of encoded inputs the model expects, `None` when any width works
    pub fn n_inputs(&self) -> Option<usize> {
        match self {
            FittedModel::Linear(model) => Some(model.coefficients.len()),
            FittedModel::Constant { .. } => None,
        }
    }
}

/// `y = intercept + x · coefficients`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl LinearModel {
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if x.ncols() != self.coefficients.len() {
            return Err(EstimationError::Prediction(format!(
                "design matrix has {} columns, model expects {}",
                x.ncols(),
                self.coefficients.len()
            )));
        }
        let beta = Array1::from_vec(self.coefficients.clone());
        Ok(x.dot(&beta) + self.intercept)
    }
}

/// L2-regularized least squares with an unpenalized intercept
#[derive(Debug, Clone)]
pub struct RidgeRegression {
    pub alpha: f64,
}

impl Default for RidgeRegression {
    fn default() -> Self {
        Self { alpha: 1.0 }
    }
}

impl Estimator for RidgeRegression {
    fn name(&self) -> &'static str {
        "ridge"
    }

    fn fit(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<FittedModel> {
        if x.nrows() != y.len() {
            return Err(EstimationError::Training(format!(
                "{} rows in design matrix but {} targets",
                x.nrows(),
                y.len()
            )));
        }
        if x.nrows() == 0 {
            return Err(EstimationError::EmptyDataset);
        }

        let y_mean = y.mean().unwrap_or(0.0);
        if x.ncols() == 0 {
            return Ok(FittedModel::Linear(LinearModel {
                intercept: y_mean,
                coefficients: Vec::new(),
            }));
        }

        // Center so the intercept stays out of the penalty
        let x_mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| EstimationError::Training("cannot average columns".to_string()))?;
        let xc = x - &x_mean;
        let yc = y - y_mean;

        let mut xtx = xc.t().dot(&xc);
        let xty = xc.t().dot(&yc);
        for i in 0..xtx.nrows() {
            xtx[[i, i]] += self.alpha.max(0.0) + DIAGONAL_JITTER;
        }

        let beta = match cholesky_solve(&xtx, &xty) {
            Some(beta) => beta,
            None => gauss_jordan_solve(&xtx, &xty).ok_or_else(|| {
                EstimationError::Training("normal equations are singular".to_string())
            })?,
        };

        let intercept = y_mean - x_mean.dot(&beta);
        Ok(FittedModel::Linear(LinearModel {
            intercept,
            coefficients: beta.to_vec(),
        }))
    }
}

/// Predicts the training-target mean; useful as a floor for comparison
#[derive(Debug, Clone, Default)]
pub struct MeanRegressor;

impl Estimator for MeanRegressor {
    fn name(&self) -> &'static str {
        "mean"
    }

    fn fit(&self, _x: &Array2<f64>, y: &Array1<f64>) -> Result<FittedModel> {
        let value = y.mean().ok_or(EstimationError::EmptyDataset)?;
        Ok(FittedModel::Constant { value })
    }
}

/// Solve `A x = b` for symmetric positive definite `A`
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }
            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 || !diag.is_finite() {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    // Forward substitution: L z = b
    let mut z = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[[i, j]] * z[j];
        }
        z[i] = (b[i] - sum) / l[[i, i]];
    }

    // Backward substitution: Lᵀ x = z
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = 0.0;
        for j in (i + 1)..n {
            sum += l[[j, i]] * x[j];
        }
        x[i] = (z[i] - sum) / l[[i, i]];
    }
    Some(x)
}

/// Gauss-Jordan elimination with partial pivoting
fn gauss_jordan_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    let mut m = a.clone();
    let mut rhs = b.clone();

    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| {
            m[[i, col]]
                .abs()
                .partial_cmp(&m[[j, col]].abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })?;
        if m[[pivot, col]].abs() < 1e-12 {
            return None;
        }
        if pivot != col {
            for k in 0..n {
                m.swap([pivot, k], [col, k]);
            }
            rhs.swap(pivot, col);
        }
        let p = m[[col, col]];
        for k in 0..n {
            m[[col, k]] /= p;
        }
        rhs[col] /= p;
        for row in 0..n {
            if row != col {
                let factor = m[[row, col]];
                if factor != 0.0 {
                    for k in 0..n {
                        m[[row, k]] -= factor * m[[col, k]];
                    }
                    rhs[row] -= factor * rhs[col];
                }
            }
        }
    }
    Some(rhs)
}
