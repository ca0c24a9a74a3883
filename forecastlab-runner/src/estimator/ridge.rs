//! Ridge regression with an unpenalised intercept.
//!
//! Features and target are centred, the penalised normal equations
//! `(XᵀX + αI) β = Xᵀy` are solved by Gaussian elimination with partial
//! pivoting, and the intercept is recovered from the means.

use forecastlab_core::domain::FeatureMatrix;

use super::{check_columns, check_training, Estimator, EstimatorError, ModelArtifact, Predictor};

const PIVOT_EPS: f64 = 1e-12;

#[derive(Debug, Clone, Copy)]
pub struct Ridge {
    alpha: f64,
}

impl Ridge {
    pub fn new(alpha: f64) -> Self {
        Self { alpha }
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }
}

impl Default for Ridge {
    fn default() -> Self {
        Self { alpha: 1.0 }
    }
}

impl Estimator for Ridge {
    fn name(&self) -> &str {
        "ridge"
    }

    fn fit(&self, x: &FeatureMatrix, y: &[f64]) -> Result<Box<dyn Predictor>, EstimatorError> {
        check_training(x, y)?;
        let n = x.n_rows();
        let p = x.n_cols();

        let x_mean: Vec<f64> = (0..p)
            .map(|c| x.column_values(c).sum::<f64>() / n as f64)
            .collect();
        let y_mean = y.iter().sum::<f64>() / n as f64;

        // gram = XcᵀXc + αI, rhs = Xcᵀyc
        let mut gram = vec![0.0; p * p];
        let mut rhs = vec![0.0; p];
        let mut centred = vec![0.0; p];
        for (r, &target) in y.iter().enumerate() {
            let row = x.row(r);
            for (c, v) in centred.iter_mut().enumerate() {
                *v = row[c] - x_mean[c];
            }
            let yc = target - y_mean;
            for i in 0..p {
                rhs[i] += centred[i] * yc;
                for j in i..p {
                    gram[i * p + j] += centred[i] * centred[j];
                }
            }
        }
        for i in 0..p {
            for j in 0..i {
                gram[i * p + j] = gram[j * p + i];
            }
            gram[i * p + i] += self.alpha;
        }

        let coefficients = solve(gram, rhs, p)?;
        let intercept = y_mean
            - coefficients
                .iter()
                .zip(&x_mean)
                .map(|(b, m)| b * m)
                .sum::<f64>();

        Ok(Box::new(RidgeModel::new(
            x.column_names().to_vec(),
            intercept,
            coefficients,
        )))
    }
}

/// Solve `a · x = b` for square `a` (row-major, `p × p`).
fn solve(mut a: Vec<f64>, mut b: Vec<f64>, p: usize) -> Result<Vec<f64>, EstimatorError> {
    for col in 0..p {
        let pivot = (col..p)
            .max_by(|&r1, &r2| a[r1 * p + col].abs().total_cmp(&a[r2 * p + col].abs()))
            .unwrap_or(col);
        let magnitude = a[pivot * p + col].abs();
        if magnitude.is_nan() || magnitude <= PIVOT_EPS {
            return Err(EstimatorError::Singular);
        }
        if pivot != col {
            for k in 0..p {
                a.swap(pivot * p + k, col * p + k);
            }
            b.swap(pivot, col);
        }
        let diag = a[col * p + col];
        for row in (col + 1)..p {
            let factor = a[row * p + col] / diag;
            if factor == 0.0 {
                continue;
            }
            for k in col..p {
                a[row * p + k] -= factor * a[col * p + k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; p];
    for row in (0..p).rev() {
        let tail: f64 = ((row + 1)..p).map(|k| a[row * p + k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row * p + row];
    }
    Ok(x)
}

#[derive(Debug, Clone, PartialEq)]
pub struct RidgeModel {
    columns: Vec<String>,
    intercept: f64,
    coefficients: Vec<f64>,
}

impl RidgeModel {
    pub fn new(columns: Vec<String>, intercept: f64, coefficients: Vec<f64>) -> Self {
        Self {
            columns,
            intercept,
            coefficients,
        }
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }
}

impl Predictor for RidgeModel {
    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>, EstimatorError> {
        check_columns(self.coefficients.len(), x)?;
        Ok((0..x.n_rows())
            .map(|r| {
                self.intercept
                    + x.row(r)
                        .iter()
                        .zip(&self.coefficients)
                        .map(|(v, b)| v * b)
                        .sum::<f64>()
            })
            .collect())
    }

    fn artifact(&self) -> Option<ModelArtifact> {
        Some(ModelArtifact::Ridge {
            columns: self.columns.clone(),
            intercept: self.intercept,
            coefficients: self.coefficients.clone(),
        })
    }
}
