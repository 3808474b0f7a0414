use tracing::debug;

use super::{Classifier, check_columns, check_training_set, sigmoid};
use crate::dataset::FeatureMatrix;
use crate::error::ModelError;

#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    mean: Vec<f64>,
    std: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(x: &FeatureMatrix) -> Self {
        let n = x.n_rows();
        let mut mean = vec![0.0; x.n_cols()];
        let mut var = vec![0.0; x.n_cols()];
        if n == 0 {
            return Self {
                mean,
                std: vec![1.0; x.n_cols()],
            };
        }

        for row in x.rows() {
            for (m, v) in mean.iter_mut().zip(row) {
                *m += v;
            }
        }
        for m in &mut mean {
            *m /= n as f64;
        }
        for row in x.rows() {
            for ((acc, v), m) in var.iter_mut().zip(row).zip(&mean) {
                let d = v - m;
                *acc += d * d;
            }
        }
        let std = var
            .into_iter()
            .map(|v| {
                let s = (v / n as f64).sqrt();
                // Constant columns pass through centered but unscaled.
                if s > 1e-12 { s } else { 1.0 }
            })
            .collect();
        Self { mean, std }
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn std(&self) -> &[f64] {
        &self.std
    }

    pub fn transform(&self, x: &FeatureMatrix) -> FeatureMatrix {
        let mut out = FeatureMatrix::new(x.n_cols());
        let mut buf = vec![0.0; x.n_cols()];
        for row in x.rows() {
            for (j, v) in row.iter().enumerate() {
                buf[j] = (v - self.mean[j]) / self.std[j];
            }
            out.push_row(&buf);
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogisticParams {
    pub l2: f64,
    pub max_iters: usize,
    pub lr_start: f64,
    pub tolerance: f64,
}

impl Default for LogisticParams {
    fn default() -> Self {
        Self {
            l2: 1e-3,
            max_iters: 3000,
            lr_start: 0.5,
            tolerance: 1e-6,
        }
    }
}

#[derive(Debug, Clone)]
struct Fitted {
    scaler: StandardScaler,
    coeffs: Vec<f64>,
    intercept: f64,
}

#[derive(Debug, Clone)]
pub struct LogisticRegression {
    params: LogisticParams,
    fitted: Option<Fitted>,
}

const NAME: &str = "logistic";

impl LogisticRegression {
    pub fn new(params: LogisticParams) -> Self {
        Self {
            params,
            fitted: None,
        }
    }

    /// The scaler learned during `fit`, reused as-is for every later prediction.
    pub fn scaler(&self) -> Option<&StandardScaler> {
        self.fitted.as_ref().map(|f| &f.scaler)
    }

    pub fn coefficients(&self) -> Option<&[f64]> {
        self.fitted.as_ref().map(|f| f.coeffs.as_slice())
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

impl Classifier for LogisticRegression {
    fn name(&self) -> &'static str {
        NAME
    }

    fn fit(&mut self, x: &FeatureMatrix, y: &[bool]) -> Result<(), ModelError> {
        check_training_set(NAME, x, y)?;
        let p = self.params;
        let scaler = StandardScaler::fit(x);
        let z = scaler.transform(x);
        let n = z.n_rows() as f64;
        let n_cols = z.n_cols();

        let mut coeffs = vec![0.0; n_cols];
        let mut intercept = 0.0;
        let mut grad = vec![0.0; n_cols];
        let mut iters = 0;

        for iter in 0..p.max_iters {
            iters = iter + 1;
            grad.iter_mut().for_each(|g| *g = 0.0);
            let mut grad_b = 0.0;

            for (row, label) in z.rows().zip(y) {
                let err = sigmoid(dot(&coeffs, row) + intercept) - if *label { 1.0 } else { 0.0 };
                grad_b += err;
                for (g, v) in grad.iter_mut().zip(row) {
                    *g += err * v;
                }
            }

            let lr = p.lr_start / (1.0 + (iter as f64 * 0.003));
            let mut largest = (grad_b / n).abs();
            for (w, g) in coeffs.iter_mut().zip(&grad) {
                let step = g / n + p.l2 * *w;
                largest = largest.max(step.abs());
                *w -= lr * step;
            }
            intercept -= lr * grad_b / n;

            if largest < p.tolerance {
                break;
            }
        }

        debug!(model = NAME, iters, intercept, "logistic fit complete");
        self.fitted = Some(Fitted {
            scaler,
            coeffs,
            intercept,
        });
        Ok(())
    }

    fn predict_proba(&self, x: &FeatureMatrix) -> Result<Vec<f64>, ModelError> {
        let fitted = self
            .fitted
            .as_ref()
            .ok_or(ModelError::NotFitted { model: NAME })?;
        check_columns(NAME, fitted.coeffs.len(), x)?;
        let z = fitted.scaler.transform(x);
        Ok(z
            .rows()
            .map(|row| sigmoid(dot(&fitted.coeffs, row) + fitted.intercept))
            .collect())
    }
}
