//! Trained predictors.
//!
//! A predictor is either primal (`X · W + b`, linear kernel only) or dual
//! (`K(X, rows) · A`). Both are plain data and serialize into the model JSON.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::KernelError;
use crate::kernel::KernelKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Predictor {
    Linear(LinearPredictor),
    Kernel(KernelPredictor),
}

impl Predictor {
    /// Predictions for the rows of `x`, shape `x.nrows() × n_labels`.
    pub fn predict(&self, x: &DMatrix<f64>) -> Result<DMatrix<f64>, KernelError> {
        match self {
            Predictor::Linear(p) => p.predict(x),
            Predictor::Kernel(p) => p.predict(x),
        }
    }

    pub fn n_labels(&self) -> usize {
        match self {
            Predictor::Linear(p) => p.weights.ncols(),
            Predictor::Kernel(p) => p.coefficients.ncols(),
        }
    }

    /// Number of input columns `predict` expects.
    pub fn n_inputs(&self) -> usize {
        match self {
            Predictor::Linear(p) => p.weights.nrows(),
            Predictor::Kernel(p) => match p.kernel {
                KernelKind::Precomputed => p.rows.nrows(),
                _ => p.rows.ncols(),
            },
        }
    }
}

/// Primal model: `X · W + b`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearPredictor {
    /// `n_features × n_labels`
    pub weights: DMatrix<f64>,
    /// One intercept per label.
    pub bias: DVector<f64>,
}

impl LinearPredictor {
    pub fn new(weights: DMatrix<f64>, bias: DVector<f64>) -> Self {
        Self { weights, bias }
    }

    pub fn predict(&self, x: &DMatrix<f64>) -> Result<DMatrix<f64>, KernelError> {
        if x.ncols() != self.weights.nrows() {
            return Err(KernelError::FeatureMismatch {
                expected: self.weights.nrows(),
                found: x.ncols(),
            });
        }
        let mut out = x * &self.weights;
        for mut row in out.row_iter_mut() {
            row += self.bias.transpose();
        }
        Ok(out)
    }
}

/// Dual model: `K(X, rows) · A`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelPredictor {
    pub kernel: KernelKind,
    /// Training rows or basis vectors (empty-width for precomputed kernels).
    pub rows: DMatrix<f64>,
    /// `rows.nrows() × n_labels`
    pub coefficients: DMatrix<f64>,
}

impl KernelPredictor {
    pub fn new(kernel: KernelKind, rows: DMatrix<f64>, coefficients: DMatrix<f64>) -> Self {
        Self {
            kernel,
            rows,
            coefficients,
        }
    }

    pub fn predict(&self, x: &DMatrix<f64>) -> Result<DMatrix<f64>, KernelError> {
        let k = self.kernel.evaluate(x, &self.rows)?;
        Ok(k * &self.coefficients)
    }
}
