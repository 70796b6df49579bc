//! Kernel functions.
//!
//! Every kernel is evaluated between the rows of two matrices:
//! `K(a, b)[i, j] = k(a_i, b_j)`.
//!
//! For `Precomputed`, the caller already holds kernel values: the "data"
//! matrix *is* `K(a, b)`, and `b` is only used for its row count.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::KernelError;

/// Supported kernels and their parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum KernelKind {
    /// `k(x, z) = <x, z> + bias`
    Linear { bias: f64 },
    /// `k(x, z) = exp(-gamma · |x - z|²)`
    Gaussian { gamma: f64 },
    /// `k(x, z) = (gamma · <x, z> + coef0)^degree`
    Polynomial { gamma: f64, coef0: f64, degree: i32 },
    /// Kernel values supplied by the caller.
    Precomputed,
}

impl Default for KernelKind {
    fn default() -> Self {
        KernelKind::Linear { bias: 0.0 }
    }
}

impl KernelKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            KernelKind::Linear { .. } => "linear",
            KernelKind::Gaussian { .. } => "gaussian",
            KernelKind::Polynomial { .. } => "polynomial",
            KernelKind::Precomputed => "precomputed",
        }
    }

    /// Evaluate `K(a, b)` (shape `a.nrows() × b.nrows()`).
    pub fn evaluate(&self, a: &DMatrix<f64>, b: &DMatrix<f64>) -> Result<DMatrix<f64>, KernelError> {
        if let KernelKind::Precomputed = self {
            if a.ncols() != b.nrows() {
                return Err(KernelError::FeatureMismatch {
                    expected: b.nrows(),
                    found: a.ncols(),
                });
            }
            return Ok(a.clone());
        }

        if a.ncols() != b.ncols() {
            return Err(KernelError::FeatureMismatch {
                expected: b.ncols(),
                found: a.ncols(),
            });
        }

        let gram = a * b.transpose();
        let k = match *self {
            KernelKind::Linear { bias } => gram.add_scalar(bias),
            KernelKind::Polynomial { gamma, coef0, degree } => {
                gram.map(|v| (gamma * v + coef0).powi(degree))
            }
            KernelKind::Gaussian { gamma } => {
                let a_norms: Vec<f64> = a.row_iter().map(|r| r.norm_squared()).collect();
                let b_norms: Vec<f64> = b.row_iter().map(|r| r.norm_squared()).collect();
                DMatrix::from_fn(a.nrows(), b.nrows(), |i, j| {
                    // |x - z|² = |x|² + |z|² - 2<x, z>, floored at 0 against round-off.
                    let dist = (a_norms[i] + b_norms[j] - 2.0 * gram[(i, j)]).max(0.0);
                    (-gamma * dist).exp()
                })
            }
            KernelKind::Precomputed => unreachable!("handled above"),
        };
        Ok(k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn sample() -> DMatrix<f64> {
        DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 0.0, 2.0, 1.0, 1.0])
    }

    #[test]
    fn linear_kernel_adds_bias() {
        let x = sample();
        let k = KernelKind::Linear { bias: 1.0 }.evaluate(&x, &x).unwrap();
        assert_abs_diff_eq!(k[(0, 0)], 2.0);
        assert_abs_diff_eq!(k[(1, 2)], 3.0);
        assert_abs_diff_eq!(k[(0, 1)], 1.0);
    }

    #[test]
    fn gaussian_kernel_is_one_on_diagonal() {
        let x = sample();
        let k = KernelKind::Gaussian { gamma: 0.5 }.evaluate(&x, &x).unwrap();
        for i in 0..3 {
            assert_abs_diff_eq!(k[(i, i)], 1.0, epsilon = 1e-12);
        }
        // |x0 - x1|² = 1 + 4 = 5
        assert_abs_diff_eq!(k[(0, 1)], (-2.5f64).exp(), epsilon = 1e-12);
    }

    #[test]
    fn polynomial_kernel_matches_formula() {
        let x = sample();
        let k = KernelKind::Polynomial { gamma: 2.0, coef0: 1.0, degree: 2 }
            .evaluate(&x, &x)
            .unwrap();
        // <x1, x2> = 2 → (2·2 + 1)² = 25
        assert_abs_diff_eq!(k[(1, 2)], 25.0);
    }

    #[test]
    fn precomputed_passes_values_through() {
        let k = DMatrix::from_row_slice(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let train_rows = DMatrix::zeros(3, 0);
        let out = KernelKind::Precomputed.evaluate(&k, &train_rows).unwrap();
        assert_eq!(out, k);

        let err = KernelKind::Precomputed
            .evaluate(&k, &DMatrix::zeros(2, 0))
            .unwrap_err();
        assert_eq!(err, KernelError::FeatureMismatch { expected: 2, found: 3 });
    }

    #[test]
    fn feature_mismatch_is_reported() {
        let x = sample();
        let z = DMatrix::zeros(2, 3);
        assert!(matches!(
            KernelKind::default().evaluate(&z, &x),
            Err(KernelError::FeatureMismatch { expected: 2, found: 3 })
        ));
    }
}
