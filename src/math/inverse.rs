//! Dense inversion of the small matrices used by the hold-out correction.
//!
//! Matrices here are at most `min(k, r)` wide (hold-out size vs kernel rank),
//! so a direct LU inverse is used. What to do when that inverse does not
//! exist is a caller decision expressed as an `InversionPolicy`.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::RankError;

/// Behaviour when a matrix cannot be inverted directly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum InversionPolicy {
    /// Fail with `RankError::Singular`.
    #[default]
    Strict,
    /// Fall back to the SVD pseudo-inverse, discarding singular values
    /// below `tolerance`, and log a warning.
    PseudoInverse { tolerance: f64 },
}

/// Invert a square matrix according to `policy`.
pub fn invert(m: &DMatrix<f64>, policy: InversionPolicy) -> Result<DMatrix<f64>, RankError> {
    let size = m.nrows();
    debug_assert_eq!(size, m.ncols(), "invert expects a square matrix");

    if let Some(inv) = m.clone().try_inverse() {
        if inv.iter().all(|v| v.is_finite()) {
            return Ok(inv);
        }
    }

    match policy {
        InversionPolicy::Strict => Err(RankError::Singular { size }),
        InversionPolicy::PseudoInverse { tolerance } => {
            log::warn!("{size}x{size} matrix is singular; using pseudo-inverse (tol={tolerance:e})");
            let pinv = m
                .clone()
                .pseudo_inverse(tolerance)
                .map_err(|_| RankError::Singular { size })?;
            if pinv.iter().all(|v| v.is_finite()) {
                Ok(pinv)
            } else {
                Err(RankError::Singular { size })
            }
        }
    }
}
