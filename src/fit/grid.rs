//! Regularization grid generation.
//!
//! The regularization parameter is picked by exhaustive search over a
//! log-spaced grid. Every grid point reuses the same eigensystem, so a wide
//! grid costs little beyond the hold-out evaluations.

use crate::domain::GridSpec;
use crate::error::RankError;

/// Generate `steps` log-spaced points between `min` and `max` (inclusive).
pub fn log_space(min: f64, max: f64, steps: usize) -> Result<Vec<f64>, RankError> {
    if !(min.is_finite() && max.is_finite() && min > 0.0 && max > 0.0 && max > min) {
        return Err(RankError::InvalidGrid(format!(
            "range min={min}, max={max} (must be finite, >0, and max>min)"
        )));
    }
    if steps < 2 {
        return Err(RankError::InvalidGrid("steps must be >= 2".to_string()));
    }

    let ln_min = min.ln();
    let ln_max = max.ln();
    let step = (ln_max - ln_min) / (steps as f64 - 1.0);

    let mut out = Vec::with_capacity(steps);
    for i in 0..steps {
        out.push((ln_min + step * i as f64).exp());
    }
    Ok(out)
}

/// `2^e` for `e` in `min_exp..max_exp` (upper bound exclusive).
pub fn powers_of_two(min_exp: i32, max_exp: i32) -> Result<Vec<f64>, RankError> {
    if min_exp >= max_exp {
        return Err(RankError::InvalidGrid(format!(
            "exponent range {min_exp}..{max_exp} is empty"
        )));
    }
    Ok((min_exp..max_exp).map(|e| 2f64.powi(e)).collect())
}

/// Materialize a grid spec, checking that every value is a usable `λ > 0`.
pub fn resolve_grid(spec: &GridSpec) -> Result<Vec<f64>, RankError> {
    let grid = match spec {
        GridSpec::PowersOfTwo { min_exp, max_exp } => powers_of_two(*min_exp, *max_exp)?,
        GridSpec::LogSpaced { min, max, steps } => log_space(*min, *max, *steps)?,
        GridSpec::Values(values) => values.clone(),
    };
    if grid.is_empty() {
        return Err(RankError::InvalidGrid("no values".to_string()));
    }
    if let Some(bad) = grid.iter().find(|v| !(v.is_finite() && **v > 0.0)) {
        return Err(RankError::InvalidGrid(format!(
            "regularization parameter {bad} must be finite and > 0"
        )));
    }
    Ok(grid)
}
