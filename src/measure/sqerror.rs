use nalgebra::DMatrix;

use crate::error::UndefinedPerformance;
use crate::measure::{Direction, Measure};

/// Mean squared error over all entries.
#[derive(Debug, Clone, Copy, Default)]
pub struct SquaredError;

impl Measure for SquaredError {
    fn name(&self) -> &'static str {
        "sqerror"
    }

    fn direction(&self) -> Direction {
        Direction::LowerIsBetter
    }

    fn score(&self, y_true: &DMatrix<f64>, y_pred: &DMatrix<f64>) -> Result<f64, UndefinedPerformance> {
        if y_true.shape() != y_pred.shape() {
            return Err(UndefinedPerformance::new(format!(
                "shape mismatch: labels {:?}, predictions {:?}",
                y_true.shape(),
                y_pred.shape()
            )));
        }
        if y_true.is_empty() {
            return Err(UndefinedPerformance::new("no samples to score"));
        }
        Ok((y_true - y_pred).norm_squared() / y_true.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_of_squared_differences() {
        let y = DMatrix::from_column_slice(2, 1, &[1.0, 3.0]);
        let p = DMatrix::from_column_slice(2, 1, &[2.0, 1.0]);
        assert_eq!(SquaredError.score(&y, &p).unwrap(), 2.5);
    }

    #[test]
    fn empty_input_is_undefined() {
        let e = DMatrix::<f64>::zeros(0, 1);
        assert!(SquaredError.score(&e, &e).is_err());
    }
}
