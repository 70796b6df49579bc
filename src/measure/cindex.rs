//! Concordance index: the fraction of label-ordered pairs the predictions
//! order the same way. Prediction ties count as half-correct.

use nalgebra::DMatrix;

use crate::error::UndefinedPerformance;
use crate::measure::{Direction, Measure};

#[derive(Debug, Clone, Copy, Default)]
pub struct ConcordanceIndex;

impl Measure for ConcordanceIndex {
    fn name(&self) -> &'static str {
        "cindex"
    }

    fn direction(&self) -> Direction {
        Direction::HigherIsBetter
    }

    /// Mean concordance over label columns that have at least one pair with
    /// differing true labels.
    fn score(&self, y_true: &DMatrix<f64>, y_pred: &DMatrix<f64>) -> Result<f64, UndefinedPerformance> {
        if y_true.shape() != y_pred.shape() {
            return Err(UndefinedPerformance::new(format!(
                "shape mismatch: labels {:?}, predictions {:?}",
                y_true.shape(),
                y_pred.shape()
            )));
        }

        let per_column: Vec<f64> = (0..y_true.ncols())
            .filter_map(|c| {
                let y: Vec<f64> = y_true.column(c).iter().copied().collect();
                let p: Vec<f64> = y_pred.column(c).iter().copied().collect();
                concordance(&y, &p)
            })
            .collect();

        if per_column.is_empty() {
            return Err(UndefinedPerformance::new(
                "No pairs, all the instances have the same output",
            ));
        }
        Ok(per_column.iter().sum::<f64>() / per_column.len() as f64)
    }
}

/// Single-column concordance; `None` when no pair has differing labels.
pub fn concordance(y: &[f64], p: &[f64]) -> Option<f64> {
    let mut decisions = 0.0;
    let mut disagreement = 0.0;
    for i in 0..y.len() {
        for j in 0..y.len() {
            if y[i] > y[j] {
                decisions += 1.0;
                if p[i] < p[j] {
                    disagreement += 1.0;
                } else if p[i] == p[j] {
                    disagreement += 0.5;
                }
            }
        }
    }
    if decisions == 0.0 {
        None
    } else {
        Some(1.0 - disagreement / decisions)
    }
}
