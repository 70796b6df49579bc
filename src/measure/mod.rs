//! Performance measures used to score hold-out predictions.
//!
//! Measures may be undefined on degenerate input (e.g. a query whose samples
//! all share one label has no pairs to order). That outcome is a value, not a
//! crash: per-group results are `GroupScore`s and only scored groups enter the
//! aggregate.

pub mod cindex;
pub mod sqerror;

pub use cindex::*;
pub use sqerror::*;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::UndefinedPerformance;

/// Whether larger or smaller scores are better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    HigherIsBetter,
    LowerIsBetter,
}

impl Direction {
    /// `true` if `candidate` strictly beats `incumbent`.
    pub fn is_better(self, candidate: f64, incumbent: f64) -> bool {
        match self {
            Direction::HigherIsBetter => candidate > incumbent,
            Direction::LowerIsBetter => candidate < incumbent,
        }
    }
}

/// Scores predictions against true labels (`n × l` each).
pub trait Measure: Sync {
    fn name(&self) -> &'static str;

    fn direction(&self) -> Direction;

    fn score(&self, y_true: &DMatrix<f64>, y_pred: &DMatrix<f64>) -> Result<f64, UndefinedPerformance>;
}

/// Outcome of scoring one query group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GroupScore {
    Scored(f64),
    Undefined,
}

impl GroupScore {
    pub fn evaluate(measure: &dyn Measure, y_true: &DMatrix<f64>, y_pred: &DMatrix<f64>) -> Self {
        match measure.score(y_true, y_pred) {
            Ok(v) => GroupScore::Scored(v),
            Err(_) => GroupScore::Undefined,
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            GroupScore::Scored(v) => Some(v),
            GroupScore::Undefined => None,
        }
    }
}

/// Mean over scored groups; undefined if no group could be scored.
pub fn aggregate(scores: &[GroupScore]) -> Result<f64, UndefinedPerformance> {
    let defined: Vec<f64> = scores.iter().filter_map(|s| s.value()).collect();
    if defined.is_empty() {
        return Err(UndefinedPerformance::new("Performance undefined for all folds"));
    }
    Ok(defined.iter().sum::<f64>() / defined.len() as f64)
}
