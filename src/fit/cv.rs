//! Leave-query-out cross-validation over a regularization grid.
//!
//! For each grid value:
//! - compute the solution for that value (no retraining of the eigensystem)
//! - hold out every query in turn with the closed-form correction
//! - score each query's hold-out predictions; undefined scores are skipped
//! - average the defined scores
//!
//! Grid points are independent given the shared eigensystem, so they run on
//! the rayon pool. Each task owns its `TrainedState`; the solver itself is
//! only read until the best value is chosen and written back.

use std::hash::Hash;

use nalgebra::DMatrix;
use rayon::prelude::*;

use crate::domain::{CvConfig, RankConfig};
use crate::error::{RankError, UndefinedPerformance};
use crate::fit::grid::resolve_grid;
use crate::measure::{Direction, GroupScore, Measure, aggregate};
use crate::predictor::Predictor;
use crate::rank::QueryRankRls;

/// How a single grid point turned out.
#[derive(Debug, Clone, PartialEq)]
pub enum PointStatus {
    Scored(f64),
    /// No query could be scored.
    Undefined,
    /// A hold-out failed numerically.
    Failed(RankError),
}

/// Results for one regularization value.
#[derive(Debug, Clone)]
pub struct GridPoint {
    pub regparam: f64,
    pub status: PointStatus,
    pub group_scores: Vec<GroupScore>,
    /// Hold-out predictions per query (dense-id order); empty when failed.
    pub predictions: Vec<DMatrix<f64>>,
}

impl GridPoint {
    pub fn performance(&self) -> Option<f64> {
        match self.status {
            PointStatus::Scored(v) => Some(v),
            _ => None,
        }
    }
}

/// Output of a grid search.
#[derive(Debug, Clone)]
pub struct CvOutcome {
    pub points: Vec<GridPoint>,
    pub best_index: usize,
    pub direction: Direction,
}

impl CvOutcome {
    /// Selected regularization parameter.
    pub fn regparam(&self) -> f64 {
        self.points[self.best_index].regparam
    }

    pub fn best_performance(&self) -> Option<f64> {
        self.points[self.best_index].performance()
    }

    pub fn grid(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.regparam).collect()
    }

    /// Aggregate performance per grid point (`None` where undefined or failed).
    pub fn performances(&self) -> Vec<Option<f64>> {
        self.points.iter().map(GridPoint::performance).collect()
    }

    /// Per-query hold-out predictions per grid point.
    pub fn predictions(&self) -> Vec<&[DMatrix<f64>]> {
        self.points.iter().map(|p| p.predictions.as_slice()).collect()
    }
}

/// Leave-query-out cross-validator bound to a performance measure.
pub struct LeaveQueryOutCv<'a> {
    measure: &'a dyn Measure,
    parallel: bool,
}

impl<'a> LeaveQueryOutCv<'a> {
    pub fn new(measure: &'a dyn Measure, parallel: bool) -> Self {
        Self { measure, parallel }
    }

    /// Solve at `regparam` and return the mean hold-out performance and the
    /// per-query predictions. Fails if no query can be scored.
    pub fn cv(
        &self,
        solver: &mut QueryRankRls,
        regparam: f64,
    ) -> Result<(f64, Vec<DMatrix<f64>>), RankError> {
        solver.solve(regparam);
        let point = self.evaluate(solver, regparam);
        match point.status {
            PointStatus::Scored(v) => Ok((v, point.predictions)),
            PointStatus::Undefined => Err(UndefinedPerformance::new(
                "Performance undefined for all folds",
            )
            .into()),
            PointStatus::Failed(err) => Err(err),
        }
    }

    /// Evaluate one grid point without mutating the solver.
    pub fn evaluate(&self, solver: &QueryRankRls, regparam: f64) -> GridPoint {
        let failed = |err: RankError| GridPoint {
            regparam,
            status: PointStatus::Failed(err),
            group_scores: Vec::new(),
            predictions: Vec::new(),
        };

        let state = match solver.state_for(regparam) {
            Ok(state) => state,
            Err(err) => return failed(err),
        };

        let labels = solver.labels();
        let folds = solver.groups().groups();
        let mut predictions = Vec::with_capacity(folds.len());
        let mut group_scores = Vec::with_capacity(folds.len());
        for fold in folds {
            let p = match solver.holdout_with(&state, fold) {
                Ok(p) => p,
                Err(err) => return failed(err),
            };
            let y = labels.select_rows(fold);
            group_scores.push(GroupScore::evaluate(self.measure, &y, &p));
            predictions.push(p);
        }

        let status = match aggregate(&group_scores) {
            Ok(v) => PointStatus::Scored(v),
            Err(_) => PointStatus::Undefined,
        };
        log::debug!(
            "regparam={regparam:e} {}={:?} ({} of {} queries scored)",
            self.measure.name(),
            status,
            group_scores.iter().filter(|s| s.value().is_some()).count(),
            group_scores.len()
        );

        GridPoint {
            regparam,
            status,
            group_scores,
            predictions,
        }
    }

    /// Evaluate every grid value, pick the best and leave `solver` trained at it.
    pub fn grid_search(&self, solver: &mut QueryRankRls, grid: &[f64]) -> Result<CvOutcome, RankError> {
        if grid.is_empty() {
            return Err(RankError::InvalidGrid("no values".to_string()));
        }
        if solver.eigensystem().is_none() {
            solver.solve(grid[0]);
        }

        let points: Vec<GridPoint> = {
            let shared: &QueryRankRls = solver;
            if self.parallel {
                grid.par_iter().map(|&r| self.evaluate(shared, r)).collect()
            } else {
                grid.iter().map(|&r| self.evaluate(shared, r)).collect()
            }
        };

        for point in &points {
            match &point.status {
                PointStatus::Undefined => {
                    log::warn!("regparam={:e}: performance undefined for all queries", point.regparam)
                }
                PointStatus::Failed(err) => log::warn!("regparam={:e}: {err}", point.regparam),
                PointStatus::Scored(_) => {}
            }
        }

        let direction = self.measure.direction();
        let Some(best_index) = select_best(&points, direction) else {
            return Err(unscored_grid_error(&points));
        };

        let best = points[best_index].regparam;
        log::info!(
            "selected regparam={best:e} ({}={:.6})",
            self.measure.name(),
            points[best_index].performance().unwrap_or(f64::NAN)
        );
        solver.solve(best);

        Ok(CvOutcome {
            points,
            best_index,
            direction,
        })
    }
}

/// Index of the best scored point; ties go to the earliest grid value.
fn select_best(points: &[GridPoint], direction: Direction) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, point) in points.iter().enumerate() {
        let Some(v) = point.performance() else {
            continue;
        };
        match best {
            Some((_, incumbent)) if !direction.is_better(v, incumbent) => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Error for a grid with no scored point: the first numerical failure if any,
/// otherwise undefined performance.
fn unscored_grid_error(points: &[GridPoint]) -> RankError {
    points
        .iter()
        .find_map(|p| match &p.status {
            PointStatus::Failed(err) => Some(err.clone()),
            _ => None,
        })
        .unwrap_or_else(|| UndefinedPerformance::new("Performance undefined for every grid point").into())
}

/// RankRLS with the regularization parameter chosen by leave-query-out CV.
#[derive(Debug, Clone)]
pub struct LeaveQueryOutRankRls {
    solver: QueryRankRls,
    outcome: CvOutcome,
}

impl LeaveQueryOutRankRls {
    pub fn fit<Q: Eq + Hash + Clone>(
        x: &DMatrix<f64>,
        y: &DMatrix<f64>,
        qids: &[Q],
        config: &RankConfig,
        cv: &CvConfig,
        basis_vectors: Option<&DMatrix<f64>>,
    ) -> Result<Self, RankError> {
        let grid = resolve_grid(&cv.grid)?;
        let initial = RankConfig {
            regparam: grid[0],
            ..*config
        };
        let mut solver = QueryRankRls::new(x, y, qids, &initial, basis_vectors)?;
        let measure = cv.measure.measure();
        let outcome = LeaveQueryOutCv::new(measure.as_ref(), cv.parallel).grid_search(&mut solver, &grid)?;
        Ok(Self { solver, outcome })
    }

    pub fn regparam(&self) -> f64 {
        self.outcome.regparam()
    }

    pub fn cv_performances(&self) -> Vec<Option<f64>> {
        self.outcome.performances()
    }

    pub fn cv_predictions(&self) -> Vec<&[DMatrix<f64>]> {
        self.outcome.predictions()
    }

    pub fn predictor(&self) -> Option<&Predictor> {
        self.solver.predictor()
    }

    pub fn predict(&self, x: &DMatrix<f64>) -> Result<DMatrix<f64>, RankError> {
        self.solver.predict(x)
    }

    pub fn solver(&self) -> &QueryRankRls {
        &self.solver
    }

    pub fn outcome(&self) -> &CvOutcome {
        &self.outcome
    }

    pub fn into_parts(self) -> (QueryRankRls, CvOutcome) {
        (self.solver, self.outcome)
    }
}
