//! RankRLS for query-structured data.
//!
//! Training minimizes the squared error of *within-query centered*
//! predictions, which is equivalent to a pairwise least-squares ranking loss
//! restricted to pairs from the same query. The heavy lifting happens once in
//! [`Eigensystem::build`]; `solve` for any further regularization parameter
//! is a diagonal rescale plus two `r`-sized products.
//!
//! References: Pahikkala et al., "Learning to rank with pairwise regularized
//! least-squares" (SIGIR LR4IR 2007) and "An efficient algorithm for learning
//! to rank from preference graphs" (Machine Learning 75(1), 2009).

use std::hash::Hash;

use nalgebra::{DMatrix, DVector};

use crate::domain::RankConfig;
use crate::error::RankError;
use crate::kernel::SvdAdapter;
use crate::math::InversionPolicy;
use crate::predictor::Predictor;
use crate::query::{QueryGroups, QueryIndex};
use crate::rank::eigensystem::{Eigensystem, scale_rows};

/// Lifecycle of the eigensystem cache.
///
/// The cache depends only on the training data, kernel and query structure,
/// all of which are fixed for a solver's lifetime, so it moves from
/// `Uninitialized` to `Ready` exactly once.
#[derive(Debug, Clone, Default)]
pub enum CacheState {
    #[default]
    Uninitialized,
    Ready(Eigensystem),
}

impl CacheState {
    pub fn get(&self) -> Option<&Eigensystem> {
        match self {
            CacheState::Ready(eig) => Some(eig),
            CacheState::Uninitialized => None,
        }
    }

    fn get_or_build(&mut self, build: impl FnOnce() -> Eigensystem) -> &Eigensystem {
        if let CacheState::Uninitialized = self {
            *self = CacheState::Ready(build());
        }
        match self {
            CacheState::Ready(eig) => eig,
            CacheState::Uninitialized => unreachable!("cache populated above"),
        }
    }
}

/// Regularization-dependent part of a solution.
///
/// Owned per grid point so concurrent evaluations never share mutable state.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainedState {
    pub regparam: f64,
    /// `1 / (LRevals + λ)`
    pub neweigvals: DVector<f64>,
    /// Dual coefficients `A`, `m × l`.
    pub coefficients: DMatrix<f64>,
}

#[derive(Debug, Clone)]
struct Trained {
    state: TrainedState,
    predictor: Predictor,
}

/// Query-structured RankRLS learner.
#[derive(Debug, Clone)]
pub struct QueryRankRls {
    adapter: SvdAdapter,
    labels: DMatrix<f64>,
    groups: QueryGroups,
    inversion: InversionPolicy,
    cache: CacheState,
    trained: Option<Trained>,
}

impl QueryRankRls {
    /// Build the learner and train it at `config.regparam`.
    ///
    /// `x` is `m × d` feature data (or the `m × m` kernel matrix for
    /// `KernelKind::Precomputed`), `y` is `m × l`, `qids` has length `m`.
    pub fn new<Q: Eq + Hash + Clone>(
        x: &DMatrix<f64>,
        y: &DMatrix<f64>,
        qids: &[Q],
        config: &RankConfig,
        basis_vectors: Option<&DMatrix<f64>>,
    ) -> Result<Self, RankError> {
        if qids.len() != x.nrows() {
            return Err(RankError::QueryMismatch {
                samples: x.nrows(),
                qids: qids.len(),
            });
        }
        let groups = QueryIndex::new(qids).into_groups();
        Self::with_groups(x, y, groups, config, basis_vectors)
    }

    /// Like [`QueryRankRls::new`], for callers that already hold the partition.
    pub fn with_groups(
        x: &DMatrix<f64>,
        y: &DMatrix<f64>,
        groups: QueryGroups,
        config: &RankConfig,
        basis_vectors: Option<&DMatrix<f64>>,
    ) -> Result<Self, RankError> {
        if y.nrows() != x.nrows() {
            return Err(RankError::LabelMismatch {
                samples: x.nrows(),
                labels: y.nrows(),
            });
        }
        if groups.len() != x.nrows() {
            return Err(RankError::QueryMismatch {
                samples: x.nrows(),
                qids: groups.len(),
            });
        }

        let adapter = SvdAdapter::construct(x, config.kernel, basis_vectors)?;
        let mut solver = Self {
            adapter,
            labels: y.clone(),
            groups,
            inversion: config.inversion,
            cache: CacheState::Uninitialized,
            trained: None,
        };
        solver.solve(config.regparam);
        Ok(solver)
    }

    /// Retrain with a new regularization parameter (`regparam > 0`).
    ///
    /// Builds the eigensystem on first use, then overwrites the trained state.
    pub fn solve(&mut self, regparam: f64) {
        let basis = self.adapter.basis();
        let eig = self
            .cache
            .get_or_build(|| Eigensystem::build(basis, &self.labels, &self.groups));
        let state = compute_state(eig, &self.adapter, regparam);
        let predictor = self.adapter.build_predictor(&state.coefficients);
        self.trained = Some(Trained { state, predictor });
    }

    /// Solution for `regparam` without touching the solver's trained state.
    pub fn state_for(&self, regparam: f64) -> Result<TrainedState, RankError> {
        let eig = self.cache.get().ok_or(RankError::NotTrained)?;
        Ok(compute_state(eig, &self.adapter, regparam))
    }

    /// Exact leave-`indices`-out predictions for the current solution.
    ///
    /// `indices` must be non-empty, unique and belong to one query. Returns a
    /// `k × l` matrix in the order of `indices`.
    pub fn holdout(&self, indices: &[usize]) -> Result<DMatrix<f64>, RankError> {
        let trained = self.trained.as_ref().ok_or(RankError::NotTrained)?;
        self.holdout_with(&trained.state, indices)
    }

    /// Hold-out predictions for an externally owned `state`.
    pub fn holdout_with(&self, state: &TrainedState, indices: &[usize]) -> Result<DMatrix<f64>, RankError> {
        let eig = self.cache.get().ok_or(RankError::NotTrained)?;
        eig.holdout(state, &self.labels, &self.groups, indices, self.inversion)
    }

    pub fn predict(&self, x: &DMatrix<f64>) -> Result<DMatrix<f64>, RankError> {
        let trained = self.trained.as_ref().ok_or(RankError::NotTrained)?;
        Ok(trained.predictor.predict(x)?)
    }

    pub fn predictor(&self) -> Option<&Predictor> {
        self.trained.as_ref().map(|t| &t.predictor)
    }

    pub fn regparam(&self) -> Option<f64> {
        self.trained.as_ref().map(|t| t.state.regparam)
    }

    /// Dual coefficients of the current solution.
    pub fn coefficients(&self) -> Option<&DMatrix<f64>> {
        self.trained.as_ref().map(|t| &t.state.coefficients)
    }

    pub fn labels(&self) -> &DMatrix<f64> {
        &self.labels
    }

    pub fn groups(&self) -> &QueryGroups {
        &self.groups
    }

    pub fn eigensystem(&self) -> Option<&Eigensystem> {
        self.cache.get()
    }

    pub fn adapter(&self) -> &SvdAdapter {
        &self.adapter
    }

    pub fn inversion(&self) -> InversionPolicy {
        self.inversion
    }
}

/// `A = V · diag(1/s) · (U · (neweigvals ⊙ multipleright))`
fn compute_state(eig: &Eigensystem, adapter: &SvdAdapter, regparam: f64) -> TrainedState {
    let neweigvals = eig.lr_evals.map(|v| 1.0 / (v + regparam));
    let scaled = scale_rows(&neweigvals, &eig.multipleright);
    let inv_svals = adapter.svals().map(|s| 1.0 / s);
    let inner = scale_rows(&inv_svals, &(&eig.lr_evecs * scaled));
    let coefficients = adapter.rsvecs() * inner;
    TrainedState {
        regparam,
        neweigvals,
        coefficients,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::KernelKind;
    use crate::measure::{ConcordanceIndex, Measure};
    use approx::assert_abs_diff_eq;

    fn toy_data() -> (DMatrix<f64>, DMatrix<f64>, Vec<&'static str>) {
        let x = DMatrix::from_row_slice(
            8,
            3,
            &[
                0.9, 0.1, 0.3, //
                0.2, 0.8, -0.1, //
                -0.5, 0.4, 0.7, //
                0.6, -0.6, 0.2, //
                1.1, 0.3, -0.4, //
                -0.2, -0.9, 0.5, //
                0.4, 0.4, 0.4, //
                -1.0, 0.2, 0.1,
            ],
        );
        let w = DVector::from_vec(vec![1.0, -0.5, 0.25]);
        let y = &x * w;
        let y = DMatrix::from_column_slice(8, 1, y.as_slice());
        let qids = vec!["a", "a", "a", "b", "b", "b", "b", "c"];
        (x, y, qids)
    }

    fn centered_ridge(x: &DMatrix<f64>, y: &DMatrix<f64>, qids: &[&str], lambda: f64) -> DMatrix<f64> {
        let groups = QueryIndex::new(qids).into_groups();
        let m = x.nrows();
        let mut l = DMatrix::identity(m, m);
        for members in groups.groups() {
            let n = members.len() as f64;
            for &i in members {
                for &j in members {
                    l[(i, j)] -= 1.0 / n;
                }
            }
        }
        let d = x.ncols();
        let lhs = x.transpose() * &l * x + DMatrix::identity(d, d) * lambda;
        lhs.try_inverse().unwrap() * x.transpose() * &l * y
    }

    #[test]
    fn linear_solution_matches_centered_ridge_regression() {
        let (x, y, qids) = toy_data();
        let config = RankConfig {
            regparam: 0.5,
            ..RankConfig::default()
        };
        let solver = QueryRankRls::new(&x, &y, &qids, &config, None).unwrap();

        let w = centered_ridge(&x, &y, &qids, 0.5);
        let expected = &x * w;
        assert_abs_diff_eq!(solver.predict(&x).unwrap(), expected, epsilon = 1e-9);
        assert_eq!(solver.regparam(), Some(0.5));
    }

    #[test]
    fn resolving_is_deterministic() {
        let (x, y, qids) = toy_data();
        let mut solver = QueryRankRls::new(&x, &y, &qids, &RankConfig::default(), None).unwrap();
        solver.solve(2.0);
        let first = solver.coefficients().unwrap().clone();
        let first_pred = solver.predict(&x).unwrap();

        solver.solve(0.01);
        solver.solve(2.0);
        assert_eq!(solver.coefficients().unwrap(), &first);
        assert_eq!(solver.predict(&x).unwrap(), first_pred);
    }

    #[test]
    fn state_for_matches_solve_without_mutation() {
        let (x, y, qids) = toy_data();
        let mut solver = QueryRankRls::new(&x, &y, &qids, &RankConfig::default(), None).unwrap();
        let state = solver.state_for(0.125).unwrap();
        assert_eq!(solver.regparam(), Some(1.0));

        solver.solve(0.125);
        assert_eq!(solver.coefficients().unwrap(), &state.coefficients);
    }

    #[test]
    fn weak_regularization_ranks_training_data_well() {
        let (x, y, qids) = toy_data();
        let config = RankConfig {
            regparam: 1e-6,
            kernel: KernelKind::Polynomial {
                gamma: 0.5,
                coef0: 1.0,
                degree: 2,
            },
            ..RankConfig::default()
        };
        let solver = QueryRankRls::new(&x, &y, &qids, &config, None).unwrap();
        let p = solver.predict(&x).unwrap();
        let groups = solver.groups().clone();
        for members in groups.groups().iter().filter(|g| g.len() > 1) {
            let yq = y.select_rows(members);
            let pq = p.select_rows(members);
            assert_abs_diff_eq!(ConcordanceIndex.score(&yq, &pq).unwrap(), 1.0);
        }
    }

    #[test]
    fn precomputed_kernel_matches_gaussian() {
        let (x, y, qids) = toy_data();
        let gaussian = KernelKind::Gaussian { gamma: 0.3 };
        let k = gaussian.evaluate(&x, &x).unwrap();

        let direct = QueryRankRls::new(
            &x,
            &y,
            &qids,
            &RankConfig { kernel: gaussian, ..RankConfig::default() },
            None,
        )
        .unwrap();
        let pre = QueryRankRls::new(
            &k,
            &y,
            &qids,
            &RankConfig { kernel: KernelKind::Precomputed, ..RankConfig::default() },
            None,
        )
        .unwrap();

        assert_abs_diff_eq!(
            direct.predict(&x).unwrap(),
            pre.predict(&k).unwrap(),
            epsilon = 1e-8
        );
    }

    #[test]
    fn mismatched_inputs_are_rejected() {
        let (x, y, qids) = toy_data();
        let short_y = y.rows(0, 5).into_owned();
        assert!(matches!(
            QueryRankRls::new(&x, &short_y, &qids, &RankConfig::default(), None),
            Err(RankError::LabelMismatch { samples: 8, labels: 5 })
        ));
        assert!(matches!(
            QueryRankRls::new(&x, &y, &qids[..3], &RankConfig::default(), None),
            Err(RankError::QueryMismatch { samples: 8, qids: 3 })
        ));
    }
}
