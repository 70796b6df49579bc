//! Exact leave-query-out predictions.
//!
//! Removing a held-out block `H` from training changes `Gᵗ·L·G` by a rank-`k`
//! term. With `Q = G_H · (M + λI)⁻¹ · G_Hᵗ` and the held-out centering
//! operator `L_H`, the matrix-inversion lemma gives the retrained
//! predictions on `H` as
//!
//! ```text
//! F_H = (I − Q·L_H)⁻¹ · R,    R = G_H·w − Q·L_H·Y_H
//! ```
//!
//! where `w` is the full-data solution. `Q` factors as `S·Sᵗ` with
//! `S = G_H·U·diag(sqrt(neweigvals))` (`k × r`), so the inverse can be taken
//! either as `k × k` or, via the same lemma, as `r × r`; the smaller one is
//! used.

use std::collections::HashSet;

use nalgebra::{DMatrix, DVector};

use crate::error::{HoldoutError, RankError};
use crate::math::{InversionPolicy, invert};
use crate::query::QueryGroups;
use crate::rank::eigensystem::{Eigensystem, scale_rows};
use crate::rank::solver::TrainedState;

/// Check a hold-out request before any matrix work.
pub fn validate_holdout(indices: &[usize], groups: &QueryGroups) -> Result<(), HoldoutError> {
    let Some(&first) = indices.first() else {
        return Err(HoldoutError::Empty);
    };

    let mut seen = HashSet::with_capacity(indices.len());
    for &i in indices {
        if !seen.insert(i) {
            return Err(HoldoutError::DuplicateIndex(i));
        }
    }

    let len = groups.len();
    let query_of = |index: usize| {
        groups
            .query_of(index)
            .ok_or(HoldoutError::OutOfRange { index, len })
    };
    let expected = query_of(first)?;
    for &index in indices {
        let found = query_of(index)?;
        if found != expected {
            return Err(HoldoutError::MixedQueries {
                index,
                expected,
                found,
            });
        }
    }
    Ok(())
}

impl Eigensystem {
    /// Hold-out predictions (`k × l`) for `indices` under `state`.
    pub fn holdout(
        &self,
        state: &TrainedState,
        labels: &DMatrix<f64>,
        groups: &QueryGroups,
        indices: &[usize],
        policy: InversionPolicy,
    ) -> Result<DMatrix<f64>, RankError> {
        validate_holdout(indices, groups)?;

        let k = indices.len();
        let r = self.rank();

        let q_left = self.multipleleft.select_rows(indices);
        let sqrt_ne = state.neweigvals.map(f64::sqrt);
        let mut sqrt_q = q_left.clone();
        for (mut col, &s) in sqrt_q.column_iter_mut().zip(sqrt_ne.iter()) {
            col *= s;
        }
        let q_ho = &sqrt_q * sqrt_q.transpose();

        let d_ho = DVector::from_iterator(k, indices.iter().map(|&i| self.weights[i]));
        let p_ho = DVector::from_element(k, 1.0 / (k as f64).sqrt());
        let y_ho = labels.select_rows(indices);

        let ly_ho = center_block(&d_ho, &p_ho, &y_ho);
        let rqy = &q_left * scale_rows(&state.neweigvals, &self.multipleright) - &q_ho * ly_ho;
        let l_sqrt_q = center_block(&d_ho, &p_ho, &sqrt_q);

        if k <= r {
            let rqrt = &sqrt_q * l_sqrt_q.transpose();
            let inv = invert(&(DMatrix::identity(k, k) - rqrt), policy)?;
            Ok(inv * rqy)
        } else {
            let rqrt = l_sqrt_q.transpose() * &sqrt_q;
            let inv = invert(&(DMatrix::identity(r, r) - rqrt), policy)?;
            let correction = &sqrt_q * (inv * (l_sqrt_q.transpose() * &rqy));
            Ok(rqy + correction)
        }
    }
}

/// `D_H ⊙ X − p·(pᵗ·X)` for the held-out block.
fn center_block(d: &DVector<f64>, p: &DVector<f64>, x: &DMatrix<f64>) -> DMatrix<f64> {
    scale_rows(d, x) - p * (p.transpose() * x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RankConfig;
    use crate::kernel::KernelKind;
    use crate::query::QueryIndex;
    use crate::rank::QueryRankRls;
    use approx::assert_abs_diff_eq;

    /// Train from scratch on `train` rows (linear primal, centered ridge) and
    /// predict on `test` rows.
    fn retrain_linear(
        x: &DMatrix<f64>,
        y: &DMatrix<f64>,
        qids: &[usize],
        train: &[usize],
        test: &[usize],
        lambda: f64,
    ) -> DMatrix<f64> {
        let xr = x.select_rows(train);
        let yr = y.select_rows(train);
        let qr: Vec<usize> = train.iter().map(|&i| qids[i]).collect();
        let groups = QueryIndex::new(&qr).into_groups();
        let m = train.len();
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
        let lhs = xr.transpose() * &l * &xr + DMatrix::identity(d, d) * lambda;
        let w = lhs.try_inverse().unwrap() * xr.transpose() * &l * yr;
        x.select_rows(test) * w
    }

    /// Dual retraining for arbitrary kernels: `a = (L·K + λI)⁻¹·L·Y`.
    fn retrain_kernel(
        k: &DMatrix<f64>,
        y: &DMatrix<f64>,
        qids: &[usize],
        train: &[usize],
        test: &[usize],
        lambda: f64,
    ) -> DMatrix<f64> {
        let k_rr = k.select_rows(train).select_columns(train);
        let k_tr = k.select_rows(test).select_columns(train);
        let yr = y.select_rows(train);
        let qr: Vec<usize> = train.iter().map(|&i| qids[i]).collect();
        let groups = QueryIndex::new(&qr).into_groups();
        let m = train.len();
        let mut l = DMatrix::identity(m, m);
        for members in groups.groups() {
            let n = members.len() as f64;
            for &i in members {
                for &j in members {
                    l[(i, j)] -= 1.0 / n;
                }
            }
        }
        let a = (&l * &k_rr + DMatrix::identity(m, m) * lambda)
            .try_inverse()
            .unwrap()
            * &l
            * yr;
        k_tr * a
    }

    fn complement(m: usize, held: &[usize]) -> Vec<usize> {
        (0..m).filter(|i| !held.contains(i)).collect()
    }

    fn six_sample_data(features: usize) -> (DMatrix<f64>, DMatrix<f64>, Vec<usize>) {
        let values = [
            0.5, -1.2, 0.3, 0.9, //
            1.4, 0.2, -0.7, 0.1, //
            -0.3, 0.8, 1.1, -0.6, //
            0.7, 0.6, 0.2, 1.3, //
            -1.0, -0.4, 0.5, 0.4, //
            0.2, 1.5, -0.9, -0.2,
        ];
        let full = DMatrix::from_row_slice(6, 4, &values);
        let x = full.columns(0, features).into_owned();
        let y = DMatrix::from_column_slice(6, 1, &[2.0, 1.0, 0.0, 1.0, 3.0, 2.0]);
        (x, y, vec![0, 0, 0, 1, 1, 1])
    }

    #[test]
    fn holding_out_a_query_matches_retraining_when_rank_is_small() {
        // 2 features → rank 2 < 3 held-out samples: r × r branch.
        let (x, y, qids) = six_sample_data(2);
        let solver = QueryRankRls::new(&x, &y, &qids, &RankConfig::default(), None).unwrap();
        assert!(solver.eigensystem().unwrap().rank() < 3);

        for held in [[0, 1, 2], [3, 4, 5]] {
            let ho = solver.holdout(&held).unwrap();
            assert_eq!(ho.shape(), (3, 1));
            let expected = retrain_linear(&x, &y, &qids, &complement(6, &held), &held, 1.0);
            assert_abs_diff_eq!(ho, expected, epsilon = 1e-6);
        }
    }

    #[test]
    fn holding_out_a_query_matches_retraining_when_rank_is_large() {
        // 4 features → rank 4 ≥ 3 held-out samples: k × k branch.
        let (x, y, qids) = six_sample_data(4);
        let config = RankConfig {
            regparam: 0.3,
            ..RankConfig::default()
        };
        let solver = QueryRankRls::new(&x, &y, &qids, &config, None).unwrap();
        assert!(solver.eigensystem().unwrap().rank() >= 3);

        let held = [3, 4, 5];
        let ho = solver.holdout(&held).unwrap();
        let expected = retrain_linear(&x, &y, &qids, &[0, 1, 2], &held, 0.3);
        assert_abs_diff_eq!(ho, expected, epsilon = 1e-6);
    }

    #[test]
    fn pseudo_inverse_policy_agrees_with_strict_on_both_branches() {
        let pinv = InversionPolicy::PseudoInverse { tolerance: 1e-12 };
        for features in [2, 4] {
            let (x, y, qids) = six_sample_data(features);
            let config = RankConfig {
                regparam: 0.5,
                inversion: pinv,
                ..RankConfig::default()
            };
            let solver = QueryRankRls::new(&x, &y, &qids, &config, None).unwrap();
            assert_eq!(solver.inversion(), pinv);
            let eig = solver.eigensystem().unwrap();
            let state = solver.state_for(0.5).unwrap();

            let held = [0, 1, 2];
            let relaxed = eig
                .holdout(&state, solver.labels(), solver.groups(), &held, pinv)
                .unwrap();
            let strict = eig
                .holdout(&state, solver.labels(), solver.groups(), &held, InversionPolicy::Strict)
                .unwrap();
            assert_abs_diff_eq!(relaxed, strict, epsilon = 1e-10);
            assert_abs_diff_eq!(solver.holdout(&held).unwrap(), relaxed, epsilon = 1e-12);

            let expected = retrain_linear(&x, &y, &qids, &[3, 4, 5], &held, 0.5);
            assert_abs_diff_eq!(relaxed, expected, epsilon = 1e-6);
        }
    }

    #[test]
    fn gaussian_holdout_matches_dual_retraining() {
        let (x, y, _) = six_sample_data(4);
        let mut x = x.resize_vertically(9, 0.0);
        for (i, v) in [0.1, -0.4, 0.8].iter().enumerate() {
            x[(6 + i, 0)] = *v;
            x[(6 + i, 1)] = -*v;
        }
        let y = y.resize_vertically(9, 0.5);
        let qids = vec![0, 0, 0, 1, 1, 1, 2, 2, 2];
        let kernel = KernelKind::Gaussian { gamma: 0.4 };
        let config = RankConfig {
            regparam: 0.5,
            kernel,
            ..RankConfig::default()
        };
        let solver = QueryRankRls::new(&x, &y, &qids, &config, None).unwrap();
        let k = kernel.evaluate(&x, &x).unwrap();

        let held = [6, 7, 8];
        let ho = solver.holdout(&held).unwrap();
        let expected = retrain_kernel(&k, &y, &qids, &complement(9, &held), &held, 0.5);
        assert_abs_diff_eq!(ho, expected, epsilon = 1e-6);
    }

    #[test]
    fn holdout_of_query_subset_returns_one_row_per_index() {
        let (x, y, qids) = six_sample_data(3);
        let solver = QueryRankRls::new(&x, &y, &qids, &RankConfig::default(), None).unwrap();
        for held in [vec![4], vec![5, 3], vec![0, 2]] {
            let ho = solver.holdout(&held).unwrap();
            assert_eq!(ho.nrows(), held.len());
            assert!(ho.iter().all(|v| v.is_finite()));
        }
    }

    #[test]
    fn multi_label_holdout_keeps_label_columns() {
        let (x, y, qids) = six_sample_data(3);
        let mut y2 = y.clone().resize_horizontally(2, 0.0);
        y2.set_column(1, &(y.column(0) * -2.0));
        let solver = QueryRankRls::new(&x, &y2, &qids, &RankConfig::default(), None).unwrap();
        let ho = solver.holdout(&[0, 1, 2]).unwrap();
        assert_eq!(ho.shape(), (3, 2));
        assert_abs_diff_eq!(ho.column(1).into_owned(), ho.column(0) * -2.0, epsilon = 1e-9);
    }

    #[test]
    fn mixed_query_request_is_rejected() {
        let (x, y, qids) = six_sample_data(2);
        let solver = QueryRankRls::new(&x, &y, &qids, &RankConfig::default(), None).unwrap();
        let err = solver.holdout(&[0, 3]).unwrap_err();
        assert_eq!(
            err,
            RankError::Holdout(HoldoutError::MixedQueries {
                index: 3,
                expected: 0,
                found: 1
            })
        );
    }

    #[test]
    fn duplicate_index_fails_before_matrix_work() {
        let groups = QueryIndex::new(&[0, 0, 0]).into_groups();
        assert_eq!(
            validate_holdout(&[1, 2, 1], &groups),
            Err(HoldoutError::DuplicateIndex(1))
        );

        let (x, y, qids) = six_sample_data(2);
        let solver = QueryRankRls::new(&x, &y, &qids, &RankConfig::default(), None).unwrap();
        assert_eq!(
            solver.holdout(&[4, 4]).unwrap_err(),
            RankError::Holdout(HoldoutError::DuplicateIndex(4))
        );
    }

    #[test]
    fn empty_and_out_of_range_requests_are_rejected() {
        let groups = QueryIndex::new(&["a", "a", "b"]).into_groups();
        assert_eq!(validate_holdout(&[], &groups), Err(HoldoutError::Empty));
        assert_eq!(
            validate_holdout(&[0, 7], &groups),
            Err(HoldoutError::OutOfRange { index: 7, len: 3 })
        );
        assert_eq!(validate_holdout(&[2], &groups), Ok(()));
    }
}
