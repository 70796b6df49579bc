//! The query-centered eigensystem shared by every solve and hold-out.
//!
//! With `G = V · diag(s)` (so that `K = G·Gᵗ`) and the centering operator
//! `L = D − P·Pᵗ`, the ranking objective in the kernel span is
//!
//! ```text
//! min_w  (Y − G·w)ᵗ · L · (Y − G·w) + λ · wᵗ·w
//! ```
//!
//! whose solution is `w = (Gᵗ·L·G + λI)⁻¹ · Gᵗ·L·Y`. Everything except `λ`
//! is fixed by the data, so one eigendecomposition of `M = Gᵗ·L·G` turns
//! every later solve into a diagonal rescaling.
//!
//! `P` (`m × Q`) has one non-zero per row, `1/sqrt(n_q)` at the sample's query
//! column. It is never materialized: products with `P` and `Pᵗ` are per-query
//! sums.

use nalgebra::{DMatrix, DVector};

use crate::kernel::KernelBasis;
use crate::math::symmetric_eigendecompose;
use crate::query::QueryGroups;

/// Regularization-independent factors of the ranking solution.
#[derive(Debug, Clone)]
pub struct Eigensystem {
    /// `D`: per-sample weights (all ones under the centering scheme).
    pub(crate) weights: DVector<f64>,
    /// Eigenvalues of `M` (descending, `≥ 0`).
    pub(crate) lr_evals: DVector<f64>,
    /// Eigenvectors of `M`, `r × r`.
    pub(crate) lr_evecs: DMatrix<f64>,
    /// `G · U`, `m × r`.
    pub(crate) multipleleft: DMatrix<f64>,
    /// `Uᵗ · Gᵗ · L · Y`, `r × l`.
    pub(crate) multipleright: DMatrix<f64>,
}

impl Eigensystem {
    pub fn build(basis: &KernelBasis, labels: &DMatrix<f64>, groups: &QueryGroups) -> Self {
        let m = groups.len();
        let counts = groups.group_sizes();

        let weights = DVector::from_element(m, 1.0);
        let pvals = DVector::from_iterator(
            m,
            groups
                .dense()
                .iter()
                .map(|&q| 1.0 / (counts[q] as f64).sqrt()),
        );

        let mut ssvecs = basis.rsvecs.clone();
        for (mut col, &s) in ssvecs.column_iter_mut().zip(basis.svals.iter()) {
            col *= s;
        }

        // M = Gᵗ·(D ⊙ G) − (Pᵗ·G)ᵗ·(Pᵗ·G)
        let pt_g = membership_t_mul(&pvals, groups, &ssvecs);
        let m_mat = ssvecs.transpose() * scale_rows(&weights, &ssvecs) - pt_g.transpose() * &pt_g;

        let pairs = symmetric_eigendecompose(&m_mat);
        let lr_svals = pairs.values.map(f64::sqrt);
        let lr_evals = lr_svals.component_mul(&lr_svals);
        let lr_evecs = pairs.vectors;

        let ly = center(&weights, &pvals, groups, labels);
        let multipleright = lr_evecs.transpose() * (ssvecs.transpose() * ly);
        let multipleleft = &ssvecs * &lr_evecs;

        log::info!(
            "built ranking eigensystem: {} samples, {} queries, rank {}, {} labels",
            m,
            groups.query_count(),
            basis.rank(),
            labels.ncols()
        );

        Self {
            weights,
            lr_evals,
            lr_evecs,
            multipleleft,
            multipleright,
        }
    }

    /// Kernel rank `r`.
    pub fn rank(&self) -> usize {
        self.lr_evals.len()
    }

    pub fn weights(&self) -> &DVector<f64> {
        &self.weights
    }
}

/// `L · X = D ⊙ X − P·(Pᵗ·X)`: subtract the within-query mean from every row.
pub(crate) fn center(
    weights: &DVector<f64>,
    pvals: &DVector<f64>,
    groups: &QueryGroups,
    x: &DMatrix<f64>,
) -> DMatrix<f64> {
    let pt_x = membership_t_mul(pvals, groups, x);
    scale_rows(weights, x) - membership_mul(pvals, groups, &pt_x)
}

/// `Pᵗ · X` (`Q × c`).
fn membership_t_mul(pvals: &DVector<f64>, groups: &QueryGroups, x: &DMatrix<f64>) -> DMatrix<f64> {
    let mut out = DMatrix::zeros(groups.query_count(), x.ncols());
    for (q, members) in groups.groups().iter().enumerate() {
        for &i in members {
            for c in 0..x.ncols() {
                out[(q, c)] += pvals[i] * x[(i, c)];
            }
        }
    }
    out
}

/// `P · Z` for `Z` of shape `Q × c` (`m × c`).
fn membership_mul(pvals: &DVector<f64>, groups: &QueryGroups, z: &DMatrix<f64>) -> DMatrix<f64> {
    DMatrix::from_fn(groups.len(), z.ncols(), |i, c| {
        let q = groups.dense()[i];
        pvals[i] * z[(q, c)]
    })
}

/// `diag(d) · X`.
pub(crate) fn scale_rows(d: &DVector<f64>, x: &DMatrix<f64>) -> DMatrix<f64> {
    let mut out = x.clone();
    for (mut row, &w) in out.row_iter_mut().zip(d.iter()) {
        row *= w;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::{KernelKind, SvdAdapter};
    use crate::query::QueryIndex;
    use approx::assert_abs_diff_eq;

    fn centering_matrix(groups: &QueryGroups) -> DMatrix<f64> {
        let m = groups.len();
        let mut l = DMatrix::identity(m, m);
        for members in groups.groups() {
            let n = members.len() as f64;
            for &i in members {
                for &j in members {
                    l[(i, j)] -= 1.0 / n;
                }
            }
        }
        l
    }

    #[test]
    fn centering_subtracts_query_means() {
        let groups = QueryIndex::new(&[0, 0, 1, 1, 1]).into_groups();
        let y = DMatrix::from_column_slice(5, 1, &[1.0, 3.0, 2.0, 4.0, 9.0]);
        let weights = DVector::from_element(5, 1.0);
        let pvals = DVector::from_vec(vec![
            1.0 / 2f64.sqrt(),
            1.0 / 2f64.sqrt(),
            1.0 / 3f64.sqrt(),
            1.0 / 3f64.sqrt(),
            1.0 / 3f64.sqrt(),
        ]);
        let ly = center(&weights, &pvals, &groups, &y);
        let expected = DMatrix::from_column_slice(5, 1, &[-1.0, 1.0, -3.0, -1.0, 4.0]);
        assert_abs_diff_eq!(ly, expected, epsilon = 1e-12);
        assert_abs_diff_eq!(centering_matrix(&groups) * &y, expected, epsilon = 1e-12);
    }

    #[test]
    fn eigensystem_diagonalizes_centered_kernel() {
        let x = DMatrix::from_row_slice(
            6,
            3,
            &[
                0.2, 1.0, -0.5, //
                1.3, -0.4, 0.1, //
                -0.8, 0.6, 0.9, //
                0.5, 0.5, 0.5, //
                -1.1, -0.2, 0.3, //
                0.7, 0.9, -1.2,
            ],
        );
        let y = DMatrix::from_column_slice(6, 1, &[1.0, 2.0, 0.0, 3.0, 1.0, 2.0]);
        let groups = QueryIndex::new(&["a", "a", "a", "b", "b", "b"]).into_groups();
        let adapter = SvdAdapter::construct(&x, KernelKind::Linear { bias: 0.0 }, None).unwrap();
        let eig = Eigensystem::build(adapter.basis(), &y, &groups);

        let basis = adapter.basis();
        let g = &basis.rsvecs * DMatrix::from_diagonal(&basis.svals);
        let l = centering_matrix(&groups);
        let m = g.transpose() * &l * &g;
        let rebuilt = &eig.lr_evecs * DMatrix::from_diagonal(&eig.lr_evals) * eig.lr_evecs.transpose();
        assert_abs_diff_eq!(rebuilt, m, epsilon = 1e-10);

        assert_eq!(eig.multipleleft.shape(), (6, eig.rank()));
        assert_eq!(eig.multipleright.shape(), (eig.rank(), 1));
        assert!(eig.lr_evals.iter().all(|&v| v >= 0.0));
        assert!(eig.weights().iter().all(|&w| w == 1.0));
    }
}
