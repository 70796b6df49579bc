//! Symmetric eigendecompositions of kernel-like matrices.
//!
//! Two flavours are needed:
//!
//! - `symmetric_eigendecompose` keeps every eigenpair. The eigensystem cache
//!   uses it, because the hold-out correction relies on the full inverse
//!   `(M + λI)⁻¹`; dropping null-space directions would change that inverse.
//! - `decompose_kernel_matrix` drops numerically-zero eigenvalues and returns
//!   singular values (square roots). The kernel adapter uses it to find the
//!   rank of the training kernel matrix.
//!
//! Eigenpairs are returned in descending eigenvalue order; ties keep the
//! order nalgebra produced them in.

use nalgebra::{DMatrix, DVector, SymmetricEigen};

/// Eigenvalues (descending, clamped at zero) and matching eigenvectors as columns.
#[derive(Debug, Clone)]
pub struct Eigenpairs {
    pub values: DVector<f64>,
    pub vectors: DMatrix<f64>,
}

/// Full symmetric eigendecomposition with negative round-off clamped to `0`.
///
/// The input must be symmetric positive semi-definite; slightly negative
/// eigenvalues from floating point error are treated as zero.
pub fn symmetric_eigendecompose(m: &DMatrix<f64>) -> Eigenpairs {
    let n = m.nrows();
    if n == 0 {
        return Eigenpairs {
            values: DVector::zeros(0),
            vectors: DMatrix::zeros(0, 0),
        };
    }

    // Symmetrize first: products like `Gᵗ L G` are symmetric only up to rounding.
    let sym = (m + m.transpose()) * 0.5;
    let eig = SymmetricEigen::new(sym);
    let order = descending_order(&eig.eigenvalues);

    let mut values = DVector::zeros(n);
    let mut vectors = DMatrix::zeros(n, n);
    for (dst, &src) in order.iter().enumerate() {
        values[dst] = eig.eigenvalues[src].max(0.0);
        vectors.set_column(dst, &eig.eigenvectors.column(src));
    }

    Eigenpairs { values, vectors }
}

/// Rank-revealing decomposition `K = V · diag(s²) · Vᵗ`.
///
/// Returns `(s, V)` where `s` holds the square roots of the eigenvalues above
/// `n · ε · λ_max`, in descending order, and `V` the matching `n × r`
/// eigenvectors. An all-zero matrix yields `r = 0`.
pub fn decompose_kernel_matrix(k: &DMatrix<f64>) -> (DVector<f64>, DMatrix<f64>) {
    let pairs = symmetric_eigendecompose(k);
    let n = pairs.values.len();
    let max_eval = pairs.values.iter().copied().fold(0.0_f64, f64::max);
    let tol = n as f64 * f64::EPSILON * max_eval;

    let keep: Vec<usize> = (0..n)
        .filter(|&i| max_eval > 0.0 && pairs.values[i] > tol)
        .collect();

    let svals = DVector::from_iterator(keep.len(), keep.iter().map(|&i| pairs.values[i].sqrt()));
    let mut vecs = DMatrix::zeros(n, keep.len());
    for (dst, &src) in keep.iter().enumerate() {
        vecs.set_column(dst, &pairs.vectors.column(src));
    }
    (svals, vecs)
}

fn descending_order(values: &DVector<f64>) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| {
        values[b]
            .partial_cmp(&values[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    order
}
