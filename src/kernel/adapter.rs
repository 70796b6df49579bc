//! Kernel basis construction ("SVD adapter").
//!
//! The solver never touches raw kernel matrices. It only needs a factorization
//!
//! ```text
//! K ≈ V · diag(s²) · Vᵗ        (V: m × r, s: r)
//! ```
//!
//! of the training kernel, and a way to turn dual coefficients over the
//! training rows back into a predictor. Three construction paths exist:
//!
//! - linear kernel: thin SVD of the data matrix (`O(m·d²)`, no kernel matrix)
//! - any kernel: eigendecomposition of the full `m × m` kernel matrix
//! - basis vectors: Nyström reduced set `K ≈ K_r · K_bb⁻¹ · K_rᵗ`, factored
//!   through the Cholesky factor of `K_bb`

use nalgebra::{Cholesky, DMatrix, DVector};

use crate::error::KernelError;
use crate::kernel::KernelKind;
use crate::math::decompose_kernel_matrix;
use crate::predictor::{KernelPredictor, LinearPredictor, Predictor};

/// Jitter levels tried (relative to the mean diagonal) when `K_bb` is not
/// numerically positive definite.
const BASIS_JITTER: [f64; 4] = [0.0, 1e-10, 1e-8, 1e-6];

/// Singular values and right singular vectors of the training kernel.
#[derive(Debug, Clone)]
pub struct KernelBasis {
    pub svals: DVector<f64>,
    pub rsvecs: DMatrix<f64>,
}

impl KernelBasis {
    pub fn rank(&self) -> usize {
        self.svals.len()
    }

    pub fn samples(&self) -> usize {
        self.rsvecs.nrows()
    }
}

#[derive(Debug, Clone)]
enum Representation {
    /// Linear kernel, no basis vectors: keep the (bias-augmented) data so the
    /// dual solution can be folded into a weight vector.
    Primal { data: DMatrix<f64>, bias: f64 },
    /// Dual predictor over all training rows.
    Dual { rows: DMatrix<f64> },
    /// Nyström reduced set over the basis vectors.
    Reduced {
        rows: DMatrix<f64>,
        /// Inverse of the lower Cholesky factor of `K_bb`.
        chol_inv: DMatrix<f64>,
        /// Right singular vectors of `K_r · L⁻ᵗ` (b × r).
        vecs: DMatrix<f64>,
    },
}

/// Owns the kernel configuration and training rows needed to rebuild a
/// predictor from dual coefficients.
#[derive(Debug, Clone)]
pub struct SvdAdapter {
    kernel: KernelKind,
    basis: KernelBasis,
    repr: Representation,
}

impl SvdAdapter {
    /// Factor the training kernel for `x` (or its reduced-set approximation).
    pub fn construct(
        x: &DMatrix<f64>,
        kernel: KernelKind,
        basis_vectors: Option<&DMatrix<f64>>,
    ) -> Result<Self, KernelError> {
        if x.nrows() == 0 {
            return Err(KernelError::EmptyData);
        }

        let (basis, repr) = match (kernel, basis_vectors) {
            (KernelKind::Linear { bias }, None) => {
                let data = augment_with_bias(x, bias);
                let basis = thin_svd_basis(&data)?.0;
                (basis, Representation::Primal { data, bias })
            }
            (_, None) => {
                if let KernelKind::Precomputed = kernel {
                    if x.nrows() != x.ncols() {
                        return Err(KernelError::NonSquarePrecomputed {
                            rows: x.nrows(),
                            cols: x.ncols(),
                        });
                    }
                }
                let rows = training_rows(kernel, x);
                let k = kernel.evaluate(x, &rows)?;
                let (svals, rsvecs) = decompose_kernel_matrix(&k);
                if svals.is_empty() {
                    return Err(KernelError::ZeroRank);
                }
                (KernelBasis { svals, rsvecs }, Representation::Dual { rows })
            }
            (_, Some(bv)) => {
                if bv.nrows() == 0 {
                    return Err(KernelError::EmptyData);
                }
                if let KernelKind::Precomputed = kernel {
                    if bv.nrows() != bv.ncols() {
                        return Err(KernelError::NonSquarePrecomputed {
                            rows: bv.nrows(),
                            cols: bv.ncols(),
                        });
                    }
                }
                let rows = training_rows(kernel, bv);
                let k_r = kernel.evaluate(x, &rows)?;
                let k_bb = kernel.evaluate(bv, &rows)?;
                let l = lower_cholesky_with_jitter(&k_bb)?;
                let chol_inv = l
                    .solve_lower_triangular(&DMatrix::identity(l.nrows(), l.ncols()))
                    .ok_or(KernelError::BasisNotPositiveDefinite {
                        jitter: BASIS_JITTER[BASIS_JITTER.len() - 1],
                    })?;
                let (basis, vecs) = thin_svd_basis(&(k_r * chol_inv.transpose()))?;
                (
                    basis,
                    Representation::Reduced {
                        rows,
                        chol_inv,
                        vecs,
                    },
                )
            }
        };

        log::debug!(
            "{} kernel basis: {} samples, rank {}",
            kernel.display_name(),
            basis.samples(),
            basis.rank()
        );

        Ok(Self {
            kernel,
            basis,
            repr,
        })
    }

    pub fn kernel(&self) -> KernelKind {
        self.kernel
    }

    pub fn basis(&self) -> &KernelBasis {
        &self.basis
    }

    pub fn svals(&self) -> &DVector<f64> {
        &self.basis.svals
    }

    pub fn rsvecs(&self) -> &DMatrix<f64> {
        &self.basis.rsvecs
    }

    /// Wrap dual coefficients `a` (`m × l`) into a predictor.
    pub fn build_predictor(&self, a: &DMatrix<f64>) -> Predictor {
        match &self.repr {
            Representation::Primal { data, bias } => {
                let w_aug = data.transpose() * a;
                let n_features = if *bias != 0.0 { data.ncols() - 1 } else { data.ncols() };
                let weights = w_aug.rows(0, n_features).into_owned();
                let intercept = if *bias != 0.0 {
                    w_aug.row(n_features).transpose() * bias.sqrt()
                } else {
                    DVector::zeros(a.ncols())
                };
                Predictor::Linear(LinearPredictor::new(weights, intercept))
            }
            Representation::Dual { rows } => {
                Predictor::Kernel(KernelPredictor::new(self.kernel, rows.clone(), a.clone()))
            }
            Representation::Reduced {
                rows,
                chol_inv,
                vecs,
            } => {
                // A_red = Zᵗ · (U · (s ⊙ (Vᵗ · A)))
                let mut projected = self.basis.rsvecs.transpose() * a;
                for (mut row, &s) in projected.row_iter_mut().zip(self.basis.svals.iter()) {
                    row *= s;
                }
                let reduced = chol_inv.transpose() * (vecs * projected);
                Predictor::Kernel(KernelPredictor::new(self.kernel, rows.clone(), reduced))
            }
        }
    }
}

/// Rows a kernel predictor is evaluated against. Precomputed kernels only need
/// the row count, so they keep an empty-width placeholder.
fn training_rows(kernel: KernelKind, x: &DMatrix<f64>) -> DMatrix<f64> {
    match kernel {
        KernelKind::Precomputed => DMatrix::zeros(x.nrows(), 0),
        _ => x.clone(),
    }
}

fn augment_with_bias(x: &DMatrix<f64>, bias: f64) -> DMatrix<f64> {
    if bias == 0.0 {
        return x.clone();
    }
    let d = x.ncols();
    let mut out = x.clone().resize_horizontally(d + 1, 0.0);
    out.column_mut(d).fill(bias.sqrt());
    out
}

/// Thin SVD `a = U · diag(s) · Vᵗ`, truncated to numerically non-zero `s`.
///
/// Returns the basis `(s, U)` and the matching right vectors `V`.
fn thin_svd_basis(a: &DMatrix<f64>) -> Result<(KernelBasis, DMatrix<f64>), KernelError> {
    let svd = a.clone().svd(true, true);
    let (Some(u), Some(v_t)) = (svd.u, svd.v_t) else {
        return Err(KernelError::ZeroRank);
    };

    let s_max = svd.singular_values.iter().copied().fold(0.0_f64, f64::max);
    let tol = a.nrows().max(a.ncols()) as f64 * f64::EPSILON * s_max;
    let mut keep: Vec<usize> = (0..svd.singular_values.len())
        .filter(|&i| s_max > 0.0 && svd.singular_values[i] > tol)
        .collect();
    if keep.is_empty() {
        return Err(KernelError::ZeroRank);
    }
    keep.sort_by(|&x, &y| {
        svd.singular_values[y]
            .partial_cmp(&svd.singular_values[x])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let svals = DVector::from_iterator(keep.len(), keep.iter().map(|&i| svd.singular_values[i]));
    let rsvecs = u.select_columns(&keep);
    let v = v_t.transpose().select_columns(&keep);
    Ok((KernelBasis { svals, rsvecs }, v))
}

fn lower_cholesky_with_jitter(k: &DMatrix<f64>) -> Result<DMatrix<f64>, KernelError> {
    let n = k.nrows();
    let scale = if n == 0 { 1.0 } else { (k.trace() / n as f64).abs().max(f64::MIN_POSITIVE) };
    for &rel in &BASIS_JITTER {
        let jitter = rel * scale;
        let shifted = k + DMatrix::<f64>::identity(n, n) * jitter;
        if let Some(chol) = Cholesky::new(shifted) {
            if rel > 0.0 {
                log::warn!("basis kernel matrix needed jitter {jitter:e} to factor");
            }
            return Ok(chol.l());
        }
    }
    Err(KernelError::BasisNotPositiveDefinite {
        jitter: BASIS_JITTER[BASIS_JITTER.len() - 1] * scale,
    })
}
