//! Shared configuration types.
//!
//! These are kept plain and serializable so they can be:
//!
//! - built from CLI flags
//! - embedded in the exported model JSON
//! - constructed directly by library users and tests

use std::path::PathBuf;

use clap::ValueEnum;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::kernel::KernelKind;
use crate::math::InversionPolicy;
use crate::measure::{ConcordanceIndex, Measure, SquaredError};

/// Default regularization parameter.
pub const DEFAULT_REGPARAM: f64 = 1.0;

/// Solver configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankConfig {
    /// Regularization parameter (`> 0`).
    pub regparam: f64,
    pub kernel: KernelKind,
    /// What the hold-out correction does with a singular matrix.
    pub inversion: InversionPolicy,
}

impl Default for RankConfig {
    fn default() -> Self {
        Self {
            regparam: DEFAULT_REGPARAM,
            kernel: KernelKind::default(),
            inversion: InversionPolicy::default(),
        }
    }
}

/// Kernel family selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum KernelName {
    Linear,
    Gaussian,
    Polynomial,
    Precomputed,
}

/// Flat kernel parameters as they arrive from the CLI.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KernelParams {
    pub bias: f64,
    pub gamma: f64,
    pub coef0: f64,
    pub degree: i32,
}

impl Default for KernelParams {
    fn default() -> Self {
        Self {
            bias: 0.0,
            gamma: 1.0,
            coef0: 0.0,
            degree: 2,
        }
    }
}

impl KernelName {
    pub fn with_params(self, params: KernelParams) -> KernelKind {
        match self {
            KernelName::Linear => KernelKind::Linear { bias: params.bias },
            KernelName::Gaussian => KernelKind::Gaussian { gamma: params.gamma },
            KernelName::Polynomial => KernelKind::Polynomial {
                gamma: params.gamma,
                coef0: params.coef0,
                degree: params.degree,
            },
            KernelName::Precomputed => KernelKind::Precomputed,
        }
    }
}

/// Performance measure selectable from the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MeasureName {
    /// Concordance index (higher is better).
    #[default]
    Cindex,
    /// Mean squared error (lower is better).
    Sqerror,
}

impl MeasureName {
    pub fn measure(self) -> Box<dyn Measure> {
        match self {
            MeasureName::Cindex => Box::new(ConcordanceIndex),
            MeasureName::Sqerror => Box::new(SquaredError),
        }
    }
}

/// Regularization grid: either `2^e` for `e` in `min_exp..max_exp`, or an
/// explicit list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridSpec {
    PowersOfTwo { min_exp: i32, max_exp: i32 },
    /// `steps` log-spaced values from `min` to `max` inclusive.
    LogSpaced { min: f64, max: f64, steps: usize },
    Values(Vec<f64>),
}

impl Default for GridSpec {
    fn default() -> Self {
        GridSpec::PowersOfTwo {
            min_exp: -15,
            max_exp: 15,
        }
    }
}

/// Leave-query-out cross-validation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvConfig {
    pub grid: GridSpec,
    pub measure: MeasureName,
    /// Evaluate grid points on the rayon pool.
    pub parallel: bool,
}

impl Default for CvConfig {
    fn default() -> Self {
        Self {
            grid: GridSpec::default(),
            measure: MeasureName::Cindex,
            parallel: true,
        }
    }
}

/// Everything a `fit` / `cv` run needs beyond the solver itself.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub data_path: PathBuf,
    pub rank: RankConfig,
    /// Draw this many training rows as Nyström basis vectors.
    pub basis_vectors: Option<usize>,
    pub basis_seed: u64,
    /// Only used by `cv`.
    pub cv: CvConfig,
    /// Print per-query hold-out scores after a `fit`.
    pub holdout_report: bool,
    pub export_model: Option<PathBuf>,
    pub export_predictions: Option<PathBuf>,
    pub export_cv: Option<PathBuf>,
}

/// Query-grouped training or scoring data.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryDataset {
    pub feature_names: Vec<String>,
    /// Empty when the data carries no labels (prediction input).
    pub label_names: Vec<String>,
    /// `m × d`
    pub x: DMatrix<f64>,
    /// `m × l`
    pub y: DMatrix<f64>,
    /// Raw query id per row.
    pub qids: Vec<String>,
}

impl QueryDataset {
    pub fn n_samples(&self) -> usize {
        self.x.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.x.ncols()
    }

    pub fn has_labels(&self) -> bool {
        !self.label_names.is_empty()
    }
}

/// Synthetic query-data generation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthConfig {
    pub queries: usize,
    pub min_per_query: usize,
    pub max_per_query: usize,
    pub features: usize,
    /// Standard deviation of label noise.
    pub noise: f64,
    /// Number of discrete relevance grades; `0` keeps real-valued labels.
    pub grades: usize,
    pub seed: u64,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            queries: 20,
            min_per_query: 5,
            max_per_query: 15,
            features: 5,
            noise: 0.1,
            grades: 0,
            seed: 42,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_name_maps_parameters() {
        let params = KernelParams {
            gamma: 0.5,
            ..KernelParams::default()
        };
        assert_eq!(
            KernelName::Gaussian.with_params(params),
            KernelKind::Gaussian { gamma: 0.5 }
        );
        assert_eq!(
            KernelName::Linear.with_params(params),
            KernelKind::Linear { bias: 0.0 }
        );
    }

    #[test]
    fn rank_config_round_trips_through_json() {
        let config = RankConfig {
            regparam: 0.25,
            kernel: KernelKind::Polynomial {
                gamma: 1.0,
                coef0: 1.0,
                degree: 3,
            },
            inversion: InversionPolicy::PseudoInverse { tolerance: 1e-9 },
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: RankConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
