//! Error types.
//!
//! The numerical core reports structured errors (`RankError` and friends) so
//! callers can tell a bad hold-out request from a degenerate measure. The
//! binary collapses everything into `AppError`, which carries the process exit
//! code:
//!
//! - `2`: invalid input or configuration
//! - `3`: insufficient data
//! - `4`: numerical or internal failure

use thiserror::Error;

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

/// Which constraint a hold-out request violated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HoldoutError {
    #[error("Hold-out predictions can not be computed for an empty hold-out set.")]
    Empty,

    #[error("Hold-out can have each index only once (index {0} repeated).")]
    DuplicateIndex(usize),

    #[error("Hold-out index {index} is out of range for {len} training samples.")]
    OutOfRange { index: usize, len: usize },

    #[error("All examples in the hold-out set must have the same qid (index {index} has query {found}, expected {expected}).")]
    MixedQueries {
        index: usize,
        expected: usize,
        found: usize,
    },
}

/// A performance measure could not score its input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Undefined performance: {0}")]
pub struct UndefinedPerformance(pub String);

impl UndefinedPerformance {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// Failures while building the kernel basis or evaluating kernels.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum KernelError {
    #[error("Kernel input has no rows.")]
    EmptyData,

    #[error("Feature count mismatch: expected {expected} columns, got {found}.")]
    FeatureMismatch { expected: usize, found: usize },

    #[error("Precomputed kernel must be square, got {rows}x{cols}.")]
    NonSquarePrecomputed { rows: usize, cols: usize },

    #[error("Kernel matrix has numerical rank zero; nothing to learn from.")]
    ZeroRank,

    #[error("Basis kernel matrix is not positive definite even after adding jitter {jitter:e}.")]
    BasisNotPositiveDefinite { jitter: f64 },
}

/// Errors raised by the ranking solver and its cross-validation driver.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RankError {
    #[error(transparent)]
    Holdout(#[from] HoldoutError),

    #[error(transparent)]
    Kernel(#[from] KernelError),

    #[error(transparent)]
    UndefinedPerformance(#[from] UndefinedPerformance),

    #[error("Matrix of size {size}x{size} is singular and cannot be inverted.")]
    Singular { size: usize },

    #[error("Label matrix has {labels} rows but data has {samples} samples.")]
    LabelMismatch { samples: usize, labels: usize },

    #[error("Query id list has {qids} entries but data has {samples} samples.")]
    QueryMismatch { samples: usize, qids: usize },

    #[error("Invalid regularization grid: {0}")]
    InvalidGrid(String),

    #[error("Solver has not been trained yet.")]
    NotTrained,
}

impl RankError {
    /// Exit code used when this error reaches the binary.
    pub fn exit_code(&self) -> u8 {
        match self {
            RankError::Holdout(_)
            | RankError::LabelMismatch { .. }
            | RankError::QueryMismatch { .. }
            | RankError::InvalidGrid(_) => 2,
            RankError::Kernel(KernelError::EmptyData) => 3,
            RankError::Kernel(KernelError::FeatureMismatch { .. })
            | RankError::Kernel(KernelError::NonSquarePrecomputed { .. }) => 2,
            RankError::UndefinedPerformance(_) => 3,
            RankError::Kernel(_) | RankError::Singular { .. } | RankError::NotTrained => 4,
        }
    }
}

impl From<RankError> for AppError {
    fn from(err: RankError) -> Self {
        AppError::new(err.exit_code(), err.to_string())
    }
}
