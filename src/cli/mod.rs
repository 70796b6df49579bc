//! Command-line parsing for the query-grouped RankRLS trainer.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the solver code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{DEFAULT_REGPARAM, KernelName, MeasureName};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "rankrls", version, about = "Query-grouped RankRLS learning to rank")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Train with a fixed regularization parameter.
    Fit(FitArgs),
    /// Select the regularization parameter by leave-query-out cross-validation.
    Cv(CvArgs),
    /// Score a CSV with a saved model.
    Predict(PredictArgs),
    /// Write a synthetic query-grouped CSV.
    Synth(SynthArgs),
}

/// Data and solver options shared by `fit` and `cv`.
#[derive(Debug, Args, Clone)]
pub struct TrainArgs {
    /// Training CSV (`qid`, `label*`, feature columns).
    #[arg(short = 'd', long, value_name = "CSV")]
    pub data: PathBuf,

    /// Kernel family. With `precomputed`, feature columns hold kernel values.
    #[arg(short = 'k', long, value_enum, default_value_t = KernelName::Linear)]
    pub kernel: KernelName,

    /// Bias term appended to the linear kernel.
    #[arg(long, default_value_t = 0.0)]
    pub bias: f64,

    /// Gaussian width / polynomial scale.
    #[arg(long, default_value_t = 1.0)]
    pub gamma: f64,

    /// Polynomial offset.
    #[arg(long, default_value_t = 0.0)]
    pub coef0: f64,

    /// Polynomial degree.
    #[arg(long, default_value_t = 2)]
    pub degree: i32,

    /// Use this many randomly drawn training rows as reduced-set basis vectors.
    #[arg(long, value_name = "N")]
    pub basis_vectors: Option<usize>,

    /// Seed for basis vector sampling.
    #[arg(long, default_value_t = 42)]
    pub basis_seed: u64,

    /// Fall back to a pseudo-inverse (with this singular value tolerance) when
    /// the hold-out correction is singular. Without it, singular matrices fail.
    #[arg(long, value_name = "TOL")]
    pub pinv: Option<f64>,
}

/// Options for `fit`.
#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    #[command(flatten)]
    pub train: TrainArgs,

    /// Regularization parameter (> 0).
    #[arg(short = 'l', long, default_value_t = DEFAULT_REGPARAM)]
    pub regparam: f64,

    /// Print per-query leave-query-out scores for the trained model.
    #[arg(long)]
    pub holdout_report: bool,

    /// Measure for the hold-out report.
    #[arg(long, value_enum, default_value_t = MeasureName::Cindex)]
    pub measure: MeasureName,

    /// Write the trained model as JSON.
    #[arg(long, value_name = "JSON")]
    pub export_model: Option<PathBuf>,

    /// Write in-sample predictions as CSV.
    #[arg(long, value_name = "CSV")]
    pub export_predictions: Option<PathBuf>,
}

/// Options for `cv`.
#[derive(Debug, Args, Clone)]
pub struct CvArgs {
    #[command(flatten)]
    pub train: TrainArgs,

    /// Performance measure to optimize.
    #[arg(long, value_enum, default_value_t = MeasureName::Cindex)]
    pub measure: MeasureName,

    /// Smallest exponent of the `2^e` grid.
    #[arg(long, default_value_t = -15, allow_hyphen_values = true)]
    pub grid_min_exp: i32,

    /// Exclusive upper exponent of the `2^e` grid.
    #[arg(long, default_value_t = 15, allow_hyphen_values = true)]
    pub grid_max_exp: i32,

    /// Explicit grid values (comma separated); overrides the exponent range.
    #[arg(long, value_delimiter = ',', num_args = 1..)]
    pub grid: Option<Vec<f64>>,

    /// Log-spaced grid between two bounds; overrides the exponent range.
    #[arg(long, num_args = 2, value_names = ["MIN", "MAX"], conflicts_with = "grid")]
    pub grid_span: Option<Vec<f64>>,

    /// Number of values in a `--grid-span` grid.
    #[arg(long, default_value_t = 30)]
    pub grid_steps: usize,

    /// Evaluate grid points one after another instead of on the thread pool.
    #[arg(long)]
    pub sequential: bool,

    /// Write the model trained at the selected regparam as JSON.
    #[arg(long, value_name = "JSON")]
    pub export_model: Option<PathBuf>,

    /// Write leave-query-out predictions at the selected regparam as CSV.
    #[arg(long, value_name = "CSV")]
    pub export_predictions: Option<PathBuf>,

    /// Write the per-grid-point performance table as CSV.
    #[arg(long, value_name = "CSV")]
    pub export_cv: Option<PathBuf>,
}

/// Options for `predict`.
#[derive(Debug, Args, Clone)]
pub struct PredictArgs {
    /// Model JSON written by `fit --export-model` or `cv --export-model`.
    #[arg(short = 'm', long, value_name = "JSON")]
    pub model: PathBuf,

    /// CSV to score (`qid` + the model's feature columns; labels optional).
    #[arg(short = 'd', long, value_name = "CSV")]
    pub data: PathBuf,

    /// Output predictions CSV.
    #[arg(short = 'o', long, value_name = "CSV")]
    pub output: PathBuf,
}

/// Options for `synth`.
#[derive(Debug, Args, Clone)]
pub struct SynthArgs {
    /// Output CSV.
    #[arg(short = 'o', long, value_name = "CSV")]
    pub output: PathBuf,

    #[arg(long, default_value_t = 20)]
    pub queries: usize,

    #[arg(long, default_value_t = 5)]
    pub min_per_query: usize,

    #[arg(long, default_value_t = 15)]
    pub max_per_query: usize,

    #[arg(long, default_value_t = 5)]
    pub features: usize,

    /// Label noise standard deviation.
    #[arg(long, default_value_t = 0.1)]
    pub noise: f64,

    /// Discretize labels into this many relevance grades (0 = real-valued).
    #[arg(long, default_value_t = 0)]
    pub grades: usize,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}
