//! Shared training pipeline used by the `fit`, `cv` and `predict` commands.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! CSV load -> validation -> (basis sampling) -> solve / grid search -> model file
//!
//! The command handlers can then focus on presentation and exports.

use nalgebra::DMatrix;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::domain::{MeasureName, QueryDataset, RunConfig};
use crate::error::{AppError, RankError};
use crate::fit::{CvOutcome, GridPoint, LeaveQueryOutCv, LeaveQueryOutRankRls};
use crate::io::{CvSummary, LabelColumns, ModelFile, align_features, load_query_csv};
use crate::kernel::KernelKind;
use crate::math::InversionPolicy;
use crate::measure::{GroupScore, aggregate};
use crate::query::{QueryGroups, QueryIndex};
use crate::rank::QueryRankRls;

/// Everything a trained run produced.
#[derive(Debug, Clone)]
pub struct TrainedRun {
    pub data: QueryDataset,
    pub queries: QueryIndex<String>,
    pub solver: QueryRankRls,
    /// Present when the regparam was selected by cross-validation.
    pub outcome: Option<CvOutcome>,
}

impl TrainedRun {
    /// Model file for the solver's current solution.
    pub fn model_file(&self, config: &RunConfig) -> Result<ModelFile, AppError> {
        let predictor = self.solver.predictor().ok_or(RankError::NotTrained)?.clone();
        let regparam = self.solver.regparam().ok_or(RankError::NotTrained)?;
        let rank = crate::domain::RankConfig {
            regparam,
            ..config.rank
        };
        let model = ModelFile::new(
            rank,
            predictor,
            self.data.feature_names.clone(),
            self.data.label_names.clone(),
            self.queries.query_count(),
            self.data.n_samples(),
        );
        Ok(match &self.outcome {
            Some(outcome) => model.with_cv(CvSummary {
                measure: config.cv.measure,
                grid: outcome.grid(),
                performances: outcome.performances(),
                best_performance: outcome.best_performance(),
            }),
            None => model,
        })
    }
}

/// Train at `config.rank.regparam`.
pub fn train(config: &RunConfig) -> Result<TrainedRun, AppError> {
    validate_run_config(config)?;
    let (data, queries) = load_training_data(config)?;
    let basis = basis_for(config, &data)?;

    let solver = QueryRankRls::with_groups(
        &data.x,
        &data.y,
        queries.groups().clone(),
        &config.rank,
        basis.as_ref(),
    )?;

    Ok(TrainedRun {
        data,
        queries,
        solver,
        outcome: None,
    })
}

/// Select the regparam by leave-query-out CV and train at it.
pub fn cross_validate(config: &RunConfig) -> Result<TrainedRun, AppError> {
    validate_run_config(config)?;
    let (data, queries) = load_training_data(config)?;
    let basis = basis_for(config, &data)?;

    let learner = LeaveQueryOutRankRls::fit(
        &data.x,
        &data.y,
        &data.qids,
        &config.rank,
        &config.cv,
        basis.as_ref(),
    )?;
    let (solver, outcome) = learner.into_parts();

    Ok(TrainedRun {
        data,
        queries,
        solver,
        outcome: Some(outcome),
    })
}

/// Per-query hold-out scores for the solver's current regparam.
pub fn holdout_scores(run: &TrainedRun, measure: MeasureName) -> Result<GridPoint, AppError> {
    let regparam = run.solver.regparam().ok_or(RankError::NotTrained)?;
    let measure = measure.measure();
    Ok(LeaveQueryOutCv::new(measure.as_ref(), false).evaluate(&run.solver, regparam))
}

/// Scatter per-query predictions back into sample order (`m × l`).
pub fn stack_query_predictions(groups: &QueryGroups, per_query: &[DMatrix<f64>], n_labels: usize) -> DMatrix<f64> {
    let mut out = DMatrix::zeros(groups.len(), n_labels);
    for (members, p) in groups.groups().iter().zip(per_query) {
        for (row, &i) in members.iter().enumerate() {
            out.set_row(i, &p.row(row));
        }
    }
    out
}

/// Load a scoring CSV and apply `model` to it.
pub fn predict_with_model(model: &ModelFile, data: &QueryDataset) -> Result<DMatrix<f64>, AppError> {
    let x = align_features(data, &model.feature_names)?;
    let p = model.predictor.predict(&x).map_err(RankError::from)?;
    Ok(p)
}

/// Mean per-query score of `predictions` against the dataset's labels.
pub fn score_predictions(
    data: &QueryDataset,
    predictions: &DMatrix<f64>,
    measure: MeasureName,
) -> Result<f64, AppError> {
    if data.y.ncols() != predictions.ncols() {
        return Err(AppError::new(
            2,
            format!(
                "Data has {} label column(s) but the model predicts {}.",
                data.y.ncols(),
                predictions.ncols()
            ),
        ));
    }
    let measure = measure.measure();
    let index = QueryIndex::new(&data.qids);
    let scores: Vec<GroupScore> = index
        .groups()
        .groups()
        .iter()
        .map(|members| {
            GroupScore::evaluate(
                measure.as_ref(),
                &data.y.select_rows(members),
                &predictions.select_rows(members),
            )
        })
        .collect();
    Ok(aggregate(&scores).map_err(RankError::from)?)
}

/// Draw `count` distinct training rows (sorted) as reduced-set basis vectors.
pub fn sample_basis_vectors(x: &DMatrix<f64>, count: usize, seed: u64) -> Result<DMatrix<f64>, AppError> {
    if count == 0 || count > x.nrows() {
        return Err(AppError::new(
            2,
            format!("Basis vector count must be in 1..={}, got {count}.", x.nrows()),
        ));
    }
    let mut rng = StdRng::seed_from_u64(seed);
    let mut rows = rand::seq::index::sample(&mut rng, x.nrows(), count).into_vec();
    rows.sort_unstable();
    Ok(x.select_rows(&rows))
}

fn load_training_data(config: &RunConfig) -> Result<(QueryDataset, QueryIndex<String>), AppError> {
    let data = load_query_csv(&config.data_path, LabelColumns::Required)?;
    if let KernelKind::Precomputed = config.rank.kernel {
        if data.n_features() != data.n_samples() {
            return Err(AppError::new(
                2,
                format!(
                    "Precomputed kernel needs one column per training row ({} rows, {} columns).",
                    data.n_samples(),
                    data.n_features()
                ),
            ));
        }
    }
    let queries = QueryIndex::new(&data.qids);
    log::info!(
        "{} queries, largest has {} samples",
        queries.query_count(),
        queries.groups().group_sizes().into_iter().max().unwrap_or(0)
    );
    Ok((data, queries))
}

fn basis_for(config: &RunConfig, data: &QueryDataset) -> Result<Option<DMatrix<f64>>, AppError> {
    match config.basis_vectors {
        Some(count) => sample_basis_vectors(&data.x, count, config.basis_seed).map(Some),
        None => Ok(None),
    }
}

fn validate_run_config(config: &RunConfig) -> Result<(), AppError> {
    let regparam = config.rank.regparam;
    if !(regparam.is_finite() && regparam > 0.0) {
        return Err(AppError::new(2, format!("Regularization parameter must be finite and > 0, got {regparam}.")));
    }

    let params_ok = match config.rank.kernel {
        KernelKind::Linear { bias } => bias.is_finite() && bias >= 0.0,
        KernelKind::Gaussian { gamma } => gamma.is_finite() && gamma > 0.0,
        KernelKind::Polynomial { gamma, coef0, degree } => gamma.is_finite() && coef0.is_finite() && degree >= 1,
        KernelKind::Precomputed => true,
    };
    if !params_ok {
        return Err(AppError::new(2, format!("Invalid kernel parameters: {:?}", config.rank.kernel)));
    }

    if let InversionPolicy::PseudoInverse { tolerance } = config.rank.inversion {
        if !(tolerance.is_finite() && tolerance >= 0.0) {
            return Err(AppError::new(2, "Pseudo-inverse tolerance must be finite and >= 0."));
        }
    }

    if config.basis_vectors.is_some() && matches!(config.rank.kernel, KernelKind::Precomputed) {
        return Err(AppError::new(
            2,
            "Basis vectors cannot be sampled from a precomputed kernel matrix.",
        ));
    }
    Ok(())
}
