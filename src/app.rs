//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and initializes logging
//! - parses CLI arguments
//! - runs training / cross-validation / scoring
//! - prints reports
//! - writes optional exports

use clap::Parser;

use crate::cli::{Command, CvArgs, FitArgs, PredictArgs, SynthArgs, TrainArgs};
use crate::domain::{CvConfig, GridSpec, KernelParams, RankConfig, RunConfig, SynthConfig};
use crate::error::AppError;
use crate::math::InversionPolicy;

pub mod pipeline;

/// Entry point for the `rankrls` binary.
pub fn run() -> Result<(), AppError> {
    // `.env` may carry RUST_LOG.
    dotenvy::dotenv().ok();
    init_logging();

    let cli = crate::cli::Cli::parse();
    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Cv(args) => handle_cv(args),
        Command::Predict(args) => handle_predict(args),
        Command::Synth(args) => handle_synth(args),
    }
}

fn init_logging() {
    let env = env_logger::Env::default().default_filter_or("info");
    // A second init (tests, embedding) is harmless.
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .try_init();
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let measure = args.measure;
    let config = run_config_from_fit_args(&args);
    let run = pipeline::train(&config)?;

    println!(
        "{}",
        crate::report::format_run_summary(&run.data, &run.queries, &config.rank)
    );

    if config.holdout_report {
        let point = pipeline::holdout_scores(&run, measure)?;
        println!(
            "{}",
            crate::report::format_holdout_report(&point, &run.queries, measure.measure().name())
        );
    }

    if let Some(path) = &config.export_model {
        crate::io::write_model_json(path, &run.model_file(&config)?)?;
        log::info!("wrote model to {}", path.display());
    }
    if let Some(path) = &config.export_predictions {
        let p = run.solver.predict(&run.data.x)?;
        crate::io::write_predictions_csv(path, &run.data.qids, &p, &run.data.label_names)?;
    }

    Ok(())
}

fn handle_cv(args: CvArgs) -> Result<(), AppError> {
    let config = run_config_from_cv_args(&args);
    let run = pipeline::cross_validate(&config)?;
    let Some(outcome) = &run.outcome else {
        return Err(AppError::new(4, "Cross-validation produced no outcome."));
    };

    println!(
        "{}",
        crate::report::format_run_summary(&run.data, &run.queries, &config.rank)
    );
    println!(
        "{}",
        crate::report::format_cv_table(outcome, config.cv.measure.measure().name())
    );

    if let Some(path) = &config.export_model {
        crate::io::write_model_json(path, &run.model_file(&config)?)?;
        log::info!("wrote model to {}", path.display());
    }
    if let Some(path) = &config.export_predictions {
        let best = &outcome.points[outcome.best_index];
        let p = pipeline::stack_query_predictions(run.queries.groups(), &best.predictions, run.data.y.ncols());
        crate::io::write_predictions_csv(path, &run.data.qids, &p, &run.data.label_names)?;
    }
    if let Some(path) = &config.export_cv {
        crate::io::write_cv_csv(path, outcome)?;
    }

    Ok(())
}

fn handle_predict(args: PredictArgs) -> Result<(), AppError> {
    let model = crate::io::read_model_json(&args.model)?;
    let data = crate::io::load_query_csv(&args.data, crate::io::LabelColumns::Optional)?;
    let p = pipeline::predict_with_model(&model, &data)?;
    crate::io::write_predictions_csv(&args.output, &data.qids, &p, &model.label_names)?;

    if data.has_labels() {
        let measure = model.cv.as_ref().map(|cv| cv.measure).unwrap_or_default();
        match pipeline::score_predictions(&data, &p, measure) {
            Ok(v) => println!("{}: {v:.6}", measure.measure().name()),
            Err(err) => log::warn!("could not score predictions: {err}"),
        }
    }
    println!("Wrote {} predictions to {}", p.nrows(), args.output.display());
    Ok(())
}

fn handle_synth(args: SynthArgs) -> Result<(), AppError> {
    let config = synth_config_from_args(&args);
    let data = crate::data::generate_queries(&config)?;
    crate::io::write_query_csv(&args.output, &data)?;
    println!(
        "Wrote {} rows in {} queries to {}",
        data.n_samples(),
        config.queries,
        args.output.display()
    );
    Ok(())
}

fn rank_config_from_args(args: &TrainArgs, regparam: f64) -> RankConfig {
    let params = KernelParams {
        bias: args.bias,
        gamma: args.gamma,
        coef0: args.coef0,
        degree: args.degree,
    };
    RankConfig {
        regparam,
        kernel: args.kernel.with_params(params),
        inversion: match args.pinv {
            Some(tolerance) => InversionPolicy::PseudoInverse { tolerance },
            None => InversionPolicy::Strict,
        },
    }
}

pub fn run_config_from_fit_args(args: &FitArgs) -> RunConfig {
    RunConfig {
        data_path: args.train.data.clone(),
        rank: rank_config_from_args(&args.train, args.regparam),
        basis_vectors: args.train.basis_vectors,
        basis_seed: args.train.basis_seed,
        cv: CvConfig {
            measure: args.measure,
            ..CvConfig::default()
        },
        holdout_report: args.holdout_report,
        export_model: args.export_model.clone(),
        export_predictions: args.export_predictions.clone(),
        export_cv: None,
    }
}

pub fn run_config_from_cv_args(args: &CvArgs) -> RunConfig {
    let grid = match (&args.grid, args.grid_span.as_deref()) {
        (Some(values), _) => GridSpec::Values(values.clone()),
        (None, Some(&[min, max])) => GridSpec::LogSpaced {
            min,
            max,
            steps: args.grid_steps,
        },
        _ => GridSpec::PowersOfTwo {
            min_exp: args.grid_min_exp,
            max_exp: args.grid_max_exp,
        },
    };
    RunConfig {
        data_path: args.train.data.clone(),
        rank: rank_config_from_args(&args.train, crate::domain::DEFAULT_REGPARAM),
        basis_vectors: args.train.basis_vectors,
        basis_seed: args.train.basis_seed,
        cv: CvConfig {
            grid,
            measure: args.measure,
            parallel: !args.sequential,
        },
        holdout_report: false,
        export_model: args.export_model.clone(),
        export_predictions: args.export_predictions.clone(),
        export_cv: args.export_cv.clone(),
    }
}

pub fn synth_config_from_args(args: &SynthArgs) -> SynthConfig {
    SynthConfig {
        queries: args.queries,
        min_per_query: args.min_per_query,
        max_per_query: args.max_per_query,
        features: args.features,
        noise: args.noise,
        grades: args.grades,
        seed: args.seed,
    }
}
