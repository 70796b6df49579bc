//! `rankrls` library crate.
//!
//! The binary (`rankrls`) is a thin wrapper around this library so that:
//!
//! - the solver, hold-out and CV code are testable without spawning processes
//! - the numerical core is reusable without the CLI
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod kernel;
pub mod math;
pub mod measure;
pub mod predictor;
pub mod query;
pub mod rank;
pub mod report;
