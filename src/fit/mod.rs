//! Regularization selection.
//!
//! Responsibilities:
//!
//! - generate regularization grids (powers of two or explicit values)
//! - evaluate each grid value by leave-query-out hold-out (parallel)
//! - select the best value by the measure's direction

pub mod cv;
pub mod grid;

pub use cv::*;
pub use grid::*;
