//! Query-structured RankRLS: eigensystem cache, solver and hold-out algebra.

pub mod eigensystem;
pub mod holdout;
pub mod solver;

pub use eigensystem::Eigensystem;
pub use holdout::validate_holdout;
pub use solver::*;
