//! Reporting utilities: run summaries and formatted terminal tables.

pub mod format;

pub use format::*;
