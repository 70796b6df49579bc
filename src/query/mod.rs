//! Query grouping.
//!
//! Ranking loss is only defined between samples of the same query, so every
//! other module works on dense query ids and per-query sample lists.

pub mod index;

pub use index::*;
