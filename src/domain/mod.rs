//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - solver configuration (`RankConfig`, `KernelName`, `KernelParams`)
//! - cross-validation settings (`CvConfig`, `GridSpec`, `MeasureName`)
//! - run and synthetic-data settings (`RunConfig`, `SynthConfig`)
//! - the in-memory dataset shared by ingest and synthesis (`QueryDataset`)

pub mod types;

pub use types::*;
