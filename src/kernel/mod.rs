//! Kernels and the kernel-basis adapter consumed by the ranking solver.

pub mod adapter;
pub mod functions;

pub use adapter::*;
pub use functions::*;
