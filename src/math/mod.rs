//! Linear-algebra primitives: symmetric eigendecomposition and small inverses.

pub mod decomposition;
pub mod inverse;

pub use decomposition::*;
pub use inverse::*;
