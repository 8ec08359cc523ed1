//! Harmonic Primitives
//!
//! Complex tensor arithmetic, activations and device selection.
//!
//! ## Submodules
//!
//! - [`complex`]: Complex tensors stored as paired real/imaginary candle tensors
//! - [`tensor_ops`]: Device selection
//! - [`activations`]: Softmax, ReLU and the phase-preserving ModReLU gate

mod activations;
mod complex;
mod tensor_ops;

// Re-export all primitives at module level
pub use activations::*;
pub use complex::*;
pub use tensor_ops::*;
