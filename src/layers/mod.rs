//! Harmonic Layers
//!
//! Trainable building blocks over [`ComplexTensor`](crate::primitives::ComplexTensor):
//!
//! - [`HarmonicEmbedding`]: token ids → polar complex vectors
//! - [`ComplexLinear`]: complex affine map
//! - [`InterferenceLogicGate`]: complex linear + ModReLU
//! - [`TeleportationAttention`]: energy-based attention, softmax(-β·E)
//! - [`HarmonicBlock`]: residual attention followed by a residual gate

mod attention;
mod block;
mod embedding;
mod linear;
mod logic_gate;

pub use attention::TeleportationAttention;
pub use block::HarmonicBlock;
pub use embedding::HarmonicEmbedding;
pub use linear::ComplexLinear;
pub use logic_gate::InterferenceLogicGate;
