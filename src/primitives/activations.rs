//! Activation Functions
//!
//! Real activations used by attention, and the phase-preserving complex
//! rectifier used by the interference logic gate.

use candle_core::{Tensor, D};
use super::ComplexTensor;
use crate::{HarmonicError, Result};

/// Softmax activation along a dimension
///
/// Converts a vector of real numbers to a probability distribution.
pub fn softmax(tensor: &Tensor, dim: usize) -> Result<Tensor> {
    candle_nn::ops::softmax(tensor, dim)
        .map_err(|e| HarmonicError::Tensor(format!("Softmax failed: {}", e)))
}

/// Softmax along the last dimension
pub fn softmax_last_dim(tensor: &Tensor) -> Result<Tensor> {
    candle_nn::ops::softmax(tensor, D::Minus1)
        .map_err(|e| HarmonicError::Tensor(format!("Softmax failed: {}", e)))
}

/// ReLU activation: max(0, x)
pub fn relu(tensor: &Tensor) -> Result<Tensor> {
    tensor
        .relu()
        .map_err(|e| HarmonicError::Tensor(format!("ReLU failed: {}", e)))
}

/// ModReLU: rectify the magnitude, keep the phase
///
/// `out = max(0, |z| + threshold) · e^{i·arg z}`
///
/// `threshold` is broadcast against the magnitude (a rank-0 scalar in the
/// logic gate). Wherever `|z| + threshold < 0` the output is exactly zero;
/// elsewhere the phase of `z` passes through unchanged.
pub fn mod_relu(z: &ComplexTensor, threshold: &Tensor) -> Result<ComplexTensor> {
    let (magnitude, phase) = z.to_polar()?;
    let shifted = magnitude
        .broadcast_add(threshold)
        .map_err(|e| HarmonicError::Tensor(format!("ModReLU threshold failed: {}", e)))?;
    let gated = relu(&shifted)?;
    phase.mul_real(&gated)
}
