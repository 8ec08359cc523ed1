//! Interference logic gate
//!
//! A complex affine map followed by ModReLU. Constructive interference
//! (large |z'|) passes with its phase intact; destructive interference that
//! drives `|z'| + threshold` below zero collapses the value to exactly zero,
//! the gate's "false" state.

use candle_core::{Device, Tensor, Var};
use crate::layers::ComplexLinear;
use crate::primitives::{mod_relu, ComplexTensor};
use crate::Result;

#[derive(Debug)]
pub struct InterferenceLogicGate {
    linear: ComplexLinear,
    threshold: Var,
}

impl InterferenceLogicGate {
    /// Gate over `dim` features with the given initial threshold
    ///
    /// Weights are complex normal scaled by 1/√dim so activations keep
    /// their scale through stacked residual blocks.
    pub fn new(dim: usize, threshold_init: f32, device: &Device) -> Result<Self> {
        let std = std::f32::consts::FRAC_1_SQRT_2 / (dim.max(1) as f32).sqrt();
        let linear = ComplexLinear::from_normal(dim, dim, std, device)?;
        Self::from_linear(linear, threshold_init, device)
    }

    /// Gate around an existing linear map
    pub fn from_linear(linear: ComplexLinear, threshold_init: f32, device: &Device) -> Result<Self> {
        let threshold = Var::from_tensor(&Tensor::new(threshold_init, device)?)?;
        Ok(Self { linear, threshold })
    }

    pub fn linear(&self) -> &ComplexLinear {
        &self.linear
    }

    /// Current threshold value
    pub fn threshold(&self) -> Result<f32> {
        Ok(self.threshold.as_tensor().to_scalar::<f32>()?)
    }

    /// Pre-activation `z·W + b`
    pub fn pre_activation(&self, z: &ComplexTensor) -> Result<ComplexTensor> {
        self.linear.forward(z)
    }

    /// `max(0, |z'| + threshold) · e^{i·arg z'}` with `z' = z·W + b`
    pub fn forward(&self, z: &ComplexTensor) -> Result<ComplexTensor> {
        let linear_out = self.pre_activation(z)?;
        mod_relu(&linear_out, self.threshold.as_tensor())
    }

    pub fn trainable_vars(&self) -> Vec<Var> {
        let mut vars = self.linear.trainable_vars();
        vars.push(self.threshold.clone());
        vars
    }

    pub fn named_vars(&self, prefix: &str) -> Vec<(String, Var)> {
        let mut vars = self.linear.named_vars(&format!("{prefix}.linear"));
        vars.push((format!("{prefix}.threshold"), self.threshold.clone()));
        vars
    }

    pub fn param_count(&self) -> usize {
        self.linear.param_count() + 1
    }
}
