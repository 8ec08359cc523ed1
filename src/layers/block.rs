//! Harmonic block: residual teleportation attention then a residual logic gate

use candle_core::{Device, Var};
use crate::layers::{InterferenceLogicGate, TeleportationAttention};
use crate::primitives::ComplexTensor;
use crate::Result;

#[derive(Debug)]
pub struct HarmonicBlock {
    attention: TeleportationAttention,
    logic_gate: InterferenceLogicGate,
}

impl HarmonicBlock {
    pub fn new(dim: usize, beta: f64, threshold_init: f32, device: &Device) -> Result<Self> {
        Ok(Self {
            attention: TeleportationAttention::new(dim, beta, device)?,
            logic_gate: InterferenceLogicGate::new(dim, threshold_init, device)?,
        })
    }

    pub fn attention(&self) -> &TeleportationAttention {
        &self.attention
    }

    pub fn logic_gate(&self) -> &InterferenceLogicGate {
        &self.logic_gate
    }

    /// `h = x + attn(x)`, then `h + gate(h)`
    pub fn forward(&self, x: &ComplexTensor) -> Result<ComplexTensor> {
        let h = x.add(&self.attention.forward(x)?)?;
        h.add(&self.logic_gate.forward(&h)?)
    }

    pub fn trainable_vars(&self) -> Vec<Var> {
        let mut vars = self.attention.trainable_vars();
        vars.extend(self.logic_gate.trainable_vars());
        vars
    }

    pub fn named_vars(&self, prefix: &str) -> Vec<(String, Var)> {
        let mut vars = self.attention.named_vars(&format!("{prefix}.attention"));
        vars.extend(self.logic_gate.named_vars(&format!("{prefix}.logic_gate")));
        vars
    }

    pub fn param_count(&self) -> usize {
        self.attention.param_count() + self.logic_gate.param_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_preserves_shape() {
        let device = Device::Cpu;
        let block = HarmonicBlock::new(16, 1.0, 0.5, &device).unwrap();
        let x = ComplexTensor::randn((2, 6, 16), &device).unwrap();

        let y = block.forward(&x).unwrap();
        assert_eq!(y.dims(), &[2, 6, 16]);
        assert!(y.all_finite().unwrap());
    }

    #[test]
    fn test_block_is_residual() {
        let device = Device::Cpu;
        let block = HarmonicBlock::new(8, 1.0, 0.5, &device).unwrap();
        let x = ComplexTensor::randn((1, 4, 8), &device).unwrap();

        let h = x.add(&block.attention().forward(&x).unwrap()).unwrap();
        let expected = h.add(&block.logic_gate().forward(&h).unwrap()).unwrap();
        let got = block.forward(&x).unwrap();

        let diff = got.sub(&expected).unwrap().abs().unwrap();
        let max = diff.flatten_all().unwrap().max(0).unwrap().to_scalar::<f32>().unwrap();
        assert!(max < 1e-5);
    }

    #[test]
    fn test_block_vars() {
        let device = Device::Cpu;
        let block = HarmonicBlock::new(4, 1.0, 0.5, &device).unwrap();

        // 3 projections × 4 vars + gate linear 4 + threshold
        assert_eq!(block.trainable_vars().len(), 17);
        let names: Vec<String> = block.named_vars("blocks.0").into_iter().map(|(n, _)| n).collect();
        assert!(names.contains(&"blocks.0.attention.q_proj.weight.re".to_string()));
        assert!(names.contains(&"blocks.0.logic_gate.threshold".to_string()));
        assert_eq!(block.param_count(), 3 * 2 * (16 + 4) + 2 * (16 + 4) + 1);
    }
}
