//! Teleportation attention
//!
//! Energy-based attention over complex projections. The alignment energy
//! between query `i` and key `j` is `E_ij = -Re(Q_i · conj(K_j))`: the better
//! aligned their phases and magnitudes, the lower the energy. Weights are
//! `softmax(-β·E)` over keys, so a larger inverse temperature β collapses the
//! distribution toward the single lowest-energy key (winner-take-all).

use candle_core::{Device, Tensor, Var};
use crate::layers::ComplexLinear;
use crate::primitives::{softmax_last_dim, ComplexTensor};
use crate::{HarmonicError, Result};

/// Parameters and inverse temperature for teleportation attention
#[derive(Debug)]
pub struct TeleportationAttention {
    /// Inverse temperature
    beta: f64,
    /// Query projection: [dim, dim]
    q_proj: ComplexLinear,
    /// Key projection: [dim, dim]
    k_proj: ComplexLinear,
    /// Value projection: [dim, dim]
    v_proj: ComplexLinear,
}

impl TeleportationAttention {
    pub fn new(dim: usize, beta: f64, device: &Device) -> Result<Self> {
        Ok(Self {
            beta,
            q_proj: ComplexLinear::new(dim, dim, device)?,
            k_proj: ComplexLinear::new(dim, dim, device)?,
            v_proj: ComplexLinear::new(dim, dim, device)?,
        })
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    pub fn dim(&self) -> usize {
        self.q_proj.in_dim()
    }

    /// Alignment energy `[.., seq, seq]`
    pub fn energy(&self, x: &ComplexTensor) -> Result<Tensor> {
        Self::ensure_sequence(x)?;
        let q = self.q_proj.forward(x)?;
        let k = self.k_proj.forward(x)?;
        Ok(q.hermitian_real(&k)?.neg()?)
    }

    /// Attention weights `softmax(-β·E)` over the key axis
    pub fn attention_weights(&self, x: &ComplexTensor) -> Result<Tensor> {
        let energy = self.energy(x)?;
        let scores = energy.affine(-self.beta, 0.0)?;
        softmax_last_dim(&scores)
    }

    /// `[batch, seq, dim]` → `[batch, seq, dim]`, bidirectional (no mask)
    pub fn forward(&self, x: &ComplexTensor) -> Result<ComplexTensor> {
        let weights = self.attention_weights(x)?;
        let v = self.v_proj.forward(x)?;
        v.apply_real_weights(&weights)
    }

    fn ensure_sequence(x: &ComplexTensor) -> Result<()> {
        if x.rank() < 2 {
            return Err(HarmonicError::ShapeMismatch(format!(
                "attention expects [.., seq, dim], got {:?}",
                x.dims()
            )));
        }
        Ok(())
    }

    /// Get all trainable variables
    pub fn trainable_vars(&self) -> Vec<Var> {
        let mut vars = self.q_proj.trainable_vars();
        vars.extend(self.k_proj.trainable_vars());
        vars.extend(self.v_proj.trainable_vars());
        vars
    }

    pub fn named_vars(&self, prefix: &str) -> Vec<(String, Var)> {
        let mut vars = self.q_proj.named_vars(&format!("{prefix}.q_proj"));
        vars.extend(self.k_proj.named_vars(&format!("{prefix}.k_proj")));
        vars.extend(self.v_proj.named_vars(&format!("{prefix}.v_proj")));
        vars
    }

    /// Total parameter count
    pub fn param_count(&self) -> usize {
        self.q_proj.param_count() + self.k_proj.param_count() + self.v_proj.param_count()
    }
}
