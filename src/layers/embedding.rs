//! Harmonic embedding: token ids → complex vectors in polar form
//!
//! Each token learns its presence (magnitude) separately from its relation
//! to other tokens (phase).

use candle_core::{DType, Device, Tensor, Var};
use crate::primitives::ComplexTensor;
use crate::{HarmonicError, Result};

/// Polar embedding table
///
/// Magnitude starts at 1 (unit energy), phase uniform in
/// `[-phase_init_scale, phase_init_scale]`.
#[derive(Debug)]
pub struct HarmonicEmbedding {
    num_embeddings: usize,
    embedding_dim: usize,
    magnitude: Var,
    phase: Var,
}

impl HarmonicEmbedding {
    pub fn new(
        num_embeddings: usize,
        embedding_dim: usize,
        phase_init_scale: f64,
        device: &Device,
    ) -> Result<Self> {
        let magnitude = Tensor::ones((num_embeddings, embedding_dim), DType::F32, device)?;
        let scale = phase_init_scale as f32;
        let phase = if scale > 0.0 {
            Tensor::rand(-scale, scale, (num_embeddings, embedding_dim), device)?
        } else {
            Tensor::zeros((num_embeddings, embedding_dim), DType::F32, device)?
        };

        Ok(Self {
            num_embeddings,
            embedding_dim,
            magnitude: Var::from_tensor(&magnitude)?,
            phase: Var::from_tensor(&phase)?,
        })
    }

    pub fn num_embeddings(&self) -> usize {
        self.num_embeddings
    }

    pub fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }

    /// Magnitude table `[vocab, dim]`
    pub fn magnitude(&self) -> &Tensor {
        self.magnitude.as_tensor()
    }

    /// Phase table `[vocab, dim]`
    pub fn phase(&self) -> &Tensor {
        self.phase.as_tensor()
    }

    /// Look up ids of any shape `[...]`, returning complex `[..., dim]`
    ///
    /// Ids must be U32 or I64 and lie in `0..vocab`.
    pub fn forward(&self, ids: &Tensor) -> Result<ComplexTensor> {
        let flat = self.checked_ids(ids)?;

        let magnitude = self.magnitude.as_tensor().index_select(&flat, 0)?;
        let phase = self.phase.as_tensor().index_select(&flat, 0)?;

        let mut shape = ids.dims().to_vec();
        shape.push(self.embedding_dim);

        // Euler: z = r·e^{iθ}
        ComplexTensor::from_polar(&magnitude, &phase)?.reshape(shape)
    }

    /// Flatten ids to U32 after range-checking them on the host
    fn checked_ids(&self, ids: &Tensor) -> Result<Tensor> {
        let flat = ids.flatten_all()?;
        match flat.dtype() {
            DType::U32 => {
                let values = flat.to_vec1::<u32>()?;
                if let Some(&bad) = values.iter().find(|&&v| v as usize >= self.num_embeddings) {
                    return Err(HarmonicError::IndexOutOfRange {
                        index: bad as i64,
                        size: self.num_embeddings,
                    });
                }
                Ok(flat)
            }
            DType::I64 => {
                let values = flat.to_vec1::<i64>()?;
                if let Some(&bad) = values
                    .iter()
                    .find(|&&v| v < 0 || v as usize >= self.num_embeddings)
                {
                    return Err(HarmonicError::IndexOutOfRange {
                        index: bad,
                        size: self.num_embeddings,
                    });
                }
                Ok(flat.to_dtype(DType::U32)?)
            }
            other => Err(HarmonicError::InvalidDType(format!(
                "token ids must be u32 or i64, got {:?}",
                other
            ))),
        }
    }

    pub fn trainable_vars(&self) -> Vec<Var> {
        vec![self.magnitude.clone(), self.phase.clone()]
    }

    pub fn named_vars(&self, prefix: &str) -> Vec<(String, Var)> {
        vec![
            (format!("{prefix}.magnitude"), self.magnitude.clone()),
            (format!("{prefix}.phase"), self.phase.clone()),
        ]
    }

    pub fn param_count(&self) -> usize {
        2 * self.num_embeddings * self.embedding_dim
    }
}
