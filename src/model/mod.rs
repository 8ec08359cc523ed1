//! Jules coder model
//!
//! Token ids flow through a [`HarmonicEmbedding`], `depth` stacked
//! [`HarmonicBlock`]s and a complex output head; the magnitude of the head's
//! output is returned as real logits `[batch, seq, vocab]`.
//!
//! The model also owns a [`HolographicBinder`] so callers can compose
//! structured representations of any equal length directly, outside the
//! token pipeline.
//!
//! # Checkpoints
//!
//! Parameters are saved by stable name (`embedding.magnitude`,
//! `blocks.0.attention.q_proj.weight.re`, `output_head.bias.im`, ...) into a
//! safetensors file. [`JulesCoderModel::save_with_metadata`] writes a
//! `.meta.json` sidecar next to it.
//!
//! ```ignore
//! model.save_with_metadata("models/jules_v1.safetensors", "v1")?;
//!
//! let fresh = JulesCoderModel::new(config, &device)?;
//! fresh.load("models/jules_v1.safetensors")?;
//! let meta = JulesCoderModel::load_metadata("models/jules_v1.safetensors")?;
//! ```

use std::collections::HashMap;
use std::path::Path;

use candle_core::{Device, Tensor, Var};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::HarmonicConfig;
use crate::holographic::HolographicBinder;
use crate::layers::{ComplexLinear, HarmonicBlock, HarmonicEmbedding};
use crate::primitives::ComplexTensor;
use crate::{HarmonicError, Result};

/// Complex-valued harmonic language model
#[derive(Debug)]
pub struct JulesCoderModel {
    config: HarmonicConfig,
    embedding: HarmonicEmbedding,
    blocks: Vec<HarmonicBlock>,
    output_head: ComplexLinear,
    binder: HolographicBinder,
    device: Device,
}

impl JulesCoderModel {
    /// Build a freshly initialized model on `device`
    pub fn new(config: HarmonicConfig, device: &Device) -> Result<Self> {
        config.validate()?;

        let embedding = HarmonicEmbedding::new(
            config.vocab_size,
            config.dim,
            config.phase_init_scale,
            device,
        )?;
        let blocks = (0..config.depth)
            .map(|_| HarmonicBlock::new(config.dim, config.beta, config.threshold_init, device))
            .collect::<Result<Vec<_>>>()?;
        let output_head = ComplexLinear::new(config.dim, config.vocab_size, device)?;
        let binder = HolographicBinder::new(config.dim)?;

        let model = Self {
            config,
            embedding,
            blocks,
            output_head,
            binder,
            device: device.clone(),
        };

        info!(
            vocab_size = model.config.vocab_size,
            dim = model.config.dim,
            depth = model.config.depth,
            params = model.param_count(),
            "Initialized harmonic model"
        );

        Ok(model)
    }

    pub fn config(&self) -> &HarmonicConfig {
        &self.config
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn embedding(&self) -> &HarmonicEmbedding {
        &self.embedding
    }

    pub fn blocks(&self) -> &[HarmonicBlock] {
        &self.blocks
    }

    pub fn output_head(&self) -> &ComplexLinear {
        &self.output_head
    }

    pub fn binder(&self) -> &HolographicBinder {
        &self.binder
    }

    /// Complex hidden states `[batch, seq, dim]` after the last block
    pub fn hidden_states(&self, ids: &Tensor) -> Result<ComplexTensor> {
        if ids.rank() != 2 {
            return Err(HarmonicError::ShapeMismatch(format!(
                "token ids must be [batch, seq], got {:?}",
                ids.dims()
            )));
        }

        let mut x = self.embedding.forward(ids)?;
        for block in &self.blocks {
            x = block.forward(&x)?;
        }
        Ok(x)
    }

    /// Real logits `[batch, seq, vocab]`: magnitude of the complex head output
    pub fn forward(&self, ids: &Tensor) -> Result<Tensor> {
        let hidden = self.hidden_states(ids)?;
        let logits = self.output_head.forward(&hidden)?.abs()?;
        debug!(ids = ?ids.dims(), logits = ?logits.dims(), "forward");
        Ok(logits)
    }

    /// Bind a filler to a role of the same shape with the model's binder
    pub fn bind_structure(&self, role: &ComplexTensor, filler: &ComplexTensor) -> Result<ComplexTensor> {
        self.binder.bind(role, filler)
    }

    /// Approximately recover the filler bound to `role` in `trace`
    pub fn unbind_structure(&self, trace: &ComplexTensor, role: &ComplexTensor) -> Result<ComplexTensor> {
        self.binder.unbind(trace, role)
    }

    /// All trainable variables in a stable order
    pub fn trainable_vars(&self) -> Vec<Var> {
        self.named_vars().into_iter().map(|(_, var)| var).collect()
    }

    /// Trainable variables keyed by checkpoint name
    pub fn named_vars(&self) -> Vec<(String, Var)> {
        let mut vars = self.embedding.named_vars("embedding");
        for (i, block) in self.blocks.iter().enumerate() {
            vars.extend(block.named_vars(&format!("blocks.{i}")));
        }
        vars.extend(self.output_head.named_vars("output_head"));
        vars
    }

    /// Total number of scalar parameters
    pub fn param_count(&self) -> usize {
        self.embedding.param_count()
            + self.blocks.iter().map(HarmonicBlock::param_count).sum::<usize>()
            + self.output_head.param_count()
    }

    /// Check if any trainable variable contains NaN or Inf
    ///
    /// Returns the name of the first unhealthy variable and the issue.
    pub fn check_weights_health(&self) -> Option<(String, &'static str)> {
        for (name, var) in self.named_vars() {
            if let Ok(vals) = var.as_tensor().flatten_all().and_then(|t| t.to_vec1::<f32>()) {
                for v in vals {
                    let issue = if v.is_nan() {
                        "NaN"
                    } else if v.is_infinite() {
                        "Infinite"
                    } else {
                        continue;
                    };
                    warn!(var = %name, issue, "Unhealthy weights");
                    return Some((name, issue));
                }
            }
        }
        None
    }

    /// Save all parameters to a safetensors file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let tensors: HashMap<String, Tensor> = self
            .named_vars()
            .into_iter()
            .map(|(name, var)| (name, var.as_tensor().clone()))
            .collect();

        candle_core::safetensors::save(&tensors, path.as_ref())
            .map_err(|e| HarmonicError::Serialization(format!("Failed to save: {}", e)))?;

        debug!(path = %path.as_ref().display(), tensors = tensors.len(), "Saved checkpoint");
        Ok(())
    }

    /// Load parameters saved by [`save`](Self::save)
    ///
    /// The checkpoint must come from a model with the same configuration:
    /// every parameter must be present with the same shape.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<()> {
        let data = std::fs::read(path.as_ref())?;
        let tensors = candle_core::safetensors::load_buffer(&data, &self.device)
            .map_err(|e| HarmonicError::Serialization(format!("Failed to deserialize: {}", e)))?;

        for (name, var) in self.named_vars() {
            let loaded = tensors.get(&name).ok_or_else(|| {
                HarmonicError::Serialization(format!("Missing parameter '{}'", name))
            })?;
            if loaded.dims() != var.as_tensor().dims() {
                return Err(HarmonicError::ShapeMismatch(format!(
                    "checkpoint parameter '{}' has shape {:?}, model expects {:?}",
                    name,
                    loaded.dims(),
                    var.as_tensor().dims()
                )));
            }
            var.set(&loaded.to_dtype(var.as_tensor().dtype())?)?;
        }

        debug!(path = %path.as_ref().display(), tensors = tensors.len(), "Loaded checkpoint");
        Ok(())
    }

    /// Save parameters plus a `.meta.json` sidecar
    pub fn save_with_metadata(&self, path: impl AsRef<Path>, version: &str) -> Result<CheckpointMetadata> {
        self.save(path.as_ref())?;

        let metadata = CheckpointMetadata::from_model(self, version);
        let meta_path = path.as_ref().with_extension("meta.json");
        let meta_json = serde_json::to_string_pretty(&metadata)
            .map_err(|e| HarmonicError::Serialization(format!("Failed to encode metadata: {}", e)))?;
        std::fs::write(&meta_path, meta_json)
            .map_err(|e| HarmonicError::Serialization(format!("Failed to save metadata: {}", e)))?;

        Ok(metadata)
    }

    /// Read the sidecar written by [`save_with_metadata`](Self::save_with_metadata)
    pub fn load_metadata(path: impl AsRef<Path>) -> Result<CheckpointMetadata> {
        let meta_path = path.as_ref().with_extension("meta.json");
        let meta_json = std::fs::read_to_string(&meta_path).map_err(|e| {
            HarmonicError::Serialization(format!(
                "Failed to read metadata file '{}': {}",
                meta_path.display(),
                e
            ))
        })?;

        serde_json::from_str(&meta_json)
            .map_err(|e| HarmonicError::Serialization(format!("Invalid metadata JSON: {}", e)))
    }
}

/// Metadata stored next to a checkpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    /// Model name
    pub name: String,

    /// Version string (e.g., "v1.2.3")
    pub version: String,

    /// When this checkpoint was created
    pub trained_at: chrono::DateTime<chrono::Utc>,

    /// Scalar parameter count at save time
    pub param_count: usize,

    /// Configuration the checkpoint was trained with
    pub config: HarmonicConfig,
}

impl CheckpointMetadata {
    pub fn from_model(model: &JulesCoderModel, version: &str) -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: version.to_string(),
            trained_at: chrono::Utc::now(),
            param_count: model.param_count(),
            config: model.config.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn device() -> Device {
        Device::Cpu
    }

    fn small_config() -> HarmonicConfig {
        HarmonicConfig::new(100, 64).with_depth(2)
    }

    fn sample_ids() -> Tensor {
        let ids: Vec<u32> = (0..20).map(|i| (i * 7 + 3) % 100).collect();
        Tensor::from_vec(ids, (2, 10), &device()).unwrap()
    }

    #[test]
    fn test_forward_logits_shape() {
        let model = JulesCoderModel::new(small_config(), &device()).unwrap();

        let logits = model.forward(&sample_ids()).unwrap();
        assert_eq!(logits.dims(), &[2, 10, 100]);
        assert_eq!(logits.dtype(), candle_core::DType::F32);

        let values = logits.flatten_all().unwrap().to_vec1::<f32>().unwrap();
        assert!(values.iter().all(|v| v.is_finite() && *v >= 0.0));
    }

    #[test]
    fn test_bind_structure() {
        let model = JulesCoderModel::new(small_config(), &device()).unwrap();
        let role = ComplexTensor::randn(64, &device()).unwrap();
        let filler = ComplexTensor::randn(64, &device()).unwrap();

        let bound = model.bind_structure(&role, &filler).unwrap();
        assert_eq!(bound.dims(), &[64]);

        let short = ComplexTensor::randn(32, &device()).unwrap();
        assert!(model.bind_structure(&role, &short).is_err());
    }

    #[test]
    fn test_bind_structure_any_equal_length() {
        let model = JulesCoderModel::new(small_config(), &device()).unwrap();
        let role = ComplexTensor::randn(32, &device()).unwrap();
        let filler = ComplexTensor::randn(32, &device()).unwrap();

        let bound = model.bind_structure(&role, &filler).unwrap();
        assert_eq!(bound.dims(), &[32]);
        assert!(bound.all_finite().unwrap());

        let swapped = model.bind_structure(&filler, &role).unwrap();
        let diff = bound.sub(&swapped).unwrap().abs().unwrap();
        let max = diff.max(0).unwrap().to_scalar::<f32>().unwrap();
        assert!(max < 1e-4);
    }

    #[test]
    fn test_depth_zero_is_embedding_then_head() {
        let model = JulesCoderModel::new(HarmonicConfig::new(10, 8).with_depth(0), &device()).unwrap();
        let ids = Tensor::new(&[[1u32, 2]], &device()).unwrap();

        let expected = model
            .output_head()
            .forward(&model.embedding().forward(&ids).unwrap())
            .unwrap()
            .abs()
            .unwrap();
        let got = model.forward(&ids).unwrap();

        let diff = got.sub(&expected).unwrap().abs().unwrap();
        let max = diff.flatten_all().unwrap().max(0).unwrap().to_scalar::<f32>().unwrap();
        assert!(max < 1e-6);
    }

    #[test]
    fn test_param_count_matches_vars() {
        let model = JulesCoderModel::new(small_config(), &device()).unwrap();
        let counted: usize = model
            .trainable_vars()
            .iter()
            .map(|v| v.as_tensor().elem_count())
            .sum();
        assert_eq!(model.param_count(), counted);
        assert!(model.check_weights_health().is_none());
    }

    #[test]
    fn test_named_vars_are_unique() {
        let model = JulesCoderModel::new(small_config(), &device()).unwrap();
        let names: Vec<String> = model.named_vars().into_iter().map(|(n, _)| n).collect();
        let unique: std::collections::HashSet<&String> = names.iter().collect();
        assert_eq!(names.len(), unique.len());
        assert!(names.contains(&"embedding.phase".to_string()));
        assert!(names.contains(&"blocks.1.logic_gate.threshold".to_string()));
        assert!(names.contains(&"output_head.weight.im".to_string()));
    }

    #[test]
    fn test_out_of_range_ids() {
        let model = JulesCoderModel::new(small_config(), &device()).unwrap();
        let ids = Tensor::new(&[[1u32, 100]], &device()).unwrap();
        assert!(matches!(
            model.forward(&ids).unwrap_err(),
            HarmonicError::IndexOutOfRange { index: 100, size: 100 }
        ));

        let flat = Tensor::new(&[1u32, 2], &device()).unwrap();
        assert!(matches!(
            model.forward(&flat).unwrap_err(),
            HarmonicError::ShapeMismatch(_)
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = HarmonicConfig::new(0, 64);
        assert!(matches!(
            JulesCoderModel::new(config, &device()).unwrap_err(),
            HarmonicError::Config(_)
        ));
    }

    #[test]
    fn test_unhealthy_weights_detected() {
        let model = JulesCoderModel::new(HarmonicConfig::new(4, 4).with_depth(1), &device()).unwrap();
        let (name, var) = model.named_vars().into_iter().last().unwrap();
        let bad = Tensor::new(&[f32::NAN, 0.0, 0.0, 0.0], &device()).unwrap();
        var.set(&bad).unwrap();

        assert_eq!(model.check_weights_health(), Some((name, "NaN")));
    }

    #[test]
    fn test_save_load_reproduces_logits() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.safetensors");

        let model = JulesCoderModel::new(small_config(), &device()).unwrap();
        model.save(&path).unwrap();

        let fresh = JulesCoderModel::new(small_config(), &device()).unwrap();
        fresh.load(&path).unwrap();

        let original = model.forward(&sample_ids()).unwrap();
        let restored = fresh.forward(&sample_ids()).unwrap();
        let diff = original.sub(&restored).unwrap().abs().unwrap();
        let max = diff.flatten_all().unwrap().max(0).unwrap().to_scalar::<f32>().unwrap();
        assert!(max < 1e-6, "max diff {}", max);
    }

    #[test]
    fn test_load_rejects_mismatched_shapes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.safetensors");

        let model = JulesCoderModel::new(HarmonicConfig::new(10, 8).with_depth(1), &device()).unwrap();
        model.save(&path).unwrap();

        let wider = JulesCoderModel::new(HarmonicConfig::new(10, 16).with_depth(1), &device()).unwrap();
        assert!(matches!(
            wider.load(&path).unwrap_err(),
            HarmonicError::ShapeMismatch(_)
        ));

        let deeper = JulesCoderModel::new(HarmonicConfig::new(10, 8).with_depth(2), &device()).unwrap();
        assert!(matches!(
            deeper.load(&path).unwrap_err(),
            HarmonicError::Serialization(_)
        ));
    }

    #[test]
    fn test_metadata_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.safetensors");

        let model = JulesCoderModel::new(HarmonicConfig::new(10, 8).with_depth(1), &device()).unwrap();
        let saved = model.save_with_metadata(&path, "v1.0.0").unwrap();
        assert!(dir.path().join("model.meta.json").exists());

        let loaded = JulesCoderModel::load_metadata(&path).unwrap();
        assert_eq!(loaded, saved);
        assert_eq!(loaded.version, "v1.0.0");
        assert_eq!(loaded.param_count, model.param_count());
        assert_eq!(loaded.config, *model.config());
    }

    #[test]
    fn test_missing_metadata() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.safetensors");
        assert!(matches!(
            JulesCoderModel::load_metadata(&path).unwrap_err(),
            HarmonicError::Serialization(_)
        ));
    }
}
