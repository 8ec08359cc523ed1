//! # jules-coder
//!
//! Complex-valued harmonic network built on candle tensors.
//!
//! ## Overview
//!
//! Every activation in this crate is a complex tensor: a magnitude that says
//! how strongly a feature is present and a phase that says how it relates to
//! everything else. Layers compose those complex values without collapsing
//! them to reals until the final output head.
//!
//! Core capabilities:
//!
//! - **Primitives**: Complex tensors as paired real/imaginary candle tensors
//! - **Holographic**: Circular-convolution binding via FFT (plus unbinding)
//! - **Layers**: Harmonic embedding, interference logic gate, teleportation
//!   attention, harmonic block
//! - **Model**: Embedding → harmonic blocks → magnitude logits, with checkpoints
//! - **Training**: Next-token loss, optimizer wrappers, gradient health checks
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use jules_coder::prelude::*;
//!
//! let config = HarmonicConfig::new(100, 64).with_depth(2);
//! let model = JulesCoderModel::new(config, &Device::Cpu)?;
//!
//! let ids = Tensor::new(&[[1u32, 2, 3], [4, 5, 6]], &Device::Cpu)?;
//! let logits = model.forward(&ids)?; // [2, 3, 100], real
//!
//! let role = ComplexTensor::randn(64, &Device::Cpu)?;
//! let filler = ComplexTensor::randn(64, &Device::Cpu)?;
//! let bound = model.bind_structure(&role, &filler)?; // complex [64]
//! ```
//!
//! ## Feature Flags
//!
//! - `metal`: Apple Metal GPU acceleration
//! - `cuda`: NVIDIA CUDA GPU acceleration

pub mod config;
pub mod holographic;
pub mod layers;
pub mod model;
pub mod primitives;
pub mod training;

// Re-export candle types for convenience
pub use candle_core::{DType, Device, Tensor, Var};

pub use config::{HarmonicConfig, HARMONIC_DIM, PHASE_INIT_SCALE};
pub use model::JulesCoderModel;
pub use primitives::ComplexTensor;

/// Error types for harmonic network operations
#[derive(Debug, thiserror::Error)]
pub enum HarmonicError {
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Index {index} out of range for vocabulary of size {size}")]
    IndexOutOfRange { index: i64, size: usize },

    #[error("Invalid dtype: {0}")]
    InvalidDType(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Tensor operation failed: {0}")]
    Tensor(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Candle error: {0}")]
    Candle(#[from] candle_core::Error),
}

/// Result type alias for harmonic network operations
pub type Result<T> = std::result::Result<T, HarmonicError>;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{DType, Device, Tensor, Var};
    pub use crate::{HarmonicError, Result};

    pub use crate::config::{HarmonicConfig, HARMONIC_DIM, PHASE_INIT_SCALE};

    // Primitives
    pub use crate::primitives::{
        best_device, cpu_device, cuda_available, gpu_available, gpu_disabled, metal_available,
        mod_relu, softmax, ComplexTensor,
    };

    // Holographic
    pub use crate::holographic::{cosine_similarity, HolographicBinder};

    // Layers
    pub use crate::layers::{
        ComplexLinear, HarmonicBlock, HarmonicEmbedding, InterferenceLogicGate,
        TeleportationAttention,
    };

    // Model
    pub use crate::model::{CheckpointMetadata, JulesCoderModel};

    // Training utilities
    pub use crate::training::{
        check_gradients_health, compute_grad_norm, next_token_loss, safe_optimizer_step,
        shift_for_next_token, train_step, LearningConfig, MetricsTracker, Optimizer,
        TrainingMetrics,
    };
}
