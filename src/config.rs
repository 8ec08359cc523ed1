//! Model configuration
//!
//! Hyperparameters for [`JulesCoderModel`](crate::model::JulesCoderModel).
//! Built in code with the builder methods or parsed from the `[model]` table
//! of a TOML file:
//!
//! ```toml
//! [model]
//! vocab_size = 100
//! dim = 64
//! depth = 2
//! beta = 1.5
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use crate::{HarmonicError, Result};

/// Default dimension of a harmonic (holographic) vector
pub const HARMONIC_DIM: usize = 1024;

/// Half-width of the uniform phase initialization range: phases start in [-π, π]
pub const PHASE_INIT_SCALE: f64 = std::f64::consts::PI;

/// Hyperparameters for the harmonic model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarmonicConfig {
    /// Vocabulary size (embedding rows and output logits)
    #[serde(default = "default_vocab_size")]
    pub vocab_size: usize,

    /// Complex feature dimension
    #[serde(default = "default_dim")]
    pub dim: usize,

    /// Number of harmonic blocks
    #[serde(default = "default_depth")]
    pub depth: usize,

    /// Inverse temperature for teleportation attention
    #[serde(default = "default_beta")]
    pub beta: f64,

    /// Initial logic gate threshold
    #[serde(default = "default_threshold_init")]
    pub threshold_init: f32,

    /// Phase initialization half-width
    #[serde(default = "default_phase_init_scale")]
    pub phase_init_scale: f64,
}

fn default_vocab_size() -> usize {
    100
}

fn default_dim() -> usize {
    HARMONIC_DIM
}

fn default_depth() -> usize {
    4
}

fn default_beta() -> f64 {
    1.0
}

fn default_threshold_init() -> f32 {
    0.5
}

fn default_phase_init_scale() -> f64 {
    PHASE_INIT_SCALE
}

impl Default for HarmonicConfig {
    fn default() -> Self {
        Self {
            vocab_size: default_vocab_size(),
            dim: default_dim(),
            depth: default_depth(),
            beta: default_beta(),
            threshold_init: default_threshold_init(),
            phase_init_scale: default_phase_init_scale(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    model: Option<HarmonicConfig>,
}

impl HarmonicConfig {
    /// Config with the given vocabulary and dimension, defaults elsewhere
    pub fn new(vocab_size: usize, dim: usize) -> Self {
        Self {
            vocab_size,
            dim,
            ..Default::default()
        }
    }

    /// Builder: set number of harmonic blocks
    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    /// Builder: set attention inverse temperature
    pub fn with_beta(mut self, beta: f64) -> Self {
        self.beta = beta;
        self
    }

    /// Builder: set initial logic gate threshold
    pub fn with_threshold_init(mut self, threshold: f32) -> Self {
        self.threshold_init = threshold;
        self
    }

    /// Builder: set phase initialization half-width
    pub fn with_phase_init_scale(mut self, scale: f64) -> Self {
        self.phase_init_scale = scale;
        self
    }

    /// Load config from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(HarmonicError::Io)?;
        Self::from_toml_str(&content)
    }

    /// Parse config from TOML text
    ///
    /// Reads the `[model]` table; a missing table yields the defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(content)
            .map_err(|e| HarmonicError::Config(format!("Failed to parse config: {}", e)))?;
        let config = file.model.unwrap_or_default();
        config.validate()?;
        Ok(config)
    }

    /// Render as TOML text with a `[model]` table
    pub fn to_toml_string(&self) -> Result<String> {
        #[derive(Serialize)]
        struct Wrapper<'a> {
            model: &'a HarmonicConfig,
        }

        toml::to_string(&Wrapper { model: self })
            .map_err(|e| HarmonicError::Config(format!("Failed to render config: {}", e)))
    }

    /// Check that every hyperparameter is usable
    pub fn validate(&self) -> Result<()> {
        if self.vocab_size == 0 {
            return Err(HarmonicError::Config("vocab_size must be positive".into()));
        }
        if self.dim == 0 {
            return Err(HarmonicError::Config("dim must be positive".into()));
        }
        if !self.beta.is_finite() || self.beta < 0.0 {
            return Err(HarmonicError::Config(format!(
                "beta must be finite and non-negative, got {}",
                self.beta
            )));
        }
        if !self.threshold_init.is_finite() {
            return Err(HarmonicError::Config("threshold_init must be finite".into()));
        }
        if !self.phase_init_scale.is_finite() || self.phase_init_scale < 0.0 {
            return Err(HarmonicError::Config(format!(
                "phase_init_scale must be finite and non-negative, got {}",
                self.phase_init_scale
            )));
        }
        Ok(())
    }
}
