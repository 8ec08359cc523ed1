//! Training Infrastructure
//!
//! Loss, optimization, and monitoring utilities for [`JulesCoderModel`].
//!
//! ## Overview
//!
//! The model itself never updates its parameters. This module supplies the
//! pieces an external loop needs:
//!
//! - **Loss**: Next-token cross-entropy over magnitude logits
//! - **Optimizers**: Wrapped candle-nn optimizers (AdamW, SGD)
//! - **Gradient utilities**: Norm, health checks, clipped steps
//! - **Metrics**: Loss tracking and convergence monitoring
//!
//! ## Example
//!
//! ```ignore
//! use jules_coder::training::*;
//!
//! let config = LearningConfig::default();
//! let mut optimizer = Optimizer::from_config(model.trainable_vars(), &config)?;
//!
//! for step in 0..100 {
//!     let (inputs, targets) = shift_for_next_token(&batch)?;
//!     let result = train_step(&model, &mut optimizer, &inputs, &targets, &config, step)?;
//!     tracker.record(&result);
//! }
//! ```

use candle_core::backprop::GradStore;
use candle_core::{DType, Tensor, Var, D};
use candle_nn::optim::Optimizer as CandleOptimizer;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::model::JulesCoderModel;
use crate::{HarmonicError, Result};

// =============================================================================
// Metrics
// =============================================================================

/// Training metrics published after epochs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingMetrics {
    /// Model or run name
    pub model: String,

    /// Current epoch number
    pub epoch: u64,

    /// Mean loss value for this epoch
    pub loss: f32,

    /// Next-token accuracy (if measured)
    pub accuracy: Option<f32>,

    /// Number of target tokens trained on
    pub tokens_trained: usize,

    /// Duration of this epoch in milliseconds
    pub duration_ms: u64,
}

impl TrainingMetrics {
    /// Create new training metrics
    pub fn new(model: impl Into<String>, epoch: u64, loss: f32) -> Self {
        Self {
            model: model.into(),
            epoch,
            loss,
            accuracy: None,
            tokens_trained: 0,
            duration_ms: 0,
        }
    }

    /// Builder: set accuracy
    pub fn with_accuracy(mut self, accuracy: f32) -> Self {
        self.accuracy = Some(accuracy);
        self
    }

    /// Builder: set tokens trained
    pub fn with_tokens(mut self, tokens: usize) -> Self {
        self.tokens_trained = tokens;
        self
    }

    /// Builder: set duration
    pub fn with_duration_ms(mut self, ms: u64) -> Self {
        self.duration_ms = ms;
        self
    }

    /// `exp(loss)`
    pub fn perplexity(&self) -> f32 {
        self.loss.exp()
    }
}

// =============================================================================
// Loss
// =============================================================================

/// Split `[batch, seq]` ids into inputs `ids[:, :-1]` and targets `ids[:, 1:]`
pub fn shift_for_next_token(ids: &Tensor) -> Result<(Tensor, Tensor)> {
    let (_, seq) = ids.dims2()?;
    if seq < 2 {
        return Err(HarmonicError::Training(format!(
            "need at least 2 tokens per sequence to shift, got {}",
            seq
        )));
    }
    let inputs = ids.narrow(1, 0, seq - 1)?;
    let targets = ids.narrow(1, 1, seq - 1)?;
    Ok((inputs, targets))
}

/// Mean cross-entropy of logits `[batch, seq, vocab]` against targets `[batch, seq]`
pub fn next_token_loss(logits: &Tensor, targets: &Tensor) -> Result<Tensor> {
    let (batch, seq, vocab) = logits.dims3()?;
    if targets.dims() != [batch, seq] {
        return Err(HarmonicError::ShapeMismatch(format!(
            "targets {:?} do not match logits {:?}",
            targets.dims(),
            logits.dims()
        )));
    }

    let flat_logits = logits.reshape((batch * seq, vocab))?;
    let flat_targets = targets.flatten_all()?.to_dtype(DType::U32)?;
    Ok(candle_nn::loss::cross_entropy(&flat_logits, &flat_targets)?)
}

/// Fraction of positions where the argmax logit equals the target
pub fn next_token_accuracy(logits: &Tensor, targets: &Tensor) -> Result<f32> {
    let predicted = logits.argmax(D::Minus1)?.flatten_all()?.to_vec1::<u32>()?;
    let expected = targets.flatten_all()?.to_dtype(DType::U32)?.to_vec1::<u32>()?;
    if predicted.len() != expected.len() {
        return Err(HarmonicError::ShapeMismatch(format!(
            "targets {:?} do not match logits {:?}",
            targets.dims(),
            logits.dims()
        )));
    }
    if expected.is_empty() {
        return Ok(0.0);
    }
    let correct = predicted.iter().zip(&expected).filter(|(p, e)| p == e).count();
    Ok(correct as f32 / expected.len() as f32)
}

// =============================================================================
// Optimizers
// =============================================================================

/// The candle-nn optimizer driving a training run
pub enum Optimizer {
    /// Adam with decoupled weight decay
    AdamW(candle_nn::optim::AdamW),
    /// Plain stochastic gradient descent
    Sgd(candle_nn::optim::SGD),
}

impl Optimizer {
    /// AdamW with candle-nn's default betas and weight decay
    pub fn adam(vars: Vec<Var>, learning_rate: f64) -> Result<Self> {
        let params = candle_nn::optim::ParamsAdamW {
            lr: learning_rate,
            ..Default::default()
        };
        Ok(Self::AdamW(candle_nn::optim::AdamW::new(vars, params)?))
    }

    pub fn sgd(vars: Vec<Var>, learning_rate: f64) -> Result<Self> {
        Ok(Self::Sgd(candle_nn::optim::SGD::new(vars, learning_rate)?))
    }

    /// AdamW or SGD as `config.use_adam` asks, with its learning rate and weight decay
    pub fn from_config(vars: Vec<Var>, config: &LearningConfig) -> Result<Self> {
        if !config.use_adam {
            return Self::sgd(vars, config.learning_rate);
        }
        let params = candle_nn::optim::ParamsAdamW {
            lr: config.learning_rate,
            weight_decay: config.weight_decay,
            ..Default::default()
        };
        Ok(Self::AdamW(candle_nn::optim::AdamW::new(vars, params)?))
    }

    /// Apply `grads` unchanged
    pub fn step(&mut self, grads: &GradStore) -> Result<()> {
        match self {
            Self::AdamW(opt) => opt.step(grads)?,
            Self::Sgd(opt) => opt.step(grads)?,
        }
        Ok(())
    }

    /// Step with NaN rejection and gradient clipping, see [`safe_optimizer_step`]
    pub fn safe_step(&mut self, grads: &mut GradStore, vars: &[Var], max_grad_norm: f32) -> Result<()> {
        match self {
            Self::AdamW(opt) => safe_optimizer_step(opt, grads, vars, max_grad_norm),
            Self::Sgd(opt) => safe_optimizer_step(opt, grads, vars, max_grad_norm),
        }
    }

    pub fn learning_rate(&self) -> f64 {
        match self {
            Self::AdamW(opt) => opt.learning_rate(),
            Self::Sgd(opt) => opt.learning_rate(),
        }
    }
}

/// Configuration for learning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningConfig {
    /// Learning rate
    pub learning_rate: f64,

    /// Sequences per batch
    pub batch_size: usize,

    /// Tokens per sequence (before shifting)
    pub seq_len: usize,

    /// Gradient clipping threshold
    pub grad_clip: f32,

    /// Use AdamW (true) or SGD (false)
    pub use_adam: bool,

    /// Weight decay for regularization
    pub weight_decay: f64,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.001,
            batch_size: 8,
            seq_len: 32,
            grad_clip: 1.0,
            use_adam: true,
            weight_decay: 0.01,
        }
    }
}

/// Result of a training step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingResult {
    /// Loss value
    pub loss: f32,

    /// Number of target tokens processed
    pub samples: usize,

    /// Gradient norms (for monitoring)
    pub grad_norms: Vec<f32>,

    /// Training step number
    pub step: usize,
}

/// One forward/backward/update pass on `(inputs, targets)`
///
/// Uses [`Optimizer::safe_step`] with `config.grad_clip`. The returned loss
/// is the loss before the update.
pub fn train_step(
    model: &JulesCoderModel,
    optimizer: &mut Optimizer,
    inputs: &Tensor,
    targets: &Tensor,
    config: &LearningConfig,
    step: usize,
) -> Result<TrainingResult> {
    let logits = model.forward(inputs)?;
    let loss = next_token_loss(&logits, targets)?;
    let loss_value = loss.to_scalar::<f32>()?;

    let mut grads = loss.backward()?;
    let vars = model.trainable_vars();
    let grad_norm = compute_grad_norm(&grads, &vars)?;
    optimizer.safe_step(&mut grads, &vars, config.grad_clip)?;

    debug!(step, loss = loss_value, grad_norm, "train step");

    Ok(TrainingResult {
        loss: loss_value,
        samples: targets.elem_count(),
        grad_norms: vec![grad_norm],
        step,
    })
}

/// Loss history with best-loss and plateau tracking
///
/// A step counts as an improvement only when it beats the best loss by more
/// than `min_delta`.
#[derive(Debug, Default)]
pub struct MetricsTracker {
    losses: Vec<f32>,
    best: Option<(usize, f32)>,
    min_delta: f32,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracker that ignores improvements of `min_delta` or less
    pub fn with_min_delta(min_delta: f32) -> Self {
        Self {
            min_delta,
            ..Self::default()
        }
    }

    pub fn record(&mut self, result: &TrainingResult) {
        let index = self.losses.len();
        self.losses.push(result.loss);
        let improved = match self.best {
            Some((_, best)) => result.loss < best - self.min_delta,
            None => result.loss.is_finite(),
        };
        if improved {
            self.best = Some((index, result.loss));
        }
    }

    /// Mean of the last `n` recorded losses
    pub fn average_loss(&self, n: usize) -> Option<f32> {
        let window = &self.losses[self.losses.len().saturating_sub(n)..];
        if window.is_empty() {
            return None;
        }
        Some(window.iter().sum::<f32>() / window.len() as f32)
    }

    /// True once `patience` steps have passed without an improvement
    pub fn has_converged(&self, patience: usize) -> bool {
        let since = match self.best {
            Some((index, _)) => self.losses.len() - 1 - index,
            None => self.losses.len(),
        };
        since >= patience
    }

    pub fn best_loss(&self) -> Option<f32> {
        self.best.map(|(_, loss)| loss)
    }

    pub fn total_steps(&self) -> usize {
        self.losses.len()
    }
}

// =============================================================================
// Gradient Utilities
// =============================================================================

/// Safe optimizer step with gradient clipping
///
/// When gradients contain NaN/Inf, the step is skipped and an error is returned.
/// When the global gradient norm exceeds `max_grad_norm`, every gradient in
/// `grads` is rescaled in place so the norm equals `max_grad_norm`, and the
/// optimizer then steps on the clipped gradients. Optimizer state (AdamW
/// moments and step count) advances exactly as for an unclipped step.
///
/// # Example
///
/// ```ignore
/// let mut grads = loss.backward()?;
/// match safe_optimizer_step(&mut adamw, &mut grads, &vars, 1.0) {
///     Ok(()) => {}
///     Err(HarmonicError::Training(_)) => continue,
///     Err(e) => return Err(e),
/// }
/// ```
pub fn safe_optimizer_step<O: CandleOptimizer>(
    optimizer: &mut O,
    grads: &mut GradStore,
    vars: &[Var],
    max_grad_norm: f32,
) -> Result<()> {
    if !check_gradients_health(grads, vars) {
        warn!("NaN detected in gradients, skipping step");
        return Err(HarmonicError::Training(
            "NaN detected in gradients - skipping step".into(),
        ));
    }

    let total_norm = compute_grad_norm(grads, vars)?;
    if total_norm > max_grad_norm && total_norm > 0.0 {
        let scale = (max_grad_norm / total_norm) as f64;
        debug!(total_norm, max_grad_norm, "Clipping gradients");

        for var in vars {
            if let Some(grad) = grads.remove(var.as_tensor()) {
                grads.insert(var.as_tensor(), grad.affine(scale, 0.0)?);
            }
        }
    }

    optimizer
        .step(grads)
        .map_err(|e| HarmonicError::Training(format!("optimizer step failed: {}", e)))
}

/// Compute the total L2 norm of all gradients
pub fn compute_grad_norm(grads: &GradStore, vars: &[Var]) -> Result<f32> {
    let mut total_sq_norm = 0.0f32;

    for var in vars {
        if let Some(grad) = grads.get(var.as_tensor()) {
            total_sq_norm += grad.sqr()?.sum_all()?.to_scalar::<f32>()?;
        }
    }

    Ok(total_sq_norm.sqrt())
}

/// Check if any gradient contains NaN or Inf
///
/// Returns true if gradients are healthy (no NaN/Inf).
pub fn check_gradients_health(grads: &GradStore, vars: &[Var]) -> bool {
    for var in vars {
        if let Some(grad) = grads.get(var.as_tensor()) {
            if let Ok(vals) = grad.flatten_all().and_then(|t| t.to_vec1::<f32>()) {
                if vals.iter().any(|v| !v.is_finite()) {
                    return false;
                }
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HarmonicConfig;
    use candle_core::Device;

    fn device() -> Device {
        Device::Cpu
    }

    fn tiny_model() -> JulesCoderModel {
        JulesCoderModel::new(HarmonicConfig::new(10, 8).with_depth(1), &device()).unwrap()
    }

    fn batch() -> Tensor {
        Tensor::new(&[[1u32, 2, 3, 4, 5, 6], [6u32, 5, 4, 3, 2, 1]], &device()).unwrap()
    }

    #[test]
    fn test_learning_config_default() {
        let config = LearningConfig::default();
        assert_eq!(config.learning_rate, 0.001);
        assert!(config.use_adam);
    }

    #[test]
    fn test_training_metrics_builder() {
        let metrics = TrainingMetrics::new("jules", 10, 0.15)
            .with_accuracy(0.92)
            .with_tokens(1000)
            .with_duration_ms(5000);

        assert_eq!(metrics.model, "jules");
        assert_eq!(metrics.epoch, 10);
        assert!((metrics.loss - 0.15).abs() < 0.001);
        assert_eq!(metrics.accuracy, Some(0.92));
        assert_eq!(metrics.tokens_trained, 1000);
        assert_eq!(metrics.duration_ms, 5000);
        assert!((metrics.perplexity() - 0.15f32.exp()).abs() < 1e-6);
    }

    #[test]
    fn test_training_metrics_serde() {
        let metrics = TrainingMetrics::new("jules", 5, 0.25).with_accuracy(0.88);

        let json = serde_json::to_string(&metrics).unwrap();
        let parsed: TrainingMetrics = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.model, "jules");
        assert_eq!(parsed.epoch, 5);
        assert_eq!(parsed.accuracy, Some(0.88));
    }

    #[test]
    fn test_shift_for_next_token() {
        let (inputs, targets) = shift_for_next_token(&batch()).unwrap();
        assert_eq!(inputs.dims(), &[2, 5]);
        assert_eq!(targets.dims(), &[2, 5]);
        assert_eq!(targets.to_vec2::<u32>().unwrap()[0], vec![2, 3, 4, 5, 6]);

        let single = Tensor::new(&[[1u32]], &device()).unwrap();
        assert!(matches!(
            shift_for_next_token(&single).unwrap_err(),
            HarmonicError::Training(_)
        ));
    }

    #[test]
    fn test_next_token_loss_uniform_logits() {
        // Equal logits → loss = ln(vocab)
        let logits = Tensor::ones((2, 3, 4), DType::F32, &device()).unwrap();
        let targets = Tensor::new(&[[0u32, 1, 2], [3, 0, 1]], &device()).unwrap();

        let loss = next_token_loss(&logits, &targets).unwrap().to_scalar::<f32>().unwrap();
        assert!((loss - 4f32.ln()).abs() < 1e-5);

        let wrong = Tensor::new(&[[0u32, 1]], &device()).unwrap();
        assert!(next_token_loss(&logits, &wrong).is_err());
    }

    #[test]
    fn test_next_token_accuracy() {
        let logits = Tensor::new(
            &[[[0.0f32, 5.0, 0.0], [3.0, 0.0, 0.0]]],
            &device(),
        )
        .unwrap();
        let targets = Tensor::new(&[[1u32, 2]], &device()).unwrap();
        assert_eq!(next_token_accuracy(&logits, &targets).unwrap(), 0.5);
    }

    #[test]
    fn test_adamw_step_changes_loss() {
        let model = tiny_model();
        let (inputs, targets) = shift_for_next_token(&batch()).unwrap();
        let mut optimizer = Optimizer::adam(model.trainable_vars(), 0.01).unwrap();

        let before = next_token_loss(&model.forward(&inputs).unwrap(), &targets).unwrap();
        let grads = before.backward().unwrap();
        assert!(check_gradients_health(&grads, &model.trainable_vars()));
        optimizer.step(&grads).unwrap();

        let after = next_token_loss(&model.forward(&inputs).unwrap(), &targets).unwrap();
        let before = before.to_scalar::<f32>().unwrap();
        let after = after.to_scalar::<f32>().unwrap();
        assert!((before - after).abs() > 1e-7, "loss unchanged: {}", before);
    }

    #[test]
    fn test_train_step_reduces_loss() {
        let model = tiny_model();
        let (inputs, targets) = shift_for_next_token(&batch()).unwrap();
        let config = LearningConfig {
            learning_rate: 0.02,
            grad_clip: 1.0,
            weight_decay: 0.0,
            ..Default::default()
        };
        let mut optimizer = Optimizer::from_config(model.trainable_vars(), &config).unwrap();
        let mut tracker = MetricsTracker::new();

        for step in 0..30 {
            let result = train_step(&model, &mut optimizer, &inputs, &targets, &config, step).unwrap();
            assert_eq!(result.samples, 10);
            tracker.record(&result);
        }

        let first = tracker.average_loss(30).unwrap();
        let last = tracker.average_loss(3).unwrap();
        assert!(last < first, "loss did not decrease: {} -> {}", first, last);
        assert!(model.check_weights_health().is_none());
    }

    #[test]
    fn test_grad_norm_and_clipping() {
        let w = Var::new(&[3.0f32, 4.0], &device()).unwrap();
        let loss = w.as_tensor().sum_all().unwrap().affine(1.0, 0.0).unwrap();
        let mut grads = loss.backward().unwrap();
        let vars = vec![w.clone()];

        // d(sum)/dw = [1, 1]
        let norm = compute_grad_norm(&grads, &vars).unwrap();
        assert!((norm - 2f32.sqrt()).abs() < 1e-6);

        let mut sgd = candle_nn::optim::SGD::new(vars.clone(), 1.0).unwrap();
        safe_optimizer_step(&mut sgd, &mut grads, &vars, 0.5).unwrap();

        // Clipped to norm 0.5: each component moves by 0.5/√2
        let step = 0.5 / 2f32.sqrt();
        let values = w.as_tensor().to_vec1::<f32>().unwrap();
        assert!((values[0] - (3.0 - step)).abs() < 1e-5);
        assert!((values[1] - (4.0 - step)).abs() < 1e-5);
    }

    #[test]
    fn test_clipped_adamw_step_matches_prescaled_gradients() {
        let params = candle_nn::optim::ParamsAdamW {
            lr: 0.1,
            weight_decay: 0.0,
            ..Default::default()
        };

        // Gradient [10, 10], norm 10·√2, clipped to 1
        let clipped = Var::new(&[3.0f32, 4.0], &device()).unwrap();
        let loss = clipped.as_tensor().sum_all().unwrap().affine(10.0, 0.0).unwrap();
        let mut grads = loss.backward().unwrap();
        let vars = vec![clipped.clone()];
        let mut adamw = candle_nn::optim::AdamW::new(vars.clone(), params.clone()).unwrap();
        safe_optimizer_step(&mut adamw, &mut grads, &vars, 1.0).unwrap();

        let clipped_grad = grads.get(clipped.as_tensor()).unwrap().to_vec1::<f32>().unwrap();
        let expected = std::f32::consts::FRAC_1_SQRT_2;
        assert!(clipped_grad.iter().all(|g| (g - expected).abs() < 1e-5));

        // Same optimizer fed the already-clipped gradient [1/√2, 1/√2]
        let reference = Var::new(&[3.0f32, 4.0], &device()).unwrap();
        let loss = reference
            .as_tensor()
            .sum_all()
            .unwrap()
            .affine(expected as f64, 0.0)
            .unwrap();
        let grads = loss.backward().unwrap();
        let mut adamw = candle_nn::optim::AdamW::new(vec![reference.clone()], params).unwrap();
        adamw.step(&grads).unwrap();

        let got = clipped.as_tensor().to_vec1::<f32>().unwrap();
        let want = reference.as_tensor().to_vec1::<f32>().unwrap();
        for (g, w) in got.iter().zip(want.iter()) {
            assert!((g - w).abs() < 1e-5, "{} vs {}", g, w);
        }

        // First AdamW step moves each weight by about lr, not lr·|g|
        assert!((3.0 - got[0] - 0.1).abs() < 1e-3, "moved by {}", 3.0 - got[0]);
    }

    #[test]
    fn test_nan_gradients_rejected() {
        let w = Var::new(&[1.0f32, -1.0], &device()).unwrap();
        // sqrt'(x) at -1 is NaN
        let loss = w.as_tensor().sqrt().unwrap().sum_all().unwrap();
        let mut grads = loss.backward().unwrap();
        let vars = vec![w.clone()];

        assert!(!check_gradients_health(&grads, &vars));

        let mut sgd = candle_nn::optim::SGD::new(vars.clone(), 0.1).unwrap();
        let err = safe_optimizer_step(&mut sgd, &mut grads, &vars, 1.0).unwrap_err();
        assert!(matches!(err, HarmonicError::Training(_)));
        assert_eq!(w.as_tensor().to_vec1::<f32>().unwrap(), vec![1.0, -1.0]);
    }

    #[test]
    fn test_metrics_tracker() {
        let mut tracker = MetricsTracker::new();

        tracker.record(&TrainingResult {
            loss: 1.0,
            samples: 32,
            grad_norms: vec![],
            step: 0,
        });

        tracker.record(&TrainingResult {
            loss: 0.5,
            samples: 32,
            grad_norms: vec![],
            step: 1,
        });

        assert_eq!(tracker.best_loss(), Some(0.5));
        assert_eq!(tracker.total_steps(), 2);
        assert!((tracker.average_loss(2).unwrap() - 0.75).abs() < 0.001);
    }

    #[test]
    fn test_convergence_detection() {
        let mut tracker = MetricsTracker::new();

        // Improving
        for i in 0..5 {
            tracker.record(&TrainingResult {
                loss: 1.0 - i as f32 * 0.1,
                samples: 32,
                grad_norms: vec![],
                step: i,
            });
        }
        assert!(!tracker.has_converged(3));

        // Plateau
        for i in 5..10 {
            tracker.record(&TrainingResult {
                loss: 0.7,
                samples: 32,
                grad_norms: vec![],
                step: i,
            });
        }
        assert!(tracker.has_converged(3));
    }

    #[test]
    fn test_min_delta_ignores_tiny_improvements() {
        let mut tracker = MetricsTracker::with_min_delta(0.01);
        for (step, loss) in [1.0f32, 0.995, 0.992, 0.991].into_iter().enumerate() {
            tracker.record(&TrainingResult {
                loss,
                samples: 8,
                grad_norms: vec![],
                step,
            });
        }
        assert_eq!(tracker.best_loss(), Some(1.0));
        assert!(tracker.has_converged(3));
        assert!(MetricsTracker::new().average_loss(5).is_none());
    }
}
