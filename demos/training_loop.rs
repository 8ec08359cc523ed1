//! Training loop with gradient descent
//!
//! Demonstrates: model → forward → next-token loss → backward → clipped step
//! → checkpoint with metadata
//!
//! Run with:
//! ```bash
//! cargo run --example training_loop
//! ```

use std::time::Instant;

use jules_coder::prelude::*;
use jules_coder::training::next_token_accuracy;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .compact()
        .init();

    let device = best_device();

    // 1. Model
    let config = HarmonicConfig::new(16, 32).with_depth(2);
    let model = JulesCoderModel::new(config, &device)?;

    // 2. Toy corpus: counting sequences modulo the vocabulary
    let learning = LearningConfig {
        learning_rate: 0.01,
        batch_size: 4,
        seq_len: 12,
        ..Default::default()
    };
    let ids: Vec<u32> = (0..learning.batch_size)
        .flat_map(|b| (0..learning.seq_len).map(move |t| ((b * 3 + t) % 16) as u32))
        .collect();
    let batch = Tensor::from_vec(ids, (learning.batch_size, learning.seq_len), &device)?;
    let (inputs, targets) = shift_for_next_token(&batch)?;

    // 3. Optimizer
    let mut optimizer = Optimizer::from_config(model.trainable_vars(), &learning)?;
    let mut tracker = MetricsTracker::new();

    // 4. Training loop
    println!("\n--- Training ---");
    for epoch in 0..60u64 {
        let started = Instant::now();
        let result = match train_step(&model, &mut optimizer, &inputs, &targets, &learning, epoch as usize) {
            Ok(result) => result,
            Err(HarmonicError::Training(msg)) => {
                warn!(epoch, %msg, "Skipping step");
                continue;
            }
            Err(e) => return Err(e),
        };
        tracker.record(&result);

        if epoch % 10 == 0 {
            let accuracy = next_token_accuracy(&model.forward(&inputs)?, &targets)?;
            let metrics = TrainingMetrics::new("counting", epoch, result.loss)
                .with_accuracy(accuracy)
                .with_tokens(result.samples)
                .with_duration_ms(started.elapsed().as_millis() as u64);
            info!(
                epoch,
                loss = metrics.loss,
                perplexity = metrics.perplexity(),
                lr = optimizer.learning_rate(),
                accuracy,
                grad_norm = result.grad_norms.first().copied().unwrap_or(0.0),
                "epoch"
            );
        }

        if tracker.has_converged(15) {
            println!("Converged after {} steps", tracker.total_steps());
            break;
        }
    }

    if let Some((name, issue)) = model.check_weights_health() {
        warn!(%name, issue, "Weights unhealthy after training");
    }

    // 5. Checkpoint
    let path = std::env::temp_dir().join("jules_counting.safetensors");
    let meta = model.save_with_metadata(&path, "v0.1.0")?;
    println!(
        "\nSaved {} parameters to {} (best loss {:.4})",
        meta.param_count,
        path.display(),
        tracker.best_loss().unwrap_or(f32::NAN)
    );

    Ok(())
}
