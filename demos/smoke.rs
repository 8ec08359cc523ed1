//! End-to-end smoke run
//!
//! Builds a small model, runs a forward pass and a structural binding.
//!
//! Run with:
//! ```bash
//! cargo run --example smoke
//! ```

use jules_coder::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .compact()
        .init();

    let device = best_device();

    // 1. Model: vocab 100, dim 64, two blocks
    let config = HarmonicConfig::new(100, 64).with_depth(2);
    let model = JulesCoderModel::new(config, &device)?;
    println!("Model has {} parameters", model.param_count());

    // 2. Forward: batch 2, seq 10
    let ids: Vec<u32> = (0..20).map(|i| (i * 13 + 1) % 100).collect();
    let ids = Tensor::from_vec(ids, (2, 10), &device)?;
    let logits = model.forward(&ids)?;
    println!("Output shape: {:?}", logits.dims());
    println!("Output dtype: {:?} (real-valued magnitudes)", logits.dtype());

    // 3. Holographic binding of two random complex vectors
    let role = ComplexTensor::randn(64, &device)?;
    let filler = ComplexTensor::randn(64, &device)?;
    let bound = model.bind_structure(&role, &filler)?;
    println!("Bound shape: {:?} (complex)", bound.dims());

    Ok(())
}
