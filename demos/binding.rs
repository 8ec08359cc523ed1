//! Holographic binding and unbinding
//!
//! Binds several role/filler pairs into one superposed trace and recovers
//! each filler by unbinding with its role.
//!
//! Run with:
//! ```bash
//! cargo run --example binding
//! ```

use jules_coder::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .compact()
        .init();

    let device = cpu_device();
    let dim = 512;
    let binder = HolographicBinder::new(dim)?;

    let names = ["subject", "verb", "object"];
    let roles = names
        .iter()
        .map(|_| ComplexTensor::randn(dim, &device))
        .collect::<Result<Vec<_>>>()?;
    let fillers = names
        .iter()
        .map(|_| ComplexTensor::randn(dim, &device))
        .collect::<Result<Vec<_>>>()?;

    // Superpose all bindings in one trace
    let mut trace = ComplexTensor::zeros(dim, &device)?;
    for (role, filler) in roles.iter().zip(&fillers) {
        trace = trace.add(&binder.bind(role, filler)?)?;
    }

    println!("--- Recovery from a {}-way superposition ---", names.len());
    for (i, name) in names.iter().enumerate() {
        let recovered = binder.unbind(&trace, &roles[i])?;
        let own = cosine_similarity(&recovered, &fillers[i])?;
        let other = cosine_similarity(&recovered, &fillers[(i + 1) % names.len()])?;
        println!("{:>8}: similarity to own filler {:.3}, to another {:.3}", name, own, other);
    }

    // Exact recovery with an impulse key
    let key = binder.impulse(7, &device)?;
    let shifted = binder.bind(&key, &fillers[0])?;
    let exact = binder.unbind(&shifted, &key)?;
    println!("Impulse key recovery: {:.6}", cosine_similarity(&exact, &fillers[0])?);

    Ok(())
}
