//! Holographic binding operations
//!
//! Implements binding and unbinding of complex vectors for holographic
//! reduced representations (HRR).
//!
//! ## Operations
//!
//! - **Bind (⊗)**: Circular convolution, `IFFT(FFT(a) ⊙ FFT(b))`
//! - **Unbind (⊘)**: Circular correlation, `IFFT(FFT(h) ⊙ conj(FFT(key)))`
//!
//! The transforms run on the host through `rustfft`. Binding is an auxiliary
//! structural operation outside the model's differentiable forward path.

use std::sync::Arc;

use candle_core::Device;
use parking_lot::Mutex;
use rustfft::{num_complex::Complex32, Fft, FftPlanner};
use tracing::debug;

use crate::primitives::ComplexTensor;
use crate::{HarmonicError, Result};

/// Circular-convolution binder for complex vectors
///
/// Inputs are `[n]` vectors or batches `[.., n]` of any length `n`; the
/// transform runs over the trailing dimension. Plans are built on first use
/// of each length and cached by the planner. `dim` is only the default
/// length for [`identity`](Self::identity) and [`impulse`](Self::impulse).
///
/// # Properties
/// - Commutative: a ⊗ b = b ⊗ a
/// - Associative: (a ⊗ b) ⊗ c = a ⊗ (b ⊗ c)
/// - Identity: the impulse `[1, 0, .., 0]` (spectrum of all ones)
/// - Exact inverse via [`unbind`](Self::unbind) for keys whose spectrum has
///   unit magnitude (e.g. shifted impulses); approximate otherwise
#[derive(Clone)]
pub struct HolographicBinder {
    dim: usize,
    planner: Arc<Mutex<FftPlanner<f32>>>,
}

impl std::fmt::Debug for HolographicBinder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HolographicBinder")
            .field("dim", &self.dim)
            .finish_non_exhaustive()
    }
}

impl HolographicBinder {
    /// Binder whose identity and impulse keys have length `dim`
    ///
    /// The transforms for `dim` are planned up front.
    pub fn new(dim: usize) -> Result<Self> {
        if dim == 0 {
            return Err(HarmonicError::Config(
                "Binder dimension must be positive".into(),
            ));
        }

        let binder = Self {
            dim,
            planner: Arc::new(Mutex::new(FftPlanner::new())),
        };
        binder.plans(dim);
        Ok(binder)
    }

    /// Default vector length for identity and impulse keys
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Bind a role to a filler via circular convolution
    ///
    /// # Example
    /// ```rust,ignore
    /// let binder = HolographicBinder::new(64)?;
    /// let bound = binder.bind(&function_name_role, &main_filler)?;
    /// ```
    pub fn bind(&self, role: &ComplexTensor, filler: &ComplexTensor) -> Result<ComplexTensor> {
        let len = Self::ensure_compatible(role, filler, "bind")?;
        let (fft, ifft) = self.plans(len);

        let mut role_spectrum = role.to_complex_vec()?;
        let mut filler_spectrum = filler.to_complex_vec()?;
        fft.process(&mut role_spectrum);
        fft.process(&mut filler_spectrum);

        for (r, f) in role_spectrum.iter_mut().zip(filler_spectrum.iter()) {
            *r = *r * f;
        }

        debug!(len, dims = ?role.dims(), "holographic bind");
        Self::inverse(ifft.as_ref(), len, role_spectrum, role.dims(), role.device())
    }

    /// Recover the partner of `key` from a bound trace via circular correlation
    ///
    /// If `trace = key ⊗ value`, then `unbind(trace, key) ≈ value`.
    pub fn unbind(&self, trace: &ComplexTensor, key: &ComplexTensor) -> Result<ComplexTensor> {
        let len = Self::ensure_compatible(trace, key, "unbind")?;
        let (fft, ifft) = self.plans(len);

        let mut trace_spectrum = trace.to_complex_vec()?;
        let mut key_spectrum = key.to_complex_vec()?;
        fft.process(&mut trace_spectrum);
        fft.process(&mut key_spectrum);

        for (t, k) in trace_spectrum.iter_mut().zip(key_spectrum.iter()) {
            *t = *t * k.conj();
        }

        debug!(len, dims = ?trace.dims(), "holographic unbind");
        Self::inverse(ifft.as_ref(), len, trace_spectrum, trace.dims(), trace.device())
    }

    /// The binding identity: an impulse at index 0
    pub fn identity(&self, device: &Device) -> Result<ComplexTensor> {
        self.impulse(0, device)
    }

    /// Impulse at `shift`; binding with it rotates a vector by `shift` places
    pub fn impulse(&self, shift: usize, device: &Device) -> Result<ComplexTensor> {
        let mut data = vec![Complex32::new(0.0, 0.0); self.dim];
        data[shift % self.dim] = Complex32::new(1.0, 0.0);
        ComplexTensor::from_complex_vec(&data, self.dim, device)
    }

    /// Forward and inverse plans for length `len` (cached by the planner)
    fn plans(&self, len: usize) -> (Arc<dyn Fft<f32>>, Arc<dyn Fft<f32>>) {
        let mut planner = self.planner.lock();
        (planner.plan_fft_forward(len), planner.plan_fft_inverse(len))
    }

    fn inverse(
        ifft: &dyn Fft<f32>,
        len: usize,
        mut spectrum: Vec<Complex32>,
        dims: &[usize],
        device: &Device,
    ) -> Result<ComplexTensor> {
        ifft.process(&mut spectrum);
        let norm_factor = 1.0 / len as f32;
        for value in spectrum.iter_mut() {
            *value = *value * norm_factor;
        }
        ComplexTensor::from_complex_vec(&spectrum, dims, device)
    }

    /// Same shape on both sides and a non-empty trailing dimension; returns its length
    fn ensure_compatible(a: &ComplexTensor, b: &ComplexTensor, op: &str) -> Result<usize> {
        if a.dims() != b.dims() {
            return Err(HarmonicError::ShapeMismatch(format!(
                "Shape mismatch for {}: {:?} vs {:?}",
                op,
                a.dims(),
                b.dims()
            )));
        }
        match a.dims().last() {
            Some(&len) if len > 0 => Ok(len),
            _ => Err(HarmonicError::ShapeMismatch(format!(
                "{} needs a non-empty trailing dimension, got {:?}",
                op,
                a.dims()
            ))),
        }
    }
}

/// Complex cosine similarity: `Re⟨a, b⟩ / (‖a‖·‖b‖)`
///
/// Returns a scalar in [-1, 1]; 0 when either vector is (near) zero.
pub fn cosine_similarity(a: &ComplexTensor, b: &ComplexTensor) -> Result<f32> {
    if a.dims() != b.dims() {
        return Err(HarmonicError::ShapeMismatch(format!(
            "Shape mismatch for similarity: {:?} vs {:?}",
            a.dims(),
            b.dims()
        )));
    }

    let a_values = a.to_complex_vec()?;
    let b_values = b.to_complex_vec()?;

    let dot: f32 = a_values
        .iter()
        .zip(b_values.iter())
        .map(|(x, y)| (x * y.conj()).re)
        .sum();
    let norm_a: f32 = a_values.iter().map(|x| x.norm_sqr()).sum::<f32>().sqrt();
    let norm_b: f32 = b_values.iter().map(|y| y.norm_sqr()).sum::<f32>().sqrt();

    if norm_a > 1e-8 && norm_b > 1e-8 {
        Ok(dot / (norm_a * norm_b))
    } else {
        Ok(0.0)
    }
}
