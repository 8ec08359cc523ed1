//! Complex Tensors
//!
//! candle has no complex dtype, so a complex tensor is a pair of F32 tensors
//! of identical shape: the real part and the imaginary part. Every operation
//! is expressed on the pair, which keeps autograd flowing through all of them
//! (except [`ComplexTensor::angle`], which is computed on the host).

use candle_core::{DType, Device, Shape, Tensor, D};
use rustfft::num_complex::Complex32;
use crate::{HarmonicError, Result};

/// Complex tensor as struct-of-arrays: `re + i·im`
#[derive(Debug, Clone)]
pub struct ComplexTensor {
    re: Tensor,
    im: Tensor,
}

impl ComplexTensor {
    /// Pair a real and an imaginary part
    ///
    /// Both parts must be F32 and have the same shape.
    pub fn new(re: Tensor, im: Tensor) -> Result<Self> {
        if re.dtype() != DType::F32 || im.dtype() != DType::F32 {
            return Err(HarmonicError::InvalidDType(format!(
                "complex parts must be f32, got {:?} and {:?}",
                re.dtype(),
                im.dtype()
            )));
        }
        if re.dims() != im.dims() {
            return Err(HarmonicError::ShapeMismatch(format!(
                "real part {:?} vs imaginary part {:?}",
                re.dims(),
                im.dims()
            )));
        }
        Ok(Self { re, im })
    }

    /// Lift a real tensor (imaginary part zero)
    pub fn from_real(re: Tensor) -> Result<Self> {
        let im = re.zeros_like()?;
        Self::new(re, im)
    }

    /// Polar construction: `r·cos θ + i·r·sin θ`
    pub fn from_polar(magnitude: &Tensor, phase: &Tensor) -> Result<Self> {
        if magnitude.dims() != phase.dims() {
            return Err(HarmonicError::ShapeMismatch(format!(
                "magnitude {:?} vs phase {:?}",
                magnitude.dims(),
                phase.dims()
            )));
        }
        let re = magnitude.mul(&phase.cos()?)?;
        let im = magnitude.mul(&phase.sin()?)?;
        Self::new(re, im)
    }

    /// All-zero complex tensor
    pub fn zeros<S: Into<Shape>>(shape: S, device: &Device) -> Result<Self> {
        let shape: Shape = shape.into();
        let re = Tensor::zeros(shape.clone(), DType::F32, device)?;
        let im = Tensor::zeros(shape, DType::F32, device)?;
        Self::new(re, im)
    }

    /// Standard complex normal: each part drawn from N(0, 1/2), so E|z|² = 1
    pub fn randn<S: Into<Shape>>(shape: S, device: &Device) -> Result<Self> {
        Self::randn_scaled(shape, std::f32::consts::FRAC_1_SQRT_2, device)
    }

    /// Complex normal with the given per-part standard deviation
    pub fn randn_scaled<S: Into<Shape>>(shape: S, std: f32, device: &Device) -> Result<Self> {
        let shape: Shape = shape.into();
        let re = Tensor::randn(0.0f32, std, shape.clone(), device)?;
        let im = Tensor::randn(0.0f32, std, shape, device)?;
        Self::new(re, im)
    }

    /// Complex uniform: each part drawn from U(-bound, bound)
    pub fn rand_uniform<S: Into<Shape>>(shape: S, bound: f32, device: &Device) -> Result<Self> {
        let shape: Shape = shape.into();
        let re = Tensor::rand(-bound, bound, shape.clone(), device)?;
        let im = Tensor::rand(-bound, bound, shape, device)?;
        Self::new(re, im)
    }

    /// Build from host complex values in row-major order
    pub fn from_complex_vec<S: Into<Shape>>(
        data: &[Complex32],
        shape: S,
        device: &Device,
    ) -> Result<Self> {
        let shape: Shape = shape.into();
        if shape.elem_count() != data.len() {
            return Err(HarmonicError::ShapeMismatch(format!(
                "{} values cannot fill shape {:?}",
                data.len(),
                shape.dims()
            )));
        }
        let re: Vec<f32> = data.iter().map(|c| c.re).collect();
        let im: Vec<f32> = data.iter().map(|c| c.im).collect();
        Self::new(
            Tensor::from_vec(re, shape.clone(), device)?,
            Tensor::from_vec(im, shape, device)?,
        )
    }

    /// Copy to host complex values in row-major order
    pub fn to_complex_vec(&self) -> Result<Vec<Complex32>> {
        let re = self.re.flatten_all()?.to_vec1::<f32>()?;
        let im = self.im.flatten_all()?.to_vec1::<f32>()?;
        Ok(re
            .into_iter()
            .zip(im)
            .map(|(re, im)| Complex32::new(re, im))
            .collect())
    }

    /// Real part
    pub fn re(&self) -> &Tensor {
        &self.re
    }

    /// Imaginary part
    pub fn im(&self) -> &Tensor {
        &self.im
    }

    pub fn dims(&self) -> &[usize] {
        self.re.dims()
    }

    pub fn rank(&self) -> usize {
        self.re.rank()
    }

    pub fn elem_count(&self) -> usize {
        self.re.elem_count()
    }

    pub fn device(&self) -> &Device {
        self.re.device()
    }

    /// Size of the trailing (feature) dimension
    pub fn feature_dim(&self) -> Result<usize> {
        Ok(self.re.dim(D::Minus1)?)
    }

    pub fn reshape<S: Into<Shape>>(&self, shape: S) -> Result<Self> {
        let shape: Shape = shape.into();
        Self::new(self.re.reshape(shape.clone())?, self.im.reshape(shape)?)
    }

    fn ensure_same_shape(&self, other: &Self, op: &str) -> Result<()> {
        if self.dims() != other.dims() {
            return Err(HarmonicError::ShapeMismatch(format!(
                "{}: {:?} vs {:?}",
                op,
                self.dims(),
                other.dims()
            )));
        }
        Ok(())
    }

    pub fn add(&self, other: &Self) -> Result<Self> {
        self.ensure_same_shape(other, "add")?;
        Self::new(self.re.add(&other.re)?, self.im.add(&other.im)?)
    }

    pub fn sub(&self, other: &Self) -> Result<Self> {
        self.ensure_same_shape(other, "sub")?;
        Self::new(self.re.sub(&other.re)?, self.im.sub(&other.im)?)
    }

    /// Add with broadcasting (e.g. a `[dim]` bias onto `[batch, seq, dim]`)
    pub fn broadcast_add(&self, other: &Self) -> Result<Self> {
        Self::new(
            self.re.broadcast_add(&other.re)?,
            self.im.broadcast_add(&other.im)?,
        )
    }

    /// Elementwise complex product: `(a + ib)(c + id) = (ac - bd) + i(ad + bc)`
    pub fn mul(&self, other: &Self) -> Result<Self> {
        self.ensure_same_shape(other, "mul")?;
        let re = self.re.mul(&other.re)?.sub(&self.im.mul(&other.im)?)?;
        let im = self.re.mul(&other.im)?.add(&self.im.mul(&other.re)?)?;
        Self::new(re, im)
    }

    /// Multiply both parts by a real tensor (broadcasting)
    pub fn mul_real(&self, factor: &Tensor) -> Result<Self> {
        Self::new(
            self.re.broadcast_mul(factor)?,
            self.im.broadcast_mul(factor)?,
        )
    }

    /// Multiply by a real scalar
    pub fn scale(&self, factor: f64) -> Result<Self> {
        Self::new(self.re.affine(factor, 0.0)?, self.im.affine(factor, 0.0)?)
    }

    /// Complex conjugate
    pub fn conj(&self) -> Result<Self> {
        Self::new(self.re.clone(), self.im.neg()?)
    }

    /// Complex matrix product over the last two dims, broadcasting batch dims
    ///
    /// A rank-1 left operand is treated as a single row.
    pub fn matmul(&self, rhs: &Self) -> Result<Self> {
        // (A + iB)(C + iD) = (AC - BD) + i(AD + BC)
        let ac = real_matmul(&self.re, &rhs.re)?;
        let bd = real_matmul(&self.im, &rhs.im)?;
        let ad = real_matmul(&self.re, &rhs.im)?;
        let bc = real_matmul(&self.im, &rhs.re)?;
        Self::new(ac.sub(&bd)?, ad.add(&bc)?)
    }

    /// Apply real mixing weights `[.., m, n]` to this `[.., n, d]` tensor
    pub fn apply_real_weights(&self, weights: &Tensor) -> Result<Self> {
        Self::new(
            real_matmul(weights, &self.re)?,
            real_matmul(weights, &self.im)?,
        )
    }

    /// Real part of the Hermitian products `Re(self · otherᴴ)`
    ///
    /// For `[.., m, d]` and `[.., n, d]` inputs the result is `[.., m, n]`:
    /// `Re(Σ_k a_k · conj(b_k)) = Σ_k (a.re·b.re + a.im·b.im)`.
    pub fn hermitian_real(&self, other: &Self) -> Result<Tensor> {
        let other_re_t = other.re.transpose(D::Minus2, D::Minus1)?.contiguous()?;
        let other_im_t = other.im.transpose(D::Minus2, D::Minus1)?.contiguous()?;
        let re = real_matmul(&self.re, &other_re_t)?;
        let im = real_matmul(&self.im, &other_im_t)?;
        Ok(re.add(&im)?)
    }

    /// |z|² elementwise
    pub fn norm_sqr(&self) -> Result<Tensor> {
        Ok(self.re.sqr()?.add(&self.im.sqr()?)?)
    }

    /// |z| elementwise
    ///
    /// The gradient is zero where `z = 0` instead of the unbounded `1/2√0`.
    pub fn abs(&self) -> Result<Tensor> {
        let norm_sqr = self.norm_sqr()?;
        let zeros = norm_sqr.zeros_like()?;
        let nonzero = norm_sqr.gt(&zeros)?;
        let safe = nonzero.where_cond(&norm_sqr, &norm_sqr.ones_like()?)?;
        Ok(nonzero.where_cond(&safe.sqrt()?, &zeros)?)
    }

    /// Polar decomposition: magnitude and unit phasor `e^{i·arg z}`
    ///
    /// Where |z| = 0 the phasor is 1 (arg 0 = 0).
    pub fn to_polar(&self) -> Result<(Tensor, Self)> {
        let magnitude = self.abs()?;
        let zeros = magnitude.zeros_like()?;
        let ones = magnitude.ones_like()?;
        let nonzero = magnitude.gt(&zeros)?;
        let safe = nonzero.where_cond(&magnitude, &ones)?;

        let re = nonzero.where_cond(&self.re.div(&safe)?, &ones)?;
        let im = nonzero.where_cond(&self.im.div(&safe)?, &zeros)?;
        Ok((magnitude, Self::new(re, im)?))
    }

    /// Unit phasor `e^{i·arg z}`
    pub fn unit_phase(&self) -> Result<Self> {
        Ok(self.to_polar()?.1)
    }

    /// Phase angle `arg z` in (-π, π]
    ///
    /// Computed on the host with `atan2`; the result carries no gradient.
    pub fn angle(&self) -> Result<Tensor> {
        let re = self.re.flatten_all()?.to_vec1::<f32>()?;
        let im = self.im.flatten_all()?.to_vec1::<f32>()?;
        let angles: Vec<f32> = re.iter().zip(&im).map(|(r, i)| i.atan2(*r)).collect();
        Ok(Tensor::from_vec(angles, self.dims(), self.device())?)
    }

    /// True when every real and imaginary component is finite
    pub fn all_finite(&self) -> Result<bool> {
        for part in [&self.re, &self.im] {
            let values = part.flatten_all()?.to_vec1::<f32>()?;
            if values.iter().any(|v| !v.is_finite()) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Real matmul over the last two dims with broadcast batch dims
///
/// A rank-1 left operand is treated as one row and the row axis is dropped
/// from the result.
pub fn real_matmul(lhs: &Tensor, rhs: &Tensor) -> Result<Tensor> {
    if rhs.rank() < 2 {
        return Err(HarmonicError::ShapeMismatch(format!(
            "matmul right operand must be at least rank 2, got {:?}",
            rhs.dims()
        )));
    }
    let inner_lhs = lhs.dim(D::Minus1)?;
    let inner_rhs = rhs.dim(D::Minus2)?;
    if inner_lhs != inner_rhs {
        return Err(HarmonicError::ShapeMismatch(format!(
            "matmul inner dims: {:?} x {:?}",
            lhs.dims(),
            rhs.dims()
        )));
    }

    if lhs.rank() == 1 {
        let row = lhs.unsqueeze(0)?;
        return Ok(row.broadcast_matmul(rhs)?.squeeze(D::Minus2)?);
    }
    Ok(lhs.broadcast_matmul(rhs)?)
}
