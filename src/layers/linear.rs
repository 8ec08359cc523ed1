//! Complex affine layer: `z·W + b`

use candle_core::{Device, Var};
use crate::primitives::ComplexTensor;
use crate::{HarmonicError, Result};

/// Complex linear layer
///
/// Weight `[in_dim, out_dim]` and bias `[out_dim]`, each stored as a pair of
/// trainable real variables.
#[derive(Debug)]
pub struct ComplexLinear {
    in_dim: usize,
    out_dim: usize,
    weight_re: Var,
    weight_im: Var,
    bias_re: Var,
    bias_im: Var,
}

impl ComplexLinear {
    /// Uniform init in ±1/√in_dim for weight and bias parts
    pub fn new(in_dim: usize, out_dim: usize, device: &Device) -> Result<Self> {
        let bound = 1.0f32 / (in_dim.max(1) as f32).sqrt();
        let weight = ComplexTensor::rand_uniform((in_dim, out_dim), bound, device)?;
        let bias = ComplexTensor::rand_uniform(out_dim, bound, device)?;
        Self::from_parts(weight, bias)
    }

    /// Complex normal init with per-part standard deviation `std`
    pub fn from_normal(in_dim: usize, out_dim: usize, std: f32, device: &Device) -> Result<Self> {
        let weight = ComplexTensor::randn_scaled((in_dim, out_dim), std, device)?;
        let bias = ComplexTensor::randn_scaled(out_dim, std, device)?;
        Self::from_parts(weight, bias)
    }

    /// Build from explicit weight `[in, out]` and bias `[out]`
    pub fn from_parts(weight: ComplexTensor, bias: ComplexTensor) -> Result<Self> {
        let (in_dim, out_dim) = match weight.dims() {
            &[i, o] => (i, o),
            dims => {
                return Err(HarmonicError::ShapeMismatch(format!(
                    "linear weight must be rank 2, got {:?}",
                    dims
                )))
            }
        };
        if bias.dims() != &[out_dim] {
            return Err(HarmonicError::ShapeMismatch(format!(
                "linear bias {:?} does not match output dim {}",
                bias.dims(),
                out_dim
            )));
        }

        Ok(Self {
            in_dim,
            out_dim,
            weight_re: Var::from_tensor(weight.re())?,
            weight_im: Var::from_tensor(weight.im())?,
            bias_re: Var::from_tensor(bias.re())?,
            bias_im: Var::from_tensor(bias.im())?,
        })
    }

    pub fn in_dim(&self) -> usize {
        self.in_dim
    }

    pub fn out_dim(&self) -> usize {
        self.out_dim
    }

    /// Current weight as a complex tensor (shares storage with the vars)
    pub fn weight(&self) -> Result<ComplexTensor> {
        ComplexTensor::new(
            self.weight_re.as_tensor().clone(),
            self.weight_im.as_tensor().clone(),
        )
    }

    /// Current bias as a complex tensor
    pub fn bias(&self) -> Result<ComplexTensor> {
        ComplexTensor::new(
            self.bias_re.as_tensor().clone(),
            self.bias_im.as_tensor().clone(),
        )
    }

    /// `z·W + b` over the trailing dimension of `z`
    pub fn forward(&self, z: &ComplexTensor) -> Result<ComplexTensor> {
        let features = z.feature_dim()?;
        if features != self.in_dim {
            return Err(HarmonicError::ShapeMismatch(format!(
                "linear layer expects trailing dimension {}, got {:?}",
                self.in_dim,
                z.dims()
            )));
        }
        z.matmul(&self.weight()?)?.broadcast_add(&self.bias()?)
    }

    /// Trainable variables: weight.re, weight.im, bias.re, bias.im
    pub fn trainable_vars(&self) -> Vec<Var> {
        vec![
            self.weight_re.clone(),
            self.weight_im.clone(),
            self.bias_re.clone(),
            self.bias_im.clone(),
        ]
    }

    /// Variables keyed by `{prefix}.weight.re` etc.
    pub fn named_vars(&self, prefix: &str) -> Vec<(String, Var)> {
        vec![
            (format!("{prefix}.weight.re"), self.weight_re.clone()),
            (format!("{prefix}.weight.im"), self.weight_im.clone()),
            (format!("{prefix}.bias.re"), self.bias_re.clone()),
            (format!("{prefix}.bias.im"), self.bias_im.clone()),
        ]
    }

    pub fn param_count(&self) -> usize {
        2 * (self.in_dim * self.out_dim + self.out_dim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustfft::num_complex::Complex32;

    fn device() -> Device {
        Device::Cpu
    }

    #[test]
    fn test_forward_shape() {
        let layer = ComplexLinear::new(8, 5, &device()).unwrap();
        let x = ComplexTensor::randn((2, 3, 8), &device()).unwrap();
        let y = layer.forward(&x).unwrap();
        assert_eq!(y.dims(), &[2, 3, 5]);
        assert_eq!(layer.param_count(), 2 * (8 * 5 + 5));
        assert_eq!(layer.trainable_vars().len(), 4);
    }

    #[test]
    fn test_forward_matches_manual() {
        // W = [[i], [1]], b = [1]
        let weight = ComplexTensor::from_complex_vec(
            &[Complex32::new(0.0, 1.0), Complex32::new(1.0, 0.0)],
            (2, 1),
            &device(),
        )
        .unwrap();
        let bias = ComplexTensor::from_complex_vec(&[Complex32::new(1.0, 0.0)], 1, &device())
            .unwrap();
        let layer = ComplexLinear::from_parts(weight, bias).unwrap();

        let x = ComplexTensor::from_complex_vec(
            &[Complex32::new(2.0, 0.0), Complex32::new(0.0, 3.0)],
            (1, 2),
            &device(),
        )
        .unwrap();
        let y = layer.forward(&x).unwrap().to_complex_vec().unwrap();

        // 2·i + 3i·1 + 1 = 1 + 5i
        assert!((y[0] - Complex32::new(1.0, 5.0)).norm() < 1e-5);
    }

    #[test]
    fn test_forward_dim_mismatch() {
        let layer = ComplexLinear::new(8, 8, &device()).unwrap();
        let x = ComplexTensor::randn((2, 4), &device()).unwrap();
        assert!(matches!(
            layer.forward(&x).unwrap_err(),
            HarmonicError::ShapeMismatch(_)
        ));
    }

    #[test]
    fn test_from_parts_validates_bias() {
        let weight = ComplexTensor::zeros((4, 3), &device()).unwrap();
        let bias = ComplexTensor::zeros(4, &device()).unwrap();
        assert!(ComplexLinear::from_parts(weight, bias).is_err());
    }

    #[test]
    fn test_named_vars() {
        let layer = ComplexLinear::new(4, 4, &device()).unwrap();
        let names: Vec<String> = layer
            .named_vars("head")
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(
            names,
            vec!["head.weight.re", "head.weight.im", "head.bias.re", "head.bias.im"]
        );
    }
}
