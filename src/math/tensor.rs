use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use thiserror::Error;

/// Dense, row-major array of `f64` with an explicit shape.
///
/// The element count always equals the product of the shape; both
/// constructors and deserialization enforce it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTensor")]
pub struct Tensor {
    shape: Vec<usize>,
    data: Vec<f64>,
}

/// Wire form of a tensor before the length invariant has been checked.
#[derive(Deserialize)]
struct RawTensor {
    shape: Vec<usize>,
    data: Vec<f64>,
}

/// Returned when a shape and a data buffer cannot form a tensor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TensorError {
    #[error("shape {shape:?} holds {expected} values but {len} were given")]
    Length {
        shape: Vec<usize>,
        expected: usize,
        len: usize,
    },

    #[error("shape {0:?} has more elements than fit in memory")]
    Overflow(Vec<usize>),
}

impl TryFrom<RawTensor> for Tensor {
    type Error = TensorError;

    fn try_from(raw: RawTensor) -> Result<Self, Self::Error> {
        Tensor::from_vec(raw.shape, raw.data)
    }
}

/// Product of the dimensions, or `None` if it overflows `usize`.
pub fn element_count(shape: &[usize]) -> Option<usize> {
    shape.iter().try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
}

fn element_count_or_panic(shape: &[usize]) -> usize {
    element_count(shape).unwrap_or_else(|| panic!("shape {shape:?} overflows usize"))
}

impl Tensor {
    /// # Panics
    /// Panics if the element count overflows `usize`.
    pub fn zeros(shape: &[usize]) -> Tensor {
        Tensor {
            shape: shape.to_vec(),
            data: vec![0.0; element_count_or_panic(shape)],
        }
    }

    pub fn from_vec(shape: Vec<usize>, data: Vec<f64>) -> Result<Tensor, TensorError> {
        let Some(expected) = element_count(&shape) else {
            return Err(TensorError::Overflow(shape));
        };
        if expected != data.len() {
            return Err(TensorError::Length {
                shape,
                expected,
                len: data.len(),
            });
        }
        Ok(Tensor { shape, data })
    }

    /// Samples a single value from N(0, 1) using the Box-Muller transform.
    fn sample_standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
        // Both uniforms live in (0, 1] so ln() never sees zero.
        let u1: f64 = 1.0 - rng.gen::<f64>();
        let u2: f64 = 1.0 - rng.gen::<f64>();
        (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
    }

    fn normal(rows: usize, cols: usize, std_dev: f64) -> Tensor {
        let mut rng = rand::thread_rng();
        let data = (0..element_count_or_panic(&[rows, cols]))
            .map(|_| Tensor::sample_standard_normal(&mut rng) * std_dev)
            .collect();
        Tensor { shape: vec![rows, cols], data }
    }

    /// He initialization: samples from N(0, sqrt(2 / cols)).
    ///
    /// Used for weights feeding a ReLU. Shape is `[rows, cols]` where `cols`
    /// is the fan-in, matching the `[out, in]` layout of a dense weight.
    ///
    /// # Panics
    /// Panics if `rows * cols` overflows `usize`.
    pub fn he(rows: usize, cols: usize) -> Tensor {
        Tensor::normal(rows, cols, (2.0 / cols as f64).sqrt())
    }

    /// Xavier (Glorot) initialization: samples from N(0, sqrt(1 / cols)).
    pub fn xavier(rows: usize, cols: usize) -> Tensor {
        Tensor::normal(rows, cols, (1.0 / cols as f64).sqrt())
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Position and value of the first NaN or infinite element, if any.
    pub fn first_non_finite(&self) -> Option<(usize, f64)> {
        self.data
            .iter()
            .copied()
            .enumerate()
            .find(|(_, x)| !x.is_finite())
    }

    /// Computes `self · x` for a rank-2 tensor of shape `[rows, cols]`.
    ///
    /// # Panics
    /// Panics if the tensor is not rank 2 or `x.len() != cols`.
    pub fn matvec(&self, x: &[f64]) -> Vec<f64> {
        let &[rows, cols] = self.shape.as_slice() else {
            panic!("matvec needs a rank-2 tensor, got shape {:?}", self.shape)
        };
        if x.len() != cols {
            panic!("Matrices are of incorrect sizes: [{rows}, {cols}] · [{}]", x.len())
        }

        self.data
            .chunks_exact(cols)
            .map(|row| row.iter().zip(x).map(|(w, v)| w * v).sum())
            .collect()
    }
}
