use crate::math::tensor::Tensor;

/// Fully connected layer computing `W·x + b`.
///
/// `weights` has shape `[out, in]`, `biases` has shape `[out]`.
#[derive(Debug, Clone)]
pub struct Dense {
    pub weights: Tensor,
    pub biases: Tensor,
}

impl Dense {
    /// He-initialized layer for use in front of a ReLU.
    pub fn he(size: usize, input_size: usize) -> Dense {
        Dense::from_weights(Tensor::he(size, input_size))
    }

    /// Xavier-initialized layer for the output projection.
    pub fn xavier(size: usize, input_size: usize) -> Dense {
        Dense::from_weights(Tensor::xavier(size, input_size))
    }

    fn from_weights(weights: Tensor) -> Dense {
        let biases = Tensor::zeros(&weights.shape()[..1]);
        Dense { weights, biases }
    }

    /// Wraps existing tensors without reinitializing anything.
    pub fn from_parts(weights: Tensor, biases: Tensor) -> Dense {
        debug_assert_eq!(weights.shape().first(), biases.shape().first());
        Dense { weights, biases }
    }

    pub fn forward(&self, input: &[f64]) -> Vec<f64> {
        let mut z = self.weights.matvec(input);
        for (zi, bi) in z.iter_mut().zip(self.biases.as_slice()) {
            *zi += bi;
        }
        z
    }
}
