use serde::{Deserialize, Serialize};

use crate::error::ArchitectureError;

pub const DEFAULT_DROP_P: f64 = 0.5;

/// Hyperparameters of a feed-forward classifier.
///
/// Fully determines the key and shape of every parameter tensor:
///
/// | key                 | shape                          |
/// |---------------------|--------------------------------|
/// | `hidden.<i>.weight` | `[hidden_sizes[i], fan_in]`    |
/// | `hidden.<i>.bias`   | `[hidden_sizes[i]]`            |
/// | `output.weight`     | `[output_size, last_width]`    |
/// | `output.bias`       | `[output_size]`                |
///
/// `fan_in` is `input_size` for the first hidden layer and the previous
/// layer's width afterwards; `last_width` is the last hidden width, or
/// `input_size` when there are no hidden layers.
///
/// A descriptor can only be obtained through [`ArchitectureDescriptor::new`]
/// or deserialization, both of which validate it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawArchitecture")]
pub struct ArchitectureDescriptor {
    input_size: usize,
    output_size: usize,
    hidden_sizes: Vec<usize>,
    drop_p: f64,
}

#[derive(Deserialize)]
struct RawArchitecture {
    input_size: usize,
    output_size: usize,
    hidden_sizes: Vec<usize>,
    #[serde(default = "default_drop_p")]
    drop_p: f64,
}

fn default_drop_p() -> f64 {
    DEFAULT_DROP_P
}

impl TryFrom<RawArchitecture> for ArchitectureDescriptor {
    type Error = ArchitectureError;

    fn try_from(raw: RawArchitecture) -> Result<Self, Self::Error> {
        ArchitectureDescriptor::new(raw.input_size, raw.output_size, raw.hidden_sizes)?
            .with_drop_p(raw.drop_p)
    }
}

impl ArchitectureDescriptor {
    /// Builds a descriptor with the default dropout probability of 0.5.
    pub fn new(
        input_size: usize,
        output_size: usize,
        hidden_sizes: Vec<usize>,
    ) -> Result<Self, ArchitectureError> {
        if input_size == 0 {
            return Err(ArchitectureError::ZeroInputSize);
        }
        if output_size == 0 {
            return Err(ArchitectureError::ZeroOutputSize);
        }
        if let Some(index) = hidden_sizes.iter().position(|&size| size == 0) {
            return Err(ArchitectureError::ZeroHiddenSize { index });
        }

        let architecture = ArchitectureDescriptor {
            input_size,
            output_size,
            hidden_sizes,
            drop_p: DEFAULT_DROP_P,
        };
        if count_parameters(&architecture.layer_dims()).is_none() {
            return Err(ArchitectureError::ParameterCountOverflow);
        }
        Ok(architecture)
    }

    pub fn with_drop_p(mut self, drop_p: f64) -> Result<Self, ArchitectureError> {
        // The negated form also rejects NaN.
        if !(0.0..1.0).contains(&drop_p) {
            return Err(ArchitectureError::InvalidDropout(drop_p));
        }
        self.drop_p = drop_p;
        Ok(self)
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn output_size(&self) -> usize {
        self.output_size
    }

    pub fn hidden_sizes(&self) -> &[usize] {
        &self.hidden_sizes
    }

    pub fn drop_p(&self) -> f64 {
        self.drop_p
    }

    /// `(fan_in, fan_out)` for every dense layer, hidden layers first.
    pub fn layer_dims(&self) -> Vec<(usize, usize)> {
        let widths: Vec<usize> = std::iter::once(self.input_size)
            .chain(self.hidden_sizes.iter().copied())
            .chain(std::iter::once(self.output_size))
            .collect();
        widths.windows(2).map(|pair| (pair[0], pair[1])).collect()
    }

    /// Ordered `(key, shape)` pairs of every parameter this architecture has.
    pub fn parameter_layout(&self) -> Vec<(String, Vec<usize>)> {
        let dims = self.layer_dims();
        let hidden_count = self.hidden_sizes.len();

        dims.into_iter()
            .enumerate()
            .flat_map(|(i, (fan_in, fan_out))| {
                let prefix = layer_prefix(i, hidden_count);
                [
                    (format!("{prefix}.weight"), vec![fan_out, fan_in]),
                    (format!("{prefix}.bias"), vec![fan_out]),
                ]
            })
            .collect()
    }

    /// Total number of scalar parameters.
    pub fn parameter_count(&self) -> usize {
        // new() rejects every architecture whose count does not fit.
        count_parameters(&self.layer_dims()).unwrap_or(usize::MAX)
    }
}

/// Sum of `fan_out * fan_in + fan_out` over the layers, or `None` on overflow.
fn count_parameters(dims: &[(usize, usize)]) -> Option<usize> {
    dims.iter().try_fold(0usize, |total, &(fan_in, fan_out)| {
        fan_out
            .checked_mul(fan_in)?
            .checked_add(fan_out)?
            .checked_add(total)
    })
}

/// Key prefix of the `index`-th dense layer: `hidden.<index>` or `output`.
pub fn layer_prefix(index: usize, hidden_count: usize) -> String {
    if index < hidden_count {
        format!("hidden.{index}")
    } else {
        "output".to_string()
    }
}
