use log::{debug, warn};

use crate::activation::{argmax, log_softmax, relu};
use crate::error::ShapeMismatch;
use crate::layers::{Dense, Dropout};
use crate::math::tensor::Tensor;
use crate::network::architecture::{layer_prefix, ArchitectureDescriptor};
use crate::network::parameters::ParameterSet;

/// Feed-forward classifier: ReLU hidden layers with dropout, then a
/// log-softmax output.
#[derive(Debug, Clone)]
pub struct Network {
    architecture: ArchitectureDescriptor,
    hidden: Vec<Dense>,
    output: Dense,
    dropout: Dropout,
    training: bool,
}

impl Network {
    /// Builds a freshly initialized network in eval mode.
    pub fn new(architecture: ArchitectureDescriptor) -> Network {
        let mut dims = architecture.layer_dims();
        // layer_dims always ends with the output projection.
        let (out_in, out_size) = dims
            .pop()
            .unwrap_or((architecture.input_size(), architecture.output_size()));

        let hidden = dims
            .into_iter()
            .map(|(fan_in, fan_out)| Dense::he(fan_out, fan_in))
            .collect();
        let output = Dense::xavier(out_size, out_in);
        let dropout = Dropout::new(architecture.drop_p());

        Network {
            architecture,
            hidden,
            output,
            dropout,
            training: false,
        }
    }

    /// Hyperparameters this network was built from.
    pub fn describe(&self) -> ArchitectureDescriptor {
        self.architecture.clone()
    }

    pub fn architecture(&self) -> &ArchitectureDescriptor {
        &self.architecture
    }

    fn layers(&self) -> impl Iterator<Item = &Dense> {
        self.hidden.iter().chain(std::iter::once(&self.output))
    }

    /// Deep copy of every weight and bias, keyed `hidden.<i>.weight`,
    /// `hidden.<i>.bias`, `output.weight`, `output.bias`.
    pub fn parameters(&self) -> ParameterSet {
        let hidden_count = self.hidden.len();
        self.layers()
            .enumerate()
            .flat_map(|(i, layer)| {
                let prefix = layer_prefix(i, hidden_count);
                [
                    (format!("{prefix}.weight"), layer.weights.clone()),
                    (format!("{prefix}.bias"), layer.biases.clone()),
                ]
            })
            .collect()
    }

    /// Replaces every weight and bias with the tensors in `parameters`.
    ///
    /// The set must contain exactly the keys of this network's layout, each
    /// with exactly the expected shape. Otherwise every offending key is
    /// reported and the network is left unchanged.
    pub fn set_parameters(&mut self, parameters: ParameterSet) -> Result<(), ShapeMismatch> {
        if let Err(err) = parameters.check_layout(&self.architecture.parameter_layout()) {
            warn!("rejected parameter assignment: {} key(s) disagree", err.mismatches.len());
            return Err(err);
        }
        let (hidden, output) = layers_from(&self.architecture, parameters);
        self.hidden = hidden;
        self.output = output;
        Ok(())
    }

    /// Builds a network in eval mode directly around `parameters`, skipping
    /// random initialization. Callers must have checked the layout.
    pub(crate) fn from_checked_parameters(
        architecture: ArchitectureDescriptor,
        parameters: ParameterSet,
    ) -> Network {
        let (hidden, output) = layers_from(&architecture, parameters);
        let dropout = Dropout::new(architecture.drop_p());
        Network {
            architecture,
            hidden,
            output,
            dropout,
            training: false,
        }
    }

    /// Enables dropout.
    pub fn train(&mut self) {
        self.training = true;
    }

    /// Disables dropout; the forward pass becomes deterministic.
    pub fn eval(&mut self) {
        self.training = false;
    }

    pub fn is_training(&self) -> bool {
        self.training
    }

    /// Forward pass returning log-probabilities over the output classes.
    ///
    /// # Panics
    /// Panics if `input.len()` differs from the architecture's `input_size`.
    pub fn forward(&self, input: &[f64]) -> Vec<f64> {
        self.forward_with_rng(input, &mut rand::thread_rng())
    }

    /// Same as [`Network::forward`], drawing dropout masks from `rng`.
    pub fn forward_with_rng<R: rand::Rng + ?Sized>(&self, input: &[f64], rng: &mut R) -> Vec<f64> {
        assert_eq!(
            input.len(),
            self.architecture.input_size(),
            "input has {} features, network expects {}",
            input.len(),
            self.architecture.input_size()
        );

        let mut current = input.to_vec();
        for layer in &self.hidden {
            current = layer.forward(&current);
            relu(&mut current);
            if self.training {
                self.dropout.apply(&mut current, rng);
            }
        }
        log_softmax(&self.output.forward(&current))
    }

    /// Class probabilities (exponentiated log-softmax output).
    pub fn probabilities(&self, input: &[f64]) -> Vec<f64> {
        self.forward(input).into_iter().map(f64::exp).collect()
    }

    /// Most likely class for `input`.
    pub fn predict(&self, input: &[f64]) -> usize {
        argmax(&self.forward(input))
    }
}

/// Moves each tensor of a checked parameter set into its layer.
fn layers_from(
    architecture: &ArchitectureDescriptor,
    mut parameters: ParameterSet,
) -> (Vec<Dense>, Dense) {
    let hidden_count = architecture.hidden_sizes().len();
    let mut layers: Vec<Dense> = architecture
        .layer_dims()
        .into_iter()
        .enumerate()
        .map(|(i, (fan_in, fan_out))| {
            let prefix = layer_prefix(i, hidden_count);
            Dense::from_parts(
                take(&mut parameters, &format!("{prefix}.weight"), &[fan_out, fan_in]),
                take(&mut parameters, &format!("{prefix}.bias"), &[fan_out]),
            )
        })
        .collect();
    debug_assert!(parameters.is_empty(), "unchecked keys left over");
    debug!("assigned parameters to {} layer(s)", layers.len());

    // layer_dims always ends with the output projection.
    let output = layers.pop().unwrap_or_else(|| {
        Dense::from_parts(
            Tensor::zeros(&[architecture.output_size(), architecture.input_size()]),
            Tensor::zeros(&[architecture.output_size()]),
        )
    });
    (layers, output)
}

fn take(parameters: &mut ParameterSet, key: &str, shape: &[usize]) -> Tensor {
    match parameters.remove(key) {
        Some(tensor) => {
            debug_assert_eq!(tensor.shape(), shape, "{key}");
            tensor
        }
        None => {
            debug_assert!(false, "checked layout is missing {key}");
            Tensor::zeros(shape)
        }
    }
}
