use serde::{Deserialize, Serialize};

use crate::activation::argmax;
use crate::loss::nll::NllLoss;
use crate::network::network::Network;

/// Loss and accuracy of a network over a labelled batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidationStats {
    /// Mean negative log-likelihood.
    pub loss: f64,
    /// Fraction of samples whose argmax matches the label, in [0, 1].
    pub accuracy: f64,
}

/// Scores `network` on `inputs` / `labels` with dropout disabled.
///
/// The network's train/eval mode is restored before returning.
///
/// # Panics
/// Panics if `inputs` is empty, the lengths differ, or a label is out of
/// range for the output layer.
pub fn validate(network: &mut Network, inputs: &[Vec<f64>], labels: &[usize]) -> ValidationStats {
    assert!(!inputs.is_empty(), "inputs must not be empty");
    assert_eq!(
        inputs.len(),
        labels.len(),
        "inputs and labels must have equal length"
    );

    let was_training = network.is_training();
    network.eval();

    let outputs: Vec<Vec<f64>> = inputs.iter().map(|input| network.forward(input)).collect();

    let loss = NllLoss::mean(
        outputs
            .iter()
            .zip(labels)
            .map(|(log_probs, &label)| (log_probs.as_slice(), label)),
    );
    let correct = outputs
        .iter()
        .zip(labels)
        .filter(|(log_probs, label)| argmax(log_probs) == **label)
        .count();

    if was_training {
        network.train();
    }

    ValidationStats {
        loss,
        accuracy: correct as f64 / inputs.len() as f64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::tensor::Tensor;
    use crate::network::{ArchitectureDescriptor, ParameterSet};

    /// Two-class network that predicts whichever input feature is larger.
    fn comparator() -> Network {
        let mut network = Network::new(ArchitectureDescriptor::new(2, 2, vec![]).unwrap());
        let mut params = ParameterSet::new();
        params.insert(
            "output.weight",
            Tensor::from_vec(vec![2, 2], vec![1.0, 0.0, 0.0, 1.0]).unwrap(),
        );
        params.insert("output.bias", Tensor::zeros(&[2]));
        network.set_parameters(params).unwrap();
        network
    }

    #[test]
    fn scores_accuracy_and_loss() {
        let mut network = comparator();
        let inputs = vec![vec![2.0, 0.0], vec![0.0, 2.0], vec![1.0, 0.0], vec![0.0, 1.0]];
        let labels = vec![0, 1, 1, 1];

        let stats = validate(&mut network, &inputs, &labels);

        assert_eq!(stats.accuracy, 0.75);
        let expected_loss = inputs
            .iter()
            .zip(&labels)
            .map(|(x, &y)| NllLoss::loss(&network.forward(x), y))
            .sum::<f64>()
            / 4.0;
        assert!((stats.loss - expected_loss).abs() < 1e-12);
    }

    #[test]
    fn restores_training_mode() {
        let mut network = comparator();
        network.train();
        validate(&mut network, &[vec![1.0, 0.0]], &[0]);
        assert!(network.is_training());
    }

    #[test]
    #[should_panic(expected = "equal length")]
    fn rejects_mismatched_labels() {
        validate(&mut comparator(), &[vec![1.0, 0.0]], &[0, 1]);
    }
}
