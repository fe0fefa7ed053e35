/// Negative log-likelihood for a log-softmax output layer.
pub struct NllLoss;

impl NllLoss {
    /// Scalar NLL for one sample: `-log_probs[target]`.
    ///
    /// `log_probs`: log-softmax output, shape [n_classes]
    /// `target`: index of the correct class
    ///
    /// # Panics
    /// Panics if `target` is out of range.
    pub fn loss(log_probs: &[f64], target: usize) -> f64 {
        -log_probs[target]
    }

    /// Mean NLL over a batch of (log_probs, target) pairs; 0.0 when empty.
    pub fn mean<'a, I>(samples: I) -> f64
    where
        I: IntoIterator<Item = (&'a [f64], usize)>,
    {
        let (total, n) = samples
            .into_iter()
            .fold((0.0, 0usize), |(total, n), (log_probs, target)| {
                (total + NllLoss::loss(log_probs, target), n + 1)
            });
        if n == 0 {
            0.0
        } else {
            total / n as f64
        }
    }
}
