pub fn relu(values: &mut [f64]) {
    for x in values.iter_mut() {
        if *x < 0.0 {
            *x = 0.0;
        }
    }
}

/// Log-softmax over a whole vector.
///
/// Shifts by the maximum before exponentiating so large logits do not
/// overflow.
pub fn log_softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let log_sum = logits.iter().map(|&z| (z - max).exp()).sum::<f64>().ln();
    logits.iter().map(|&z| z - max - log_sum).collect()
}

/// Index of the maximum element in a slice.
pub fn argmax(v: &[f64]) -> usize {
    v.iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)
        .unwrap_or(0)
}
