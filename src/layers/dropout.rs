use rand::Rng;

/// Inverted dropout: zeroes each activation with probability `p` and scales
/// the survivors by `1 / (1 - p)` so eval mode needs no rescaling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dropout {
    pub p: f64,
}

impl Dropout {
    pub fn new(p: f64) -> Dropout {
        Dropout { p }
    }

    pub fn apply<R: Rng + ?Sized>(&self, activations: &mut [f64], rng: &mut R) {
        if self.p == 0.0 {
            return;
        }
        let scale = 1.0 / (1.0 - self.p);
        for a in activations.iter_mut() {
            if rng.gen::<f64>() < self.p {
                *a = 0.0;
            } else {
                *a *= scale;
            }
        }
    }
}
