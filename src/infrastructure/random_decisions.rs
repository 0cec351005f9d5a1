use crate::domain::ports::DecisionSource;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Baseline agent: uniform random outputs, reproducible from its seed.
#[derive(Debug, Clone)]
pub struct RandomDecisionSource {
    rng: StdRng,
    outputs: usize,
}

impl RandomDecisionSource {
    pub fn new(seed: u64, outputs: usize) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            outputs,
        }
    }
}

impl DecisionSource for RandomDecisionSource {
    fn decide(&mut self, _vision: &[f64]) -> Vec<f64> {
        (0..self.outputs).map(|_| self.rng.random::<f64>()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_decisions() {
        let mut a = RandomDecisionSource::new(7, 3);
        let mut b = RandomDecisionSource::new(7, 3);

        for _ in 0..10 {
            let da = a.decide(&[]);
            assert_eq!(da.len(), 3);
            assert!(da.iter().all(|v| (0.0..1.0).contains(v)));
            assert_eq!(da, b.decide(&[]));
        }
    }
}
