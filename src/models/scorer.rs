//! Scoring model interface and the built-in reconstruction scorer

use crate::config::ScoringConfig;
use anyhow::{ensure, Result};
use async_trait::async_trait;

/// A model mapping a feature vector to an anomaly score.
///
/// Implementations must not mutate the input and must fail, rather than
/// truncate or pad, when the input length differs from `dimension()`.
#[async_trait]
pub trait Scorer: Send + Sync {
    /// Expected feature vector length
    fn dimension(&self) -> usize;

    async fn score(&self, features: &[f64]) -> Result<f64>;
}

/// Reconstruction-error scorer for features normalized to a training range.
///
/// Each feature is reconstructed as its projection onto `[lower, upper]`, the
/// range the training data was min-max scaled into; the score is the mean
/// squared reconstruction error. In-range vectors score zero and the score
/// grows quadratically with the distance outside the range.
#[derive(Debug, Clone)]
pub struct ReconstructionScorer {
    dimension: usize,
    lower: f64,
    upper: f64,
}

impl ReconstructionScorer {
    pub fn new(dimension: usize, lower: f64, upper: f64) -> Self {
        Self {
            dimension,
            lower: lower.min(upper),
            upper: upper.max(lower),
        }
    }

    pub fn from_config(config: &ScoringConfig) -> Self {
        Self::new(config.dimension, config.lower_bound, config.upper_bound)
    }

    fn reconstruction_error(&self, features: &[f64]) -> f64 {
        let sum: f64 = features
            .iter()
            .map(|&x| {
                let reconstructed = x.clamp(self.lower, self.upper);
                (x - reconstructed).powi(2)
            })
            .sum();
        sum / features.len() as f64
    }
}

#[async_trait]
impl Scorer for ReconstructionScorer {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn score(&self, features: &[f64]) -> Result<f64> {
        ensure!(
            features.len() == self.dimension,
            "expected {} features, got {}",
            self.dimension,
            features.len()
        );
        ensure!(
            features.iter().all(|x| x.is_finite()),
            "feature vector contains non-finite values"
        );
        Ok(self.reconstruction_error(features))
    }
}
