//! Anomaly scoring models

pub mod scorer;

pub use scorer::{ReconstructionScorer, Scorer};
