//! Error types for the anomaly stream pipeline

use crate::hub::SubscriberId;
use thiserror::Error;

/// Failures surfaced by pipeline components
#[derive(Debug, Error)]
pub enum Error {
    /// The scorer could not produce a usable score: unreachable, timed out,
    /// malformed output, or the input had the wrong dimensionality
    #[error("scoring unavailable: {0}")]
    ScoringUnavailable(String),

    /// A subscriber's queue no longer has a receiver; handled inside the hub
    #[error("delivery to subscriber {0} failed")]
    SubscriberDeliveryFailed(SubscriberId),
}

pub type Result<T> = std::result::Result<T, Error>;
