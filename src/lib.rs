//! Anomaly Stream Library
//!
//! Real-time fan-out of anomaly scores to any number of subscribers, with
//! level-triggered alert rules evaluated over a sliding window of recent
//! scores.

pub mod alerts;
pub mod bus;
pub mod clock;
pub mod config;
pub mod error;
pub mod gateway;
pub mod hub;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod sink;
pub mod stream;
pub mod types;

pub use alerts::AlertEngine;
pub use config::AppConfig;
pub use error::{Error, Result};
pub use gateway::ScoringGateway;
pub use hub::{BroadcastHub, SubscriberId, Subscription};
pub use models::{ReconstructionScorer, Scorer};
pub use pipeline::{Pipeline, PipelineStatus};
pub use sink::JsonLinesSink;
pub use stream::{LogSource, StreamSource, SyntheticLogSource};
pub use types::{AlertRecord, HubMessage, ScoredEvent, StreamStats};
