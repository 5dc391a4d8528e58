//! Type definitions for the anomaly stream pipeline

pub mod alert;
pub mod event;
pub mod message;
pub mod status;

pub use alert::{AlertPayload, AlertRecord, AlertStats, AlertType, AnomalyStats, Severity};
pub use event::{LogEntry, LogLevel, ScoredEvent};
pub use message::{HubMessage, StreamProgress, SummaryStats};
pub use status::{ControlStatus, StreamStats};
