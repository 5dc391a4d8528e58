//! Scored events and the log entries they are computed from

use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

/// One feature vector plus its anomaly score.
///
/// Immutable once built; shared between the hub and the alert engine as
/// `Arc<ScoredEvent>`. The anomaly flag is derived from the score on every
/// access and never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredEvent {
    timestamp: f64,
    score: f64,
    threshold: f64,
    source_features: Vec<f64>,
}

impl ScoredEvent {
    pub fn new(timestamp: f64, score: f64, threshold: f64, source_features: Vec<f64>) -> Self {
        Self {
            timestamp,
            score,
            threshold,
            source_features,
        }
    }

    /// Seconds since the pipeline clock started
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    /// Threshold the anomaly flag is computed against
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn source_features(&self) -> &[f64] {
        &self.source_features
    }

    pub fn is_anomalous(&self) -> bool {
        self.score > self.threshold
    }
}

impl Serialize for ScoredEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ScoredEvent", 4)?;
        state.serialize_field("timestamp", &self.timestamp)?;
        state.serialize_field("anomaly_score", &self.score)?;
        state.serialize_field("is_anomalous", &self.is_anomalous())?;
        state.serialize_field("features", &self.source_features)?;
        state.end()
    }
}

/// Severity label carried by a raw log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

/// A log line with the numeric features the scorer consumes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Wall-clock time the entry was produced
    pub timestamp: DateTime<Utc>,
    /// Originating log source
    pub source: String,
    pub level: LogLevel,
    pub message: String,
    pub features: Vec<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anomaly_flag_follows_score() {
        let below = ScoredEvent::new(1.0, 0.05, 0.05, vec![0.0; 5]);
        let above = ScoredEvent::new(2.0, 0.0501, 0.05, vec![0.0; 5]);

        assert!(!below.is_anomalous());
        assert!(above.is_anomalous());
    }

    #[test]
    fn test_serialized_event_carries_derived_flag() {
        let event = ScoredEvent::new(3.5, 0.2, 0.05, vec![1.0, 2.0]);
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["anomaly_score"], 0.2);
        assert_eq!(json["is_anomalous"], true);
        assert_eq!(json["features"], serde_json::json!([1.0, 2.0]));
    }
}
