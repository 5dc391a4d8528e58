//! Alert data structures

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Rule that produced an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertType {
    #[serde(rename = "HIGH_ANOMALY_SCORE")]
    HighScore,
    #[serde(rename = "CONSECUTIVE_ANOMALIES")]
    ConsecutiveAnomalies,
    #[serde(rename = "HIGH_ANOMALY_RATE")]
    HighRate,
}

impl AlertType {
    /// Wire name of the alert type
    pub fn name(&self) -> &'static str {
        match self {
            AlertType::HighScore => "HIGH_ANOMALY_SCORE",
            AlertType::ConsecutiveAnomalies => "CONSECUTIVE_ANOMALIES",
            AlertType::HighRate => "HIGH_ANOMALY_RATE",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            AlertType::HighScore => Severity::High,
            AlertType::ConsecutiveAnomalies => Severity::Medium,
            AlertType::HighRate => Severity::High,
        }
    }
}

/// Alert severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// Rule-specific diagnostics attached to an alert
pub type AlertPayload = BTreeMap<String, Value>;

/// Alert emitted when a rule fires
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    /// Unique alert identifier
    pub alert_id: String,
    pub alert_type: AlertType,
    pub severity: Severity,
    /// Seconds since the pipeline clock started
    pub timestamp: f64,
    pub payload: AlertPayload,
}

impl AlertRecord {
    /// Create a new alert; severity follows from the alert type
    pub fn new(alert_type: AlertType, timestamp: f64, payload: AlertPayload) -> Self {
        Self {
            alert_id: uuid::Uuid::new_v4().to_string(),
            alert_type,
            severity: alert_type.severity(),
            timestamp,
            payload,
        }
    }

    /// Human-readable message from the payload, if present
    pub fn message(&self) -> &str {
        self.payload
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }
}

/// Anomaly statistics over the current window
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AnomalyStats {
    /// Events in the window
    pub total: usize,
    /// Events above the high-score threshold
    pub high_score_count: usize,
    /// Fraction of events above the anomaly threshold
    pub rate: f64,
}

/// Alert engine status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertStats {
    /// Whether the periodic summary task is armed
    pub is_running: bool,
    pub total_alerts: usize,
    pub anomaly_stats: AnomalyStats,
}
