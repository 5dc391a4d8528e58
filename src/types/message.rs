//! Messages fanned out to hub subscribers

use super::alert::AlertRecord;
use super::event::{LogEntry, ScoredEvent};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Envelope for everything the hub broadcasts, tagged by `type` on the wire
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HubMessage {
    /// Raw result of every scoring call
    Prediction { event: Arc<ScoredEvent> },

    /// Notice for a prediction above the anomaly threshold
    AnomalyAlert {
        data: Arc<ScoredEvent>,
        message: String,
    },

    /// A stream entry went through the gateway
    LogProcessed {
        timestamp: f64,
        log_data: LogEntry,
        prediction: Arc<ScoredEvent>,
        stats: StreamProgress,
    },

    /// A rule fired
    Alert(AlertRecord),

    /// Periodic digest of recent alerts
    AlertSummary {
        timestamp: f64,
        total_alerts: usize,
        recent_alerts: Vec<AlertRecord>,
        anomaly_stats: SummaryStats,
    },

    /// Periodic stream health snapshot
    SystemMonitoring {
        timestamp: f64,
        status: String,
        processed_logs: u64,
        anomalies_detected: u64,
        uptime: f64,
        throughput: f64,
    },
}

impl HubMessage {
    /// Wire tag of the message
    pub fn kind(&self) -> &'static str {
        match self {
            HubMessage::Prediction { .. } => "prediction",
            HubMessage::AnomalyAlert { .. } => "anomaly_alert",
            HubMessage::LogProcessed { .. } => "log_processed",
            HubMessage::Alert(_) => "alert",
            HubMessage::AlertSummary { .. } => "alert_summary",
            HubMessage::SystemMonitoring { .. } => "system_monitoring",
        }
    }
}

/// Running counters attached to each processed stream entry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StreamProgress {
    pub processed_count: u64,
    pub anomaly_count: u64,
    pub uptime: f64,
}

/// Window statistics carried by an alert summary
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub total_recent: usize,
    pub high_score_count: usize,
}
