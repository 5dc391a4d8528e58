//! Stream statistics and control transition results

use serde::{Deserialize, Serialize};
use std::fmt;

/// Counters owned by the stream source
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StreamStats {
    pub is_running: bool,
    pub processed_count: u64,
    pub anomaly_count: u64,
    /// Pipeline clock reading when the current (or last) run started
    pub start_time: Option<f64>,
}

impl StreamStats {
    /// Seconds since the run started, measured at `now`
    pub fn uptime(&self, now: f64) -> f64 {
        self.start_time.map(|start| now - start).unwrap_or(0.0)
    }

    /// Entries per second since the run started, with elapsed floored at one second
    pub fn throughput(&self, now: f64) -> f64 {
        match self.start_time {
            Some(start) => self.processed_count as f64 / (now - start).max(1.0),
            None => 0.0,
        }
    }
}

/// Outcome of a start or stop request.
///
/// Redundant transitions are informational, not failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlStatus {
    Started,
    AlreadyRunning,
    Stopped,
    NotRunning,
}

impl fmt::Display for ControlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ControlStatus::Started => "started",
            ControlStatus::AlreadyRunning => "already running",
            ControlStatus::Stopped => "stopped",
            ControlStatus::NotRunning => "not running",
        };
        f.write_str(text)
    }
}
