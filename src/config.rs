//! Configuration management for the anomaly stream pipeline

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix for overrides (`ANOMALY_STREAM__SCORING__THRESHOLD=0.08`)
const ENV_PREFIX: &str = "ANOMALY_STREAM";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub scoring: ScoringConfig,
    pub alerting: AlertingConfig,
    pub stream: StreamConfig,
    pub hub: HubConfig,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

/// Scoring gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Scores strictly above this value are anomalous
    pub threshold: f64,
    /// Expected feature vector length
    pub dimension: usize,
    /// Upper bound on a single scorer call in milliseconds
    pub timeout_ms: u64,
    /// Lower edge of the normalized training range
    pub lower_bound: f64,
    /// Upper edge of the normalized training range
    pub upper_bound: f64,
}

impl ScoringConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Alert engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertingConfig {
    /// Sliding window size (most recent scored events)
    pub window_capacity: usize,
    /// Alert history size
    pub history_capacity: usize,
    /// HighScore fires when the latest score exceeds this
    pub high_score_threshold: f64,
    /// Score above which a window entry counts as an anomaly for the window rules
    pub anomaly_score_threshold: f64,
    /// Number of trailing entries inspected by the consecutive rule
    pub consecutive_window: usize,
    /// Minimum anomalies in the trailing entries for the consecutive rule
    pub consecutive_min: usize,
    /// Number of trailing entries inspected by the rate rule
    pub rate_window: usize,
    /// Anomaly fraction the rate rule must exceed
    pub rate_threshold: f64,
    /// Period of the alert summary broadcast
    pub summary_interval_secs: u64,
    /// Number of recent alerts carried by a summary
    pub summary_recent: usize,
}

impl AlertingConfig {
    pub fn summary_interval(&self) -> Duration {
        Duration::from_secs(self.summary_interval_secs)
    }
}

/// Stream source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Time between generated log entries in milliseconds
    pub cadence_ms: u64,
    /// Period of the system monitoring broadcast
    pub monitor_interval_secs: u64,
    /// Lower bound of synthetic feature values
    pub feature_min: f64,
    /// Upper bound of synthetic feature values (exclusive)
    pub feature_max: f64,
    /// Source label stamped on synthetic entries
    pub source_name: String,
}

impl StreamConfig {
    pub fn cadence(&self) -> Duration {
        Duration::from_millis(self.cadence_ms)
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_secs(self.monitor_interval_secs)
    }
}

/// Broadcast hub and event bus configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// Per-subscriber queue capacity; the oldest message is dropped on overflow
    pub subscriber_capacity: usize,
    /// Capacity of each event bus subscriber channel
    pub bus_capacity: usize,
}

/// Metrics reporting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Interval between logged metrics summaries
    pub report_interval_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path.
    ///
    /// Built-in defaults are layered under the file, and `ANOMALY_STREAM__*`
    /// environment variables over it.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let defaults =
            Config::try_from(&AppConfig::default()).context("Failed to encode default configuration")?;

        let config = Config::builder()
            .add_source(defaults)
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scoring: ScoringConfig {
                threshold: 0.05,
                dimension: 5,
                timeout_ms: 500,
                lower_bound: 0.0,
                upper_bound: 1.0,
            },
            alerting: AlertingConfig {
                window_capacity: 100,
                history_capacity: 50,
                high_score_threshold: 0.1,
                anomaly_score_threshold: 0.05,
                consecutive_window: 10,
                consecutive_min: 3,
                rate_window: 20,
                rate_threshold: 0.5,
                summary_interval_secs: 30,
                summary_recent: 5,
            },
            stream: StreamConfig {
                cadence_ms: 1000,
                monitor_interval_secs: 5,
                feature_min: 0.0,
                feature_max: 5.0,
                source_name: "system_logs".to_string(),
            },
            hub: HubConfig {
                subscriber_capacity: 256,
                bus_capacity: 1024,
            },
            metrics: MetricsConfig {
                report_interval_secs: 60,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.scoring.threshold, 0.05);
        assert_eq!(config.scoring.dimension, 5);
        assert_eq!(config.alerting.window_capacity, 100);
        assert_eq!(config.alerting.history_capacity, 50);
        assert_eq!(config.stream.cadence(), Duration::from_secs(1));
        assert_eq!(config.alerting.summary_interval(), Duration::from_secs(30));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = AppConfig::load_from_path("does/not/exist.toml").unwrap();
        assert_eq!(config.scoring.timeout_ms, 500);
        assert_eq!(config.stream.source_name, "system_logs");
    }

    #[test]
    fn test_shipped_file_matches_defaults() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/config.toml");
        let config = AppConfig::load_from_path(path).unwrap();
        let defaults = AppConfig::default();
        assert_eq!(config.scoring.threshold, defaults.scoring.threshold);
        assert_eq!(config.alerting.rate_window, defaults.alerting.rate_window);
        assert_eq!(config.hub.subscriber_capacity, defaults.hub.subscriber_capacity);
    }
}
