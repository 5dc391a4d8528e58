//! Alert engine: windowed rule evaluation, bounded alert history and the
//! periodic summary broadcast.

use super::rules::AlertRule;
use super::window::SlidingWindow;
use crate::clock::Clock;
use crate::config::AlertingConfig;
use crate::hub::BroadcastHub;
use crate::metrics::PipelineMetrics;
use crate::types::{
    AlertRecord, AlertStats, AnomalyStats, ControlStatus, HubMessage, ScoredEvent, SummaryStats,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

struct AlertState {
    window: SlidingWindow,
    history: VecDeque<AlertRecord>,
}

/// Evaluates the alert rules over a sliding window of scored events.
///
/// `ingest` works whether or not the summary task is armed; `start`/`stop`
/// only control the periodic summary.
pub struct AlertEngine {
    config: AlertingConfig,
    rules: Vec<AlertRule>,
    hub: Arc<BroadcastHub>,
    clock: Clock,
    metrics: Arc<PipelineMetrics>,
    state: Mutex<AlertState>,
    summary: Mutex<Option<watch::Sender<bool>>>,
}

impl AlertEngine {
    pub fn new(
        config: &AlertingConfig,
        hub: Arc<BroadcastHub>,
        clock: Clock,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            rules: AlertRule::from_config(config),
            state: Mutex::new(AlertState {
                window: SlidingWindow::new(config.window_capacity),
                history: VecDeque::with_capacity(config.history_capacity),
            }),
            config: config.clone(),
            hub,
            clock,
            metrics,
            summary: Mutex::new(None),
        }
    }

    fn state(&self) -> MutexGuard<'_, AlertState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn summary(&self) -> MutexGuard<'_, Option<watch::Sender<bool>>> {
        self.summary
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add an event to the window and evaluate every rule against it.
    ///
    /// Each rule whose condition holds appends one alert to the history and
    /// broadcasts it. Returns the alerts fired by this call, in rule order.
    pub fn ingest(&self, event: Arc<ScoredEvent>) -> Vec<AlertRecord> {
        let fired = {
            let mut state = self.state();
            state.window.push(event.clone());

            let now = self.clock.now();
            let fired: Vec<AlertRecord> = self
                .rules
                .iter()
                .filter_map(|rule| {
                    rule.evaluate(&event, &state.window)
                        .map(|payload| AlertRecord::new(rule.alert_type(), now, payload))
                })
                .collect();

            for alert in &fired {
                while state.history.len() >= self.config.history_capacity.max(1) {
                    state.history.pop_front();
                }
                state.history.push_back(alert.clone());
            }
            fired
        };

        for alert in &fired {
            self.metrics.record_alert(alert.alert_type);
            warn!(
                alert_type = alert.alert_type.name(),
                severity = ?alert.severity,
                "ALERT: {} - {}",
                alert.alert_type.name(),
                alert.message()
            );
            self.hub.broadcast(HubMessage::Alert(alert.clone()));
        }

        fired
    }

    /// The `limit` most recent alerts, oldest first
    pub fn alert_history(&self, limit: usize) -> Vec<AlertRecord> {
        let state = self.state();
        let skip = state.history.len().saturating_sub(limit);
        state.history.iter().skip(skip).cloned().collect()
    }

    /// Anomaly statistics over the current window
    pub fn anomaly_stats(&self) -> AnomalyStats {
        let state = self.state();
        self.window_stats(&state.window)
    }

    fn window_stats(&self, window: &SlidingWindow) -> AnomalyStats {
        if window.is_empty() {
            return AnomalyStats::default();
        }
        let total = window.len();
        AnomalyStats {
            total,
            high_score_count: window.count_above(self.config.high_score_threshold),
            rate: window.count_above(self.config.anomaly_score_threshold) as f64 / total as f64,
        }
    }

    pub fn alert_stats(&self) -> AlertStats {
        let (total_alerts, anomaly_stats) = {
            let state = self.state();
            (state.history.len(), self.window_stats(&state.window))
        };
        AlertStats {
            is_running: self.is_running(),
            total_alerts,
            anomaly_stats,
        }
    }

    pub fn window_len(&self) -> usize {
        self.state().window.len()
    }

    pub fn history_len(&self) -> usize {
        self.state().history.len()
    }

    /// Whether the summary task is armed
    pub fn is_running(&self) -> bool {
        self.summary().is_some()
    }

    /// Arm the periodic summary task
    pub fn start(self: &Arc<Self>) -> ControlStatus {
        let mut summary = self.summary();
        if summary.is_some() {
            return ControlStatus::AlreadyRunning;
        }

        let (stop_tx, stop_rx) = watch::channel(true);
        *summary = Some(stop_tx);
        tokio::spawn(run_summary(self.clone(), stop_rx));

        info!(
            interval_secs = self.config.summary_interval_secs,
            "Alert summary task started"
        );
        ControlStatus::Started
    }

    /// Disarm the periodic summary task
    pub fn stop(&self) -> ControlStatus {
        match self.summary().take() {
            Some(stop_tx) => {
                let _ = stop_tx.send(false);
                info!("Alert summary task stopped");
                ControlStatus::Stopped
            }
            None => ControlStatus::NotRunning,
        }
    }

    /// Broadcast a summary if any alert has been recorded. Returns whether
    /// one was sent.
    pub fn broadcast_summary(&self) -> bool {
        let message = {
            let state = self.state();
            if state.history.is_empty() {
                return false;
            }
            let skip = state
                .history
                .len()
                .saturating_sub(self.config.summary_recent);
            HubMessage::AlertSummary {
                timestamp: self.clock.now(),
                total_alerts: state.history.len(),
                recent_alerts: state.history.iter().skip(skip).cloned().collect(),
                anomaly_stats: SummaryStats {
                    total_recent: state.window.len(),
                    high_score_count: state.window.count_above(self.config.high_score_threshold),
                },
            }
        };

        let delivered = self.hub.broadcast(message);
        debug!(delivered, "Alert summary broadcast");
        true
    }
}

async fn run_summary(engine: Arc<AlertEngine>, mut stop_rx: watch::Receiver<bool>) {
    let period = engine.config.summary_interval().max(Duration::from_millis(1));
    let mut interval = tokio::time::interval(period);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if !*stop_rx.borrow() {
                    break;
                }
                engine.broadcast_summary();
            }
            changed = stop_rx.changed() => {
                if changed.is_err() || !*stop_rx.borrow() {
                    break;
                }
            }
        }
    }

    debug!("Alert summary loop exited");
}
