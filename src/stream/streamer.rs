//! Stream source: drives a log source through the scoring gateway while running

use super::source::{LogSource, SourceFactory};
use crate::clock::Clock;
use crate::config::StreamConfig;
use crate::gateway::ScoringGateway;
use crate::hub::BroadcastHub;
use crate::types::{ControlStatus, HubMessage, LogEntry, ScoredEvent, StreamProgress, StreamStats};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

struct StreamState {
    stats: StreamStats,
    /// Identifies the current run; loops from an older run stop touching state
    run_id: u64,
    stop_tx: Option<watch::Sender<bool>>,
}

/// Start/stop-able generator of scored log entries.
///
/// Every run owns its own stop signal, its own log source and two tasks: the
/// generation loop and the monitoring timer. Counter updates and `stop` take
/// the same lock, so once `stop` returns no counter changes again until the
/// next `start`.
pub struct StreamSource {
    config: StreamConfig,
    gateway: Arc<ScoringGateway>,
    hub: Arc<BroadcastHub>,
    clock: Clock,
    factory: SourceFactory,
    state: Mutex<StreamState>,
}

impl StreamSource {
    pub fn new(
        config: &StreamConfig,
        gateway: Arc<ScoringGateway>,
        hub: Arc<BroadcastHub>,
        clock: Clock,
        factory: SourceFactory,
    ) -> Self {
        Self {
            config: config.clone(),
            gateway,
            hub,
            clock,
            factory,
            state: Mutex::new(StreamState {
                stats: StreamStats::default(),
                run_id: 0,
                stop_tx: None,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, StreamState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> StreamStats {
        self.state().stats
    }

    pub fn is_running(&self) -> bool {
        self.state().stats.is_running
    }

    /// Begin a new run unless one is active
    pub fn start(self: &Arc<Self>) -> ControlStatus {
        let (run_id, stop_rx) = {
            let mut state = self.state();
            if state.stats.is_running {
                info!("Stream already running");
                return ControlStatus::AlreadyRunning;
            }

            state.run_id += 1;
            state.stats.is_running = true;
            state.stats.start_time = Some(self.clock.now());
            let (stop_tx, stop_rx) = watch::channel(true);
            state.stop_tx = Some(stop_tx);
            (state.run_id, stop_rx)
        };

        let source = (self.factory)();
        tokio::spawn(run_generation(self.clone(), run_id, stop_rx.clone(), source));
        tokio::spawn(run_monitoring(self.clone(), run_id, stop_rx));

        info!(
            run_id,
            cadence_ms = self.config.cadence_ms,
            "Stream started"
        );
        ControlStatus::Started
    }

    /// End the active run, if any
    pub fn stop(&self) -> ControlStatus {
        let mut state = self.state();
        if !state.stats.is_running {
            info!("Stream not running");
            return ControlStatus::NotRunning;
        }

        state.stats.is_running = false;
        if let Some(stop_tx) = state.stop_tx.take() {
            let _ = stop_tx.send(false);
        }
        info!(
            run_id = state.run_id,
            processed = state.stats.processed_count,
            anomalies = state.stats.anomaly_count,
            "Stream stopped"
        );
        ControlStatus::Stopped
    }

    /// Count a scored entry for `run_id`. Returns `None` when that run is no
    /// longer the active one.
    fn record(&self, run_id: u64, event: &ScoredEvent) -> Option<StreamProgress> {
        let mut state = self.state();
        if !state.stats.is_running || state.run_id != run_id {
            return None;
        }

        state.stats.processed_count += 1;
        if event.is_anomalous() {
            state.stats.anomaly_count += 1;
        }
        Some(StreamProgress {
            processed_count: state.stats.processed_count,
            anomaly_count: state.stats.anomaly_count,
            uptime: state.stats.uptime(self.clock.now()),
        })
    }

    /// Counters for `run_id` while it is the active run
    fn run_stats(&self, run_id: u64) -> Option<StreamStats> {
        let state = self.state();
        (state.stats.is_running && state.run_id == run_id).then_some(state.stats)
    }

    /// The source for `run_id` ran dry
    fn finish(&self, run_id: u64) {
        let mut state = self.state();
        if state.stats.is_running && state.run_id == run_id {
            state.stats.is_running = false;
            state.stop_tx = None;
            info!(run_id, "Log source exhausted, stream stopped");
        }
    }

    /// Score, count and publish one entry. The event only reaches the bus
    /// once `record` has accepted it for the active run, so an entry whose
    /// scoring straddles `stop` leaves no trace.
    async fn process(&self, run_id: u64, entry: LogEntry) -> bool {
        let event = match self.gateway.evaluate(entry.features.clone()).await {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, message = %entry.message, "Error processing log entry");
                return true;
            }
        };

        let Some(progress) = self.record(run_id, &event) else {
            debug!(run_id, "Run ended while scoring, entry discarded");
            return false;
        };

        debug!(
            processed = progress.processed_count,
            score = event.score(),
            "Log entry processed"
        );
        let event = Arc::new(event);
        self.gateway.publish(event.clone()).await;
        self.hub.broadcast(HubMessage::LogProcessed {
            timestamp: self.clock.now(),
            log_data: entry,
            prediction: event,
            stats: progress,
        });
        true
    }
}

async fn run_generation(
    stream: Arc<StreamSource>,
    run_id: u64,
    mut stop_rx: watch::Receiver<bool>,
    mut source: Box<dyn LogSource>,
) {
    loop {
        let entry = tokio::select! {
            biased;
            _ = stop_rx.changed() => break,
            entry = source.next_entry() => entry,
        };

        let Some(entry) = entry else {
            stream.finish(run_id);
            break;
        };

        if !*stop_rx.borrow() || !stream.process(run_id, entry).await {
            break;
        }
    }

    debug!(run_id, "Generation loop exited");
}

async fn run_monitoring(stream: Arc<StreamSource>, run_id: u64, mut stop_rx: watch::Receiver<bool>) {
    let period = stream.config.monitor_interval().max(Duration::from_millis(1));
    let mut interval = tokio::time::interval_at(Instant::now(), period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = stop_rx.changed() => break,
            _ = interval.tick() => {
                let Some(stats) = stream.run_stats(run_id) else {
                    break;
                };
                let now = stream.clock.now();
                stream.hub.broadcast(HubMessage::SystemMonitoring {
                    timestamp: now,
                    status: "active".to_string(),
                    processed_logs: stats.processed_count,
                    anomalies_detected: stats.anomaly_count,
                    uptime: stats.uptime(now),
                    throughput: stats.throughput(now),
                });
            }
        }
    }

    debug!(run_id, "Monitoring loop exited");
}
