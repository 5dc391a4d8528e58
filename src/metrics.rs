//! Performance metrics and statistics tracking for the anomaly stream pipeline.

use crate::types::AlertType;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Latency samples kept for percentile estimates
const MAX_LATENCY_SAMPLES: usize = 10_000;

/// Metrics collector for pipeline performance
pub struct PipelineMetrics {
    /// Successful scoring calls
    pub events_scored: AtomicU64,
    /// Scoring calls above the anomaly threshold
    pub anomalies_detected: AtomicU64,
    /// Scoring calls that ended in `ScoringUnavailable`
    pub scoring_failures: AtomicU64,
    /// Total alerts generated
    pub alerts_generated: AtomicU64,
    /// Subscribers removed after a failed delivery
    pub subscribers_dropped: AtomicU64,
    /// Messages discarded from full subscriber queues
    pub messages_overflowed: AtomicU64,
    /// Alerts by rule
    alerts_by_type: RwLock<HashMap<AlertType, u64>>,
    /// Scoring latencies (in microseconds)
    scoring_times: RwLock<Vec<u64>>,
    /// Score distribution buckets, 0.02 wide; the last bucket is open-ended
    score_buckets: RwLock<[u64; 10]>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl PipelineMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            events_scored: AtomicU64::new(0),
            anomalies_detected: AtomicU64::new(0),
            scoring_failures: AtomicU64::new(0),
            alerts_generated: AtomicU64::new(0),
            subscribers_dropped: AtomicU64::new(0),
            messages_overflowed: AtomicU64::new(0),
            alerts_by_type: RwLock::new(HashMap::new()),
            scoring_times: RwLock::new(Vec::with_capacity(1000)),
            score_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record a successful scoring call
    pub fn record_score(&self, latency: Duration, score: f64, is_anomalous: bool) {
        self.events_scored.fetch_add(1, Ordering::Relaxed);
        if is_anomalous {
            self.anomalies_detected.fetch_add(1, Ordering::Relaxed);
        }

        if let Ok(mut times) = self.scoring_times.write() {
            times.push(latency.as_micros() as u64);
            if times.len() > MAX_LATENCY_SAMPLES {
                times.drain(0..MAX_LATENCY_SAMPLES / 2);
            }
        }

        let bucket = (score.max(0.0) * 50.0).min(9.0) as usize;
        if let Ok(mut buckets) = self.score_buckets.write() {
            buckets[bucket] += 1;
        }
    }

    pub fn record_scoring_failure(&self) {
        self.scoring_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an alert
    pub fn record_alert(&self, alert_type: AlertType) {
        self.alerts_generated.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut by_type) = self.alerts_by_type.write() {
            *by_type.entry(alert_type).or_insert(0) += 1;
        }
    }

    pub fn record_subscriber_dropped(&self) {
        self.subscribers_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_overflow(&self, dropped: u64) {
        self.messages_overflowed.fetch_add(dropped, Ordering::Relaxed);
    }

    /// Get scoring latency statistics
    pub fn get_scoring_stats(&self) -> LatencyStats {
        let times = match self.scoring_times.read() {
            Ok(times) => times,
            Err(_) => return LatencyStats::default(),
        };
        if times.is_empty() {
            return LatencyStats::default();
        }

        let mut sorted: Vec<u64> = times.clone();
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();

        LatencyStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: sorted[(count as f64 * 0.95) as usize],
            p99_us: sorted[(count as f64 * 0.99) as usize],
            max_us: *sorted.last().unwrap_or(&0),
        }
    }

    /// Get current throughput (scored events per second)
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.events_scored.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Get score distribution
    pub fn get_score_distribution(&self) -> [u64; 10] {
        self.score_buckets
            .read()
            .map(|buckets| *buckets)
            .unwrap_or_default()
    }

    /// Get alerts by rule
    pub fn get_alerts_by_type(&self) -> HashMap<AlertType, u64> {
        self.alerts_by_type
            .read()
            .map(|by_type| by_type.clone())
            .unwrap_or_default()
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let scored = self.events_scored.load(Ordering::Relaxed);
        let anomalies = self.anomalies_detected.load(Ordering::Relaxed);
        let failures = self.scoring_failures.load(Ordering::Relaxed);
        let alert_count = self.alerts_generated.load(Ordering::Relaxed);
        let anomaly_rate = if scored > 0 {
            (anomalies as f64 / scored as f64) * 100.0
        } else {
            0.0
        };

        let latency = self.get_scoring_stats();
        let throughput = self.get_throughput();
        let alerts_by_type = self.get_alerts_by_type();
        let score_dist = self.get_score_distribution();

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║              ANOMALY STREAM - METRICS SUMMARY                ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Events Scored: {:>8}  │  Throughput: {:>6.1} ev/s          ║",
            scored, throughput
        );
        info!(
            "║ Anomalies:     {:>8}  │  Anomaly Rate: {:>6.1}%            ║",
            anomalies, anomaly_rate
        );
        info!(
            "║ Scoring Failures: {:>5}  │  Alerts: {:>8}                  ║",
            failures, alert_count
        );
        info!(
            "║ Subscribers Dropped: {:>4}  │  Overflowed Messages: {:>8}  ║",
            self.subscribers_dropped.load(Ordering::Relaxed),
            self.messages_overflowed.load(Ordering::Relaxed)
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Scoring Time (μs): mean={:>5} p50={:>5} p95={:>5} p99={:>5}   ║",
            latency.mean_us, latency.p50_us, latency.p95_us, latency.p99_us
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Alerts by Rule:                                              ║");
        for (alert_type, count) in &alerts_by_type {
            let pct = if alert_count > 0 {
                (*count as f64 / alert_count as f64) * 100.0
            } else {
                0.0
            };
            info!(
                "║   {:22}: {:>6} ({:>5.1}%)                     ║",
                alert_type.name(),
                count,
                pct
            );
        }
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Score Distribution:                                          ║");
        let total: u64 = score_dist.iter().sum();
        for (i, &count) in score_dist.iter().enumerate() {
            let pct = if total > 0 { (count as f64 / total as f64) * 100.0 } else { 0.0 };
            let bar_len = (pct / 2.0) as usize;
            let bar: String = "█".repeat(bar_len.min(20));
            let upper = if i == 9 {
                "inf ".to_string()
            } else {
                format!("{:.2}", (i + 1) as f64 / 50.0)
            };
            info!(
                "║   {:.2}-{}: {:>6} ({:>5.1}%) {}",
                i as f64 / 50.0,
                upper,
                count,
                pct,
                bar
            );
        }
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Latency statistics
#[derive(Debug, Default)]
pub struct LatencyStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Real-time metrics reporter that prints periodic summaries
pub struct MetricsReporter {
    metrics: Arc<PipelineMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<PipelineMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let period = Duration::from_secs(self.interval_secs.max(1));
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}
