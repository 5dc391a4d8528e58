//! Log sources feeding the stream

use crate::config::StreamConfig;
use crate::types::{LogEntry, LogLevel};
use async_trait::async_trait;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior};

/// A pull-based supply of log entries.
///
/// `next_entry` waits until the next entry is due and returns `None` once the
/// source is exhausted. Sources are single-use: a stream run builds a fresh
/// one through a [`SourceFactory`].
#[async_trait]
pub trait LogSource: Send {
    async fn next_entry(&mut self) -> Option<LogEntry>;
}

/// Builds the source for one stream run
pub type SourceFactory = Arc<dyn Fn() -> Box<dyn LogSource> + Send + Sync>;

/// Infinite source of random log entries, one per cadence interval
pub struct SyntheticLogSource {
    cadence: Duration,
    interval: Option<Interval>,
    rng: StdRng,
    source_name: String,
    feature_min: f64,
    feature_max: f64,
    dimension: usize,
    produced: u64,
}

impl SyntheticLogSource {
    pub fn new(config: &StreamConfig, dimension: usize) -> Self {
        Self::with_rng(config, dimension, StdRng::from_entropy())
    }

    /// Deterministic source for reproducible runs
    pub fn with_seed(config: &StreamConfig, dimension: usize, seed: u64) -> Self {
        Self::with_rng(config, dimension, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: &StreamConfig, dimension: usize, rng: StdRng) -> Self {
        Self {
            cadence: config.cadence(),
            interval: None,
            rng,
            source_name: config.source_name.clone(),
            feature_min: config.feature_min.min(config.feature_max),
            feature_max: config.feature_max.max(config.feature_min),
            dimension,
            produced: 0,
        }
    }

    /// Factory producing an entropy-seeded source per run
    pub fn factory(config: &StreamConfig, dimension: usize) -> SourceFactory {
        let config = config.clone();
        Arc::new(move || Box::new(SyntheticLogSource::new(&config, dimension)) as Box<dyn LogSource>)
    }

    fn generate(&mut self) -> LogEntry {
        let level = match self.rng.gen_range(0..3) {
            0 => LogLevel::Info,
            1 => LogLevel::Warning,
            _ => LogLevel::Error,
        };
        let features = (0..self.dimension)
            .map(|_| {
                if self.feature_max > self.feature_min {
                    self.rng.gen_range(self.feature_min..self.feature_max)
                } else {
                    self.feature_min
                }
            })
            .collect();

        let entry = LogEntry {
            timestamp: Utc::now(),
            source: self.source_name.clone(),
            level,
            message: format!("Log entry {}", self.produced),
            features,
        };
        self.produced += 1;
        entry
    }
}

#[async_trait]
impl LogSource for SyntheticLogSource {
    async fn next_entry(&mut self) -> Option<LogEntry> {
        let cadence = self.cadence.max(Duration::from_millis(1));
        let interval = self.interval.get_or_insert_with(|| {
            let mut interval = tokio::time::interval_at(Instant::now() + cadence, cadence);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });
        interval.tick().await;
        Some(self.generate())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[tokio::test(start_paused = true)]
    async fn test_one_entry_per_cadence() {
        let config = AppConfig::default().stream;
        let mut source = SyntheticLogSource::with_seed(&config, 5, 7);

        let started = Instant::now();
        let first = source.next_entry().await.unwrap();
        assert_eq!(started.elapsed(), Duration::from_secs(1));
        let second = source.next_entry().await.unwrap();
        assert_eq!(started.elapsed(), Duration::from_secs(2));

        assert_eq!(first.message, "Log entry 0");
        assert_eq!(second.message, "Log entry 1");
        assert_eq!(first.source, "system_logs");
    }

    #[tokio::test(start_paused = true)]
    async fn test_features_within_configured_range() {
        let config = AppConfig::default().stream;
        let mut source = SyntheticLogSource::with_seed(&config, 5, 42);

        for _ in 0..50 {
            let entry = source.next_entry().await.unwrap();
            assert_eq!(entry.features.len(), 5);
            assert!(entry.features.iter().all(|&x| (0.0..5.0).contains(&x)));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_seeded_sources_repeat() {
        let config = AppConfig::default().stream;
        let mut a = SyntheticLogSource::with_seed(&config, 5, 99);
        let mut b = SyntheticLogSource::with_seed(&config, 5, 99);

        let fa = a.next_entry().await.unwrap().features;
        let fb = b.next_entry().await.unwrap().features;
        assert_eq!(fa, fb);
    }
}
