//! Scoring gateway: the single entry point from feature vectors to scored events

use crate::bus::{EventBus, PipelineEvent};
use crate::clock::Clock;
use crate::config::ScoringConfig;
use crate::error::{Error, Result};
use crate::metrics::PipelineMetrics;
use crate::models::Scorer;
use crate::types::ScoredEvent;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Wraps the scorer behind a bounded, uniform async call and publishes every
/// result on the event bus. Holds no state between calls.
pub struct ScoringGateway {
    scorer: Arc<dyn Scorer>,
    bus: Arc<EventBus>,
    clock: Clock,
    metrics: Arc<PipelineMetrics>,
    threshold: f64,
    dimension: usize,
    timeout: Duration,
}

impl ScoringGateway {
    pub fn new(
        config: &ScoringConfig,
        scorer: Arc<dyn Scorer>,
        bus: Arc<EventBus>,
        clock: Clock,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        if scorer.dimension() != config.dimension {
            warn!(
                configured = config.dimension,
                scorer = scorer.dimension(),
                "Scorer dimension differs from configuration"
            );
        }

        Self {
            scorer,
            bus,
            clock,
            metrics,
            threshold: config.threshold,
            dimension: config.dimension,
            timeout: config.timeout(),
        }
    }

    /// Anomaly threshold applied to every score
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Score one feature vector and publish the result.
    ///
    /// Returns after every bus consumer has handled the event, so the hub
    /// broadcast and alert evaluation it triggers are already visible. Any
    /// failure of the scorer is reported as `ScoringUnavailable`; no score is
    /// made up.
    pub async fn score(&self, features: Vec<f64>) -> Result<ScoredEvent> {
        let event = self.evaluate(features).await?;
        self.publish(Arc::new(event.clone())).await;
        Ok(event)
    }

    /// Score one feature vector without publishing it
    pub async fn evaluate(&self, features: Vec<f64>) -> Result<ScoredEvent> {
        let started = Instant::now();

        let score = match self.call_scorer(&features).await {
            Ok(score) => score,
            Err(e) => {
                self.metrics.record_scoring_failure();
                warn!(error = %e, "Scoring failed");
                return Err(e);
            }
        };

        let event = ScoredEvent::new(self.clock.now(), score, self.threshold, features);
        self.metrics
            .record_score(started.elapsed(), score, event.is_anomalous());

        debug!(
            score = score,
            is_anomalous = event.is_anomalous(),
            latency_us = started.elapsed().as_micros() as u64,
            "Scored feature vector"
        );
        Ok(event)
    }

    /// Hand a scored event to the bus consumers and wait until they are done
    pub async fn publish(&self, event: Arc<ScoredEvent>) {
        let reached = self.bus.publish(PipelineEvent::Scored(event)).await;
        if reached == 0 {
            debug!("No bus consumers for scored event");
        }
    }

    async fn call_scorer(&self, features: &[f64]) -> Result<f64> {
        if features.len() != self.dimension {
            return Err(Error::ScoringUnavailable(format!(
                "expected {} features, got {}",
                self.dimension,
                features.len()
            )));
        }

        let score = tokio::time::timeout(self.timeout, self.scorer.score(features))
            .await
            .map_err(|_| {
                Error::ScoringUnavailable(format!(
                    "scorer did not answer within {} ms",
                    self.timeout.as_millis()
                ))
            })?
            .map_err(|e| Error::ScoringUnavailable(format!("{:#}", e)))?;

        if !score.is_finite() {
            return Err(Error::ScoringUnavailable(format!(
                "scorer returned non-finite score {}",
                score
            )));
        }

        Ok(score)
    }
}
