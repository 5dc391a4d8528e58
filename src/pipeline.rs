//! Pipeline context: one instance of every component, wired together, plus
//! the control operations exposed to the transport layer.

use crate::alerts::AlertEngine;
use crate::bus::{Delivery, EventBus, PipelineEvent};
use crate::clock::Clock;
use crate::config::AppConfig;
use crate::error::Result;
use crate::gateway::ScoringGateway;
use crate::hub::{BroadcastHub, SubscriberId, Subscription};
use crate::metrics::PipelineMetrics;
use crate::models::{ReconstructionScorer, Scorer};
use crate::stream::{SourceFactory, StreamSource, SyntheticLogSource};
use crate::types::{
    AlertRecord, AlertStats, AnomalyStats, ControlStatus, HubMessage, ScoredEvent, StreamStats,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Combined status of all components
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStatus {
    pub stream: StreamStats,
    pub alerting: AlertStats,
    pub subscribers: usize,
}

/// Explicit context object owning the hub, bus, gateway, alert engine and
/// stream source. Independent instances share nothing.
pub struct Pipeline {
    clock: Clock,
    metrics: Arc<PipelineMetrics>,
    hub: Arc<BroadcastHub>,
    alerts: Arc<AlertEngine>,
    gateway: Arc<ScoringGateway>,
    stream: Arc<StreamSource>,
    relays: Vec<JoinHandle<()>>,
}

impl Pipeline {
    /// Build a pipeline with the reconstruction scorer and the synthetic source.
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(config: &AppConfig) -> Self {
        let scorer = Arc::new(ReconstructionScorer::from_config(&config.scoring));
        let factory = SyntheticLogSource::factory(&config.stream, config.scoring.dimension);
        Self::with_components(config, scorer, factory)
    }

    /// Build a pipeline around a custom scorer and log source
    pub fn with_components(
        config: &AppConfig,
        scorer: Arc<dyn Scorer>,
        factory: SourceFactory,
    ) -> Self {
        let clock = Clock::new();
        let metrics = Arc::new(PipelineMetrics::new());
        let hub = Arc::new(BroadcastHub::new(
            config.hub.subscriber_capacity,
            metrics.clone(),
        ));
        let bus = Arc::new(EventBus::new(config.hub.bus_capacity));
        let alerts = Arc::new(AlertEngine::new(
            &config.alerting,
            hub.clone(),
            clock,
            metrics.clone(),
        ));

        let relays = vec![
            tokio::spawn(relay_to_hub(bus.subscribe(), hub.clone())),
            tokio::spawn(relay_to_alerts(bus.subscribe(), alerts.clone())),
        ];

        let gateway = Arc::new(ScoringGateway::new(
            &config.scoring,
            scorer,
            bus,
            clock,
            metrics.clone(),
        ));
        let stream = Arc::new(StreamSource::new(
            &config.stream,
            gateway.clone(),
            hub.clone(),
            clock,
            factory,
        ));

        info!(
            threshold = gateway.threshold(),
            dimension = gateway.dimension(),
            "Pipeline initialized"
        );

        Self {
            clock,
            metrics,
            hub,
            alerts,
            gateway,
            stream,
            relays,
        }
    }

    pub fn start_stream(&self) -> ControlStatus {
        self.stream.start()
    }

    pub fn stop_stream(&self) -> ControlStatus {
        self.stream.stop()
    }

    pub fn stream_stats(&self) -> StreamStats {
        self.stream.stats()
    }

    /// Score a feature vector directly, outside the stream. When this returns
    /// the prediction has been broadcast and any alerts it raised are in the
    /// history.
    pub async fn score(&self, features: Vec<f64>) -> Result<ScoredEvent> {
        self.gateway.score(features).await
    }

    pub fn alert_history(&self, limit: usize) -> Vec<AlertRecord> {
        self.alerts.alert_history(limit)
    }

    pub fn anomaly_stats(&self) -> AnomalyStats {
        self.alerts.anomaly_stats()
    }

    pub fn alert_stats(&self) -> AlertStats {
        self.alerts.alert_stats()
    }

    pub fn start_alerting(&self) -> ControlStatus {
        self.alerts.start()
    }

    pub fn stop_alerting(&self) -> ControlStatus {
        self.alerts.stop()
    }

    pub fn subscribe(&self) -> Subscription {
        self.hub.subscribe()
    }

    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.hub.unsubscribe(id)
    }

    pub fn status(&self) -> PipelineStatus {
        PipelineStatus {
            stream: self.stream.stats(),
            alerting: self.alerts.alert_stats(),
            subscribers: self.hub.subscriber_count(),
        }
    }

    /// Seconds since the pipeline was built
    pub fn uptime(&self) -> f64 {
        self.clock.now()
    }

    pub fn metrics(&self) -> Arc<PipelineMetrics> {
        self.metrics.clone()
    }

    /// Stop the stream and the summary task and tear down the relays
    pub fn shutdown(self) {
        self.stream.stop();
        self.alerts.stop();
        for relay in &self.relays {
            relay.abort();
        }
        info!("Pipeline shut down");
    }
}

/// Broadcast every scored event, plus an anomaly notice for anomalous ones
async fn relay_to_hub(mut deliveries: mpsc::Receiver<Delivery>, hub: Arc<BroadcastHub>) {
    while let Some(delivery) = deliveries.recv().await {
        let PipelineEvent::Scored(event) = delivery.event();
        let notice = event.is_anomalous().then(|| HubMessage::AnomalyAlert {
            message: format!("Anomaly detected! Score: {:.4}", event.score()),
            data: event.clone(),
        });
        hub.broadcast(HubMessage::Prediction {
            event: event.clone(),
        });
        if let Some(notice) = notice {
            hub.broadcast(notice);
        }
        delivery.ack();
    }
    debug!("Hub relay exited");
}

/// Feed anomalous events to the alert engine
async fn relay_to_alerts(mut deliveries: mpsc::Receiver<Delivery>, alerts: Arc<AlertEngine>) {
    while let Some(delivery) = deliveries.recv().await {
        let PipelineEvent::Scored(event) = delivery.event();
        if event.is_anomalous() {
            alerts.ingest(event.clone());
        }
        delivery.ack();
    }
    debug!("Alert relay exited");
}
