use anomaly_stream::stream::{LogSource, SourceFactory};
use anomaly_stream::types::{AlertType, ControlStatus};
use anomaly_stream::{AppConfig, Error, HubMessage, Pipeline, Scorer, Subscription, SyntheticLogSource};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Scores a vector as its first feature
struct FirstFeatureScorer;

#[async_trait]
impl Scorer for FirstFeatureScorer {
    fn dimension(&self) -> usize {
        5
    }

    async fn score(&self, features: &[f64]) -> anyhow::Result<f64> {
        anyhow::ensure!(features.len() == 5, "expected 5 features");
        Ok(features[0])
    }
}

fn seeded_pipeline(config: &AppConfig) -> Pipeline {
    let stream = config.stream.clone();
    let dimension = config.scoring.dimension;
    let factory: SourceFactory = Arc::new(move || {
        Box::new(SyntheticLogSource::with_seed(&stream, dimension, 7)) as Box<dyn LogSource>
    });
    Pipeline::with_components(
        config,
        Arc::new(anomaly_stream::ReconstructionScorer::from_config(&config.scoring)),
        factory,
    )
}

/// Takes 300 ms to score anything, always anomalous
struct SlowScorer;

#[async_trait]
impl Scorer for SlowScorer {
    fn dimension(&self) -> usize {
        5
    }

    async fn score(&self, _features: &[f64]) -> anyhow::Result<f64> {
        tokio::time::sleep(Duration::from_millis(300)).await;
        Ok(1.0)
    }
}

/// Everything delivered to `subscription` until it stays quiet for a second
async fn drain(subscription: &mut Subscription) -> Vec<Arc<HubMessage>> {
    let mut messages = Vec::new();
    while let Ok(Some(message)) =
        tokio::time::timeout(Duration::from_secs(1), subscription.recv()).await
    {
        messages.push(message);
    }
    messages
}

#[tokio::test(start_paused = true)]
async fn test_out_of_range_vector_raises_high_score_alert() {
    let pipeline = Pipeline::new(&AppConfig::default());
    let mut subscription = pipeline.subscribe();

    let event = pipeline.score(vec![10.0; 5]).await.unwrap();
    assert!(event.is_anomalous());
    assert!(event.score() > 0.1);

    let messages = drain(&mut subscription).await;
    let kinds: Vec<&str> = messages.iter().map(|m| m.kind()).collect();
    assert!(kinds.contains(&"prediction"));
    assert!(kinds.contains(&"anomaly_alert"));

    let alerts: Vec<_> = messages
        .iter()
        .filter_map(|m| match m.as_ref() {
            HubMessage::Alert(alert) => Some(alert.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].alert_type, AlertType::HighScore);

    // The most recently broadcast alert is the one history returns
    assert_eq!(pipeline.alert_history(1), alerts);
    pipeline.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_normal_vector_broadcasts_prediction_only() {
    let pipeline = Pipeline::new(&AppConfig::default());
    let mut subscription = pipeline.subscribe();

    let event = pipeline.score(vec![0.5; 5]).await.unwrap();
    assert!(!event.is_anomalous());

    let messages = drain(&mut subscription).await;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].kind(), "prediction");
    assert!(pipeline.alert_history(10).is_empty());
    assert_eq!(pipeline.anomaly_stats().total, 0);
}

#[tokio::test(start_paused = true)]
async fn test_wrong_dimension_is_scoring_unavailable() {
    let pipeline = Pipeline::new(&AppConfig::default());
    let mut subscription = pipeline.subscribe();

    let result = pipeline.score(vec![1.0; 3]).await;
    assert!(matches!(result, Err(Error::ScoringUnavailable(_))));
    assert!(drain(&mut subscription).await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_stream_counts_match_broadcast_entries() {
    let pipeline = seeded_pipeline(&AppConfig::default());
    let mut subscription = pipeline.subscribe();

    assert_eq!(pipeline.start_stream(), ControlStatus::Started);
    tokio::time::sleep(Duration::from_millis(3500)).await;

    let stats = pipeline.stream_stats();
    assert!(stats.is_running);
    assert_eq!(stats.processed_count, 3);

    let mut anomalous = 0;
    while let Some(message) = subscription.try_recv() {
        if let HubMessage::LogProcessed { prediction, .. } = message.as_ref() {
            if prediction.is_anomalous() {
                anomalous += 1;
            }
        }
    }
    assert_eq!(stats.anomaly_count, anomalous);

    assert_eq!(pipeline.stop_stream(), ControlStatus::Stopped);
    let stopped = pipeline.stream_stats();
    tokio::time::sleep(Duration::from_secs(1)).await;

    let later = pipeline.stream_stats();
    assert_eq!(later.processed_count, stopped.processed_count);
    assert_eq!(later.anomaly_count, stopped.anomaly_count);
}

#[tokio::test(start_paused = true)]
async fn test_double_stop_is_idempotent() {
    let pipeline = seeded_pipeline(&AppConfig::default());

    pipeline.start_stream();
    tokio::time::sleep(Duration::from_millis(1500)).await;

    assert_eq!(pipeline.stop_stream(), ControlStatus::Stopped);
    assert!(!pipeline.stream_stats().is_running);
    assert_eq!(pipeline.stop_stream(), ControlStatus::NotRunning);
    assert!(!pipeline.stream_stats().is_running);

    let processed = pipeline.stream_stats().processed_count;
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(pipeline.stream_stats().processed_count, processed);
}

#[tokio::test(start_paused = true)]
async fn test_consecutive_anomalies_through_pipeline() {
    let config = AppConfig::default();
    let pipeline = Pipeline::with_components(
        &config,
        Arc::new(FirstFeatureScorer),
        SyntheticLogSource::factory(&config.stream, config.scoring.dimension),
    );
    let mut subscription = pipeline.subscribe();

    for _ in 0..3 {
        pipeline.score(vec![0.08, 0.0, 0.0, 0.0, 0.0]).await.unwrap();
        drain(&mut subscription).await;
    }

    let history = pipeline.alert_history(10);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].alert_type, AlertType::ConsecutiveAnomalies);
    assert_eq!(pipeline.anomaly_stats().total, 3);
    assert_eq!(pipeline.anomaly_stats().high_score_count, 0);
}

#[tokio::test(start_paused = true)]
async fn test_summary_once_alerts_exist() {
    let pipeline = Pipeline::new(&AppConfig::default());
    let mut subscription = pipeline.subscribe();

    pipeline.score(vec![10.0; 5]).await.unwrap();
    drain(&mut subscription).await;

    // One summary on arming, one more a period later
    assert_eq!(pipeline.start_alerting(), ControlStatus::Started);
    tokio::time::sleep(Duration::from_secs(31)).await;

    let mut summaries = Vec::new();
    while let Some(message) = subscription.try_recv() {
        if let HubMessage::AlertSummary {
            total_alerts,
            recent_alerts,
            ..
        } = message.as_ref()
        {
            summaries.push((*total_alerts, recent_alerts.len()));
        }
    }
    assert_eq!(summaries, vec![(1, 1), (1, 1)]);
    assert!(pipeline.alert_stats().is_running);

    assert_eq!(pipeline.stop_alerting(), ControlStatus::Stopped);
    assert!(!pipeline.alert_stats().is_running);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_subscriber_does_not_block_others() {
    let pipeline = Pipeline::new(&AppConfig::default());
    let stalled = pipeline.subscribe();
    let mut live = pipeline.subscribe();
    drop(stalled);

    pipeline.score(vec![0.5; 5]).await.unwrap();
    let messages = drain(&mut live).await;

    assert_eq!(messages.len(), 1);
    assert_eq!(pipeline.status().subscribers, 1);
}

#[tokio::test(start_paused = true)]
async fn test_pipelines_share_no_state() {
    let first = Pipeline::new(&AppConfig::default());
    let second = Pipeline::new(&AppConfig::default());
    let mut subscription = second.subscribe();

    first.score(vec![10.0; 5]).await.unwrap();
    first.start_stream();
    tokio::time::sleep(Duration::from_millis(2500)).await;
    first.stop_stream();

    assert!(!first.alert_history(10).is_empty());
    assert!(second.alert_history(10).is_empty());
    assert_eq!(second.stream_stats().processed_count, 0);
    assert!(subscription.try_recv().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_score_side_effects_visible_on_return() {
    let pipeline = Pipeline::new(&AppConfig::default());
    let mut subscription = pipeline.subscribe();

    let event = pipeline.score(vec![10.0; 5]).await.unwrap();
    assert_eq!(event.score(), 81.0);

    let history = pipeline.alert_history(1);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].alert_type, AlertType::HighScore);
    assert_eq!(pipeline.anomaly_stats().total, 1);

    let mut kinds = Vec::new();
    let mut broadcast_alert = None;
    while let Some(message) = subscription.try_recv() {
        kinds.push(message.kind());
        if let HubMessage::Alert(alert) = message.as_ref() {
            broadcast_alert = Some(alert.clone());
        }
    }
    // The two relays run independently, so only the set of kinds is fixed
    kinds.sort_unstable();
    assert_eq!(kinds, vec!["alert", "anomaly_alert", "prediction"]);
    assert_eq!(broadcast_alert.as_ref(), history.last());
}

#[tokio::test(start_paused = true)]
async fn test_stop_while_scoring_emits_nothing_more() {
    let config = AppConfig::default();
    let pipeline = Pipeline::with_components(
        &config,
        Arc::new(SlowScorer),
        SyntheticLogSource::factory(&config.stream, config.scoring.dimension),
    );

    pipeline.start_stream();
    // The first entry arrives at 1 s and is still being scored at 1.1 s
    tokio::time::sleep(Duration::from_millis(1100)).await;
    let mut subscription = pipeline.subscribe();
    assert_eq!(pipeline.stop_stream(), ControlStatus::Stopped);

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(subscription.try_recv().is_none());
    assert!(pipeline.alert_history(10).is_empty());
    assert_eq!(pipeline.stream_stats().processed_count, 0);
}
