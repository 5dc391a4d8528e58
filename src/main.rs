//! Anomaly Stream - Main Entry Point
//!
//! Scores a live stream of log entries, evaluates alert rules over the recent
//! window and writes every broadcast message to stdout as JSON lines.

use anomaly_stream::{
    config::{AppConfig, LoggingConfig},
    metrics::MetricsReporter,
    JsonLinesSink, Pipeline,
};
use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("anomaly_stream={}", config.level)))
        .context("Invalid log level")?;

    // Logs go to stderr; stdout carries the message stream
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if config.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = AppConfig::load()?;
    init_logging(&config.logging)?;

    info!("Starting Anomaly Stream");
    info!(
        "Anomaly threshold: {:.2}, high score: {:.2}, window: {}, history: {}",
        config.scoring.threshold,
        config.alerting.high_score_threshold,
        config.alerting.window_capacity,
        config.alerting.history_capacity
    );

    let pipeline = Pipeline::new(&config);

    // Start metrics reporter
    let reporter = MetricsReporter::new(pipeline.metrics(), config.metrics.report_interval_secs);
    let reporter = tokio::spawn(reporter.start());

    // Stream every hub message to stdout
    let subscription = pipeline.subscribe();
    let sink_id = subscription.id();
    let sink = tokio::spawn(JsonLinesSink::new(subscription, tokio::io::stdout()).run());

    let alerting = pipeline.start_alerting();
    let stream = pipeline.start_stream();
    info!(
        alerting = %alerting,
        stream = %stream,
        cadence_ms = config.stream.cadence_ms,
        "Streaming; press Ctrl+C to stop"
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    info!("Shutting down...");
    let status = pipeline.status();
    pipeline.stop_stream();
    pipeline.stop_alerting();
    pipeline.unsubscribe(sink_id);

    let (_, written) = sink.await.context("Sink task failed")?;
    reporter.abort();

    info!(
        processed = status.stream.processed_count,
        anomalies = status.stream.anomaly_count,
        alerts = status.alerting.total_alerts,
        messages_written = written,
        uptime_secs = pipeline.uptime(),
        "Final status"
    );
    pipeline.metrics().print_summary();
    pipeline.shutdown();

    Ok(())
}
