//! Score burst tool
//!
//! Fires a burst of concurrent scoring calls at an in-process pipeline, with a
//! configurable share of out-of-range feature vectors, then prints the alert
//! history and window statistics.
//!
//! Usage: score_burst [count] [anomaly_rate] [concurrency] [history_limit]

use anomaly_stream::{AppConfig, Pipeline};
use futures::stream::{self, StreamExt};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tracing::{info, warn};

/// Feature vector generator
struct FeatureGenerator {
    rng: StdRng,
    dimension: usize,
}

impl FeatureGenerator {
    fn new(dimension: usize) -> Self {
        Self {
            rng: StdRng::from_entropy(),
            dimension,
        }
    }

    /// Features inside the normalized training range
    fn generate_normal(&mut self) -> Vec<f64> {
        (0..self.dimension)
            .map(|_| self.rng.gen_range(0.0..1.0))
            .collect()
    }

    /// Features well outside the training range
    fn generate_suspicious(&mut self) -> Vec<f64> {
        (0..self.dimension)
            .map(|_| self.rng.gen_range(1.5..10.0))
            .collect()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("score_burst=info".parse()?)
                .add_directive("anomaly_stream=warn".parse()?),
        )
        .init();

    info!("Starting score burst");

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let count: usize = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(100);
    let anomaly_rate: f64 = args
        .get(2)
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.2)
        .clamp(0.0, 1.0);
    let concurrency: usize = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(8).max(1);
    let history_limit: usize = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(20);

    info!(
        count = count,
        anomaly_rate = anomaly_rate,
        concurrency = concurrency,
        "Configuration loaded"
    );

    let config = AppConfig::load()?;
    let pipeline = Arc::new(Pipeline::new(&config));

    let mut generator = FeatureGenerator::new(config.scoring.dimension);
    let mut rng = StdRng::from_entropy();
    let mut suspicious_count = 0;
    let vectors: Vec<Vec<f64>> = (0..count)
        .map(|_| {
            if rng.gen_bool(anomaly_rate) {
                suspicious_count += 1;
                generator.generate_suspicious()
            } else {
                generator.generate_normal()
            }
        })
        .collect();

    info!(
        "Scoring {} vectors ({} normal, {} suspicious)",
        count,
        count - suspicious_count,
        suspicious_count
    );

    let results: Vec<_> = stream::iter(vectors)
        .map(|features| {
            let pipeline = pipeline.clone();
            async move { pipeline.score(features).await }
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;

    let mut anomalous = 0;
    for result in &results {
        match result {
            Ok(event) if event.is_anomalous() => anomalous += 1,
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Scoring failed"),
        }
    }

    // Let the relays drain the bus
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let stats = pipeline.anomaly_stats();
    info!(
        "Completed! {} scored, {} anomalous; window total={} high_score={} rate={:.2}",
        results.len(),
        anomalous,
        stats.total,
        stats.high_score_count,
        stats.rate
    );

    for alert in pipeline.alert_history(history_limit) {
        println!("{}", serde_json::to_string(&alert)?);
    }

    Ok(())
}
