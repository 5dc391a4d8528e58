//! In-process event bus between producers of scored events and their consumers.
//!
//! Producers publish typed events without knowing who listens. Every consumer
//! subscribes once and receives every event on its own bounded channel, in
//! publish order. Each event arrives wrapped in a [`Delivery`]; `publish`
//! returns only after every consumer has acknowledged (or dropped) its copy,
//! so the side effects of a publish are visible to the publisher's caller.

use crate::types::ScoredEvent;
use futures::future::join_all;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// Event flowing over the bus
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// The gateway produced a score
    Scored(Arc<ScoredEvent>),
}

/// One consumer's copy of a published event
#[derive(Debug)]
pub struct Delivery {
    event: PipelineEvent,
    ack: oneshot::Sender<()>,
}

impl Delivery {
    pub fn event(&self) -> &PipelineEvent {
        &self.event
    }

    /// Tell the publisher this consumer is done with the event
    pub fn ack(self) {
        let _ = self.ack.send(());
    }
}

/// Fan-out of pipeline events to internal consumers
pub struct EventBus {
    subscribers: Mutex<Vec<mpsc::Sender<Delivery>>>,
    capacity: usize,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            capacity: capacity.max(1),
        }
    }

    /// Register a consumer
    pub fn subscribe(&self) -> mpsc::Receiver<Delivery> {
        let (tx, rx) = mpsc::channel(self.capacity);
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(tx);
        rx
    }

    /// Send `event` to every consumer, waiting for channel space, then wait
    /// until each consumer has handled it.
    ///
    /// Consumers that went away are forgotten. Returns the number of
    /// consumers the event reached.
    pub async fn publish(&self, event: PipelineEvent) -> usize {
        let senders: Vec<mpsc::Sender<Delivery>> = self
            .subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();

        let mut acks = Vec::with_capacity(senders.len());
        for sender in &senders {
            let (ack, done) = oneshot::channel();
            let delivery = Delivery {
                event: event.clone(),
                ack,
            };
            if sender.send(delivery).await.is_ok() {
                acks.push(done);
            }
        }

        let reached = acks.len();
        if reached < senders.len() {
            let mut subscribers = self
                .subscribers
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            subscribers.retain(|sender| !sender.is_closed());
            debug!(remaining = subscribers.len(), "Dropped closed bus consumers");
        }

        // A consumer that drops its delivery without acking releases us too
        join_all(acks).await;
        reached
    }

    /// Number of registered consumers
    pub fn consumer_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tokio::task::JoinHandle;

    fn scored(score: f64) -> PipelineEvent {
        PipelineEvent::Scored(Arc::new(ScoredEvent::new(0.0, score, 0.05, vec![])))
    }

    /// Acknowledges every delivery and returns the scores once the bus is gone
    fn collector(mut rx: mpsc::Receiver<Delivery>) -> JoinHandle<Vec<f64>> {
        tokio::spawn(async move {
            let mut scores = Vec::new();
            while let Some(delivery) = rx.recv().await {
                let PipelineEvent::Scored(event) = delivery.event();
                scores.push(event.score());
                delivery.ack();
            }
            scores
        })
    }

    #[tokio::test]
    async fn test_every_consumer_gets_every_event_in_order() {
        let bus = EventBus::new(8);
        let first = collector(bus.subscribe());
        let second = collector(bus.subscribe());

        assert_eq!(bus.publish(scored(1.0)).await, 2);
        assert_eq!(bus.publish(scored(2.0)).await, 2);
        drop(bus);

        assert_eq!(first.await.unwrap(), vec![1.0, 2.0]);
        assert_eq!(second.await.unwrap(), vec![1.0, 2.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_publish_waits_for_acknowledgement() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        let handled = Arc::new(AtomicBool::new(false));

        let flag = handled.clone();
        let consumer = tokio::spawn(async move {
            let delivery = rx.recv().await.unwrap();
            tokio::time::sleep(Duration::from_millis(50)).await;
            flag.store(true, Ordering::SeqCst);
            delivery.ack();
        });

        bus.publish(scored(1.0)).await;
        assert!(handled.load(Ordering::SeqCst));
        consumer.await.unwrap();
    }

    #[tokio::test]
    async fn test_dropped_delivery_releases_publisher() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        let consumer = tokio::spawn(async move {
            drop(rx.recv().await);
        });

        assert_eq!(bus.publish(scored(1.0)).await, 1);
        consumer.await.unwrap();
    }

    #[tokio::test]
    async fn test_closed_consumer_is_forgotten() {
        let bus = EventBus::new(8);
        let gone = bus.subscribe();
        let kept = collector(bus.subscribe());
        drop(gone);

        assert_eq!(bus.publish(scored(1.0)).await, 1);
        assert_eq!(bus.consumer_count(), 1);
        drop(bus);
        assert_eq!(kept.await.unwrap(), vec![1.0]);
    }
}
