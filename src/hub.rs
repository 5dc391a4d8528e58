//! Broadcast hub: fan-out of pipeline messages to every connected subscriber.
//!
//! Each subscriber gets its own bounded `tokio::sync::broadcast` channel. A
//! full channel overwrites its oldest message, so a stalled consumer costs at
//! most `capacity` messages of memory and never slows the broadcaster down;
//! the receiver learns how many it missed when it next reads. The subscriber
//! set lives behind one mutex that is only held to register, remove or
//! snapshot senders; sending happens after it is released.

use crate::error::Error;
use crate::metrics::PipelineMetrics;
use crate::types::HubMessage;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{debug, info, warn};

/// Hub-issued identifier of one subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SubscriberId(u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

type Sender = broadcast::Sender<Arc<HubMessage>>;

/// Receiving half of a hub subscription.
///
/// Dropping it disconnects the subscriber; the hub removes it on the next
/// broadcast.
pub struct Subscription {
    id: SubscriberId,
    receiver: broadcast::Receiver<Arc<HubMessage>>,
    metrics: Arc<PipelineMetrics>,
    overflowed: u64,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next message.
    ///
    /// Returns `None` once the subscriber has been unsubscribed and its queue
    /// is drained.
    pub async fn recv(&mut self) -> Option<Arc<HubMessage>> {
        loop {
            match self.receiver.recv().await {
                Ok(message) => return Some(message),
                Err(RecvError::Lagged(missed)) => self.lagged(missed),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Take the next message if one is queued
    pub fn try_recv(&mut self) -> Option<Arc<HubMessage>> {
        loop {
            match self.receiver.try_recv() {
                Ok(message) => return Some(message),
                Err(TryRecvError::Lagged(missed)) => self.lagged(missed),
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    /// Messages discarded because this subscriber fell behind, as observed
    /// by its reads so far
    pub fn overflowed(&self) -> u64 {
        self.overflowed
    }

    fn lagged(&mut self, missed: u64) {
        self.overflowed += missed;
        self.metrics.record_overflow(missed);
        debug!(subscriber = %self.id, missed, "Subscriber fell behind, oldest messages dropped");
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Set of connected subscribers and the fan-out over them
pub struct BroadcastHub {
    subscribers: Mutex<HashMap<SubscriberId, Sender>>,
    next_id: AtomicU64,
    capacity: usize,
    metrics: Arc<PipelineMetrics>,
}

impl BroadcastHub {
    /// Create a hub whose subscriber queues hold `capacity` messages
    /// (rounded up to a power of two)
    pub fn new(capacity: usize, metrics: Arc<PipelineMetrics>) -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            capacity: capacity.max(1),
            metrics,
        }
    }

    fn subscribers(&self) -> MutexGuard<'_, HashMap<SubscriberId, Sender>> {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a subscriber; it receives every broadcast issued from now on
    pub fn subscribe(&self) -> Subscription {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = broadcast::channel(self.capacity);

        let count = {
            let mut subscribers = self.subscribers();
            subscribers.insert(id, sender);
            subscribers.len()
        };

        info!(subscriber = %id, subscribers = count, "Subscriber connected");
        Subscription {
            id,
            receiver,
            metrics: self.metrics.clone(),
            overflowed: 0,
        }
    }

    /// Remove a subscriber. Unknown or already removed ids are ignored.
    ///
    /// Dropping the sender closes the channel; the receiver drains what is
    /// queued and then sees the end of the stream.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.subscribers().remove(&id);
        match removed {
            Some(_) => {
                info!(subscriber = %id, "Subscriber disconnected");
                true
            }
            None => false,
        }
    }

    /// Deliver `message` to every current subscriber without blocking.
    ///
    /// Subscribers whose receiver is gone are removed; the others still get
    /// the message. Returns the number of queues the message was placed in.
    pub fn broadcast(&self, message: HubMessage) -> usize {
        let targets: Vec<(SubscriberId, Sender)> = self
            .subscribers()
            .iter()
            .map(|(id, sender)| (*id, sender.clone()))
            .collect();

        if targets.is_empty() {
            return 0;
        }

        let message = Arc::new(message);
        let mut delivered = 0;
        let mut failed = Vec::new();

        for (id, sender) in targets {
            match sender.send(message.clone()) {
                Ok(_) => delivered += 1,
                Err(_) => failed.push(id),
            }
        }

        for id in failed {
            if self.subscribers().remove(&id).is_some() {
                self.metrics.record_subscriber_dropped();
                let error = Error::SubscriberDeliveryFailed(id);
                warn!(subscriber = %id, error = %error, "Removing subscriber");
            }
        }

        debug!(kind = message.kind(), delivered, "Broadcast complete");
        delivered
    }

    /// Number of connected subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers().len()
    }
}
