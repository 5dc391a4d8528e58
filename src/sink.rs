//! JSON-lines writer draining a hub subscription

use crate::hub::Subscription;
use crate::types::HubMessage;
use anyhow::Result;
use std::io;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, warn};

/// Writes every message of one subscription as a line of JSON
pub struct JsonLinesSink<W> {
    subscription: Subscription,
    writer: W,
    written: u64,
}

impl<W: AsyncWrite + Unpin> JsonLinesSink<W> {
    pub fn new(subscription: Subscription, writer: W) -> Self {
        Self {
            subscription,
            writer,
            written: 0,
        }
    }

    /// Write one message
    pub async fn publish(&mut self, message: &HubMessage) -> Result<()> {
        let mut payload = serde_json::to_vec(message)?;
        payload.push(b'\n');

        self.writer.write_all(&payload).await?;
        self.writer.flush().await?;
        self.written += 1;

        debug!(
            subscriber = %self.subscription.id(),
            kind = message.kind(),
            "Published hub message"
        );
        Ok(())
    }

    /// Drain the subscription until it is unsubscribed or the reader goes
    /// away; returns the writer and the number of lines written
    pub async fn run(mut self) -> (W, u64) {
        while let Some(message) = self.subscription.recv().await {
            if let Err(e) = self.publish(&message).await {
                if is_broken_pipe(&e) {
                    warn!(
                        subscriber = %self.subscription.id(),
                        written = self.written,
                        "Output closed, sink stopping"
                    );
                    break;
                }
                error!(
                    subscriber = %self.subscription.id(),
                    kind = message.kind(),
                    error = %e,
                    "Failed to write hub message"
                );
            }
        }
        (self.writer, self.written)
    }
}

fn is_broken_pipe(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<io::Error>()
        .is_some_and(|e| e.kind() == io::ErrorKind::BrokenPipe)
}
