//! Per-destination delivery queues.
//!
//! Each destination gets one multi-producer, single-consumer FIFO of
//! [`Batch`]es. A full queue blocks the producer, which is the only thing
//! bounding how far ingestion can run ahead of loading. A capacity of zero
//! turns every hand-off into a rendezvous: the producer is released only
//! once the loading worker has taken the batch.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use memload_core::Batch;

use crate::error::QueueError;

struct Envelope {
    batch: Batch,
    /// Present only in rendezvous mode; fired when the receiver takes the batch.
    handoff: Option<oneshot::Sender<()>>,
}

/// Producer half of a delivery queue. Cheap to clone.
#[derive(Clone)]
pub struct DeliveryQueue {
    destination: Arc<str>,
    tx: mpsc::Sender<Envelope>,
    rendezvous: bool,
}

/// Consumer half of a delivery queue, owned by one loading worker.
pub struct DeliveryReceiver {
    destination: Arc<str>,
    rx: mpsc::Receiver<Envelope>,
}

/// Create a delivery queue for `destination` holding up to `capacity` batches.
///
/// `capacity == 0` selects rendezvous mode.
pub fn delivery_queue(
    destination: impl Into<String>,
    capacity: usize,
) -> (DeliveryQueue, DeliveryReceiver) {
    let destination: Arc<str> = Arc::from(destination.into());
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        DeliveryQueue {
            destination: destination.clone(),
            tx,
            rendezvous: capacity == 0,
        },
        DeliveryReceiver { destination, rx },
    )
}

impl DeliveryQueue {
    pub fn destination(&self) -> &str {
        &self.destination
    }

    #[cfg(test)]
    pub(crate) async fn send(&self, batch: Batch) -> Result<(), QueueError> {
        let (envelope, handoff) = self.wrap(batch);
        self.tx.send(envelope).await.map_err(|_| self.closed())?;
        match handoff {
            Some(ack) => ack.await.map_err(|_| self.closed()),
            None => Ok(()),
        }
    }

    /// Hand a batch to the loading worker, blocking while the queue is full
    /// (or, in rendezvous mode, until the worker has taken it). Must not be
    /// called from async context.
    pub fn blocking_send(&self, batch: Batch) -> Result<(), QueueError> {
        let (envelope, handoff) = self.wrap(batch);
        self.tx.blocking_send(envelope).map_err(|_| self.closed())?;
        match handoff {
            Some(ack) => ack.blocking_recv().map_err(|_| self.closed()),
            None => Ok(()),
        }
    }

    fn wrap(&self, batch: Batch) -> (Envelope, Option<oneshot::Receiver<()>>) {
        if self.rendezvous {
            let (ack_tx, ack_rx) = oneshot::channel();
            (
                Envelope {
                    batch,
                    handoff: Some(ack_tx),
                },
                Some(ack_rx),
            )
        } else {
            (
                Envelope {
                    batch,
                    handoff: None,
                },
                None,
            )
        }
    }

    fn closed(&self) -> QueueError {
        QueueError::Closed(self.destination.to_string())
    }
}

impl fmt::Debug for DeliveryQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeliveryQueue")
            .field("destination", &self.destination)
            .field("rendezvous", &self.rendezvous)
            .finish()
    }
}

impl DeliveryReceiver {
    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Next batch, or `None` once every producer is gone and the queue is drained.
    pub async fn recv(&mut self) -> Option<Batch> {
        let envelope = self.rx.recv().await?;
        if let Some(handoff) = envelope.handoff {
            // The producer may have given up waiting; the batch is still ours.
            let _ = handoff.send(());
        }
        Some(envelope.batch)
    }
}

// ── Routing table ─────────────────────────────────────────────

/// Destination → delivery queue lookup shared by all ingestion workers.
///
/// Built once before any worker starts and never mutated afterwards. Dropping
/// the last handle (or calling [`close`](Self::close)) closes every queue.
#[derive(Debug)]
pub struct Routes {
    queues: BTreeMap<String, DeliveryQueue>,
}

impl Routes {
    pub fn new(queues: impl IntoIterator<Item = DeliveryQueue>) -> Self {
        Self {
            queues: queues
                .into_iter()
                .map(|q| (q.destination().to_string(), q))
                .collect(),
        }
    }

    pub fn get(&self, destination: &str) -> Option<&DeliveryQueue> {
        self.queues.get(destination)
    }

    pub fn contains(&self, destination: &str) -> bool {
        self.queues.contains_key(destination)
    }

    /// Known destinations, in a stable order.
    pub fn destinations(&self) -> impl Iterator<Item = &str> {
        self.queues.keys().map(String::as_str)
    }

    /// Close every queue exactly once. Loading workers drain what is
    /// buffered and then stop.
    pub fn close(self) {
        for (destination, queue) in self.queues {
            debug!(destination = %destination, "closing delivery queue");
            drop(queue);
        }
    }
}
