//! Per-destination batch accumulator.
//!
//! Collects [`Task`]s per destination and hands a batch to that
//! destination's [`DeliveryQueue`] once it reaches the size threshold.
//! One accumulator belongs to exactly one ingestion worker; it runs on a
//! blocking thread and blocks there when a delivery queue is full.

use std::collections::HashMap;
use std::sync::Arc;

use memload_core::{Batch, Task};

use crate::delivery::Routes;
use crate::error::QueueError;

/// Accumulates tasks into per-destination batches.
pub struct BatchAccumulator {
    routes: Arc<Routes>,
    pending: HashMap<String, Batch>,
    max_size: usize,
    flushed: u64,
}

impl BatchAccumulator {
    /// Create an accumulator over `routes`.
    ///
    /// - `max_size`: flush a destination's batch once it holds this many
    ///   tasks. `0` flushes on every append.
    pub fn new(routes: Arc<Routes>, max_size: usize) -> Self {
        Self {
            routes,
            pending: HashMap::new(),
            max_size,
            flushed: 0,
        }
    }

    /// Add a task to `destination`'s batch, flushing it if the threshold is hit.
    ///
    /// Blocks while the destination's queue is full.
    pub fn append(&mut self, destination: &str, task: Task) -> Result<(), QueueError> {
        if !self.routes.contains(destination) {
            return Err(QueueError::UnknownDestination(destination.to_string()));
        }

        let batch = self.pending.entry(destination.to_string()).or_default();
        batch.push(task);

        if self.max_size == 0 || batch.len() >= self.max_size {
            let full = std::mem::take(batch);
            self.hand_off(destination, full)?;
        }
        Ok(())
    }

    /// Hand every non-empty batch to its queue.
    ///
    /// Walks the routing table rather than the pending map so every known
    /// destination is visited exactly once.
    pub fn flush_all(&mut self) -> Result<(), QueueError> {
        let routes = Arc::clone(&self.routes);
        for destination in routes.destinations() {
            let batch = match self.pending.get_mut(destination) {
                Some(batch) if !batch.is_empty() => std::mem::take(batch),
                _ => continue,
            };
            self.hand_off(destination, batch)?;
        }
        Ok(())
    }

    #[cfg(test)]
    fn pending(&self, destination: &str) -> usize {
        self.pending.get(destination).map_or(0, Vec::len)
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.pending.values().all(Vec::is_empty)
    }

    /// Batches handed off so far.
    pub fn flushed_batches(&self) -> u64 {
        self.flushed
    }

    fn hand_off(&mut self, destination: &str, batch: Batch) -> Result<(), QueueError> {
        let queue = self
            .routes
            .get(destination)
            .ok_or_else(|| QueueError::UnknownDestination(destination.to_string()))?;
        queue.blocking_send(batch)?;
        self.flushed += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::{delivery_queue, DeliveryReceiver};

    fn make_task(key: &str) -> Task {
        Task {
            key: key.to_string(),
            payload: key.as_bytes().to_vec(),
        }
    }

    fn routes(destinations: &[&str]) -> (Arc<Routes>, Vec<DeliveryReceiver>) {
        let mut receivers = Vec::new();
        let mut queues = Vec::new();
        for d in destinations {
            let (q, rx) = delivery_queue(*d, 64);
            queues.push(q);
            receivers.push(rx);
        }
        (Arc::new(Routes::new(queues)), receivers)
    }

    /// Close the routes and collect everything a receiver got, batch by batch.
    fn drain(rx: &mut DeliveryReceiver) -> Vec<Vec<String>> {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        rt.block_on(async {
            let mut out = Vec::new();
            while let Some(batch) = rx.recv().await {
                out.push(batch.into_iter().map(|t| t.key).collect());
            }
            out
        })
    }

    #[test]
    fn test_flush_on_size() {
        let (routes, mut rxs) = routes(&["idfa"]);
        let mut acc = BatchAccumulator::new(routes, 3);
        for i in 0..3 {
            acc.append("idfa", make_task(&format!("idfa:{i}"))).unwrap();
        }
        assert_eq!(acc.pending("idfa"), 0);
        assert_eq!(acc.flushed_batches(), 1);

        drop(acc);
        assert_eq!(drain(&mut rxs[0]), vec![vec!["idfa:0", "idfa:1", "idfa:2"]]);
    }

    #[test]
    fn test_no_flush_below_size() {
        let (routes, _rxs) = routes(&["idfa"]);
        let mut acc = BatchAccumulator::new(routes, 5);
        acc.append("idfa", make_task("idfa:1")).unwrap();
        acc.append("idfa", make_task("idfa:2")).unwrap();
        assert_eq!(acc.pending("idfa"), 2);
        assert_eq!(acc.flushed_batches(), 0);
        assert!(!acc.is_empty());
    }

    #[test]
    fn test_zero_threshold_flushes_every_task() {
        let (routes, mut rxs) = routes(&["gaid"]);
        let mut acc = BatchAccumulator::new(routes, 0);
        acc.append("gaid", make_task("gaid:1")).unwrap();
        acc.append("gaid", make_task("gaid:2")).unwrap();
        assert!(acc.is_empty());

        drop(acc);
        assert_eq!(drain(&mut rxs[0]), vec![vec!["gaid:1"], vec!["gaid:2"]]);
    }

    #[test]
    fn test_flush_all_sends_only_non_empty_batches() {
        let (routes, mut rxs) = routes(&["adid", "gaid", "idfa"]);
        let mut acc = BatchAccumulator::new(routes, 10);
        acc.append("idfa", make_task("idfa:1")).unwrap();
        acc.append("adid", make_task("adid:1")).unwrap();
        acc.append("idfa", make_task("idfa:2")).unwrap();

        acc.flush_all().unwrap();
        assert!(acc.is_empty());
        assert_eq!(acc.flushed_batches(), 2);

        // Second flush has nothing left to send.
        acc.flush_all().unwrap();
        assert_eq!(acc.flushed_batches(), 2);

        drop(acc);
        assert_eq!(drain(&mut rxs[0]), vec![vec!["adid:1"]]);
        assert!(drain(&mut rxs[1]).is_empty());
        assert_eq!(drain(&mut rxs[2]), vec![vec!["idfa:1", "idfa:2"]]);
    }

    #[test]
    fn test_unknown_destination_is_rejected() {
        let (routes, _rxs) = routes(&["idfa"]);
        let mut acc = BatchAccumulator::new(routes, 0);
        let err = acc.append("xxxx", make_task("xxxx:1")).unwrap_err();
        assert!(matches!(err, QueueError::UnknownDestination(ref d) if d == "xxxx"));
    }

    #[test]
    fn test_closed_queue_surfaces_error() {
        let (routes, rxs) = routes(&["dvid"]);
        drop(rxs);
        let mut acc = BatchAccumulator::new(routes, 0);
        let err = acc.append("dvid", make_task("dvid:1")).unwrap_err();
        assert!(matches!(err, QueueError::Closed(_)));
    }
}
