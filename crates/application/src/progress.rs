//! In-process publish/subscribe for benchmark run progress.
//!
//! One broker per process, keyed by run id. The bus is not a queue: events
//! published with no subscribers are discarded. Delivery order is FIFO per
//! subscription; a subscriber whose channel is gone is dropped silently; a
//! terminal event closes every subscriber stream for the run after delivery.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use arguslm_domain::{BenchmarkRunId, ProgressEvent};

/// Identifies one subscription for unsubscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionHandle {
    run_id: BenchmarkRunId,
    subscriber_id: u64,
}

/// A live subscription: the handle plus the ordered event receiver.
pub struct Subscription {
    pub handle: SubscriptionHandle,
    pub receiver: mpsc::UnboundedReceiver<ProgressEvent>,
}

/// In-process progress broker.
#[derive(Default)]
pub struct ProgressBus {
    subscribers: Mutex<HashMap<BenchmarkRunId, Vec<(u64, mpsc::UnboundedSender<ProgressEvent>)>>>,
    next_id: AtomicU64,
}

impl ProgressBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber for one run's events.
    pub fn subscribe(&self, run_id: BenchmarkRunId) -> Subscription {
        let subscriber_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .entry(run_id)
            .or_default()
            .push((subscriber_id, tx));
        Subscription {
            handle: SubscriptionHandle {
                run_id,
                subscriber_id,
            },
            receiver: rx,
        }
    }

    /// Deliver an event to every subscriber of the run, dropping any whose
    /// channel is closed. Returns the number of successful deliveries.
    ///
    /// Terminal events additionally close the run's subscriber streams:
    /// receivers drain what was already delivered, then end.
    pub fn publish(&self, run_id: BenchmarkRunId, event: ProgressEvent) -> usize {
        let mut subscribers = self.subscribers.lock();
        let Some(entries) = subscribers.get_mut(&run_id) else {
            return 0;
        };

        entries.retain(|(_, tx)| tx.send(event.clone()).is_ok());
        let delivered = entries.len();

        if event.is_terminal() || entries.is_empty() {
            subscribers.remove(&run_id);
            debug!(%run_id, "closed progress subscriptions");
        }
        delivered
    }

    /// Remove one subscription. Safe to call after the run already closed.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) {
        let mut subscribers = self.subscribers.lock();
        if let Some(entries) = subscribers.get_mut(&handle.run_id) {
            entries.retain(|(id, _)| *id != handle.subscriber_id);
            if entries.is_empty() {
                subscribers.remove(&handle.run_id);
            }
        }
    }

    /// Number of live subscribers for a run.
    pub fn subscriber_count(&self, run_id: BenchmarkRunId) -> usize {
        self.subscribers
            .lock()
            .get(&run_id)
            .map(|entries| entries.len())
            .unwrap_or(0)
    }
}
