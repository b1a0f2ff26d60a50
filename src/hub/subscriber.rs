//! Subscriber queue types
//!
//! The hub keeps the sending half of each subscriber's queue; the connection
//! holds the receiving half inside a [`Subscription`].

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use futures::Stream;
use tokio::sync::mpsc;

use crate::stats::SubscriberStats;

use super::sample::Sample;
use super::store::Shared;

/// Unique, monotonically increasing subscriber identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(pub(super) u64);

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Queue bookkeeping shared by both halves
#[derive(Debug, Default)]
struct QueueState {
    backlog: AtomicUsize,
    removed: AtomicBool,
}

/// Registry-side half of a subscriber
pub(super) struct SubscriberEntry {
    tx: mpsc::UnboundedSender<Sample>,
    state: Arc<QueueState>,
}

impl SubscriberEntry {
    /// Queue a sample; returns false if the receiving side is gone
    pub(super) fn offer(&self, sample: &Sample) -> bool {
        // Count before sending so a concurrent drain never underflows
        self.state.backlog.fetch_add(1, Ordering::Relaxed);

        if self.tx.send(sample.clone()).is_err() {
            self.state.backlog.fetch_sub(1, Ordering::Relaxed);
            return false;
        }

        true
    }

    /// Samples queued but not yet drained
    pub(super) fn backlog(&self) -> usize {
        self.state.backlog.load(Ordering::Relaxed)
    }

    /// Mark the queue as removed from the registry
    pub(super) fn close(&self) {
        self.state.removed.store(true, Ordering::Release);
    }
}

/// Create both halves of a subscriber queue
pub(super) fn channel(id: SubscriberId, hub: Weak<Shared>) -> (SubscriberEntry, Subscription) {
    let (tx, rx) = mpsc::unbounded_channel();
    let state = Arc::new(QueueState::default());

    let entry = SubscriberEntry {
        tx,
        state: Arc::clone(&state),
    };

    let subscription = Subscription {
        id,
        rx,
        state,
        stats: SubscriberStats::new(),
        hub,
    };

    (entry, subscription)
}

/// Handle for one registered subscriber
///
/// Draining happens through [`recv`](Self::recv). Dropping the handle
/// unregisters the subscriber from the hub, discarding anything still queued.
pub struct Subscription {
    id: SubscriberId,
    rx: mpsc::UnboundedReceiver<Sample>,
    state: Arc<QueueState>,
    stats: SubscriberStats,
    hub: Weak<Shared>,
}

impl Subscription {
    /// Subscriber identifier
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next sample
    ///
    /// Returns `None` once the subscriber has been unregistered or the hub
    /// is gone. Samples still queued at that point are discarded.
    pub async fn recv(&mut self) -> Option<Sample> {
        while let Some(sample) = self.rx.recv().await {
            if let Some(sample) = self.take(sample) {
                return Some(sample);
            }
        }
        None
    }

    /// Take the next sample if one is already queued
    pub fn try_recv(&mut self) -> Option<Sample> {
        while let Ok(sample) = self.rx.try_recv() {
            if let Some(sample) = self.take(sample) {
                return Some(sample);
            }
        }
        None
    }

    /// Whether the hub still delivers to this subscriber
    pub fn is_registered(&self) -> bool {
        !self.state.removed.load(Ordering::Acquire) && self.hub.strong_count() > 0
    }

    /// Samples queued but not yet drained
    ///
    /// The queue is unbounded: a subscriber that never drains grows this
    /// without limit.
    pub fn backlog(&self) -> usize {
        self.state.backlog.load(Ordering::Relaxed)
    }

    /// Delivery statistics so far
    pub fn stats(&self) -> &SubscriberStats {
        &self.stats
    }

    /// Turn the subscription into a stream of samples
    ///
    /// The subscriber stays registered until the stream is dropped.
    pub fn into_stream(self) -> impl Stream<Item = Sample> + Send + 'static {
        futures::stream::unfold(self, |mut subscription| async move {
            let sample = subscription.recv().await?;
            Some((sample, subscription))
        })
    }

    fn take(&mut self, sample: Sample) -> Option<Sample> {
        self.state.backlog.fetch_sub(1, Ordering::Relaxed);

        if self.state.removed.load(Ordering::Acquire) {
            return None;
        }

        self.stats.record(&sample);
        Some(sample)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(shared) = self.hub.upgrade() {
            shared.remove(self.id);
        }

        tracing::debug!(
            subscriber = %self.id,
            samples = self.stats.samples_received,
            bytes = self.stats.bytes_received,
            duration_ms = self.stats.duration().as_millis() as u64,
            "Subscription closed"
        );
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("backlog", &self.backlog())
            .finish()
    }
}
