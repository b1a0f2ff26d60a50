//! Broadcast hub implementation
//!
//! The single fan-out point between the production task and every
//! connected listener.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::stats::HubStats;

use super::sample::Sample;
use super::subscriber::{self, SubscriberEntry, SubscriberId, Subscription};

/// Registry state guarded by the hub lock
#[derive(Default)]
struct Registry {
    subscribers: HashMap<SubscriberId, SubscriberEntry>,
    next_id: u64,
    total_subscribers: u64,
    samples_published: u64,
    bytes_published: u64,
}

/// State shared between the hub and its subscriptions
pub(crate) struct Shared {
    registry: Mutex<Registry>,
}

impl Shared {
    /// Remove a subscriber; returns whether it was registered
    pub(super) fn remove(&self, id: SubscriberId) -> bool {
        let (entry, remaining) = {
            let mut registry = self.registry.lock();
            let entry = registry.subscribers.remove(&id);
            (entry, registry.subscribers.len())
        };

        let Some(entry) = entry else {
            return false;
        };

        entry.close();

        tracing::info!(
            subscriber = %id,
            discarded = entry.backlog(),
            subscribers = remaining,
            "Subscriber removed"
        );

        true
    }
}

/// Fan-out hub for audio samples
///
/// Every subscriber gets its own unbounded queue. `publish` pushes into all of
/// them under one short-lived lock, so the set of recipients of a sample is
/// exactly the set registered when it was published, and each subscriber
/// observes samples in publish order.
///
/// Cloning the hub is cheap; all clones share the same registry.
#[derive(Clone)]
pub struct BroadcastHub {
    shared: Arc<Shared>,
}

impl BroadcastHub {
    /// Create an empty hub
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                registry: Mutex::new(Registry {
                    next_id: 1,
                    ..Default::default()
                }),
            }),
        }
    }

    /// Register a new subscriber with an empty queue
    pub fn register(&self) -> Subscription {
        let mut registry = self.shared.registry.lock();

        let id = SubscriberId(registry.next_id);
        registry.next_id += 1;
        registry.total_subscribers += 1;

        let (entry, subscription) = subscriber::channel(id, Arc::downgrade(&self.shared));
        registry.subscribers.insert(id, entry);

        tracing::info!(
            subscriber = %id,
            subscribers = registry.subscribers.len(),
            "Subscriber added"
        );

        subscription
    }

    /// Remove a subscriber, discarding its undelivered samples
    ///
    /// Returns false if the subscriber was not registered.
    pub fn unregister(&self, id: SubscriberId) -> bool {
        self.shared.remove(id)
    }

    /// Offer a sample to every registered subscriber
    ///
    /// Empty samples are ignored. Never waits on a consumer. Returns the
    /// number of subscribers the sample was queued for.
    pub fn publish(&self, sample: Sample) -> usize {
        if sample.is_empty() {
            return 0;
        }

        let mut registry = self.shared.registry.lock();
        registry.samples_published += 1;
        registry.bytes_published += sample.len() as u64;

        let delivered = registry
            .subscribers
            .values()
            .filter(|entry| entry.offer(&sample))
            .count();

        tracing::trace!(
            bytes = sample.len(),
            subscribers = delivered,
            "Sample published"
        );

        delivered
    }

    /// Number of registered subscribers
    pub fn subscriber_count(&self) -> usize {
        self.shared.registry.lock().subscribers.len()
    }

    /// Whether a subscriber is currently registered
    pub fn is_registered(&self, id: SubscriberId) -> bool {
        self.shared.registry.lock().subscribers.contains_key(&id)
    }

    /// Snapshot of hub counters
    pub fn stats(&self) -> HubStats {
        let registry = self.shared.registry.lock();

        HubStats {
            subscriber_count: registry.subscribers.len(),
            total_subscribers: registry.total_subscribers,
            samples_published: registry.samples_published,
            bytes_published: registry.bytes_published,
            max_backlog: registry
                .subscribers
                .values()
                .map(SubscriberEntry::backlog)
                .max()
                .unwrap_or(0),
        }
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}
