//! Statistics for the broadcast pipeline

use std::time::Duration;

use tokio::time::Instant;

use crate::hub::Sample;

/// Delivery statistics for one subscriber
#[derive(Debug, Clone)]
pub struct SubscriberStats {
    /// Samples drained from the queue
    pub samples_received: u64,
    /// Bytes drained from the queue
    pub bytes_received: u64,
    /// When the subscriber registered
    pub connected_at: Instant,
}

impl SubscriberStats {
    /// Create new stats tracker
    pub fn new() -> Self {
        Self {
            samples_received: 0,
            bytes_received: 0,
            connected_at: Instant::now(),
        }
    }

    /// Account for one drained sample
    pub fn record(&mut self, sample: &Sample) {
        self.samples_received += 1;
        self.bytes_received += sample.len() as u64;
    }

    /// Time since the subscriber registered
    pub fn duration(&self) -> Duration {
        self.connected_at.elapsed()
    }

    /// Average delivered bitrate in bits per second
    pub fn bitrate(&self) -> u64 {
        bitrate(self.bytes_received, self.duration())
    }
}

impl Default for SubscriberStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of hub-wide counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HubStats {
    /// Currently registered subscribers
    pub subscriber_count: usize,
    /// Subscribers registered since the hub was created
    pub total_subscribers: u64,
    /// Non-empty samples published
    pub samples_published: u64,
    /// Bytes published
    pub bytes_published: u64,
    /// Largest undrained queue among current subscribers
    pub max_backlog: usize,
}

/// Statistics for the production task
#[derive(Debug, Clone)]
pub struct ProducerStats {
    /// Samples taken from the source
    pub samples: u64,
    /// Bytes taken from the source
    pub bytes: u64,
    /// When production started
    pub started_at: Instant,
}

impl ProducerStats {
    /// Create new stats tracker, starting the clock now
    pub fn new() -> Self {
        Self {
            samples: 0,
            bytes: 0,
            started_at: Instant::now(),
        }
    }

    /// Account for one produced sample
    pub fn record(&mut self, sample: &Sample) {
        self.samples += 1;
        self.bytes += sample.len() as u64;
    }

    /// Time since production started
    pub fn duration(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Average produced bitrate in bits per second
    pub fn bitrate(&self) -> u64 {
        bitrate(self.bytes, self.duration())
    }
}

impl Default for ProducerStats {
    fn default() -> Self {
        Self::new()
    }
}

fn bitrate(bytes: u64, duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if secs > 0 {
        (bytes * 8) / secs
    } else {
        0
    }
}
