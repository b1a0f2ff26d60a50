//! Delivery and production counters

pub mod metrics;

pub use metrics::{HubStats, ProducerStats, SubscriberStats};
