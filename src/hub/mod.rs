//! Broadcast hub for live audio fan-out
//!
//! One producer publishes samples; every connected listener drains its own
//! queue at its own pace.
//!
//! # Architecture
//!
//! ```text
//!                        BroadcastHub
//!                 ┌─────────────────────────┐
//!                 │ Mutex<Registry {        │
//!                 │   subscribers: HashMap< │
//!                 │     SubscriberId,       │
//!                 │     mpsc::Sender>       │
//!                 │ }>                      │
//!                 └───────────┬─────────────┘
//!                             │
//!         ┌───────────────────┼───────────────────┐
//!         │                   │                   │
//!         ▼                   ▼                   ▼
//!    [Producer]         [Subscription]      [Subscription]
//!    publish()          recv()              recv()
//!         │                   │                   │
//!         └──► hub.publish() ─┴──► HTTP body ────►TCP
//! ```
//!
//! # Backpressure
//!
//! There is none. Queues are unbounded so a slow listener never stalls the
//! encoder; a listener that stops reading accumulates backlog until its
//! connection is closed. [`Subscription::backlog`] and
//! [`HubStats::max_backlog`](crate::stats::HubStats) expose the growth.

pub mod sample;
pub mod store;
pub mod subscriber;

pub use sample::Sample;
pub use store::BroadcastHub;
pub use subscriber::{SubscriberId, Subscription};
