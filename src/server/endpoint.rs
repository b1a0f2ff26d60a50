//! HTTP streaming endpoint
//!
//! Each GET registers a subscriber and streams its queue as a chunked
//! `audio/mpeg` body. The body owns the subscription, so when the client
//! goes away and the body is dropped the subscriber is unregistered.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use crate::hub::{BroadcastHub, SubscriberId};

use super::config::{ServerConfig, CONTENT_TYPE};

/// State shared by all endpoint requests
#[derive(Clone)]
struct EndpointState {
    hub: BroadcastHub,
    max_listeners: usize,
    /// Response bodies currently streaming
    active: Arc<AtomicUsize>,
}

/// Build the router serving the stream at the configured path
pub fn router(hub: BroadcastHub, config: &ServerConfig) -> Router {
    let state = EndpointState {
        hub,
        max_listeners: config.max_listeners,
        active: Arc::new(AtomicUsize::new(0)),
    };

    Router::new()
        .route(&config.endpoint, get(stream_audio))
        .with_state(state)
}

async fn stream_audio(
    State(state): State<EndpointState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
) -> Response {
    if state.max_listeners > 0 && state.hub.subscriber_count() >= state.max_listeners {
        tracing::warn!(peer = %peer, "Listener rejected: limit reached");
        return (StatusCode::SERVICE_UNAVAILABLE, "listener limit reached").into_response();
    }

    let subscription = state.hub.register();
    let guard = ListenerGuard::new(peer, subscription.id(), Arc::clone(&state.active));

    // The guard travels with the subscription so both live as long as the body
    let body = futures::stream::unfold(
        (subscription, guard),
        |(mut subscription, guard)| async move {
            let sample = subscription.recv().await?;
            tracing::debug!(
                subscriber = %guard.subscriber,
                bytes = sample.len(),
                "Sending audio sample"
            );
            Some((Ok::<_, Infallible>(sample.into_bytes()), (subscription, guard)))
        },
    );

    (
        [
            (header::CONTENT_TYPE, CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(body),
    )
        .into_response()
}

/// Tracks one listener's connection for as long as its body streams
struct ListenerGuard {
    peer: SocketAddr,
    subscriber: SubscriberId,
    active: Arc<AtomicUsize>,
}

impl ListenerGuard {
    fn new(peer: SocketAddr, subscriber: SubscriberId, active: Arc<AtomicUsize>) -> Self {
        let listeners = active.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::info!(
            peer = %peer,
            subscriber = %subscriber,
            listeners = listeners,
            "Listener connected"
        );

        Self {
            peer,
            subscriber,
            active,
        }
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        let listeners = self.active.fetch_sub(1, Ordering::Relaxed) - 1;
        tracing::info!(
            peer = %self.peer,
            subscriber = %self.subscriber,
            listeners = listeners,
            "Listener disconnected"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::Sample;

    fn state(max_listeners: usize) -> EndpointState {
        EndpointState {
            hub: BroadcastHub::new(),
            max_listeners,
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn peer() -> ConnectInfo<SocketAddr> {
        ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000)))
    }

    #[tokio::test]
    async fn test_listener_tracked_until_body_dropped() {
        let state = state(0);

        let response = stream_audio(State(state.clone()), peer()).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.active.load(Ordering::Relaxed), 1);
        assert_eq!(state.hub.subscriber_count(), 1);

        state.hub.publish(Sample::from(&b"AAAA"[..]));
        assert_eq!(state.active.load(Ordering::Relaxed), 1);

        drop(response);

        assert_eq!(state.active.load(Ordering::Relaxed), 0);
        assert_eq!(state.hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_rejected_listener_is_not_tracked() {
        let state = state(1);

        let first = stream_audio(State(state.clone()), peer()).await;
        let second = stream_audio(State(state.clone()), peer()).await;

        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(second.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(state.active.load(Ordering::Relaxed), 1);
        assert_eq!(state.hub.subscriber_count(), 1);
    }
}
