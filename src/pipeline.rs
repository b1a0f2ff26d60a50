//! Production task
//!
//! Drains a sample sequence into the broadcast hub until it ends.

use futures::{Stream, StreamExt};

use crate::hub::{BroadcastHub, Sample};
use crate::stats::ProducerStats;

/// Publish every sample from `samples` to `hub`
///
/// Returns once the sequence ends. Subscribers stay connected afterwards;
/// they simply stop receiving data.
pub async fn run<S>(samples: S, hub: BroadcastHub) -> ProducerStats
where
    S: Stream<Item = Sample>,
{
    let mut stats = ProducerStats::new();
    let mut samples = std::pin::pin!(samples);

    while let Some(sample) = samples.next().await {
        stats.record(&sample);
        let subscribers = hub.publish(sample);

        tracing::trace!(
            sample = stats.samples,
            subscribers = subscribers,
            "Sample distributed"
        );
    }

    tracing::info!(
        samples = stats.samples,
        bytes = stats.bytes,
        bitrate = stats.bitrate(),
        "Encoder stream ended"
    );

    stats
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::Instant;
    use tokio_test::io::Builder;

    use super::*;
    use crate::hub::Subscription;
    use crate::source::PacedSampleSource;

    fn drain(subscription: &mut Subscription) -> Vec<Sample> {
        std::iter::from_fn(|| subscription.try_recv()).collect()
    }

    #[tokio::test]
    async fn test_empty_chunk_is_suppressed() {
        let hub = BroadcastHub::new();
        let mut a = hub.register();
        let mut b = hub.register();

        let chunks = vec![
            Sample::from(&b"AAAA"[..]),
            Sample::from(&b""[..]),
            Sample::from(&b"BBBB"[..]),
        ];
        let stats = run(futures::stream::iter(chunks), hub.clone()).await;

        let expected = vec![Sample::from(&b"AAAA"[..]), Sample::from(&b"BBBB"[..])];
        assert_eq!(drain(&mut a), expected);
        assert_eq!(drain(&mut b), expected);

        assert_eq!(stats.samples, 3);
        assert_eq!(stats.bytes, 8);
        assert_eq!(hub.stats().samples_published, 2);

        // Subscribers are not disconnected when production ends
        assert_eq!(hub.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_subscriber_joining_mid_stream() {
        let hub = BroadcastHub::new();
        let mut early = hub.register();

        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let producer = tokio::spawn(run(channel_stream(rx), hub.clone()));

        tx.send(Sample::from(&b"AAAA"[..])).unwrap();
        assert_eq!(early.recv().await, Some(Sample::from(&b"AAAA"[..])));

        let mut late = hub.register();
        tx.send(Sample::from(&b"BBBB"[..])).unwrap();
        drop(tx);
        producer.await.unwrap();

        assert_eq!(drain(&mut early), vec![Sample::from(&b"BBBB"[..])]);
        assert_eq!(drain(&mut late), vec![Sample::from(&b"BBBB"[..])]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_paced_source_into_hub() {
        let hub = BroadcastHub::new();
        let mut listener = hub.register();

        let started_at = Instant::now();
        let reader = Builder::new()
            .wait(Duration::from_millis(100))
            .read(b"AAAA")
            .wait(Duration::from_millis(100))
            .read(b"BBBB")
            .read(b"CCCC")
            .build();

        let source = PacedSampleSource::new(reader, started_at, 4);
        let stats = run(source.into_stream(), hub.clone()).await;

        assert_eq!(stats.samples, 2);
        assert_eq!(
            drain(&mut listener),
            vec![Sample::from(&b"BBBB"[..]), Sample::from(&b"CCCC"[..])]
        );
    }

    fn channel_stream(
        mut rx: tokio::sync::mpsc::UnboundedReceiver<Sample>,
    ) -> impl Stream<Item = Sample> {
        futures::stream::poll_fn(move |cx| rx.poll_recv(cx))
    }
}
