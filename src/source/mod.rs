//! Paced sample source
//!
//! Turns the encoder's output pipe into a sequence of [`Sample`]s delivered
//! at real-time cadence.
//!
//! The delay between launching the encoder and its first output byte is
//! measured once (the *latency*). From then on a block is only surfaced when
//! at least `latency` has passed since the first sample; blocks that arrive
//! earlier are dropped. This discards the burst of buffered audio some
//! capture devices emit at start-up, keeping listeners close to live.

use std::io;
use std::time::Duration;

use futures::Stream;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::ChildStdout;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::encoder::{EncoderOutput, EncoderState};
use crate::hub::Sample;

/// Source of paced audio samples read from an encoder
pub struct PacedSampleSource<R> {
    reader: Option<R>,
    chunk_size: usize,
    started_at: Instant,
    first_sample_at: Option<Instant>,
    latency: Duration,
    exit: Option<watch::Receiver<EncoderState>>,
}

impl PacedSampleSource<ChildStdout> {
    /// Read from a freshly started encoder
    pub fn from_output(output: EncoderOutput, chunk_size: usize) -> Self {
        Self::new(output.stdout, output.started_at, chunk_size).with_exit_signal(output.state)
    }
}

impl<R: AsyncRead + Unpin> PacedSampleSource<R> {
    /// Create a source reading `chunk_size` blocks from `reader`
    ///
    /// `started_at` is when the producing process was launched.
    pub fn new(reader: R, started_at: Instant, chunk_size: usize) -> Self {
        Self {
            reader: Some(reader),
            chunk_size: chunk_size.max(1),
            started_at,
            first_sample_at: None,
            latency: Duration::ZERO,
            exit: None,
        }
    }

    /// End the sequence once the encoder stops running
    pub fn with_exit_signal(mut self, state: watch::Receiver<EncoderState>) -> Self {
        self.exit = Some(state);
        self
    }

    /// Estimated start-up latency (zero until the first sample arrives)
    pub fn latency(&self) -> Duration {
        self.latency
    }

    /// When the first non-empty block was read
    pub fn first_sample_at(&self) -> Option<Instant> {
        self.first_sample_at
    }

    /// Whether the sequence has ended
    pub fn is_finished(&self) -> bool {
        self.reader.is_none()
    }

    /// Next paced sample, or `None` once the encoder output has ended
    pub async fn next_sample(&mut self) -> Option<Sample> {
        loop {
            let block = match self.read_block().await {
                Ok(Some(block)) => block,
                Ok(None) => {
                    self.finish();
                    return None;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Encoder output read failed");
                    self.finish();
                    return None;
                }
            };

            let now = Instant::now();
            let first = match self.first_sample_at {
                Some(first) => first,
                None => self.calibrate(now),
            };

            if now.duration_since(first) >= self.latency {
                return Some(Sample::from(block));
            }

            tracing::trace!(bytes = block.len(), "Dropping early block");
        }
    }

    /// Turn the source into a stream of samples
    pub fn into_stream(self) -> impl Stream<Item = Sample> {
        futures::stream::unfold(self, |mut source| async move {
            let sample = source.next_sample().await?;
            Some((sample, source))
        })
    }

    fn calibrate(&mut self, now: Instant) -> Instant {
        self.latency = now.saturating_duration_since(self.started_at);
        self.first_sample_at = Some(now);

        tracing::info!(
            latency_ms = self.latency.as_millis() as u64,
            "Estimated latency"
        );

        now
    }

    /// Fill one block; a short block means the stream ended mid-way
    async fn read_block(&mut self) -> io::Result<Option<Vec<u8>>> {
        let Self {
            reader,
            exit,
            chunk_size,
            ..
        } = self;

        let Some(reader) = reader.as_mut() else {
            return Ok(None);
        };

        if let Some(exit) = exit.as_ref() {
            let state = *exit.borrow();
            if is_stopped(state) {
                return Ok(None);
            }
        }

        let mut buf = vec![0u8; *chunk_size];
        let mut filled = 0;

        while filled < buf.len() {
            let read = reader.read(&mut buf[filled..]);

            let n = match exit.as_mut() {
                Some(exit) => tokio::select! {
                    n = read => n?,
                    () = stopped(exit) => {
                        tracing::debug!("Encoder stopped, ending sample stream");
                        return Ok(None);
                    }
                },
                None => read.await?,
            };

            if n == 0 {
                break;
            }
            filled += n;
        }

        if filled == 0 {
            return Ok(None);
        }

        buf.truncate(filled);
        Ok(Some(buf))
    }

    /// Release the output pipe
    fn finish(&mut self) {
        if self.reader.take().is_some() {
            tracing::debug!("Encoder output closed");
        }
        self.exit = None;
    }
}

fn is_stopped(state: EncoderState) -> bool {
    matches!(state, EncoderState::Idle | EncoderState::Terminating)
}

async fn stopped(exit: &mut watch::Receiver<EncoderState>) {
    // A dropped supervisor counts as stopped too
    let _ = exit.wait_for(|state| is_stopped(*state)).await;
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use tokio::io::AsyncWriteExt;
    use tokio_test::io::Builder;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_latency_calibration() {
        let started_at = Instant::now();
        let reader = Builder::new()
            .wait(Duration::from_millis(300))
            .read(b"AAAA")
            .read(b"BBBB")
            .wait(Duration::from_millis(300))
            .read(b"CCCC")
            .read(b"DDDD")
            .build();

        let mut source = PacedSampleSource::new(reader, started_at, 4);

        let mut delivered = Vec::new();
        while let Some(sample) = source.next_sample().await {
            delivered.push((sample, Instant::now()));
        }

        let latency = source.latency();
        assert!(latency >= Duration::from_millis(300));
        assert!(latency < Duration::from_millis(310));

        let first = source.first_sample_at().unwrap();
        assert_eq!(first.duration_since(started_at), latency);

        // The early burst is dropped
        let samples: Vec<_> = delivered.iter().map(|(s, _)| s.clone()).collect();
        assert_eq!(
            samples,
            vec![Sample::from(&b"CCCC"[..]), Sample::from(&b"DDDD"[..])]
        );

        for (_, at) in &delivered {
            assert!(*at >= first + latency);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_latency_delivers_everything() {
        let reader = Builder::new().read(b"AAAA").read(b"BBBB").build();

        let source = PacedSampleSource::new(reader, Instant::now(), 4);
        let samples: Vec<_> = source.into_stream().collect().await;

        assert_eq!(
            samples,
            vec![Sample::from(&b"AAAA"[..]), Sample::from(&b"BBBB"[..])]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocks_are_filled_and_tail_is_short() {
        let reader = Builder::new().read(b"AAAA").read(b"BBBB").read(b"CC").build();

        let mut source = PacedSampleSource::new(reader, Instant::now(), 8);

        assert_eq!(source.next_sample().await, Some(Sample::from(&b"AAAABBBB"[..])));
        assert_eq!(source.next_sample().await, Some(Sample::from(&b"CC"[..])));
        assert_eq!(source.next_sample().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequence_is_not_restartable() {
        let reader = Builder::new().build();

        let mut source = PacedSampleSource::new(reader, Instant::now(), 4);

        assert_eq!(source.next_sample().await, None);
        assert!(source.is_finished());
        assert_eq!(source.next_sample().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_error_ends_sequence() {
        let reader = Builder::new()
            .read_error(io::Error::other("pipe broke"))
            .build();

        let mut source = PacedSampleSource::new(reader, Instant::now(), 4);

        assert_eq!(source.next_sample().await, None);
        assert!(source.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_exit_signal_ends_pending_read() {
        let (reader, mut writer) = tokio::io::duplex(64);
        let (state_tx, state_rx) = watch::channel(EncoderState::Running);

        let mut source =
            PacedSampleSource::new(reader, Instant::now(), 4).with_exit_signal(state_rx);

        writer.write_all(b"AAAA").await.unwrap();
        assert_eq!(source.next_sample().await, Some(Sample::from(&b"AAAA"[..])));

        // The writer stays open; only the state change can end the read
        let pending = tokio::spawn(async move { source.next_sample().await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        state_tx.send_replace(EncoderState::Idle);

        let result = tokio::time::timeout(Duration::from_secs(5), pending)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result, None);
        drop(writer);
    }
}
