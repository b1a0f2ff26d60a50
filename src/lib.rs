//! micstream: live audio capture broadcast over HTTP
//!
//! An ffmpeg child process captures a recording device and encodes it to
//! mp3; the encoded stream is fanned out to any number of HTTP listeners.
//!
//! ```text
//!  ProcessSupervisor ──stdout──► PacedSampleSource ──► pipeline::run
//!                                                          │
//!                                                   BroadcastHub::publish
//!                                                          │
//!                                    ┌─────────────────────┼──────────────┐
//!                                    ▼                     ▼              ▼
//!                              Subscription          Subscription   Subscription
//!                              (GET /stream.mp3)     ...            ...
//! ```
//!
//! # Example
//! ```no_run
//! use micstream::encoder::{EncoderConfig, ProcessSupervisor};
//! use micstream::hub::BroadcastHub;
//! use micstream::server::{ServerConfig, StreamServer};
//! use micstream::source::PacedSampleSource;
//!
//! # async fn example() -> micstream::error::Result<()> {
//! let config = EncoderConfig::with_device("default");
//! let mut supervisor = ProcessSupervisor::from_config(&config);
//! let output = supervisor.spawn(&config)?;
//!
//! let hub = BroadcastHub::new();
//! let source = PacedSampleSource::from_output(output, config.chunk_size);
//! tokio::spawn(micstream::pipeline::run(source.into_stream(), hub.clone()));
//!
//! let server = StreamServer::new(ServerConfig::default(), hub);
//! server.run_until(async { let _ = tokio::signal::ctrl_c().await; }).await?;
//!
//! supervisor.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod encoder;
pub mod error;
pub mod hub;
pub mod pipeline;
pub mod server;
pub mod source;
pub mod stats;

pub use encoder::{EncoderConfig, ProcessSupervisor};
pub use error::{Error, Result};
pub use hub::{BroadcastHub, Sample, Subscription};
pub use server::{ServerConfig, StreamServer};
pub use source::PacedSampleSource;
