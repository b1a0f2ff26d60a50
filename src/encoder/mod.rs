//! External encoder process management
//!
//! The encoder is an ffmpeg child process that captures the recording device
//! and writes mp3 to its standard output.

pub mod config;
pub mod supervisor;

pub use config::EncoderConfig;
pub use supervisor::{EncoderOutput, EncoderState, ProcessSupervisor};
