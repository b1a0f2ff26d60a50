//! Encoder configuration
//!
//! Holds the capture and compression settings and turns them into the
//! ffmpeg command line used by the supervisor.

use std::time::Duration;

/// Default read block size in bytes
pub const DEFAULT_CHUNK_SIZE: usize = 8192;

/// Default time to wait for a graceful encoder exit before killing it
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Encoder configuration options
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    /// Path to the ffmpeg binary
    pub program: String,

    /// ffmpeg input format (e.g. "alsa", "pulse")
    pub input_format: String,

    /// Capture device identifier
    pub device: String,

    /// Output sample rate in Hz
    pub sample_rate: u32,

    /// mp3 bitrate in kbps
    pub bitrate_kbps: u32,

    /// Number of output channels
    pub channels: u16,

    /// Size of the blocks read from the encoder output
    pub chunk_size: usize,

    /// Inherit the encoder's stderr instead of discarding it
    pub verbose: bool,

    /// Grace period between SIGTERM and SIGKILL on shutdown
    pub shutdown_timeout: Duration,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            program: "ffmpeg".to_string(),
            input_format: "alsa".to_string(),
            device: "default".to_string(),
            sample_rate: 44100,
            bitrate_kbps: 128,
            channels: 1,
            chunk_size: DEFAULT_CHUNK_SIZE,
            verbose: false,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl EncoderConfig {
    /// Create a config capturing from the given device
    pub fn with_device(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            ..Default::default()
        }
    }

    /// Set the ffmpeg binary path
    pub fn program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Set the input format / sound system
    pub fn input_format(mut self, format: impl Into<String>) -> Self {
        self.input_format = format.into();
        self
    }

    /// Set the output sample rate
    pub fn sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = rate;
        self
    }

    /// Set the mp3 bitrate in kbps
    pub fn bitrate(mut self, kbps: u32) -> Self {
        self.bitrate_kbps = kbps;
        self
    }

    /// Set the channel count
    pub fn channels(mut self, channels: u16) -> Self {
        self.channels = channels;
        self
    }

    /// Set the read block size (at least one byte)
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    /// Enable or disable verbose mode
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Set the graceful shutdown timeout
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Build the ffmpeg argument list (without the program name)
    pub fn args(&self) -> Vec<String> {
        vec![
            "-f".to_string(),
            self.input_format.clone(),
            "-i".to_string(),
            self.device.clone(),
            "-vn".to_string(),
            "-acodec".to_string(),
            "libmp3lame".to_string(),
            "-b:a".to_string(),
            format!("{}k", self.bitrate_kbps),
            "-ac".to_string(),
            self.channels.to_string(),
            "-ar".to_string(),
            self.sample_rate.to_string(),
            "-f".to_string(),
            "mp3".to_string(),
            "-".to_string(),
        ]
    }

    /// Full command line, for logging
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in self.args() {
            line.push(' ');
            line.push_str(&arg);
        }
        line
    }
}
