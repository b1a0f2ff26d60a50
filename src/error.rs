//! Error types
//!
//! A single error enum covers the encoder process boundary, the HTTP listener
//! and command-line configuration.

use thiserror::Error;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for micstream operations
#[derive(Debug, Error)]
pub enum Error {
    /// The encoder binary could not be found or spawned
    #[error("failed to launch encoder `{program}`: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// `start` was called while an encoder process is still active
    #[error("encoder process is already running")]
    AlreadyRunning,

    /// Delivering a control signal to the encoder failed
    #[cfg(unix)]
    #[error("failed to signal encoder process: {0}")]
    Signal(#[from] nix::errno::Errno),

    /// Operation is not available on this platform
    #[error("unsupported on this platform: {0}")]
    Unsupported(&'static str),

    /// Invalid command-line option or configuration value
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_error_names_program() {
        let err = Error::Launch {
            program: "ffmpeg-missing".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };

        let message = err.to_string();
        assert!(message.contains("ffmpeg-missing"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::AddrInUse, "busy");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
