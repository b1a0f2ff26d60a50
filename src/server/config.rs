//! Server configuration

use std::net::SocketAddr;

use crate::error::{Error, Result};

/// Default streaming path
pub const DEFAULT_ENDPOINT: &str = "/stream.mp3";

/// Content type of the audio stream
pub const CONTENT_TYPE: &str = "audio/mpeg";

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// HTTP path serving the stream
    pub endpoint: String,

    /// Maximum concurrent listeners (0 = unlimited)
    pub max_listeners: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            max_listeners: 0, // Unlimited
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the streaming path; a leading `/` is added if missing
    pub fn endpoint(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.endpoint = if path.starts_with('/') {
            path
        } else {
            format!("/{}", path)
        };
        self
    }

    /// Set maximum concurrent listeners
    pub fn max_listeners(mut self, max: usize) -> Self {
        self.max_listeners = max;
        self
    }

    /// Check that the endpoint is a literal path
    ///
    /// Braces and segments starting with `:` or `*` would be read as route
    /// captures, so they are rejected.
    pub fn validate(&self) -> Result<()> {
        let path = &self.endpoint;

        if !path.starts_with('/') {
            return Err(Error::InvalidArgument(format!(
                "endpoint must start with '/': {}",
                path
            )));
        }

        if path.contains(['{', '}']) {
            return Err(Error::InvalidArgument(format!(
                "endpoint must not contain braces: {}",
                path
            )));
        }

        if path
            .split('/')
            .any(|segment| segment.starts_with(':') || segment.starts_with('*'))
        {
            return Err(Error::InvalidArgument(format!(
                "endpoint segments must not start with ':' or '*': {}",
                path
            )));
        }

        Ok(())
    }
}
