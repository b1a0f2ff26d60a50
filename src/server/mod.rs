//! HTTP side of the broadcaster
//!
//! A single GET endpoint streams the live mp3 feed to each listener.

pub mod config;
pub mod endpoint;
pub mod listener;

pub use config::ServerConfig;
pub use listener::StreamServer;
