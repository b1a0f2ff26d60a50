//! HTTP stream server
//!
//! Binds the listener and serves the streaming endpoint until shut down.

use std::future::{Future, IntoFuture};
use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;

use crate::error::Result;
use crate::hub::BroadcastHub;
use crate::server::config::ServerConfig;
use crate::server::endpoint;

/// HTTP server streaming the hub's output
pub struct StreamServer {
    config: ServerConfig,
    hub: BroadcastHub,
}

impl StreamServer {
    /// Create a new server distributing samples from `hub`
    pub fn new(config: ServerConfig, hub: BroadcastHub) -> Self {
        Self { config, hub }
    }

    fn router(&self) -> Router {
        endpoint::router(self.hub.clone(), &self.config)
    }

    /// Run the server
    ///
    /// This method blocks until the server fails.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server until `shutdown` resolves
    ///
    /// Open streams are not drained on shutdown; they end when the runtime
    /// stops.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        self.config.validate()?;
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        self.config.validate()?;

        let addr = listener.local_addr()?;
        tracing::info!(
            addr = %addr,
            endpoint = %self.config.endpoint,
            "HTTP server listening"
        );

        let app = self
            .router()
            .into_make_service_with_connect_info::<SocketAddr>();
        let server = axum::serve(listener, app).into_future();

        tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = server => {
                result?;
                Ok(())
            }
        }
    }
}
