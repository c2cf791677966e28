//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Turn a populated [`RpcMux`] into the final Axum router
//! - Bind the router to a listener
//! - Stop accepting on shutdown and drain in-flight requests

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::config::ServerConfig;
use crate::http::mux::RpcMux;
use crate::lifecycle::shutdown;

/// HTTP server for the JSON-RPC mux.
pub struct HttpServer {
    router: Router,
    config: ServerConfig,
}

impl HttpServer {
    /// Create a new HTTP server serving everything mounted on `mux`.
    pub fn new(config: ServerConfig, mux: RpcMux) -> Self {
        let router = mux.into_router(&config);
        Self { router, config }
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            request_timeout_secs = self.config.timeouts.request_secs,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown::recv(shutdown_rx))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The finished router, for driving the server without a socket.
    pub fn into_router(self) -> Router {
        self.router
    }
}
