//! JSON-RPC 2.0 server (v1)
//!
//! Serves the `test` echo method under the configured rpc path.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http server ──▶ RpcMux ──▶ Dispatcher ──▶ middleware chain ──▶ Handler
//!                        │                          │                                  │
//!                        │                          ▼                                  ▼
//!                        │                      MethodRegistry                  Container scope
//!                        │                                                    (per-request deps)
//!     Client Response    ▼
//!     ◀────────────── JSON reply (object or array, input order)
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::routing::get;
use clap::Parser;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::Instrument;

use rpc_mux::config::{load_config, ServerConfig};
use rpc_mux::di::{ResolveError, Scope};
use rpc_mux::lifecycle::{signals, Shutdown};
use rpc_mux::observability::{self, RequestLogger};
use rpc_mux::rpc::{DispatchOptions, RequestContext};
use rpc_mux::{BaseHandler, Container, Handler, HttpServer, MethodDeclaration, RpcError, RpcMux};

#[derive(Parser)]
#[command(name = "rpc-mux")]
#[command(about = "JSON-RPC 2.0 server", long_about = None)]
struct Cli {
    /// Path to a TOML config file; defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

/// Echoes its `Text` parameter back.
struct TestHandler {
    base: BaseHandler,
    logger: RequestLogger,
}

#[derive(Debug, Default, Deserialize)]
struct TestParams {
    #[serde(rename = "Text", default)]
    text: String,
}

#[derive(Debug, Serialize)]
struct TestResult {
    #[serde(rename = "Text")]
    text: String,
}

impl Handler for TestHandler {
    type Params = TestParams;
    type Output = TestResult;

    fn provide(scope: &Scope<'_>) -> Result<Self, ResolveError> {
        Ok(Self {
            base: BaseHandler::default(),
            logger: scope.resolve()?,
        })
    }

    fn set_context(&mut self, ctx: RequestContext) {
        self.base.set_context(ctx);
    }

    fn context(&self) -> Option<&RequestContext> {
        self.base.context()
    }

    async fn handle(&self, params: TestParams) -> Result<TestResult, RpcError> {
        async move {
            self.logger.info("hello world");
            Ok(TestResult { text: params.text })
        }
        .instrument(self.logger.span().clone())
        .await
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    observability::logging::init(&config.observability)?;

    tracing::info!("rpc-mux v0.1.0 starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        rpc_path = %config.rpc.path,
        request_timeout_secs = config.timeouts.request_secs,
        concurrent_batches = config.rpc.concurrent_batches,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => observability::init_metrics(addr)?,
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let container = Arc::new(Container::new());
    observability::register_request_logger(&container)?;

    let mut mux = RpcMux::new(container.clone()).with_options(DispatchOptions::from_config(&config));
    mux.register_methods(
        &config.rpc.path,
        vec![MethodDeclaration::of::<TestHandler>("test")],
        vec![
            observability::logging_middleware(),
            observability::metrics_middleware(),
        ],
    )?;
    mux.route("/health", get(|| async { StatusCode::OK }))?;
    container.seal();

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        signals::wait_for_signal().await;
        shutdown.trigger();
    });

    let server = HttpServer::new(config, mux);
    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
