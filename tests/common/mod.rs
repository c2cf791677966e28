//! Shared utilities for integration and load testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::get;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

use rpc_mux::config::ServerConfig;
use rpc_mux::di::{ResolveError, Scope};
use rpc_mux::observability::{register_request_logger, RequestLogger};
use rpc_mux::rpc::{DispatchOptions, Middleware};
use rpc_mux::{
    BaseHandler, Container, Handler, HttpServer, MethodDeclaration, RequestContext, RpcError, RpcMux,
    Shutdown,
};

/// Echoes `Text`, fails on `"fail"`.
pub struct EchoHandler {
    base: BaseHandler,
    logger: RequestLogger,
}

#[derive(Debug, Default, Deserialize)]
pub struct EchoParams {
    #[serde(rename = "Text", default)]
    pub text: String,
    #[serde(default)]
    pub delay_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct EchoResult {
    #[serde(rename = "Text")]
    pub text: String,
    pub tracking_id: String,
}

impl Handler for EchoHandler {
    type Params = EchoParams;
    type Output = EchoResult;

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

    async fn handle(&self, params: EchoParams) -> Result<EchoResult, RpcError> {
        if params.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(params.delay_ms)).await;
        }
        if params.text == "fail" {
            self.logger.warn("refusing echo");
            return Err(RpcError::new(4000, "refused").with_data(serde_json::json!({"Text": "fail"})));
        }
        self.logger.info("echo");
        Ok(EchoResult {
            text: params.text,
            tracking_id: self.logger.tracking_id().to_string(),
        })
    }
}

/// A running server on an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: tokio::task::JoinHandle<Result<(), std::io::Error>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Start a server exposing `echo` under `/rpc/v1/` plus `/health`.
pub async fn start_server(config: ServerConfig, middlewares: Vec<Middleware>) -> TestServer {
    let container = Arc::new(Container::new());
    register_request_logger(&container).unwrap();

    let mut mux = RpcMux::new(container.clone()).with_options(DispatchOptions::from_config(&config));
    mux.register_methods(
        &config.rpc.path,
        vec![MethodDeclaration::of::<EchoHandler>("echo")],
        middlewares,
    )
    .unwrap();
    mux.route("/health", get(|| async { StatusCode::OK })).unwrap();
    container.seal();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, mux);
    let handle = tokio::spawn(server.run(listener, shutdown.subscribe()));

    TestServer { addr, shutdown, handle }
}
