//! Structured logging.
//!
//! # Responsibilities
//! - Initialize logging subsystem
//! - Log every rpc call through a middleware
//! - Provide a per-request logger tagged with the request's tracking id
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - Log level configurable via config and environment; `RUST_LOG` wins
//! - The per-request logger is a scoped dependency, so every handler built
//!   for one request shares one tracking id

use std::time::Instant;

use tracing::Span;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;
use crate::di::{Container, ContainerError, Lifetime};
use crate::rpc::middleware::{from_fn, Middleware};

/// Install the global subscriber.
pub fn init(config: &ObservabilityConfig) -> Result<(), TryInitError> {
    let level = config.log_level.to_ascii_lowercase();
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("rpc_mux={level},tower_http={level}").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
}

/// Middleware logging method, id, duration and error code of every call.
pub fn logging_middleware() -> Middleware {
    from_fn(|handler, params, next| async move {
        let ctx = handler.request_context().cloned();
        let start = Instant::now();
        let result = next(handler, params).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let Some(ctx) = ctx else {
            return result;
        };
        match &result {
            Ok(_) => tracing::debug!(
                method = %ctx.method(),
                id = %ctx.id(),
                request_id = ctx.request_id().unwrap_or("-"),
                elapsed_ms,
                "Call completed"
            ),
            Err(err) => tracing::warn!(
                method = %ctx.method(),
                id = %ctx.id(),
                request_id = ctx.request_id().unwrap_or("-"),
                elapsed_ms,
                code = err.code,
                error = %err.message,
                "Call failed"
            ),
        }
        result
    })
}

/// Logger bound to one request's tracking id.
#[derive(Debug, Clone)]
pub struct RequestLogger {
    tracking_id: String,
    span: Span,
}

impl RequestLogger {
    pub fn new(tracking_id: impl Into<String>) -> Self {
        let tracking_id = tracking_id.into();
        let span = tracing::info_span!("rpc_request", tracking_id = %tracking_id);
        Self { tracking_id, span }
    }

    pub fn tracking_id(&self) -> &str {
        &self.tracking_id
    }

    /// Span carrying the tracking id; instrument handler futures with it.
    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn info(&self, message: &str) {
        self.span.in_scope(|| tracing::info!(tracking_id = %self.tracking_id, "{}", message));
    }

    pub fn warn(&self, message: &str) {
        self.span.in_scope(|| tracing::warn!(tracking_id = %self.tracking_id, "{}", message));
    }
}

/// Register [`RequestLogger`] as a scoped dependency keyed by the request id.
pub fn register_request_logger(container: &Container) -> Result<(), ContainerError> {
    container.register(|scope| Ok(RequestLogger::new(scope.key())), Lifetime::Scoped)
}
