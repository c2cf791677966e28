//! Request dispatch.
//!
//! # Data Flow
//! ```text
//! body bytes
//!     → protocol::parse            (single | batch | top-level error)
//!     → per request:
//!         validate                 (method non-empty, jsonrpc == "2.0")   → InvalidParams
//!         registry lookup                                                 → MethodNotFound
//!         construct handler in a scope keyed by the request id            → Internal
//!         bind request context
//!         decode params into a fresh instance                             → Internal
//!         middleware chain → handler
//!     → Response per request, in input order
//! ```
//!
//! # Design Decisions
//! - Every request ends in exactly one response; nothing escapes as a panic
//!   or error
//! - Internal failures are logged with full detail and answered with the
//!   generic internal error
//! - Batch elements are independent; they may run concurrently but keep
//!   their input position

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::rpc::context::InboundContext;
use crate::rpc::error::RpcError;
use crate::rpc::handler::{CallResult, DynHandler};
use crate::rpc::middleware::{build_chain, terminal, Middleware};
use crate::rpc::protocol::{self, Id, Incoming, Parsed, Reply, Request, Response, VERSION};
use crate::rpc::registry::{MethodDescriptor, MethodRegistry};

/// Tunables for a dispatcher.
#[derive(Debug, Clone)]
pub struct DispatchOptions {
    /// Run batch elements concurrently instead of one after another.
    pub concurrent_batches: bool,
    /// Largest accepted batch; `0` means unlimited.
    pub max_batch_size: usize,
    /// Deadline attached to each inbound request.
    pub request_timeout: Option<Duration>,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            concurrent_batches: true,
            max_batch_size: 0,
            request_timeout: None,
        }
    }
}

impl DispatchOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            concurrent_batches: config.rpc.concurrent_batches,
            max_batch_size: config.rpc.max_batch_size,
            request_timeout: Some(Duration::from_secs(config.timeouts.request_secs)),
        }
    }
}

/// Dispatches JSON-RPC payloads against one registry and middleware list.
pub struct Dispatcher {
    registry: Arc<MethodRegistry>,
    middlewares: Arc<[Middleware]>,
    options: DispatchOptions,
}

impl Dispatcher {
    pub fn new(registry: Arc<MethodRegistry>, middlewares: Vec<Middleware>) -> Self {
        Self {
            registry,
            middlewares: middlewares.into(),
            options: DispatchOptions::default(),
        }
    }

    pub fn with_options(mut self, options: DispatchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &DispatchOptions {
        &self.options
    }

    /// Handle a raw request body and produce the reply to send back.
    pub async fn dispatch(&self, body: &[u8], inbound: &InboundContext) -> Reply {
        let incoming = match protocol::parse(body) {
            Ok(incoming) => incoming,
            Err(response) => return Reply::Single(response),
        };

        match incoming {
            Incoming::Single(parsed) => Reply::Single(self.process(parsed, inbound).await),
            Incoming::Batch(items) => {
                let limit = self.options.max_batch_size;
                if limit > 0 && items.len() > limit {
                    tracing::warn!(size = items.len(), limit, "Batch rejected: too large");
                    return Reply::Single(Response::failure(Id::Null, RpcError::invalid_request()));
                }

                tracing::debug!(size = items.len(), concurrent = self.options.concurrent_batches, "Dispatching batch");
                let responses = if self.options.concurrent_batches {
                    join_all(items.into_iter().map(|parsed| self.process(parsed, inbound))).await
                } else {
                    let mut responses = Vec::with_capacity(items.len());
                    for parsed in items {
                        responses.push(self.process(parsed, inbound).await);
                    }
                    responses
                };
                Reply::Batch(responses)
            }
        }
    }

    async fn process(&self, parsed: Parsed, inbound: &InboundContext) -> Response {
        match parsed {
            Ok(request) => self.invoke(request, inbound).await,
            Err(response) => response,
        }
    }

    /// Run a single request through the full dispatch sequence.
    pub async fn invoke(&self, request: Request, inbound: &InboundContext) -> Response {
        let id = request.id.clone();
        let outcome = self.call(request, inbound).await;
        Response::from_outcome(id, outcome)
    }

    async fn call(&self, request: Request, inbound: &InboundContext) -> CallResult {
        let descriptor = self.method_for(&request)?;
        let id = request.id.clone();
        let scope_key = scope_key(&id);

        let mut handler = {
            let scope = self.registry.container().scope(scope_key.clone());
            descriptor.construct(&scope).map_err(|e| {
                tracing::error!(
                    method = %request.method,
                    id = %id,
                    handler = descriptor.handler_type(),
                    error = %e,
                    "Failed to construct handler"
                );
                RpcError::internal()
            })?
        };

        handler.bind(inbound.for_call(&request.method, id.clone(), scope_key));

        let params = descriptor.decode_params(request.params.as_deref()).map_err(|e| {
            tracing::error!(method = %request.method, id = %id, error = %e, "Failed to decode params");
            RpcError::internal()
        })?;

        let handler: Arc<dyn DynHandler> = Arc::from(handler);
        let chain = build_chain(&handler, terminal(), &self.middlewares);
        chain(handler, params).await
    }

    fn method_for(&self, request: &Request) -> Result<Arc<MethodDescriptor>, RpcError> {
        if request.method.is_empty() || request.version != VERSION {
            tracing::debug!(method = %request.method, version = %request.version, "Rejected request envelope");
            return Err(RpcError::invalid_params());
        }

        self.registry.lookup(&request.method).ok_or_else(|| {
            tracing::debug!(method = %request.method, "Method not found");
            RpcError::method_not_found()
        })
    }
}

/// Scope key for a call: the id's JSON text, or a fresh token for notifications.
///
/// String ids keep their quotes, so `7` and `"7"` get separate scopes.
fn scope_key(id: &Id) -> String {
    match id {
        Id::Null => Uuid::new_v4().to_string(),
        Id::Raw(raw) => raw.get().to_string(),
    }
}
