//! Handler traits.
//!
//! # Design Decisions
//! - [`Handler`] is the typed trait method authors implement; its
//!   associated `Params` type is the declared parameter shape
//! - [`DynHandler`] is the object-safe view the dispatcher and middleware
//!   work with; every `Handler` gets it for free
//! - A handler is built per request, bound to its context once, invoked once

use std::any::{type_name, Any};
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::di::{ResolveError, Scope};
use crate::rpc::context::RequestContext;
use crate::rpc::error::RpcError;

/// Decoded parameters travelling through the middleware chain.
pub type BoxedParams = Box<dyn Any + Send>;

/// Outcome of one call: exactly a result or an error.
pub type CallResult = Result<Value, RpcError>;

/// A JSON-RPC method implementation.
///
/// `Params` is decoded from the request's `params` member into a fresh
/// `Params::default()` when the member is absent or `null`. Add
/// `#[serde(default)]` to the params struct to tolerate missing fields.
pub trait Handler: Send + Sync + Sized + 'static {
    type Params: DeserializeOwned + Default + Send + 'static;
    type Output: Serialize + Send + 'static;

    /// Construction recipe, run by the resolution service once per request.
    fn provide(scope: &Scope<'_>) -> Result<Self, ResolveError>;

    fn set_context(&mut self, ctx: RequestContext);

    fn context(&self) -> Option<&RequestContext>;

    fn handle(
        &self,
        params: Self::Params,
    ) -> impl Future<Output = Result<Self::Output, RpcError>> + Send;
}

/// Context slot for handler structs; delegate the context methods to it.
#[derive(Debug, Clone, Default)]
pub struct BaseHandler {
    ctx: Option<RequestContext>,
}

impl BaseHandler {
    pub fn set_context(&mut self, ctx: RequestContext) {
        self.ctx = Some(ctx);
    }

    pub fn context(&self) -> Option<&RequestContext> {
        self.ctx.as_ref()
    }
}

/// Type-erased handler as seen by the dispatcher and middleware.
pub trait DynHandler: Send + Sync {
    fn bind(&mut self, ctx: RequestContext);

    fn request_context(&self) -> Option<&RequestContext>;

    fn handler_name(&self) -> &'static str;

    /// Run the handler with parameters produced by its method's decoder.
    fn call(self: Arc<Self>, params: BoxedParams) -> BoxFuture<'static, CallResult>;
}

impl<H: Handler> DynHandler for H {
    fn bind(&mut self, ctx: RequestContext) {
        self.set_context(ctx);
    }

    fn request_context(&self) -> Option<&RequestContext> {
        self.context()
    }

    fn handler_name(&self) -> &'static str {
        type_name::<H>()
    }

    fn call(self: Arc<Self>, params: BoxedParams) -> BoxFuture<'static, CallResult> {
        Box::pin(async move {
            let params = params.downcast::<H::Params>().map_err(|_| {
                tracing::error!(
                    handler = type_name::<H>(),
                    expected = type_name::<H::Params>(),
                    "Parameter type assertion failed"
                );
                RpcError::internal()
            })?;

            let output = self.handle(*params).await?;
            serde_json::to_value(output).map_err(|e| {
                tracing::error!(handler = type_name::<H>(), error = %e, "Failed to encode result");
                RpcError::internal()
            })
        })
    }
}
