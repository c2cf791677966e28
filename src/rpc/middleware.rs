//! Middleware chain composition.
//!
//! # Responsibilities
//! - Define the middleware shape: `(handler, next) -> wrapped call`
//! - Compose an ordered middleware list around a terminal call
//!
//! # Design Decisions
//! - The first middleware in the list is the outermost layer
//! - Composition is a pure fold; chains share nothing mutable
//! - Chains are rebuilt per call, which is just a few `Arc` clones

use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::rpc::error::RpcError;
use crate::rpc::handler::{BoxedParams, CallResult, DynHandler};

/// A (possibly wrapped) call of a handler.
pub type HandlerFunc =
    Arc<dyn Fn(Arc<dyn DynHandler>, BoxedParams) -> BoxFuture<'static, CallResult> + Send + Sync>;

/// Wraps the next call in the chain, producing a new call.
pub type Middleware = Arc<dyn Fn(&Arc<dyn DynHandler>, HandlerFunc) -> HandlerFunc + Send + Sync>;

/// The innermost call: invoke the handler itself.
pub fn terminal() -> HandlerFunc {
    Arc::new(|handler: Arc<dyn DynHandler>, params: BoxedParams| handler.call(params))
}

/// Compose `middlewares` around `last`, first element outermost.
///
/// An empty list returns `last` unchanged.
pub fn build_chain(
    handler: &Arc<dyn DynHandler>,
    last: HandlerFunc,
    middlewares: &[Middleware],
) -> HandlerFunc {
    middlewares
        .iter()
        .rev()
        .fold(last, |next, middleware| middleware(handler, next))
}

/// Build a middleware from an async function taking the call and `next`.
///
/// ```ignore
/// let audit = middleware::from_fn(|handler, params, next| async move {
///     let result = next(handler, params).await;
///     tracing::info!(ok = result.is_ok(), "audited");
///     result
/// });
/// ```
pub fn from_fn<F, Fut>(f: F) -> Middleware
where
    F: Fn(Arc<dyn DynHandler>, BoxedParams, HandlerFunc) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CallResult> + Send + 'static,
{
    let f = Arc::new(f);
    Arc::new(move |_: &Arc<dyn DynHandler>, next: HandlerFunc| -> HandlerFunc {
        let f = f.clone();
        Arc::new(
            move |handler: Arc<dyn DynHandler>, params: BoxedParams| -> BoxFuture<'static, CallResult> {
                Box::pin(f(handler, params, next.clone()))
            },
        )
    })
}

/// Abort calls whose deadline has passed or whose request was cancelled.
///
/// Opt-in: the dispatcher itself never enforces cancellation.
pub fn deadline_middleware() -> Middleware {
    from_fn(|handler, params, next| async move {
        let ctx = handler.request_context().cloned();
        let Some(ctx) = ctx else {
            return next(handler, params).await;
        };

        if ctx.is_expired() || ctx.is_cancelled() {
            tracing::warn!(method = %ctx.method(), id = %ctx.id(), "Call abandoned before start");
            return Err(RpcError::internal());
        }

        let deadline = ctx.deadline();
        let expired = async move {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline.into()).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            result = next(handler, params) => result,
            _ = ctx.cancellation_token().cancelled() => {
                tracing::warn!(method = %ctx.method(), id = %ctx.id(), "Call cancelled");
                Err(RpcError::internal())
            }
            _ = expired => {
                tracing::warn!(method = %ctx.method(), id = %ctx.id(), "Call deadline exceeded");
                Err(RpcError::internal())
            }
        }
    })
}
