//! Request-scoped context handed to handlers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::rpc::protocol::Id;

/// Context of the inbound HTTP request, shared by every call in a batch.
#[derive(Debug, Clone, Default)]
pub struct InboundContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
    request_id: Option<String>,
}

impl InboundContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Token cancelled when the inbound request goes away.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// Derive the context for one call within this request.
    pub(crate) fn for_call(&self, method: &str, id: Id, scope_key: String) -> RequestContext {
        RequestContext {
            method: Arc::from(method),
            id,
            scope_key,
            request_id: self.request_id.clone(),
            cancel: self.cancel.child_token(),
            deadline: self.deadline,
        }
    }
}

/// Context bound to a handler instance before it is invoked.
///
/// Cancellation is only signalled here; observing it is up to the handler.
#[derive(Debug, Clone)]
pub struct RequestContext {
    method: Arc<str>,
    id: Id,
    scope_key: String,
    request_id: Option<String>,
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    pub fn method(&self) -> &str {
        &self.method
    }

    /// The JSON-RPC id of the call, `null` for notifications.
    pub fn id(&self) -> &Id {
        &self.id
    }

    /// Key of the resolution scope the handler was built in.
    pub fn scope_key(&self) -> &str {
        &self.scope_key
    }

    /// The `x-request-id` of the carrying HTTP request, if any.
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline; `None` when there is no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_some_and(|left| left.is_zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_context_inherits_inbound() {
        let inbound = InboundContext::new()
            .with_request_id("req-9")
            .with_deadline(Instant::now() + Duration::from_secs(30));
        let ctx = inbound.for_call("echo", Id::parse("4").unwrap(), "4".into());

        assert_eq!(ctx.method(), "echo");
        assert_eq!(ctx.id().get(), "4");
        assert_eq!(ctx.scope_key(), "4");
        assert_eq!(ctx.request_id(), Some("req-9"));
        assert!(!ctx.is_expired());
        assert!(ctx.remaining().unwrap() > Duration::from_secs(29));
    }

    #[test]
    fn test_inbound_cancellation_reaches_calls() {
        let inbound = InboundContext::new();
        let first = inbound.for_call("a", Id::Null, "x".into());
        let second = inbound.for_call("b", Id::Null, "y".into());
        assert!(!first.is_cancelled());

        inbound.cancellation_token().cancel();
        assert!(first.is_cancelled());
        assert!(second.is_cancelled());
    }

    #[test]
    fn test_past_deadline_is_expired() {
        let inbound = InboundContext::new().with_deadline(Instant::now());
        let ctx = inbound.for_call("a", Id::Null, "x".into());
        assert!(ctx.is_expired());
    }
}
