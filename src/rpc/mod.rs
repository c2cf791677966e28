//! JSON-RPC 2.0 dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! Setup:
//!     MethodDeclaration::of::<Handler>("name")
//!     → registry.rs (descriptor + provider handed to the container)
//!
//! Per request:
//!     body bytes
//!     → protocol.rs (single | batch | envelope error)
//!     → dispatcher.rs (validate → lookup → construct → bind → decode)
//!     → middleware.rs (chain built around the handler call)
//!     → handler.rs (typed Handler::handle)
//!     → protocol.rs (responses in input order, array iff batch)
//! ```
//!
//! # Design Decisions
//! - Registries are explicitly owned and passed to their dispatcher
//! - Failures become error responses; nothing escapes a dispatch
//! - Internal detail goes to the log, never to the client

pub mod context;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod middleware;
pub mod protocol;
pub mod registry;

pub use context::{InboundContext, RequestContext};
pub use dispatcher::{DispatchOptions, Dispatcher};
pub use error::{ErrorCode, RegistrationError, RpcError};
pub use handler::{BaseHandler, BoxedParams, CallResult, DynHandler, Handler};
pub use middleware::{build_chain, deadline_middleware, from_fn, terminal, HandlerFunc, Middleware};
pub use protocol::{Id, Reply, Request, Response, VERSION};
pub use registry::{MethodDeclaration, MethodDescriptor, MethodRegistry};
