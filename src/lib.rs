//! JSON-RPC 2.0 over HTTP: method registry, dispatcher and middleware chain.

pub mod config;
pub mod di;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod rpc;

pub use config::schema::ServerConfig;
pub use di::{Container, Lifetime, Scope};
pub use http::{HttpServer, RpcMux};
pub use lifecycle::Shutdown;
pub use rpc::{BaseHandler, Handler, MethodDeclaration, Middleware, RequestContext, RpcError};
