//! HTTP transport subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum serve, graceful shutdown)
//!     → request id / trace / timeout / body limit layers
//!     → mux.rs (path → method group, POST only)
//!     → request.rs (request id + deadline → inbound context)
//!     → rpc::Dispatcher
//!     → JSON reply (object or array)
//! ```

pub mod mux;
pub mod request;
pub mod server;

pub use mux::{MuxError, RpcMux};
pub use request::X_REQUEST_ID;
pub use server::HttpServer;
