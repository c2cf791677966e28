//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Every rpc call (when the middleware is installed):
//!     → logging.rs (structured log event per call)
//!     → metrics.rs (counters, histograms)
//!
//! Handlers:
//!     → logging.rs RequestLogger (span tagged with the tracking id)
//!
//! Consumers:
//!     → stdout (fmt layer)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging for machine parsing
//! - Request ID flows from the HTTP layer into every handler context
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;

pub use logging::{logging_middleware, register_request_logger, RequestLogger};
pub use metrics::{init_metrics, metrics_middleware};
