//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     trigger → every subscriber wakes → server stops accepting → drain → exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup in main: config, logging, metrics, registrations, listener
//! - Shutdown drains in-flight requests before the server future resolves

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
