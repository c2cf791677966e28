//! Dependency resolution subsystem.
//!
//! # Data Flow
//! ```text
//! Setup:
//!     Container::register(provider, lifetime)   (one recipe per type)
//!     → Container::seal()                       (no more recipes)
//!
//! Per request:
//!     Container::scope(correlation key)
//!     → Scope::construct::<Handler>()           (fresh handler)
//!         → Scope::resolve::<Dep>()             (scoped deps cached in the scope)
//!     → scope dropped with the request
//! ```

pub mod container;

pub use container::{Container, ContainerError, Lifetime, ResolveError, Scope};
