//! Method registry.
//!
//! # Responsibilities
//! - Map method names to descriptors (handler factory + params decoder)
//! - Hand each handler's construction recipe to the resolution service
//!
//! # Design Decisions
//! - Written during setup, read on every request: `RwLock` so lookups
//!   never block each other
//! - The provider is registered before the entry is inserted, so a failed
//!   registration leaves the registry untouched
//! - Registering an existing name replaces it (last write wins)

use std::any::type_name;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde::de::DeserializeOwned;
use serde_json::value::RawValue;

use crate::di::{Container, ContainerError, Lifetime, ResolveError, Scope};
use crate::rpc::error::RegistrationError;
use crate::rpc::handler::{BoxedParams, DynHandler, Handler};

type RegisterProvider = fn(&Container) -> Result<(), ContainerError>;
type HandlerFactory = fn(&Scope<'_>) -> Result<Box<dyn DynHandler>, ResolveError>;
type ParamsDecoder = fn(Option<&RawValue>) -> Result<BoxedParams, serde_json::Error>;

#[derive(Clone, Copy)]
struct Binding {
    handler_type: &'static str,
    register: RegisterProvider,
    construct: HandlerFactory,
    decode: ParamsDecoder,
}

impl Binding {
    fn of<H: Handler>() -> Self {
        Self {
            handler_type: type_name::<H>(),
            register: register_provider::<H>,
            construct: construct_handler::<H>,
            decode: decode_params::<H::Params>,
        }
    }
}

fn register_provider<H: Handler>(container: &Container) -> Result<(), ContainerError> {
    container.register(H::provide, Lifetime::Transient)
}

fn construct_handler<H: Handler>(scope: &Scope<'_>) -> Result<Box<dyn DynHandler>, ResolveError> {
    scope
        .construct::<H>()
        .map(|handler| Box::new(handler) as Box<dyn DynHandler>)
}

fn decode_params<P>(raw: Option<&RawValue>) -> Result<BoxedParams, serde_json::Error>
where
    P: DeserializeOwned + Default + Send + 'static,
{
    let params = match raw {
        Some(raw) => serde_json::from_str::<P>(raw.get())?,
        None => P::default(),
    };
    Ok(Box::new(params))
}

/// A method to be registered: a name plus the handler type that serves it.
#[derive(Clone)]
pub struct MethodDeclaration {
    name: String,
    binding: Option<Binding>,
}

impl MethodDeclaration {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            binding: None,
        }
    }

    /// Shorthand for `MethodDeclaration::new(name).handler::<H>()`.
    pub fn of<H: Handler>(name: impl Into<String>) -> Self {
        Self::new(name).handler::<H>()
    }

    /// Serve this method with `H`; its `Params` type is the parameter shape.
    pub fn handler<H: Handler>(mut self) -> Self {
        self.binding = Some(Binding::of::<H>());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for MethodDeclaration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodDeclaration")
            .field("name", &self.name)
            .field("handler", &self.binding.map(|b| b.handler_type))
            .finish()
    }
}

/// A registered method. Immutable once registered.
#[derive(Debug)]
pub struct MethodDescriptor {
    name: String,
    binding: Binding,
}

impl MethodDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handler_type(&self) -> &'static str {
        self.binding.handler_type
    }

    /// Build a fresh handler through the resolution service.
    pub fn construct(&self, scope: &Scope<'_>) -> Result<Box<dyn DynHandler>, ResolveError> {
        (self.binding.construct)(scope)
    }

    /// Decode a raw `params` member into a fresh instance of the declared shape.
    pub fn decode_params(&self, raw: Option<&RawValue>) -> Result<BoxedParams, serde_json::Error> {
        (self.binding.decode)(raw)
    }
}

impl std::fmt::Debug for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.handler_type)
    }
}

/// Concurrency-safe `name → descriptor` table.
#[derive(Debug)]
pub struct MethodRegistry {
    methods: RwLock<HashMap<String, Arc<MethodDescriptor>>>,
    container: Arc<Container>,
}

impl MethodRegistry {
    pub fn new(container: Arc<Container>) -> Self {
        Self {
            methods: RwLock::new(HashMap::new()),
            container,
        }
    }

    pub fn container(&self) -> &Arc<Container> {
        &self.container
    }

    /// Register a method and its handler's construction recipe.
    pub fn register(&self, declaration: MethodDeclaration) -> Result<(), RegistrationError> {
        let MethodDeclaration { name, binding } = declaration;
        if name.is_empty() {
            return Err(RegistrationError::EmptyMethodName);
        }
        let binding = binding.ok_or_else(|| RegistrationError::MissingHandler(name.clone()))?;

        (binding.register)(&self.container)?;

        let descriptor = Arc::new(MethodDescriptor {
            name: name.clone(),
            binding,
        });
        let previous = self
            .methods
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.clone(), descriptor);

        match previous {
            Some(old) => tracing::warn!(
                method = %name,
                previous = old.handler_type(),
                handler = binding.handler_type,
                "Method re-registered; previous handler replaced"
            ),
            None => tracing::debug!(method = %name, handler = binding.handler_type, "Method registered"),
        }
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<MethodDescriptor>> {
        self.methods
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Registered method names, sorted.
    pub fn method_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .methods
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.methods.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
