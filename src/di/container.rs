//! Provider registry and per-request scopes.
//!
//! # Responsibilities
//! - Store one construction recipe ("provider") per type
//! - Open a [`Scope`] keyed by a request correlation id
//! - Build values on demand inside a scope, caching scoped values
//!
//! # Design Decisions
//! - Providers are keyed by `TypeId`; no reflection beyond `Any` downcasts
//! - Re-registering a type replaces its provider
//! - Once sealed, the container accepts no further providers
//! - A scope lives for exactly one dispatch and is dropped with it

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use thiserror::Error;

type Erased = Box<dyn Any + Send>;
type Provider = Arc<dyn ErasedProvider>;

trait ErasedProvider: Send + Sync {
    fn provide(&self, scope: &Scope<'_>) -> Result<Erased, ResolveError>;
}

struct Typed<F, T> {
    provider: F,
    _marker: PhantomData<fn() -> T>,
}

impl<F, T> ErasedProvider for Typed<F, T>
where
    T: Send + 'static,
    F: Fn(&Scope<'_>) -> Result<T, ResolveError> + Send + Sync,
{
    fn provide(&self, scope: &Scope<'_>) -> Result<Erased, ResolveError> {
        (self.provider)(scope).map(|value| Box::new(value) as Erased)
    }
}

/// How long a provided value lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifetime {
    /// A new value every time it is requested.
    Transient,
    /// One value per scope, shared by everything resolved inside it.
    Scoped,
}

/// Error registering a provider.
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("container is sealed; provider for `{0}` rejected")]
    Sealed(&'static str),
}

/// Error building a value inside a scope.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    #[error("no provider registered for `{0}`")]
    NotRegistered(&'static str),

    #[error("dependency cycle detected while resolving `{0}`")]
    Cycle(&'static str),

    #[error("provider for `{0}` produced a value of another type")]
    TypeMismatch(&'static str),

    #[error("provider for `{type_name}` failed: {reason}")]
    Provider {
        type_name: &'static str,
        reason: String,
    },
}

impl ResolveError {
    /// Report a failure from inside a provider for `T`.
    pub fn provider<T: ?Sized>(reason: impl std::fmt::Display) -> Self {
        ResolveError::Provider {
            type_name: type_name::<T>(),
            reason: reason.to_string(),
        }
    }
}

struct Registration {
    provider: Provider,
    lifetime: Lifetime,
}

/// The resolution service: construct-by-type, scoped by request key.
#[derive(Default)]
pub struct Container {
    providers: RwLock<HashMap<TypeId, Registration>>,
    sealed: AtomicBool,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the construction recipe for `T`.
    pub fn register<T, F>(&self, provider: F, lifetime: Lifetime) -> Result<(), ContainerError>
    where
        T: Send + 'static,
        F: Fn(&Scope<'_>) -> Result<T, ResolveError> + Send + Sync + 'static,
    {
        if self.is_sealed() {
            return Err(ContainerError::Sealed(type_name::<T>()));
        }

        let provider: Provider = Arc::new(Typed {
            provider,
            _marker: PhantomData,
        });
        let previous = self
            .providers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(TypeId::of::<T>(), Registration { provider, lifetime });

        if previous.is_some() {
            tracing::debug!(type_name = type_name::<T>(), "Provider replaced");
        }
        Ok(())
    }

    /// Register a ready-made value; every resolution hands out a clone.
    pub fn register_instance<T>(&self, value: T) -> Result<(), ContainerError>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.register(move |_| Ok(value.clone()), Lifetime::Transient)
    }

    /// Stop accepting providers. Registration after this point fails.
    pub fn seal(&self) {
        self.sealed.store(true, Ordering::Release);
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&TypeId::of::<T>())
    }

    /// Open a scope bound to a request correlation key.
    pub fn scope(&self, key: impl Into<String>) -> Scope<'_> {
        Scope {
            container: self,
            key: key.into(),
            instances: Mutex::new(HashMap::new()),
            resolving: Mutex::new(Vec::new()),
        }
    }

    fn lookup(&self, id: TypeId) -> Option<(Provider, Lifetime)> {
        self.providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .map(|r| (r.provider.clone(), r.lifetime))
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.providers.read().map(|p| p.len()).unwrap_or_default();
        f.debug_struct("Container")
            .field("providers", &count)
            .field("sealed", &self.is_sealed())
            .finish()
    }
}

/// A resolution scope for one request.
pub struct Scope<'c> {
    container: &'c Container,
    key: String,
    instances: Mutex<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
    resolving: Mutex<Vec<TypeId>>,
}

impl Scope<'_> {
    /// The correlation key this scope was opened with.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Resolve a dependency, honouring its registered lifetime.
    pub fn resolve<T>(&self) -> Result<T, ResolveError>
    where
        T: Clone + Send + Sync + 'static,
    {
        let id = TypeId::of::<T>();
        if let Some(cached) = self
            .instances
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .and_then(|v| v.downcast_ref::<T>())
        {
            return Ok(cached.clone());
        }

        let (provider, lifetime) = self
            .container
            .lookup(id)
            .ok_or(ResolveError::NotRegistered(type_name::<T>()))?;
        let value: T = self.build(id, &provider)?;

        if lifetime == Lifetime::Scoped {
            self.instances
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(id, Box::new(value.clone()));
        }
        Ok(value)
    }

    /// Build a fresh `T` from its provider, bypassing the scope cache.
    pub fn construct<T>(&self) -> Result<T, ResolveError>
    where
        T: Send + 'static,
    {
        let id = TypeId::of::<T>();
        let (provider, _) = self
            .container
            .lookup(id)
            .ok_or(ResolveError::NotRegistered(type_name::<T>()))?;
        self.build(id, &provider)
    }

    fn build<T: 'static>(&self, id: TypeId, provider: &Provider) -> Result<T, ResolveError> {
        {
            let mut resolving = self.resolving.lock().unwrap_or_else(PoisonError::into_inner);
            if resolving.contains(&id) {
                return Err(ResolveError::Cycle(type_name::<T>()));
            }
            resolving.push(id);
        }

        let built = provider.provide(self);

        self.resolving
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|entry| *entry != id);

        built?
            .downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|_| ResolveError::TypeMismatch(type_name::<T>()))
    }
}
