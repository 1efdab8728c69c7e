// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Type-keyed service registry used for page activation.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{PageError, Result};

type ServiceEntry = (Arc<dyn Any + Send + Sync>, &'static str);

/// Shared services that pages can request by type.
///
/// Registered services are shared by every request. Register trait objects
/// by wrapping them, e.g. `Arc<dyn CustomerRepository>`.
///
/// ```rust
/// use pageflow::ServiceProvider;
///
/// struct Greeting(&'static str);
///
/// let mut services = ServiceProvider::new();
/// services.insert(Greeting("hello"));
///
/// assert_eq!(services.require::<Greeting>().unwrap().0, "hello");
/// assert!(services.get::<String>().is_none());
/// ```
#[derive(Clone, Default)]
pub struct ServiceProvider {
    services: HashMap<TypeId, ServiceEntry>,
}

impl ServiceProvider {
    /// Creates an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a service, replacing any previous service of the same type.
    pub fn insert<T: Send + Sync + 'static>(&mut self, service: T) -> &mut Self {
        self.insert_shared(Arc::new(service))
    }

    /// Registers an already shared service.
    pub fn insert_shared<T: Send + Sync + 'static>(&mut self, service: Arc<T>) -> &mut Self {
        self.services.insert(
            TypeId::of::<T>(),
            (service as Arc<dyn Any + Send + Sync>, std::any::type_name::<T>()),
        );
        self
    }

    /// Returns the service of type `T`, if registered.
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.services
            .get(&TypeId::of::<T>())
            .and_then(|(service, _)| Arc::clone(service).downcast::<T>().ok())
    }

    /// Returns the service of type `T` or [`PageError::ServiceNotRegistered`].
    pub fn require<T: Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        self.get::<T>()
            .ok_or(PageError::ServiceNotRegistered(std::any::type_name::<T>()))
    }

    /// Returns true if a service of type `T` is registered.
    pub fn contains<T: 'static>(&self) -> bool {
        self.services.contains_key(&TypeId::of::<T>())
    }

    /// Number of registered services.
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Returns true if no services are registered.
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl fmt::Debug for ServiceProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set()
            .entries(self.services.values().map(|(_, name)| name))
            .finish()
    }
}
