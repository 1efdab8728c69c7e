// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Request-scoped state threaded through the pipeline.
//!
//! [`PageContext`] composes everything a request needs: the incoming
//! [`PageRequest`], matched route values, the compiled descriptor, the shared
//! services, the binding inputs, view data, validation state and the response
//! sink. It is a cheap handle; every filter context, page instance and result
//! sees the same underlying state.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value as JsonValue;
use tokio::sync::Notify;

use crate::binding::{ArgumentBinder, DefaultArgumentBinder, ValueProviderFactory};
use crate::descriptor::CompiledPageActionDescriptor;
use crate::request::PageRequest;
use crate::response::PageResponse;
use crate::services::ServiceProvider;

/// Values shared between a page and its rendering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewData {
    values: BTreeMap<String, JsonValue>,
}

impl ViewData {
    /// Returns the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.values.get(key)
    }

    /// Stores a value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<JsonValue>) {
        self.values.insert(key.into(), value.into());
    }

    /// Iterates over all entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &JsonValue)> {
        self.values.iter()
    }

    /// Returns true if nothing was stored.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Binding and validation failures recorded for one request.
///
/// Failures never abort the pipeline; the affected argument is bound to its
/// default value and the error is recorded here for user code to inspect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationState {
    errors: BTreeMap<String, Vec<String>>,
}

impl ValidationState {
    /// Records an error for `key`.
    pub fn add_error(&mut self, key: impl Into<String>, message: impl Into<String>) {
        self.errors.entry(key.into()).or_default().push(message.into());
    }

    /// Returns the errors recorded for `key`.
    pub fn errors_for(&self, key: &str) -> &[String] {
        self.errors.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Iterates over keys with errors.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.errors.keys().map(String::as_str)
    }

    /// Total number of recorded errors.
    pub fn error_count(&self) -> usize {
        self.errors.values().map(Vec::len).sum()
    }

    /// Returns true if no errors were recorded.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Cooperative cancellation signal for one request.
///
/// Cloned handles observe the same signal.
#[derive(Clone, Default)]
pub struct Cancellation {
    inner: Arc<CancellationInner>,
}

#[derive(Default)]
struct CancellationInner {
    canceled: AtomicBool,
    notify: Notify,
}

impl Cancellation {
    /// Creates a signal that has not fired.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires the signal, waking every pending waiter.
    pub fn cancel(&self) {
        self.inner.canceled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    /// Returns true once [`cancel`](Self::cancel) was called.
    pub fn is_canceled(&self) -> bool {
        self.inner.canceled.load(Ordering::SeqCst)
    }

    /// Completes when the signal fires.
    pub async fn canceled(&self) {
        loop {
            // Register before checking so a concurrent cancel is not missed.
            let notified = self.inner.notify.notified();
            if self.is_canceled() {
                return;
            }
            notified.await;
        }
    }
}

impl fmt::Debug for Cancellation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cancellation")
            .field("canceled", &self.is_canceled())
            .finish()
    }
}

/// Request-scoped page state.
#[derive(Clone)]
pub struct PageContext {
    inner: Arc<PageContextInner>,
}

struct PageContextInner {
    request: PageRequest,
    route_values: HashMap<String, String>,
    descriptor: Arc<CompiledPageActionDescriptor>,
    services: Arc<ServiceProvider>,
    value_provider_factories: Vec<Arc<dyn ValueProviderFactory>>,
    binder: Arc<dyn ArgumentBinder>,
    cancellation: Cancellation,
    response: Mutex<PageResponse>,
    view_data: Mutex<ViewData>,
    validation: Mutex<ValidationState>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PageContext {
    /// Starts building a context for `request` against `descriptor`.
    pub fn builder(
        request: PageRequest,
        descriptor: Arc<CompiledPageActionDescriptor>,
    ) -> PageContextBuilder {
        PageContextBuilder {
            route_values: descriptor.route_values.clone(),
            request,
            descriptor,
            services: Arc::new(ServiceProvider::new()),
            value_provider_factories: Vec::new(),
            binder: Arc::new(DefaultArgumentBinder),
            cancellation: Cancellation::new(),
        }
    }

    /// The incoming request.
    pub fn request(&self) -> &PageRequest {
        &self.inner.request
    }

    /// Route values (the descriptor's values plus matched URL parameters).
    pub fn route_values(&self) -> &HashMap<String, String> {
        &self.inner.route_values
    }

    /// The compiled descriptor of the page being executed.
    pub fn action_descriptor(&self) -> &Arc<CompiledPageActionDescriptor> {
        &self.inner.descriptor
    }

    /// Shared services available for injection.
    pub fn services(&self) -> &ServiceProvider {
        &self.inner.services
    }

    /// Factories that build the value providers used for binding.
    pub fn value_provider_factories(&self) -> &[Arc<dyn ValueProviderFactory>] {
        &self.inner.value_provider_factories
    }

    /// The binder used for handler arguments.
    pub fn binder(&self) -> &Arc<dyn ArgumentBinder> {
        &self.inner.binder
    }

    /// The request's cancellation signal.
    pub fn cancellation(&self) -> &Cancellation {
        &self.inner.cancellation
    }

    /// Returns true if the request was canceled.
    pub fn is_canceled(&self) -> bool {
        self.inner.cancellation.is_canceled()
    }

    /// Runs `f` with mutable access to the response.
    pub fn with_response<R>(&self, f: impl FnOnce(&mut PageResponse) -> R) -> R {
        f(&mut lock(&self.inner.response))
    }

    /// Returns a copy of the response written so far.
    pub fn response(&self) -> PageResponse {
        lock(&self.inner.response).clone()
    }

    /// Moves the response out, leaving an empty one behind.
    pub fn take_response(&self) -> PageResponse {
        std::mem::take(&mut *lock(&self.inner.response))
    }

    /// Runs `f` with mutable access to the view data.
    pub fn with_view_data<R>(&self, f: impl FnOnce(&mut ViewData) -> R) -> R {
        f(&mut lock(&self.inner.view_data))
    }

    /// Stores a view data value.
    pub fn set_view_data(&self, key: impl Into<String>, value: impl Into<JsonValue>) {
        lock(&self.inner.view_data).insert(key, value);
    }

    /// Returns a snapshot of the view data.
    pub fn view_data(&self) -> ViewData {
        lock(&self.inner.view_data).clone()
    }

    /// Records a binding or validation error.
    pub fn add_model_error(&self, key: impl Into<String>, message: impl Into<String>) {
        lock(&self.inner.validation).add_error(key, message);
    }

    /// Returns a snapshot of the validation state.
    pub fn validation(&self) -> ValidationState {
        lock(&self.inner.validation).clone()
    }
}

impl fmt::Debug for PageContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageContext")
            .field("method", &self.inner.request.method)
            .field("path", &self.inner.request.path)
            .field("page", &self.inner.descriptor.display_name)
            .finish()
    }
}

/// Builder for [`PageContext`].
pub struct PageContextBuilder {
    request: PageRequest,
    route_values: HashMap<String, String>,
    descriptor: Arc<CompiledPageActionDescriptor>,
    services: Arc<ServiceProvider>,
    value_provider_factories: Vec<Arc<dyn ValueProviderFactory>>,
    binder: Arc<dyn ArgumentBinder>,
    cancellation: Cancellation,
}

impl PageContextBuilder {
    /// Adds matched route parameters to the descriptor's route values.
    pub fn route_values(mut self, values: HashMap<String, String>) -> Self {
        self.route_values.extend(values);
        self
    }

    /// Sets the shared services.
    pub fn services(mut self, services: Arc<ServiceProvider>) -> Self {
        self.services = services;
        self
    }

    /// Sets the value provider factories used for binding.
    pub fn value_provider_factories(
        mut self,
        factories: Vec<Arc<dyn ValueProviderFactory>>,
    ) -> Self {
        self.value_provider_factories = factories;
        self
    }

    /// Replaces the argument binder.
    pub fn binder(mut self, binder: Arc<dyn ArgumentBinder>) -> Self {
        self.binder = binder;
        self
    }

    /// Uses an existing cancellation signal.
    pub fn cancellation(mut self, cancellation: Cancellation) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Creates the context.
    pub fn build(self) -> PageContext {
        PageContext {
            inner: Arc::new(PageContextInner {
                request: self.request,
                route_values: self.route_values,
                descriptor: self.descriptor,
                services: self.services,
                value_provider_factories: self.value_provider_factories,
                binder: self.binder,
                cancellation: self.cancellation,
                response: Mutex::new(PageResponse::new()),
                view_data: Mutex::new(ViewData::default()),
                validation: Mutex::new(ValidationState::default()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_validation_state() {
        let mut state = ValidationState::default();
        assert!(state.is_valid());

        state.add_error("id", "not a number");
        state.add_error("id", "out of range");
        assert!(!state.is_valid());
        assert_eq!(state.errors_for("id").len(), 2);
        assert_eq!(state.errors_for("name"), &[] as &[String]);
        assert_eq!(state.error_count(), 2);
    }

    #[test]
    fn test_view_data() {
        let mut data = ViewData::default();
        data.insert("title", "Customers");
        data.insert("count", 3);
        assert_eq!(data.get("title"), Some(&JsonValue::from("Customers")));
        assert_eq!(data.iter().count(), 2);
    }

    #[tokio::test]
    async fn test_cancellation_wakes_waiter() {
        let cancellation = Cancellation::new();
        let waiter = cancellation.clone();

        let handle = tokio::spawn(async move { waiter.canceled().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        cancellation.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("waiter should wake")
            .unwrap();
        assert!(cancellation.is_canceled());
    }

    #[tokio::test]
    async fn test_cancellation_already_fired() {
        let cancellation = Cancellation::new();
        cancellation.cancel();
        tokio::time::timeout(Duration::from_millis(100), cancellation.canceled())
            .await
            .expect("fired signal completes immediately");
    }
}
