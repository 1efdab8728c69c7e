// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Handler argument binding.
//!
//! Each request carries a list of [`ValueProviderFactory`]s (by default route
//! values, query string and form body; cookies are opt-in through
//! [`CookieValueProviderFactory`]). To bind a parameter the [`ArgumentBinder`] asks
//! every factory for a [`ValueProvider`], then looks the parameter up by name.
//! If no provider knows the name, binding falls back to the empty prefix.
//!
//! Values that cannot be converted to the declared [`ParameterType`] are
//! recorded in the request's validation state and bound to the type's default
//! value, so the handler still runs.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value as JsonValue};

use crate::body::parse_form_values;
use crate::context::PageContext;
use crate::descriptor::{ParameterDescriptor, ParameterType};
use crate::error::{PageError, Result};

/// A source of raw string values keyed by name.
pub trait ValueProvider: Send + Sync {
    /// Returns true if any key equals `prefix` or starts with `prefix.`.
    ///
    /// The empty prefix matches any non-empty provider.
    fn contains_prefix(&self, prefix: &str) -> bool;

    /// Returns the value stored under `key`.
    fn get_value(&self, key: &str) -> Option<String>;

    /// Returns every `(member, value)` pair below `prefix`.
    fn values_with_prefix(&self, prefix: &str) -> Vec<(String, String)>;
}

/// A [`ValueProvider`] backed by a map.
#[derive(Debug, Clone, Default)]
pub struct DictionaryValueProvider {
    values: HashMap<String, String>,
}

impl DictionaryValueProvider {
    /// Wraps `values`.
    pub fn new(values: HashMap<String, String>) -> Self {
        Self { values }
    }
}

impl ValueProvider for DictionaryValueProvider {
    fn contains_prefix(&self, prefix: &str) -> bool {
        if prefix.is_empty() {
            return !self.values.is_empty();
        }
        self.values.keys().any(|key| key_has_prefix(key, prefix))
    }

    fn get_value(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn values_with_prefix(&self, prefix: &str) -> Vec<(String, String)> {
        self.values
            .iter()
            .filter_map(|(key, value)| {
                let member = if prefix.is_empty() {
                    key.as_str()
                } else {
                    key.strip_prefix(prefix)?.strip_prefix('.')?
                };
                Some((member.to_string(), value.clone()))
            })
            .collect()
    }
}

fn key_has_prefix(key: &str, prefix: &str) -> bool {
    match key.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('.'),
        None => false,
    }
}

/// Providers consulted in order; the first provider with a value wins.
#[derive(Clone, Default)]
pub struct CompositeValueProvider {
    providers: Vec<Arc<dyn ValueProvider>>,
}

impl CompositeValueProvider {
    /// Combines `providers`.
    pub fn new(providers: Vec<Arc<dyn ValueProvider>>) -> Self {
        Self { providers }
    }
}

impl ValueProvider for CompositeValueProvider {
    fn contains_prefix(&self, prefix: &str) -> bool {
        self.providers.iter().any(|p| p.contains_prefix(prefix))
    }

    fn get_value(&self, key: &str) -> Option<String> {
        self.providers.iter().find_map(|p| p.get_value(key))
    }

    fn values_with_prefix(&self, prefix: &str) -> Vec<(String, String)> {
        let mut seen = HashMap::new();
        for provider in &self.providers {
            for (member, value) in provider.values_with_prefix(prefix) {
                seen.entry(member).or_insert(value);
            }
        }
        seen.into_iter().collect()
    }
}

/// Outcome of [`ValueProviderFactory::create_value_provider`].
pub type ProviderResult = Result<Option<Arc<dyn ValueProvider>>>;

/// Creates the value provider for one request.
#[async_trait]
pub trait ValueProviderFactory: Send + Sync {
    /// Returns a provider, or `None` if the request has nothing to offer.
    async fn create_value_provider(&self, ctx: &PageContext) -> ProviderResult;
}

/// Values from the matched route.
#[derive(Debug, Clone, Copy, Default)]
pub struct RouteValueProviderFactory;

#[async_trait]
impl ValueProviderFactory for RouteValueProviderFactory {
    async fn create_value_provider(&self, ctx: &PageContext) -> ProviderResult {
        Ok(Some(Arc::new(DictionaryValueProvider::new(ctx.route_values().clone()))))
    }
}

/// Values from the query string.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryStringValueProviderFactory;

#[async_trait]
impl ValueProviderFactory for QueryStringValueProviderFactory {
    async fn create_value_provider(&self, ctx: &PageContext) -> ProviderResult {
        let query = &ctx.request().query;
        if query.is_empty() {
            return Ok(None);
        }
        Ok(Some(Arc::new(DictionaryValueProvider::new(query.clone()))))
    }
}

/// Values from a form, multipart or JSON object body.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormValueProviderFactory;

#[async_trait]
impl ValueProviderFactory for FormValueProviderFactory {
    async fn create_value_provider(&self, ctx: &PageContext) -> ProviderResult {
        let request = ctx.request();
        let Some(body) = request.body.as_deref() else {
            return Ok(None);
        };

        let values = parse_form_values(body, request.content_type()).map_err(PageError::handler)?;
        Ok(Some(Arc::new(DictionaryValueProvider::new(values))))
    }
}

/// Values from request cookies. Not part of the defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct CookieValueProviderFactory;

#[async_trait]
impl ValueProviderFactory for CookieValueProviderFactory {
    async fn create_value_provider(&self, ctx: &PageContext) -> ProviderResult {
        let cookies = &ctx.request().cookies;
        if cookies.is_empty() {
            return Ok(None);
        }
        Ok(Some(Arc::new(DictionaryValueProvider::new(cookies.clone()))))
    }
}

/// The default factories: route values, then query string, then form body.
pub fn default_value_provider_factories() -> Vec<Arc<dyn ValueProviderFactory>> {
    vec![
        Arc::new(RouteValueProviderFactory),
        Arc::new(QueryStringValueProviderFactory),
        Arc::new(FormValueProviderFactory),
    ]
}

/// Binds one declared parameter for a request.
#[async_trait]
pub trait ArgumentBinder: Send + Sync {
    /// Binds `parameter`. Conversion failures are recorded in the request's
    /// validation state and yield the type's default value.
    async fn bind(&self, ctx: &PageContext, parameter: &ParameterDescriptor) -> Result<JsonValue>;
}

/// Binder over the request's value provider factories.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultArgumentBinder;

#[async_trait]
impl ArgumentBinder for DefaultArgumentBinder {
    async fn bind(&self, ctx: &PageContext, parameter: &ParameterDescriptor) -> Result<JsonValue> {
        let mut providers = Vec::new();
        for factory in ctx.value_provider_factories() {
            if let Some(provider) = factory.create_value_provider(ctx).await? {
                providers.push(provider);
            }
        }
        let provider = CompositeValueProvider::new(providers);

        let model_name = if provider.contains_prefix(&parameter.name) {
            parameter.name.as_str()
        } else {
            ""
        };

        let bound = match parameter.parameter_type {
            ParameterType::Object => Ok(bind_object(&provider, model_name)),
            scalar => match provider.get_value(model_name) {
                Some(raw) => convert(&raw, scalar),
                None => Ok(default_value(scalar)),
            },
        };

        Ok(match bound {
            Ok(value) => value,
            Err(message) => {
                tracing::debug!("Binding '{}' failed: {}", parameter.name, message);
                ctx.add_model_error(parameter.name.clone(), message);
                default_value(parameter.parameter_type)
            }
        })
    }
}

fn bind_object(provider: &dyn ValueProvider, prefix: &str) -> JsonValue {
    let members: Map<String, JsonValue> = provider
        .values_with_prefix(prefix)
        .into_iter()
        .map(|(member, value)| (member, JsonValue::String(value)))
        .collect();
    JsonValue::Object(members)
}

fn convert(raw: &str, parameter_type: ParameterType) -> std::result::Result<JsonValue, String> {
    let trimmed = raw.trim();
    match parameter_type {
        ParameterType::String => Ok(JsonValue::String(raw.to_string())),
        ParameterType::Integer => trimmed
            .parse::<i64>()
            .map(JsonValue::from)
            .map_err(|_| format!("The value '{}' is not a valid integer.", raw)),
        ParameterType::Float => trimmed
            .parse::<f64>()
            .ok()
            .and_then(|f| serde_json::Number::from_f64(f).map(JsonValue::Number))
            .ok_or_else(|| format!("The value '{}' is not a valid number.", raw)),
        ParameterType::Boolean => match trimmed.to_ascii_lowercase().as_str() {
            "true" | "on" | "1" => Ok(JsonValue::Bool(true)),
            "false" | "off" | "0" | "" => Ok(JsonValue::Bool(false)),
            _ => Err(format!("The value '{}' is not a valid boolean.", raw)),
        },
        ParameterType::Object => Ok(JsonValue::String(raw.to_string())),
    }
}

fn default_value(parameter_type: ParameterType) -> JsonValue {
    match parameter_type {
        ParameterType::String => JsonValue::Null,
        ParameterType::Integer => JsonValue::from(0),
        ParameterType::Float => JsonValue::from(0.0),
        ParameterType::Boolean => JsonValue::Bool(false),
        ParameterType::Object => JsonValue::Object(Map::new()),
    }
}

/// Bound handler arguments, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandlerArguments {
    values: Vec<(String, JsonValue)>,
}

impl HandlerArguments {
    /// Binds every parameter with the request's binder.
    pub async fn bind(ctx: &PageContext, parameters: &[ParameterDescriptor]) -> Result<Self> {
        let binder = Arc::clone(ctx.binder());
        let mut values = Vec::with_capacity(parameters.len());
        for parameter in parameters {
            let value = binder.bind(ctx, parameter).await?;
            values.push((parameter.name.clone(), value));
        }
        Ok(Self { values })
    }

    /// Creates arguments from already bound values.
    pub fn from_values(values: Vec<(String, JsonValue)>) -> Self {
        Self { values }
    }

    /// Raw bound value for `name`.
    pub fn value(&self, name: &str) -> Option<&JsonValue> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Deserializes the bound value for `name`.
    ///
    /// A parameter that bound nothing (`null`) yields `T::default()`.
    pub fn get<T: DeserializeOwned + Default>(&self, name: &str) -> Result<T> {
        match self.value(name) {
            None | Some(JsonValue::Null) => Ok(T::default()),
            Some(value) => serde_json::from_value(value.clone()).map_err(PageError::handler),
        }
    }

    /// Number of arguments.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if there are no arguments.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
