// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Pages and their handlers.
//!
//! A page is a user type implementing [`Page`], described by a
//! [`PageDefinition`] that lists how to construct it and which handler runs
//! for which HTTP verb. Executing a page instance:
//!
//! 1. selects the handler for the request verb (`HEAD` falls back to `GET`),
//! 2. binds the handler's declared parameters,
//! 3. calls [`Page::on_binding_completed`],
//! 4. runs the handler; a returned result is executed and ends the run,
//! 5. otherwise renders the page template as a [`PageViewResult`].
//!
//! Requests with no matching handler go straight to step 5.
//!
//! # Example
//!
//! ```rust
//! use pageflow::page::{HandlerMethod, Page, PageDefinition};
//! use pageflow::ParameterType;
//!
//! #[derive(Default)]
//! struct Edit {
//!     id: i64,
//! }
//!
//! impl Page for Edit {}
//!
//! let definition = PageDefinition::builder("Edit", |_| Ok(Edit::default()))
//!     .handler(
//!         HandlerMethod::sync("OnGet", |page: &mut Edit, ctx, args| {
//!             page.id = args.get("id")?;
//!             ctx.set_view_data("id", page.id);
//!             Ok(())
//!         })
//!         .parameter("id", ParameterType::Integer),
//!     )
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(definition.verbs(), vec![pageflow::Method::Get]);
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde_json::Value as JsonValue;

use crate::binding::HandlerArguments;
use crate::context::{PageContext, ViewData};
use crate::descriptor::{ParameterDescriptor, ParameterType};
use crate::error::{PageError, Result};
use crate::filters::Filter;
use crate::request::Method;
use crate::results::{self, ActionResult, PageViewResult};
use crate::services::ServiceProvider;

lazy_static! {
    static ref PLACEHOLDER: Regex =
        Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z0-9_]+)*)\s*\}\}")
            .expect("placeholder pattern is valid");
}

/// Outcome of a handler: an optional result to execute instead of rendering.
pub type HandlerResult = Result<Option<Box<dyn ActionResult>>>;

/// A request-handling page.
///
/// Every method has a default, so a page with no custom behavior is just
/// `impl Page for MyPage {}`.
pub trait Page: Send + 'static {
    /// Called after handler arguments are bound, before the handler runs.
    ///
    /// Binding failures are visible through [`PageContext::validation`].
    fn on_binding_completed(&mut self, _ctx: &PageContext) {}

    /// Produces the default output from the page template.
    ///
    /// The default replaces `{{ key }}` (and `{{ key.member }}`) with
    /// HTML-escaped view data.
    fn render(&self, ctx: &PageContext, template: &str) -> Result<String> {
        Ok(render_template(template, &ctx.view_data()))
    }
}

/// Substitutes `{{ key }}` placeholders with view data values.
///
/// Strings are HTML-escaped, other values use their JSON form, missing keys
/// render as nothing.
pub fn render_template(template: &str, view_data: &ViewData) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            let mut path = caps[1].split('.');
            let root = path.next().and_then(|key| view_data.get(key));
            let value = path.fold(root, |value, member| value.and_then(|v| v.get(member)));

            match value {
                None | Some(JsonValue::Null) => String::new(),
                Some(JsonValue::String(s)) => escape_html(s),
                Some(other) => escape_html(&other.to_string()),
            }
        })
        .into_owned()
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

type SyncHandlerFn<P> =
    dyn Fn(&mut P, &PageContext, &HandlerArguments) -> HandlerResult + Send + Sync;

type AsyncHandlerFn<P> = dyn for<'a> Fn(
        &'a mut P,
        &'a PageContext,
        HandlerArguments,
    ) -> BoxFuture<'a, HandlerResult>
    + Send
    + Sync;

enum HandlerKind<P> {
    Sync(Arc<SyncHandlerFn<P>>),
    Async(Arc<AsyncHandlerFn<P>>),
}

impl<P> Clone for HandlerKind<P> {
    fn clone(&self) -> Self {
        match self {
            Self::Sync(f) => Self::Sync(Arc::clone(f)),
            Self::Async(f) => Self::Async(Arc::clone(f)),
        }
    }
}

/// A verb handler of a page.
///
/// The four constructors mirror the supported signatures: synchronous or
/// asynchronous, returning nothing or an optional result.
pub struct HandlerMethod<P> {
    name: String,
    parameters: Vec<ParameterDescriptor>,
    kind: HandlerKind<P>,
    returns_result: bool,
}

impl<P: Page> HandlerMethod<P> {
    /// Synchronous handler without a result.
    pub fn sync<F>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut P, &PageContext, &HandlerArguments) -> Result<()> + Send + Sync + 'static,
    {
        Self::from_kind(
            name,
            HandlerKind::Sync(Arc::new(
                move |page: &mut P, ctx: &PageContext, args: &HandlerArguments| {
                    handler(page, ctx, args).map(|()| None)
                },
            )),
            false,
        )
    }

    /// Synchronous handler that may return a result.
    pub fn sync_result<F>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut P, &PageContext, &HandlerArguments) -> HandlerResult + Send + Sync + 'static,
    {
        Self::from_kind(name, HandlerKind::Sync(Arc::new(handler)), true)
    }

    /// Asynchronous handler without a result.
    pub fn asynchronous<F>(name: impl Into<String>, handler: F) -> Self
    where
        F: for<'a> Fn(&'a mut P, &'a PageContext, HandlerArguments) -> BoxFuture<'a, Result<()>>
            + Send
            + Sync
            + 'static,
    {
        Self::from_kind(
            name,
            HandlerKind::Async(erase_async(move |page, ctx, args| {
                let pending = handler(page, ctx, args);
                async move { pending.await.map(|()| None) }.boxed()
            })),
            false,
        )
    }

    /// Asynchronous handler that may return a result.
    pub fn async_result<F>(name: impl Into<String>, handler: F) -> Self
    where
        F: for<'a> Fn(&'a mut P, &'a PageContext, HandlerArguments) -> BoxFuture<'a, HandlerResult>
            + Send
            + Sync
            + 'static,
    {
        Self::from_kind(name, HandlerKind::Async(erase_async(handler)), true)
    }

    fn from_kind(name: impl Into<String>, kind: HandlerKind<P>, returns_result: bool) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            kind,
            returns_result,
        }
    }

    /// Declares a bound parameter.
    pub fn parameter(mut self, name: impl Into<String>, parameter_type: ParameterType) -> Self {
        self.parameters.push(ParameterDescriptor::new(name, parameter_type));
        self
    }

    /// Handler name, e.g. `OnPostAsync`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared parameters.
    pub fn parameters(&self) -> &[ParameterDescriptor] {
        &self.parameters
    }

    /// Returns true for asynchronous handlers.
    pub fn is_async(&self) -> bool {
        matches!(self.kind, HandlerKind::Async(_))
    }

    /// Returns true if the handler can produce a result.
    pub fn returns_result(&self) -> bool {
        self.returns_result
    }

    async fn invoke(
        &self,
        page: &mut P,
        ctx: &PageContext,
        arguments: HandlerArguments,
    ) -> HandlerResult {
        match &self.kind {
            HandlerKind::Sync(handler) => handler(page, ctx, &arguments),
            HandlerKind::Async(handler) => handler(page, ctx, arguments).await,
        }
    }
}

fn erase_async<P, F>(handler: F) -> Arc<AsyncHandlerFn<P>>
where
    F: for<'a> Fn(&'a mut P, &'a PageContext, HandlerArguments) -> BoxFuture<'a, HandlerResult>
        + Send
        + Sync
        + 'static,
{
    Arc::new(handler)
}

impl<P> fmt::Debug for HandlerMethod<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerMethod")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .field("async", &matches!(self.kind, HandlerKind::Async(_)))
            .field("returns_result", &self.returns_result)
            .finish()
    }
}

type Activator<P> = dyn Fn(&ServiceProvider) -> Result<P> + Send + Sync;

/// How to construct a page type and which handler serves which verb.
pub struct PageDefinition<P> {
    name: String,
    activator: Arc<Activator<P>>,
    handlers: BTreeMap<Method, HandlerMethod<P>>,
    filters: Vec<Arc<dyn Filter>>,
}

impl<P: Page> PageDefinition<P> {
    /// Starts a definition. `activator` builds a page per request and may
    /// resolve injected services.
    pub fn builder<F>(name: impl Into<String>, activator: F) -> PageDefinitionBuilder<P>
    where
        F: Fn(&ServiceProvider) -> Result<P> + Send + Sync + 'static,
    {
        PageDefinitionBuilder {
            definition: PageDefinition {
                name: name.into(),
                activator: Arc::new(activator),
                handlers: BTreeMap::new(),
                filters: Vec::new(),
            },
            error: None,
        }
    }

    /// Type name of the page.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Verbs with a handler, in a stable order.
    pub fn verbs(&self) -> Vec<Method> {
        self.handlers.keys().copied().collect()
    }

    /// The handler for `verb`, if any.
    pub fn handler_for(&self, verb: Method) -> Option<&HandlerMethod<P>> {
        self.handlers.get(&verb)
    }

    fn select_handler(&self, verb: Option<Method>) -> Option<&HandlerMethod<P>> {
        match verb? {
            Method::Head => self
                .handlers
                .get(&Method::Head)
                .or_else(|| self.handlers.get(&Method::Get)),
            verb => self.handlers.get(&verb),
        }
    }
}

/// Builder for [`PageDefinition`].
pub struct PageDefinitionBuilder<P> {
    definition: PageDefinition<P>,
    error: Option<PageError>,
}

impl<P: Page> PageDefinitionBuilder<P> {
    /// Adds a handler whose verb is taken from its name (`OnGet...`,
    /// `OnPost...`, `OnPut...`, `OnDelete...`, `OnPatch...`).
    pub fn handler(self, handler: HandlerMethod<P>) -> Self {
        match Method::from_handler_name(&handler.name) {
            Some(verb) => self.on(verb, handler),
            None => {
                let message = format!(
                    "Handler '{}' on page '{}' does not name an HTTP verb",
                    handler.name, self.definition.name
                );
                self.fail(message)
            }
        }
    }

    /// Adds a handler for an explicit verb.
    pub fn on(mut self, verb: Method, handler: HandlerMethod<P>) -> Self {
        if let Some(existing) = self.definition.handlers.get(&verb) {
            let message = format!(
                "Page '{}' declares more than one {} handler ('{}' and '{}')",
                self.definition.name, verb, existing.name, handler.name
            );
            return self.fail(message);
        }
        self.definition.handlers.insert(verb, handler);
        self
    }

    /// Adds a filter that applies to this page only.
    pub fn filter(mut self, filter: Arc<dyn Filter>) -> Self {
        if !filter.has_capability() {
            let message = format!(
                "Filter '{}' on page '{}' implements neither an authorization nor a resource stage",
                filter.name(),
                self.definition.name
            );
            return self.fail(message);
        }
        self.definition.filters.push(filter);
        self
    }

    fn fail(mut self, message: String) -> Self {
        if self.error.is_none() {
            self.error = Some(PageError::Configuration(message));
        }
        self
    }

    /// Finishes the definition, reporting the first configuration error.
    pub fn build(self) -> Result<PageDefinition<P>> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.definition),
        }
    }
}

/// Type-erased page definition.
pub trait PageBehavior: Send + Sync {
    /// Type name of the page.
    fn name(&self) -> &str;

    /// Creates a page instance for one request.
    fn create(self: Arc<Self>, services: &ServiceProvider) -> Result<Box<dyn PageInstance>>;

    /// Verbs with a handler.
    fn verbs(&self) -> Vec<Method>;

    /// Every handler parameter, in handler order.
    fn parameters(&self) -> Vec<ParameterDescriptor>;

    /// Page-level filters.
    fn filters(&self) -> &[Arc<dyn Filter>];
}

impl<P: Page> PageBehavior for PageDefinition<P> {
    fn name(&self) -> &str {
        &self.name
    }

    fn create(self: Arc<Self>, services: &ServiceProvider) -> Result<Box<dyn PageInstance>> {
        let page = (self.activator)(services)?;
        Ok(Box::new(TypedPage {
            page,
            definition: self,
        }))
    }

    fn verbs(&self) -> Vec<Method> {
        PageDefinition::verbs(self)
    }

    fn parameters(&self) -> Vec<ParameterDescriptor> {
        self.handlers
            .values()
            .flat_map(|handler| handler.parameters.iter().cloned())
            .collect()
    }

    fn filters(&self) -> &[Arc<dyn Filter>] {
        &self.filters
    }
}

/// One live page, created per request.
#[async_trait]
pub trait PageInstance: Send {
    /// Runs the handler for the request verb and produces the response.
    async fn execute(&mut self, ctx: &PageContext) -> Result<()>;
}

struct TypedPage<P> {
    page: P,
    definition: Arc<PageDefinition<P>>,
}

#[async_trait]
impl<P: Page> PageInstance for TypedPage<P> {
    async fn execute(&mut self, ctx: &PageContext) -> Result<()> {
        let definition = Arc::clone(&self.definition);

        if let Some(handler) = definition.select_handler(ctx.request().verb()) {
            tracing::debug!(
                "Executing handler {} of {}",
                handler.name,
                ctx.action_descriptor().display_name
            );

            let arguments = HandlerArguments::bind(ctx, &handler.parameters).await?;
            self.page.on_binding_completed(ctx);

            if let Some(result) = handler.invoke(&mut self.page, ctx, arguments).await? {
                return results::execute(ctx, result.as_ref()).await;
            }
        }

        let page_type = Arc::clone(&ctx.action_descriptor().page_type);
        let content = self.page.render(ctx, page_type.template())?;
        results::execute(ctx, &PageViewResult::new(content)).await
    }
}

/// Page used for sources without code-behind; it only renders its template.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplatePage;

impl Page for TemplatePage {}

/// The executable type produced by compiling a page source.
pub struct PageType {
    name: String,
    model: Option<String>,
    template: String,
    behavior: Arc<dyn PageBehavior>,
}

impl PageType {
    /// Creates a page type from a definition and the page template.
    pub fn new<P: Page>(definition: PageDefinition<P>, template: impl Into<String>) -> Self {
        Self::from_behavior(Arc::new(definition), template)
    }

    /// Creates a page type from an already erased definition.
    pub fn from_behavior(behavior: Arc<dyn PageBehavior>, template: impl Into<String>) -> Self {
        Self {
            name: behavior.name().to_string(),
            model: None,
            template: template.into(),
            behavior,
        }
    }

    /// A page type that only renders `template`.
    pub fn template_only(name: impl Into<String>, template: impl Into<String>) -> Self {
        let definition: PageDefinition<TemplatePage> = PageDefinition {
            name: name.into(),
            activator: Arc::new(|_| Ok(TemplatePage)),
            handlers: BTreeMap::new(),
            filters: Vec::new(),
        };
        Self::new(definition, template)
    }

    /// Records the model type declared by the source.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared model type, if any.
    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    /// The template rendered by default.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Verbs with a handler.
    pub fn verbs(&self) -> Vec<Method> {
        self.behavior.verbs()
    }

    /// Handler parameters.
    pub fn parameters(&self) -> Vec<ParameterDescriptor> {
        self.behavior.parameters()
    }

    /// Page-level filters.
    pub fn filters(&self) -> &[Arc<dyn Filter>] {
        self.behavior.filters()
    }

    /// Creates a page instance for one request.
    pub fn create_instance(&self, services: &ServiceProvider) -> Result<Box<dyn PageInstance>> {
        Arc::clone(&self.behavior).create(services)
    }
}

impl fmt::Debug for PageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageType")
            .field("name", &self.name)
            .field("model", &self.model)
            .field("verbs", &self.verbs())
            .finish()
    }
}
