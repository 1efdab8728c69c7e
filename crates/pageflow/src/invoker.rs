// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! The page action invoker.
//!
//! [`PageActionInvoker`] runs one request against one page. It is a small
//! interpreter over a [`State`] value:
//!
//! ```text
//! InvokeBegin
//!   -> AuthorizationBegin -> AuthorizationNext -> {AuthorizationAsync | AuthorizationSync}*
//!        -> AuthorizationShortCircuit -> InvokeEnd
//!        -> AuthorizationEnd
//!   -> ResourceBegin -> ResourceNext -> {ResourceAsync | ResourceSyncBegin}
//!        -> ResourceShortCircuit -> ResourceEnd
//!        -> ResourceInside -> PageBegin -> PageEnd
//!   -> ResourceEnd -> InvokeEnd
//! ```
//!
//! Each resource filter runs in its own nesting level. The outermost level
//! belongs to the invoker ([`Scope::Invoker`]); every deeper level is entered
//! through the continuation of the enclosing filter and runs with
//! [`Scope::Resource`]. Errors raised by a nested level are captured in the
//! shared [`ResourceExecutedContext`] so enclosing filters see them in their
//! executed hooks. When the outermost level unwinds, an error no filter
//! marked as handled is returned to the caller unchanged.
//!
//! Cancellation is checked before every filter and before the page runs.
//! Pending authorization filters, page execution and result execution are
//! abandoned as soon as the request's [`Cancellation`] fires; resource
//! filters that already ran their executing hook still get their executed
//! hook while the pipeline unwinds.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::activation::PageFactory;
use crate::context::{Cancellation, PageContext};
use crate::error::{PageError, Result};
use crate::filters::{
    AuthorizationFilterContext, CursorItem, FilterCursor, FilterSet, ResourceExecutedContext,
    ResourceExecutingContext,
};
use crate::results;

/// Position of the invoker in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Start of the invocation.
    InvokeBegin,
    /// Resets the cursor for the authorization stage.
    AuthorizationBegin,
    /// Selects the next authorization filter.
    AuthorizationNext,
    /// Runs an asynchronous authorization filter.
    AuthorizationAsync(usize),
    /// Runs a synchronous authorization filter.
    AuthorizationSync(usize),
    /// Executes the result set by an authorization filter.
    AuthorizationShortCircuit,
    /// Every authorization filter passed.
    AuthorizationEnd,
    /// Resets the cursor for the resource stage.
    ResourceBegin,
    /// Selects the next resource filter.
    ResourceNext,
    /// Runs an asynchronous resource filter around the rest of the pipeline.
    ResourceAsync(usize),
    /// Runs the executing hook of a synchronous resource filter.
    ResourceSyncBegin(usize),
    /// Runs the executed hook of a synchronous resource filter.
    ResourceSyncEnd(usize),
    /// Executes the short-circuit result, then continues with the executed
    /// hook of the synchronous filter that set it, if any.
    ResourceShortCircuit(Option<usize>),
    /// No resource filter is left.
    ResourceInside,
    /// Creates and executes the page.
    PageBegin,
    /// The page completed.
    PageEnd,
    /// Unwinds the current level; the outermost level surfaces unhandled errors.
    ResourceEnd,
    /// End of the invocation.
    InvokeEnd,
}

/// Nesting level a [`State`] is interpreted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// The outermost level, driven by [`PageActionInvoker::invoke`].
    Invoker,
    /// A level entered through a resource filter continuation.
    Resource,
}

/// Executes the filter pipeline and the page for one request.
pub struct PageActionInvoker {
    page: PageContext,
    filters: FilterSet,
    factory: Arc<dyn PageFactory>,
    cursor: FilterCursor,
    authorization: Option<AuthorizationFilterContext>,
    executed: Option<ResourceExecutedContext>,
    // Filter that set a result and also ran its continuation.
    misuse: Option<String>,
}

impl PageActionInvoker {
    /// Creates an invoker for `page` with the filters selected for it.
    pub fn new(page: PageContext, filters: FilterSet, factory: Arc<dyn PageFactory>) -> Self {
        Self {
            page,
            filters,
            factory,
            cursor: FilterCursor::new(),
            authorization: None,
            executed: None,
            misuse: None,
        }
    }

    /// The request context.
    pub fn page_context(&self) -> &PageContext {
        &self.page
    }

    /// The filters run by this invoker.
    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    /// Runs the pipeline to completion.
    pub async fn invoke(&mut self) -> Result<()> {
        tracing::debug!(
            "Invoking {} with {} filter(s)",
            self.page.action_descriptor().display_name,
            self.filters.len()
        );
        let outcome = self.run(State::InvokeBegin, Scope::Invoker).await;
        // Misuse fails the invocation even when a filter marked it handled.
        let outcome = match self.misuse.take() {
            Some(filter) => Err(PageError::InvalidShortCircuit { filter }),
            None => outcome,
        };
        if let Err(err) = &outcome {
            tracing::debug!(
                "Invocation of {} failed: {}",
                self.page.action_descriptor().display_name,
                err
            );
        }
        outcome
    }

    async fn run(&mut self, mut state: State, scope: Scope) -> Result<()> {
        let cancellation = self.page.cancellation().clone();
        // Executing context of the filter owning this level.
        let mut executing: Option<ResourceExecutingContext> = None;

        loop {
            tracing::trace!("{:?} ({:?})", state, scope);

            state = match state {
                State::InvokeBegin => State::AuthorizationBegin,

                State::AuthorizationBegin => {
                    self.cursor.reset();
                    State::AuthorizationNext
                }

                State::AuthorizationNext => {
                    self.ensure_not_canceled()?;
                    match self.cursor.next_authorization(&self.filters) {
                        Some(CursorItem::Async(index)) => State::AuthorizationAsync(index),
                        Some(CursorItem::Sync(index)) => State::AuthorizationSync(index),
                        None => State::AuthorizationEnd,
                    }
                }

                State::AuthorizationAsync(index) => {
                    let filter = Arc::clone(&self.filters[index]);
                    if let Some(authorization) = filter.as_async_authorization() {
                        tracing::debug!("Before authorization filter {}", filter.name());
                        let ctx = self.authorization_context();
                        cancellable(&cancellation, authorization.on_authorization(ctx)).await?;
                        tracing::debug!("After authorization filter {}", filter.name());
                    }
                    self.after_authorization_filter()
                }

                State::AuthorizationSync(index) => {
                    let filter = Arc::clone(&self.filters[index]);
                    if let Some(authorization) = filter.as_authorization() {
                        tracing::debug!("Before authorization filter {}", filter.name());
                        authorization.on_authorization(self.authorization_context())?;
                        tracing::debug!("After authorization filter {}", filter.name());
                    }
                    self.after_authorization_filter()
                }

                State::AuthorizationShortCircuit => {
                    let result = self.authorization.as_mut().and_then(|ctx| ctx.take_result());
                    if let Some(result) = result {
                        tracing::debug!(
                            "Request to {} was short-circuited by authorization",
                            self.page.action_descriptor().display_name
                        );
                        let execution = results::execute(&self.page, result.as_ref());
                        cancellable(&cancellation, execution).await?;
                    }
                    State::InvokeEnd
                }

                State::AuthorizationEnd => State::ResourceBegin,

                State::ResourceBegin => {
                    self.cursor.reset();
                    State::ResourceNext
                }

                State::ResourceNext => {
                    self.ensure_not_canceled()?;
                    match self.cursor.next_resource(&self.filters) {
                        Some(CursorItem::Async(index)) => State::ResourceAsync(index),
                        Some(CursorItem::Sync(index)) => State::ResourceSyncBegin(index),
                        None => State::ResourceInside,
                    }
                }

                State::ResourceAsync(index) => {
                    let filter = Arc::clone(&self.filters[index]);
                    let Some(resource) = filter.as_async_resource() else {
                        return Err(missing_capability(filter.name()));
                    };
                    let ctx = executing.get_or_insert_with(|| {
                        ResourceExecutingContext::new(self.page.clone(), self.filters.clone())
                    });

                    tracing::debug!("Before resource filter {}", filter.name());
                    let next = ResourceNext {
                        invoker: self,
                        filter: filter.name().to_string(),
                    };
                    let outcome = resource.on_resource_execution(ctx, next).await;
                    tracing::debug!("After resource filter {}", filter.name());

                    if let Some(filter) = &self.misuse {
                        return Err(PageError::InvalidShortCircuit {
                            filter: filter.clone(),
                        });
                    }
                    outcome?;

                    if self.executed.is_some() {
                        State::ResourceEnd
                    } else if ctx.has_result() {
                        self.executed = Some(ResourceExecutedContext::short_circuited(
                            self.page.clone(),
                            self.filters.clone(),
                            ctx.take_result(),
                        ));
                        State::ResourceShortCircuit(None)
                    } else {
                        return Err(PageError::MissingContinuation {
                            filter: filter.name().to_string(),
                        });
                    }
                }

                State::ResourceSyncBegin(index) => {
                    let filter = Arc::clone(&self.filters[index]);
                    let Some(resource) = filter.as_resource() else {
                        return Err(missing_capability(filter.name()));
                    };
                    let ctx = executing.get_or_insert_with(|| {
                        ResourceExecutingContext::new(self.page.clone(), self.filters.clone())
                    });

                    tracing::debug!("Before resource executing {}", filter.name());
                    resource.on_resource_executing(ctx)?;
                    tracing::debug!("After resource executing {}", filter.name());

                    match ctx.take_result() {
                        Some(result) => {
                            self.executed = Some(ResourceExecutedContext::short_circuited(
                                self.page.clone(),
                                self.filters.clone(),
                                Some(result),
                            ));
                            State::ResourceShortCircuit(Some(index))
                        }
                        None => {
                            self.invoke_next_resource_filter().await;
                            State::ResourceSyncEnd(index)
                        }
                    }
                }

                State::ResourceSyncEnd(index) => {
                    let filter = Arc::clone(&self.filters[index]);
                    let Some(resource) = filter.as_resource() else {
                        return Err(missing_capability(filter.name()));
                    };
                    let executed = self.executed_context();

                    tracing::debug!("Before resource executed {}", filter.name());
                    resource.on_resource_executed(executed)?;
                    tracing::debug!("After resource executed {}", filter.name());
                    State::ResourceEnd
                }

                State::ResourceShortCircuit(sync_filter) => {
                    tracing::debug!(
                        "Request to {} was short-circuited by a resource filter",
                        self.page.action_descriptor().display_name
                    );
                    let result = self.executed.as_ref().and_then(|ctx| ctx.result.as_deref());
                    let outcome = match result {
                        Some(result) => {
                            cancellable(&cancellation, results::execute(&self.page, result)).await
                        }
                        None => Ok(()),
                    };
                    // The filter that set the result still gets its executed hook.
                    if let Err(err) = outcome {
                        tracing::debug!("Short-circuit result failed: {}", err);
                        self.executed_context().exception = Some(err);
                    }
                    match sync_filter {
                        Some(index) => State::ResourceSyncEnd(index),
                        None => State::ResourceEnd,
                    }
                }

                State::ResourceInside => State::PageBegin,

                State::PageBegin => {
                    self.ensure_not_canceled()?;
                    let mut page = self.factory.create_page(&self.page)?;
                    let outcome = cancellable(&cancellation, page.execute(&self.page)).await;
                    self.factory.release_page(&self.page, page);
                    outcome?;
                    State::PageEnd
                }

                State::PageEnd => match scope {
                    Scope::Resource => {
                        self.executed = Some(ResourceExecutedContext::new(
                            self.page.clone(),
                            self.filters.clone(),
                        ));
                        return Ok(());
                    }
                    Scope::Invoker => State::InvokeEnd,
                },

                State::ResourceEnd => match scope {
                    Scope::Resource => return Ok(()),
                    Scope::Invoker => {
                        if let Some(executed) = self.executed.as_mut() {
                            if !executed.exception_handled {
                                if let Some(err) = executed.exception.take() {
                                    return Err(err);
                                }
                            }
                        }
                        State::InvokeEnd
                    }
                },

                State::InvokeEnd => return Ok(()),
            };
        }
    }

    /// Runs the remaining resource filters and the page as a nested level.
    ///
    /// Leaves `executed` set in every case; an error of the nested level is
    /// stored in it rather than returned.
    fn invoke_next_resource_filter(&mut self) -> BoxFuture<'_, ()> {
        async move {
            if let Err(err) = self.run(State::ResourceNext, Scope::Resource).await {
                tracing::debug!("Nested resource pipeline failed: {}", err);
                self.executed = Some(ResourceExecutedContext::failed(
                    self.page.clone(),
                    self.filters.clone(),
                    err,
                ));
            }
            self.executed_context();
        }
        .boxed()
    }

    fn authorization_context(&mut self) -> &mut AuthorizationFilterContext {
        let page = &self.page;
        let filters = &self.filters;
        self.authorization
            .get_or_insert_with(|| AuthorizationFilterContext::new(page.clone(), filters.clone()))
    }

    fn executed_context(&mut self) -> &mut ResourceExecutedContext {
        let page = &self.page;
        let filters = &self.filters;
        self.executed
            .get_or_insert_with(|| ResourceExecutedContext::new(page.clone(), filters.clone()))
    }

    fn after_authorization_filter(&self) -> State {
        let short_circuited = self
            .authorization
            .as_ref()
            .map_or(false, |ctx| ctx.result().is_some());

        if short_circuited {
            State::AuthorizationShortCircuit
        } else {
            State::AuthorizationNext
        }
    }

    fn ensure_not_canceled(&self) -> Result<()> {
        if self.page.is_canceled() {
            tracing::debug!(
                "Request to {} was canceled",
                self.page.action_descriptor().display_name
            );
            return Err(PageError::Canceled);
        }
        Ok(())
    }
}

/// Continuation handed to an [`AsyncResourceFilter`](crate::filters::AsyncResourceFilter).
///
/// Calling [`run`](Self::run) executes the nested filters and the page and
/// yields the executed context they produced.
pub struct ResourceNext<'n> {
    invoker: &'n mut PageActionInvoker,
    filter: String,
}

impl<'n> ResourceNext<'n> {
    /// Runs the rest of the pipeline.
    ///
    /// `ctx` is the filter's executing context. If it already carries a
    /// result the pipeline is not run and
    /// [`PageError::InvalidShortCircuit`] is returned; the invocation then
    /// fails with that error even if the filter ignores it.
    pub async fn run(
        self,
        ctx: &ResourceExecutingContext,
    ) -> Result<&'n mut ResourceExecutedContext> {
        let invoker = self.invoker;

        if ctx.has_result() {
            tracing::warn!(
                "Resource filter {} set a result and also called its continuation",
                self.filter
            );
            invoker.misuse = Some(self.filter.clone());
            return Err(PageError::InvalidShortCircuit { filter: self.filter });
        }

        invoker.invoke_next_resource_filter().await;
        Ok(invoker.executed_context())
    }

    /// Name of the filter holding this continuation.
    pub fn filter_name(&self) -> &str {
        &self.filter
    }
}

fn missing_capability(filter: &str) -> PageError {
    PageError::Configuration(format!("Filter {} lost its resource capability", filter))
}

async fn cancellable<T>(
    cancellation: &Cancellation,
    work: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancellation.canceled() => Err(PageError::Canceled),
        outcome = work => outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::DefaultPageFactory;
    use crate::descriptor::{CompiledPageActionDescriptor, PageActionDescriptor};
    use crate::filters::{
        AsyncAuthorizationFilter, AsyncResourceFilter, AuthorizationFilter, Filter, ResourceFilter,
    };
    use crate::page::{HandlerMethod, Page, PageDefinition, PageType};
    use crate::request::PageRequest;
    use crate::results::{ActionResult, StatusCodeResult};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    type Log = Arc<Mutex<Vec<String>>>;

    fn push(log: &Log, entry: impl Into<String>) {
        log.lock().unwrap().push(entry.into());
    }

    fn entries(log: &Log) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    #[derive(Debug, thiserror::Error)]
    #[error("boom from {0}")]
    struct Boom(&'static str);

    struct Auth {
        name: &'static str,
        log: Log,
        deny: bool,
    }

    impl Filter for Auth {
        fn name(&self) -> &str {
            self.name
        }
        fn as_authorization(&self) -> Option<&dyn AuthorizationFilter> {
            Some(self)
        }
    }

    impl AuthorizationFilter for Auth {
        fn on_authorization(&self, ctx: &mut AuthorizationFilterContext) -> Result<()> {
            push(&self.log, self.name);
            if self.deny {
                ctx.set_result(StatusCodeResult::new(401));
            }
            Ok(())
        }
    }

    struct AsyncAuth {
        name: &'static str,
        log: Log,
    }

    impl Filter for AsyncAuth {
        fn name(&self) -> &str {
            self.name
        }
        fn as_async_authorization(&self) -> Option<&dyn AsyncAuthorizationFilter> {
            Some(self)
        }
    }

    #[async_trait]
    impl AsyncAuthorizationFilter for AsyncAuth {
        async fn on_authorization(&self, _ctx: &mut AuthorizationFilterContext) -> Result<()> {
            tokio::task::yield_now().await;
            push(&self.log, self.name);
            Ok(())
        }
    }

    #[derive(Default)]
    struct Resource {
        name: &'static str,
        log: Option<Log>,
        short_circuit: bool,
        stall: bool,
        fail: bool,
        handle: bool,
    }

    impl Resource {
        fn new(name: &'static str, log: &Log) -> Self {
            Self {
                name,
                log: Some(Arc::clone(log)),
                ..Self::default()
            }
        }

        fn log(&self, entry: String) {
            if let Some(log) = &self.log {
                push(log, entry);
            }
        }
    }

    impl Filter for Resource {
        fn name(&self) -> &str {
            self.name
        }
        fn as_resource(&self) -> Option<&dyn ResourceFilter> {
            Some(self)
        }
    }

    impl ResourceFilter for Resource {
        fn on_resource_executing(&self, ctx: &mut ResourceExecutingContext) -> Result<()> {
            self.log(format!("{}:executing", self.name));
            if self.fail {
                return Err(PageError::handler(Boom(self.name)));
            }
            if self.short_circuit {
                ctx.set_result(StatusCodeResult::new(403));
            }
            if self.stall {
                ctx.set_result(Stall);
            }
            Ok(())
        }

        fn on_resource_executed(&self, ctx: &mut ResourceExecutedContext) -> Result<()> {
            self.log(format!(
                "{}:executed canceled={} exception={}",
                self.name,
                ctx.canceled,
                ctx.exception.is_some()
            ));
            if self.handle && ctx.exception.is_some() {
                ctx.exception_handled = true;
            }
            Ok(())
        }
    }

    /// Result that never completes.
    struct Stall;

    #[async_trait]
    impl ActionResult for Stall {
        async fn execute_result(&self, _ctx: &PageContext) -> Result<()> {
            futures::future::pending::<()>().await;
            Ok(())
        }
    }

    #[derive(Clone, Copy, PartialEq)]
    enum Mode {
        Continue,
        ShortCircuit,
        Both,
        Neither,
    }

    struct AsyncResource {
        name: &'static str,
        log: Log,
        mode: Mode,
    }

    impl Filter for AsyncResource {
        fn name(&self) -> &str {
            self.name
        }
        fn as_async_resource(&self) -> Option<&dyn AsyncResourceFilter> {
            Some(self)
        }
    }

    #[async_trait]
    impl AsyncResourceFilter for AsyncResource {
        async fn on_resource_execution(
            &self,
            ctx: &mut ResourceExecutingContext,
            next: ResourceNext<'_>,
        ) -> Result<()> {
            push(&self.log, format!("{}:before", self.name));
            match self.mode {
                Mode::Continue => {
                    let executed = next.run(ctx).await?;
                    let failed = executed.exception.is_some();
                    push(&self.log, format!("{}:after exception={}", self.name, failed));
                }
                Mode::ShortCircuit => ctx.set_result(StatusCodeResult::new(429)),
                Mode::Both => {
                    ctx.set_result(StatusCodeResult::new(429));
                    let _ = next.run(ctx).await;
                }
                Mode::Neither => {}
            }
            Ok(())
        }
    }

    struct LoggedPage {
        log: Log,
    }

    impl Page for LoggedPage {}

    fn sync_handler() -> HandlerMethod<LoggedPage> {
        HandlerMethod::sync("OnGet", |page: &mut LoggedPage, _, _| {
            push(&page.log, "page");
            Ok(())
        })
    }

    fn invoker(
        filters: Vec<Arc<dyn Filter>>,
        log: &Log,
        handler: HandlerMethod<LoggedPage>,
    ) -> PageActionInvoker {
        let page_log = Arc::clone(log);
        let definition = PageDefinition::builder("LoggedPage", move |_| {
            Ok(LoggedPage {
                log: Arc::clone(&page_log),
            })
        })
        .handler(handler)
        .build()
        .unwrap();

        let descriptor =
            PageActionDescriptor::from_view_engine_path("Pages", "/Index.page", vec![]);
        let page_type = Arc::new(PageType::new(definition, "rendered"));
        let compiled = CompiledPageActionDescriptor::new(&descriptor, page_type).unwrap();
        let ctx = PageContext::builder(PageRequest::new("/", "GET"), Arc::new(compiled)).build();

        let factory = Arc::new(DefaultPageFactory::default());
        PageActionInvoker::new(ctx, FilterSet::new(filters), factory)
    }

    fn new_log() -> Log {
        Arc::new(Mutex::new(Vec::new()))
    }

    #[tokio::test]
    async fn test_no_filters_renders_page() {
        let log = new_log();
        let mut invoker = invoker(vec![], &log, sync_handler());
        invoker.invoke().await.unwrap();

        assert_eq!(entries(&log), vec!["page"]);
        assert_eq!(invoker.page_context().response().body, "rendered");
    }

    #[tokio::test]
    async fn test_stage_order() {
        let log = new_log();
        let filters: Vec<Arc<dyn Filter>> = vec![
            Arc::new(Resource::new("r1", &log)),
            Arc::new(Auth {
                name: "a1",
                log: log.clone(),
                deny: false,
            }),
            Arc::new(AsyncResource {
                name: "r2",
                log: log.clone(),
                mode: Mode::Continue,
            }),
            Arc::new(AsyncAuth {
                name: "a2",
                log: log.clone(),
            }),
        ];

        invoker(filters, &log, sync_handler()).invoke().await.unwrap();
        assert_eq!(
            entries(&log),
            vec![
                "a1",
                "a2",
                "r1:executing",
                "r2:before",
                "page",
                "r2:after exception=false",
                "r1:executed canceled=false exception=false",
            ]
        );
    }

    #[tokio::test]
    async fn test_authorization_short_circuit() {
        let log = new_log();
        let filters: Vec<Arc<dyn Filter>> = vec![
            Arc::new(Auth {
                name: "deny",
                log: log.clone(),
                deny: true,
            }),
            Arc::new(Auth {
                name: "later",
                log: log.clone(),
                deny: false,
            }),
            Arc::new(Resource::new("r1", &log)),
        ];

        let mut invoker = invoker(filters, &log, sync_handler());
        invoker.invoke().await.unwrap();

        assert_eq!(entries(&log), vec!["deny"]);
        assert_eq!(invoker.page_context().response().status, 401);
    }

    #[tokio::test]
    async fn test_sync_short_circuit_runs_own_executed_hook() {
        let log = new_log();
        let filters: Vec<Arc<dyn Filter>> = vec![
            Arc::new(Resource::new("r1", &log)),
            Arc::new(Resource {
                short_circuit: true,
                ..Resource::new("r2", &log)
            }),
            Arc::new(Resource::new("r3", &log)),
        ];

        let mut invoker = invoker(filters, &log, sync_handler());
        invoker.invoke().await.unwrap();

        assert_eq!(
            entries(&log),
            vec![
                "r1:executing",
                "r2:executing",
                "r2:executed canceled=true exception=false",
                "r1:executed canceled=true exception=false",
            ]
        );
        let response = invoker.page_context().response();
        assert_eq!(response.status, 403);
        assert_eq!(response.body, "");
    }

    #[tokio::test]
    async fn test_async_short_circuit() {
        let log = new_log();
        let filters: Vec<Arc<dyn Filter>> = vec![
            Arc::new(Resource::new("r1", &log)),
            Arc::new(AsyncResource {
                name: "r2",
                log: log.clone(),
                mode: Mode::ShortCircuit,
            }),
        ];

        let mut invoker = invoker(filters, &log, sync_handler());
        invoker.invoke().await.unwrap();

        assert_eq!(
            entries(&log),
            vec![
                "r1:executing",
                "r2:before",
                "r1:executed canceled=true exception=false",
            ]
        );
        assert_eq!(invoker.page_context().response().status, 429);
    }

    #[tokio::test]
    async fn test_async_result_and_continuation_is_reported() {
        let log = new_log();
        let filters: Vec<Arc<dyn Filter>> = vec![Arc::new(AsyncResource {
            name: "both",
            log: log.clone(),
            mode: Mode::Both,
        })];

        let mut invoker = invoker(filters, &log, sync_handler());
        let err = invoker.invoke().await.unwrap_err();

        assert!(matches!(err, PageError::InvalidShortCircuit { ref filter } if filter == "both"));
        assert_eq!(entries(&log), vec!["both:before"]);
        assert_eq!(invoker.page_context().response().status, 200);
        assert_eq!(invoker.page_context().response().body, "");
    }

    #[tokio::test]
    async fn test_nested_misuse_fails_even_when_handled() {
        let log = new_log();
        let filters: Vec<Arc<dyn Filter>> = vec![
            Arc::new(Resource {
                handle: true,
                ..Resource::new("outer", &log)
            }),
            Arc::new(AsyncResource {
                name: "both",
                log: log.clone(),
                mode: Mode::Both,
            }),
        ];

        let mut invoker = invoker(filters, &log, sync_handler());
        let err = invoker.invoke().await.unwrap_err();

        assert!(matches!(err, PageError::InvalidShortCircuit { ref filter } if filter == "both"));
        assert_eq!(
            entries(&log),
            vec![
                "outer:executing",
                "both:before",
                "outer:executed canceled=false exception=true",
            ]
        );
        assert_eq!(invoker.page_context().response().body, "");
    }

    #[tokio::test]
    async fn test_async_without_result_or_continuation() {
        let log = new_log();
        let filters: Vec<Arc<dyn Filter>> = vec![Arc::new(AsyncResource {
            name: "idle",
            log: log.clone(),
            mode: Mode::Neither,
        })];

        let err = invoker(filters, &log, sync_handler()).invoke().await.unwrap_err();
        assert!(matches!(err, PageError::MissingContinuation { ref filter } if filter == "idle"));
    }

    #[tokio::test]
    async fn test_nested_error_surfaces_after_executed_hooks() {
        let log = new_log();
        let filters: Vec<Arc<dyn Filter>> = vec![
            Arc::new(Resource::new("r1", &log)),
            Arc::new(AsyncResource {
                name: "r2",
                log: log.clone(),
                mode: Mode::Continue,
            }),
            Arc::new(Resource {
                fail: true,
                ..Resource::new("r3", &log)
            }),
        ];

        let err = invoker(filters, &log, sync_handler()).invoke().await.unwrap_err();

        assert_eq!(err.downcast_ref::<Boom>().map(|b| b.0), Some("r3"));
        assert_eq!(err.to_string(), "boom from r3");
        assert_eq!(
            entries(&log),
            vec![
                "r1:executing",
                "r2:before",
                "r3:executing",
                "r2:after exception=true",
                "r1:executed canceled=false exception=true",
            ]
        );
    }

    #[tokio::test]
    async fn test_handled_exception_is_not_rethrown() {
        let log = new_log();
        let filters: Vec<Arc<dyn Filter>> = vec![
            Arc::new(Resource {
                handle: true,
                ..Resource::new("r1", &log)
            }),
            Arc::new(Resource::new("r2", &log)),
        ];
        let handler = HandlerMethod::sync("OnGet", |page: &mut LoggedPage, _, _| {
            push(&page.log, "page");
            Err(PageError::handler(Boom("page")))
        });

        invoker(filters, &log, handler).invoke().await.unwrap();
        assert_eq!(
            entries(&log),
            vec![
                "r1:executing",
                "r2:executing",
                "page",
                "r2:executed canceled=false exception=true",
                "r1:executed canceled=false exception=true",
            ]
        );
    }

    #[tokio::test]
    async fn test_page_error_without_filters_propagates() {
        let log = new_log();
        let handler = HandlerMethod::sync("OnGet", |_: &mut LoggedPage, _, _| {
            Err(PageError::handler(Boom("page")))
        });

        let err = invoker(vec![], &log, handler).invoke().await.unwrap_err();
        assert!(err.downcast_ref::<Boom>().is_some());
    }

    #[tokio::test]
    async fn test_page_runs_once_with_nested_filters() {
        let log = new_log();
        let filters: Vec<Arc<dyn Filter>> = vec![
            Arc::new(AsyncResource {
                name: "r1",
                log: log.clone(),
                mode: Mode::Continue,
            }),
            Arc::new(Resource::new("r2", &log)),
            Arc::new(AsyncResource {
                name: "r3",
                log: log.clone(),
                mode: Mode::Continue,
            }),
        ];

        invoker(filters, &log, sync_handler()).invoke().await.unwrap();
        let pages = entries(&log).iter().filter(|e| e.as_str() == "page").count();
        assert_eq!(pages, 1);
    }

    #[tokio::test]
    async fn test_canceled_before_start() {
        let log = new_log();
        let filters: Vec<Arc<dyn Filter>> = vec![Arc::new(Auth {
            name: "a1",
            log: log.clone(),
            deny: false,
        })];

        let mut invoker = invoker(filters, &log, sync_handler());
        invoker.page_context().cancellation().cancel();

        let err = invoker.invoke().await.unwrap_err();
        assert!(err.is_canceled());
        assert!(entries(&log).is_empty());
    }

    #[tokio::test]
    async fn test_cancel_during_page_unwinds_resource_filters() {
        let log = new_log();
        let filters: Vec<Arc<dyn Filter>> = vec![Arc::new(Resource::new("r1", &log))];
        let handler = HandlerMethod::asynchronous("OnGetAsync", |page: &mut LoggedPage, _, _| {
            async move {
                push(&page.log, "page");
                futures::future::pending::<()>().await;
                Ok(())
            }
            .boxed()
        });

        let mut invoker = invoker(filters, &log, handler);
        let cancellation = invoker.page_context().cancellation().clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancellation.cancel();
        });

        let err = invoker.invoke().await.unwrap_err();
        assert!(err.is_canceled());
        assert_eq!(
            entries(&log),
            vec!["r1:executing", "page", "r1:executed canceled=false exception=true"]
        );
    }

    #[tokio::test]
    async fn test_canceled_short_circuit_result_still_runs_executed_hooks() {
        let log = new_log();
        let filters: Vec<Arc<dyn Filter>> = vec![
            Arc::new(Resource::new("r1", &log)),
            Arc::new(Resource {
                stall: true,
                ..Resource::new("r2", &log)
            }),
        ];

        let mut invoker = invoker(filters, &log, sync_handler());
        let cancellation = invoker.page_context().cancellation().clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancellation.cancel();
        });

        let err = invoker.invoke().await.unwrap_err();
        assert!(err.is_canceled());
        assert_eq!(
            entries(&log),
            vec![
                "r1:executing",
                "r2:executing",
                "r2:executed canceled=true exception=true",
                "r1:executed canceled=true exception=true",
            ]
        );
    }
}
