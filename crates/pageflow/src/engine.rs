// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! The pages engine.
//!
//! [`PagesEngine`] ties the pieces together. Pages are discovered once when
//! the engine is built. Each request is then handled like this:
//!
//! 1. match the URL against the route table,
//! 2. compile the page, or reuse the cached compilation,
//! 3. collect its filters,
//! 4. build a [`PageContext`] and run a [`PageActionInvoker`],
//! 5. return the response written during the run.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use pageflow::{MemoryPageProvider, PageRequest, PagesEngine};
//!
//! let files = Arc::new(MemoryPageProvider::new());
//! files.add_file("Pages/Index.page", "@page\n<h1>Home</h1>");
//!
//! let engine = PagesEngine::builder().file_provider(files).build().unwrap();
//! let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! let response = runtime.block_on(engine.handle(PageRequest::new("/", "GET"))).unwrap();
//! assert_eq!(response.body, "<h1>Home</h1>");
//! ```

use std::sync::Arc;

use crate::activation::{DefaultPageFactory, PageFactory};
use crate::binding::{
    default_value_provider_factories, ArgumentBinder, DefaultArgumentBinder, ValueProviderFactory,
};
use crate::compilation::{CompiledPageCache, PageCompiler, RegistryPageCompiler};
use crate::context::{Cancellation, PageContext};
use crate::descriptor::{
    CompiledPageActionDescriptor, FilterDescriptor, FilterScope, PageActionDescriptor,
};
use crate::discovery::{PageActionDescriptorProvider, PageFileProvider};
use crate::error::Result;
use crate::filters::{DefaultFilterProvider, Filter, FilterAggregator, FilterProvider};
use crate::invoker::PageActionInvoker;
use crate::options::PagesOptions;
use crate::page::{Page, PageDefinition};
use crate::request::PageRequest;
use crate::response::PageResponse;
use crate::routing::RouteTable;
use crate::services::ServiceProvider;

/// Handles page requests.
pub struct PagesEngine {
    files: Arc<dyn PageFileProvider>,
    options: PagesOptions,
    routes: RouteTable,
    cache: CompiledPageCache,
    aggregator: FilterAggregator,
    factory: Arc<dyn PageFactory>,
    services: Arc<ServiceProvider>,
    value_provider_factories: Vec<Arc<dyn ValueProviderFactory>>,
    binder: Arc<dyn ArgumentBinder>,
}

impl PagesEngine {
    /// Starts building an engine.
    pub fn builder() -> PagesEngineBuilder {
        PagesEngineBuilder::default()
    }

    /// Handles a request.
    ///
    /// A path no page matches yields a 404 response. Errors raised by the
    /// pipeline and not handled by a filter are returned as `Err`.
    pub async fn handle(&self, request: PageRequest) -> Result<PageResponse> {
        self.handle_with_cancellation(request, Cancellation::new()).await
    }

    /// Handles a request that can be canceled through `cancellation`.
    pub async fn handle_with_cancellation(
        &self,
        request: PageRequest,
        cancellation: Cancellation,
    ) -> Result<PageResponse> {
        let Some(matched) = self.routes.match_url(&request.path) else {
            tracing::debug!("No page matches {}", request.path);
            return Ok(PageResponse::not_found(format!("No page matches {}", request.path)));
        };

        let compiled = self.compiled(&matched.descriptor).await?;
        let filters = self.aggregator.filters_for(&compiled);

        let ctx = PageContext::builder(request, compiled)
            .route_values(matched.params)
            .services(Arc::clone(&self.services))
            .value_provider_factories(self.value_provider_factories.clone())
            .binder(Arc::clone(&self.binder))
            .cancellation(cancellation)
            .build();

        let mut invoker = PageActionInvoker::new(ctx, filters, Arc::clone(&self.factory));
        invoker.invoke().await?;
        Ok(invoker.page_context().take_response())
    }

    /// Compiles every discovered page, reporting each outcome.
    pub async fn compile_all(
        &self,
    ) -> Vec<(Arc<PageActionDescriptor>, Result<Arc<CompiledPageActionDescriptor>>)> {
        let mut outcomes = Vec::with_capacity(self.routes.len());
        for route in self.routes.routes() {
            let outcome = self.compiled(&route.descriptor).await;
            outcomes.push((Arc::clone(&route.descriptor), outcome));
        }
        outcomes
    }

    async fn compiled(
        &self,
        descriptor: &PageActionDescriptor,
    ) -> Result<Arc<CompiledPageActionDescriptor>> {
        let source = self.files.read_file(&descriptor.relative_path)?;
        self.cache.get_or_compile(descriptor, &source).await
    }

    /// The route table built at startup.
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// The options the engine was built with.
    pub fn options(&self) -> &PagesOptions {
        &self.options
    }

    /// The compiled page cache.
    pub fn cache(&self) -> &CompiledPageCache {
        &self.cache
    }
}

impl std::fmt::Debug for PagesEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PagesEngine")
            .field("options", &self.options)
            .field("routes", &self.routes)
            .field("cache", &self.cache)
            .finish()
    }
}

/// Builder for [`PagesEngine`].
#[derive(Default)]
pub struct PagesEngineBuilder {
    files: Option<Arc<dyn PageFileProvider>>,
    options: PagesOptions,
    registry: RegistryPageCompiler,
    compiler: Option<Arc<dyn PageCompiler>>,
    global_filters: Vec<Arc<dyn Filter>>,
    filter_providers: Vec<Arc<dyn FilterProvider>>,
    factory: Option<Arc<dyn PageFactory>>,
    services: ServiceProvider,
    value_provider_factories: Option<Vec<Arc<dyn ValueProviderFactory>>>,
    binder: Option<Arc<dyn ArgumentBinder>>,
}

impl PagesEngineBuilder {
    /// Sets where page sources are read from.
    pub fn file_provider(mut self, files: Arc<dyn PageFileProvider>) -> Self {
        self.files = Some(files);
        self
    }

    /// Sets the options.
    pub fn options(mut self, options: PagesOptions) -> Self {
        self.options = options;
        self
    }

    /// Registers a code-behind model, referenced from sources by `@model`.
    pub fn page<P: Page>(mut self, definition: PageDefinition<P>) -> Self {
        self.registry.register(definition);
        self
    }

    /// Replaces the page compiler. Models registered with
    /// [`page`](Self::page) are ignored.
    pub fn compiler(mut self, compiler: Arc<dyn PageCompiler>) -> Self {
        self.compiler = Some(compiler);
        self
    }

    /// Adds a filter that applies to every page.
    pub fn global_filter(mut self, filter: Arc<dyn Filter>) -> Self {
        self.global_filters.push(filter);
        self
    }

    /// Adds a filter provider.
    pub fn filter_provider(mut self, provider: Arc<dyn FilterProvider>) -> Self {
        self.filter_providers.push(provider);
        self
    }

    /// Replaces the page factory.
    pub fn page_factory(mut self, factory: Arc<dyn PageFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Registers a service available to page activators.
    pub fn service<T: Send + Sync + 'static>(mut self, service: T) -> Self {
        self.services.insert(service);
        self
    }

    /// Replaces the value provider factories used for binding.
    pub fn value_provider_factories(
        mut self,
        factories: Vec<Arc<dyn ValueProviderFactory>>,
    ) -> Self {
        self.value_provider_factories = Some(factories);
        self
    }

    /// Replaces the argument binder.
    pub fn binder(mut self, binder: Arc<dyn ArgumentBinder>) -> Self {
        self.binder = Some(binder);
        self
    }

    /// Discovers pages and builds the engine.
    ///
    /// Invalid options, filters without a capability and conflicting routes
    /// are reported here.
    pub fn build(self) -> Result<PagesEngine> {
        self.options.validate()?;

        let files = match self.files {
            Some(files) => files,
            None => default_file_provider()?,
        };

        let global_filters = self
            .global_filters
            .into_iter()
            .map(|filter| FilterDescriptor::new(filter, FilterScope::Global))
            .collect::<Result<Vec<_>>>()?;

        let options = self.options.clone();
        let provider =
            PageActionDescriptorProvider::new(Arc::clone(&files), options, global_filters);
        let descriptors = provider.discover()?;
        let routes = RouteTable::from_descriptors(descriptors.into_iter().map(Arc::new))?;

        let compiler = self
            .compiler
            .unwrap_or_else(|| Arc::new(self.registry));

        let mut providers: Vec<Arc<dyn FilterProvider>> = vec![Arc::new(DefaultFilterProvider)];
        providers.extend(self.filter_providers);

        tracing::debug!("Pages engine ready with {} route(s)", routes.len());

        Ok(PagesEngine {
            files,
            cache: CompiledPageCache::new(compiler, self.options.compilation_cache_capacity),
            options: self.options,
            routes,
            aggregator: FilterAggregator::new(providers),
            factory: self.factory.unwrap_or_else(|| Arc::new(DefaultPageFactory::default())),
            services: Arc::new(self.services),
            value_provider_factories: self
                .value_provider_factories
                .unwrap_or_else(default_value_provider_factories),
            binder: self.binder.unwrap_or_else(|| Arc::new(DefaultArgumentBinder)),
        })
    }
}

#[cfg(feature = "filesystem")]
fn default_file_provider() -> Result<Arc<dyn PageFileProvider>> {
    let root = std::env::current_dir()?;
    Ok(Arc::new(crate::discovery::FileSystemPageProvider::new(root)))
}

#[cfg(not(feature = "filesystem"))]
fn default_file_provider() -> Result<Arc<dyn PageFileProvider>> {
    Err(crate::error::PageError::Configuration(
        "No page file provider configured".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::MemoryPageProvider;
    use crate::page::HandlerMethod;
    use crate::{PageError, ParameterType};
    use std::collections::HashMap;

    struct Greeting(&'static str);

    #[derive(Default)]
    struct EditModel {
        greeting: &'static str,
    }

    impl Page for EditModel {}

    fn engine(files: Arc<MemoryPageProvider>) -> PagesEngine {
        let definition = PageDefinition::builder("EditModel", |services| {
            Ok(EditModel {
                greeting: services.require::<Greeting>()?.0,
            })
        })
        .handler(
            HandlerMethod::sync("OnGet", |page: &mut EditModel, ctx, args| {
                let id: i64 = args.get("id")?;
                ctx.set_view_data("message", format!("{} #{}", page.greeting, id));
                Ok(())
            })
            .parameter("id", ParameterType::Integer),
        )
        .build()
        .unwrap();

        PagesEngine::builder()
            .file_provider(files)
            .page(definition)
            .service(Greeting("Editing"))
            .build()
            .unwrap()
    }

    fn files() -> Arc<MemoryPageProvider> {
        let files = Arc::new(MemoryPageProvider::new());
        files.add_file("Pages/Customers/Index.page", "@page\n<ul></ul>");
        files.add_file(
            "Pages/Customers/[id].page",
            "@page\n@model EditModel\n<p>{{ message }}</p>",
        );
        files
    }

    #[tokio::test]
    async fn test_route_params_bind_handler_arguments() {
        let engine = engine(files());
        let response = engine.handle(PageRequest::new("/customers/42", "GET")).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "<p>Editing #42</p>");
    }

    #[tokio::test]
    async fn test_query_string_also_binds() {
        let engine = engine(files());
        let request = PageRequest::new("/Customers/7", "GET").with_query(HashMap::from([(
            "other".to_string(),
            "x".to_string(),
        )]));
        let response = engine.handle(request).await.unwrap();
        assert_eq!(response.body, "<p>Editing #7</p>");
    }

    #[tokio::test]
    async fn test_unknown_path_is_404() {
        let engine = engine(files());
        let response = engine.handle(PageRequest::new("/nowhere", "GET")).await.unwrap();
        assert_eq!(response.status, 404);
    }

    #[tokio::test]
    async fn test_source_change_recompiles() {
        let files = files();
        let engine = engine(Arc::clone(&files));

        let first = engine.handle(PageRequest::new("/Customers", "GET")).await.unwrap();
        assert_eq!(first.body, "<ul></ul>");

        files.add_file("Pages/Customers/Index.page", "@page\n<ol></ol>");
        let second = engine.handle(PageRequest::new("/Customers", "GET")).await.unwrap();
        assert_eq!(second.body, "<ol></ol>");
        assert_eq!(engine.cache().compilation_count(), 2);
    }

    #[tokio::test]
    async fn test_compile_all_reports_failures() {
        let files = files();
        files.add_file("Pages/Broken.page", "@page\n@model Missing\n");
        let engine = engine(files);

        let outcomes = engine.compile_all().await;
        assert_eq!(outcomes.len(), 3);
        let failed: Vec<&str> = outcomes
            .iter()
            .filter(|(_, outcome)| outcome.is_err())
            .map(|(descriptor, _)| descriptor.relative_path.as_str())
            .collect();
        assert_eq!(failed, vec!["Pages/Broken.page"]);
    }

    #[test]
    fn test_conflicting_pages_fail_build() {
        let files = Arc::new(MemoryPageProvider::new());
        files.add_file("Pages/About.page", "@page\n");
        files.add_file("Pages/About/Index.page", "@page\n");

        let result = PagesEngine::builder().file_provider(files).build();
        assert!(matches!(result, Err(PageError::Configuration(_))));
    }
}
