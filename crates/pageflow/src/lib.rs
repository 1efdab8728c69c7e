// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

// Warn on missing documentation for public items
#![warn(missing_docs)]

//! # pageflow
//!
//! Page-centric request handling for Rust.
//!
//! Every page is a source file below a `Pages` directory, optionally backed
//! by a code-behind model with one handler per HTTP verb. A request runs
//! through a filter pipeline before the page executes:
//!
//! 1. authorization filters, any of which can short-circuit the request,
//! 2. resource filters, which wrap everything that follows,
//! 3. the page handler and default rendering.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use pageflow::{FileSystemPageProvider, PageRequest, PagesEngine};
//!
//! let engine = PagesEngine::builder()
//!     .file_provider(Arc::new(FileSystemPageProvider::new(".")))
//!     .build()?;
//!
//! let response = engine.handle(PageRequest::new("/Customers", "GET")).await?;
//! ```

/// Page activation and release.
pub mod activation;
/// Handler argument binding.
pub mod binding;
/// Request body parsing for form values.
mod body;
/// Page source compilation and the compiled page cache.
pub mod compilation;
/// Request-scoped page context.
pub mod context;
/// Page action descriptors.
pub mod descriptor;
/// Page discovery.
pub mod discovery;
/// Request handling entry point.
pub mod engine;
/// Error types and reporting.
pub mod error;
/// Filter capabilities, contexts and aggregation.
pub mod filters;
/// The filter pipeline state machine.
pub mod invoker;
/// Engine options.
pub mod options;
/// Pages, handlers and page types.
pub mod page;
/// HTTP request abstraction.
pub mod request;
/// HTTP response abstraction.
pub mod response;
/// Action results.
pub mod results;
/// URL routing.
pub mod routing;
/// Service registry for page activation.
pub mod services;

pub use activation::{DefaultPageActivator, DefaultPageFactory, PageActivator, PageFactory};
pub use binding::{
    ArgumentBinder, DefaultArgumentBinder, HandlerArguments, ValueProvider, ValueProviderFactory,
};
pub use compilation::{CompiledPageCache, PageCompiler, RegistryPageCompiler};
pub use context::{Cancellation, PageContext, ValidationState, ViewData};
pub use descriptor::{
    CompiledPageActionDescriptor, FilterDescriptor, FilterScope, PageActionDescriptor,
    ParameterDescriptor, ParameterType,
};
#[cfg(feature = "filesystem")]
pub use discovery::FileSystemPageProvider;
pub use discovery::{MemoryPageProvider, PageActionDescriptorProvider, PageFileProvider};
pub use engine::{PagesEngine, PagesEngineBuilder};
pub use error::{CompilationError, CompilationFailure, DiagnosticMessage, PageError, Result};
pub use filters::{
    AsyncAuthorizationFilter, AsyncResourceFilter, AuthorizationFilter, AuthorizationFilterContext,
    Filter, FilterSet, ResourceExecutedContext, ResourceExecutingContext, ResourceFilter,
};
pub use invoker::{PageActionInvoker, ResourceNext};
pub use options::PagesOptions;
pub use page::{HandlerMethod, Page, PageDefinition, PageType};
pub use request::{Method, PageRequest};
pub use response::PageResponse;
pub use results::{
    ActionResult, ContentResult, JsonResult, PageViewResult, RedirectResult, StatusCodeResult,
};
pub use routing::RouteTable;
pub use services::ServiceProvider;
