// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Page activation.
//!
//! The invoker never constructs pages itself. It asks a [`PageFactory`] for an
//! instance and hands it back when the request is done, even if execution
//! failed. The default factory delegates to a [`PageActivator`], which runs
//! the page type's activator with the request's services so pages can resolve
//! injected dependencies through [`ServiceProvider::require`](crate::ServiceProvider::require).

use std::sync::Arc;

use crate::context::PageContext;
use crate::error::Result;
use crate::page::PageInstance;

/// Creates and releases page instances.
pub trait PageActivator: Send + Sync {
    /// Creates an instance of the page type of `ctx`.
    fn create(&self, ctx: &PageContext) -> Result<Box<dyn PageInstance>>;

    /// Releases an instance created by [`create`](Self::create).
    fn release(&self, ctx: &PageContext, page: Box<dyn PageInstance>);
}

/// Activator that builds pages from their compiled page type.
///
/// Releasing drops the instance, which runs any `Drop` cleanup the page has.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPageActivator;

impl PageActivator for DefaultPageActivator {
    fn create(&self, ctx: &PageContext) -> Result<Box<dyn PageInstance>> {
        ctx.action_descriptor().page_type.create_instance(ctx.services())
    }

    fn release(&self, _ctx: &PageContext, page: Box<dyn PageInstance>) {
        drop(page);
    }
}

/// Produces page instances for the invoker.
pub trait PageFactory: Send + Sync {
    /// Creates the page for a request.
    fn create_page(&self, ctx: &PageContext) -> Result<Box<dyn PageInstance>>;

    /// Releases the page once the request is done.
    fn release_page(&self, ctx: &PageContext, page: Box<dyn PageInstance>);
}

/// Factory backed by a [`PageActivator`].
#[derive(Clone)]
pub struct DefaultPageFactory {
    activator: Arc<dyn PageActivator>,
}

impl DefaultPageFactory {
    /// Creates a factory over `activator`.
    pub fn new(activator: Arc<dyn PageActivator>) -> Self {
        Self { activator }
    }
}

impl Default for DefaultPageFactory {
    fn default() -> Self {
        Self::new(Arc::new(DefaultPageActivator))
    }
}

impl PageFactory for DefaultPageFactory {
    fn create_page(&self, ctx: &PageContext) -> Result<Box<dyn PageInstance>> {
        tracing::trace!("Activating {}", ctx.action_descriptor().display_name);
        self.activator.create(ctx)
    }

    fn release_page(&self, ctx: &PageContext, page: Box<dyn PageInstance>) {
        tracing::trace!("Releasing {}", ctx.action_descriptor().display_name);
        self.activator.release(ctx, page);
    }
}
