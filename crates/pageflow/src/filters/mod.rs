// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Filter capabilities and the per-request filter set.
//!
//! A filter is any type implementing [`Filter`]. It opts into pipeline stages
//! by returning itself from the matching capability accessor:
//!
//! | Stage | Synchronous | Asynchronous |
//! |---|---|---|
//! | Authorization | [`AuthorizationFilter`] | [`AsyncAuthorizationFilter`] |
//! | Resource | [`ResourceFilter`] | [`AsyncResourceFilter`] |
//!
//! When a filter exposes both variants of a stage only the asynchronous one
//! runs.
//!
//! # Example
//!
//! ```rust
//! use pageflow::filters::{AuthorizationFilter, AuthorizationFilterContext, Filter};
//! use pageflow::results::StatusCodeResult;
//!
//! struct RequireUser;
//!
//! impl Filter for RequireUser {
//!     fn as_authorization(&self) -> Option<&dyn AuthorizationFilter> {
//!         Some(self)
//!     }
//! }
//!
//! impl AuthorizationFilter for RequireUser {
//!     fn on_authorization(&self, ctx: &mut AuthorizationFilterContext) -> pageflow::Result<()> {
//!         if ctx.page().request().header("x-user").is_none() {
//!             ctx.set_result(StatusCodeResult::new(401));
//!         }
//!         Ok(())
//!     }
//! }
//! ```

mod context;
mod cursor;
pub mod provider;

use std::fmt;
use std::ops::Index;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::invoker::ResourceNext;

pub use context::{AuthorizationFilterContext, ResourceExecutedContext, ResourceExecutingContext};
pub use cursor::{CursorItem, FilterCursor};
pub use provider::{
    DefaultFilterProvider, FilterAggregator, FilterItem, FilterProvider, FilterProviderContext,
};

/// Base trait for everything that can sit in a filter pipeline.
pub trait Filter: Send + Sync + 'static {
    /// Name used in diagnostics and error messages.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Explicit order; lower values run first.
    fn order(&self) -> i32 {
        0
    }

    /// Synchronous authorization capability.
    fn as_authorization(&self) -> Option<&dyn AuthorizationFilter> {
        None
    }

    /// Asynchronous authorization capability.
    fn as_async_authorization(&self) -> Option<&dyn AsyncAuthorizationFilter> {
        None
    }

    /// Synchronous resource capability.
    fn as_resource(&self) -> Option<&dyn ResourceFilter> {
        None
    }

    /// Asynchronous resource capability.
    fn as_async_resource(&self) -> Option<&dyn AsyncResourceFilter> {
        None
    }

    /// Returns true if the filter participates in at least one stage.
    fn has_capability(&self) -> bool {
        self.as_authorization().is_some()
            || self.as_async_authorization().is_some()
            || self.as_resource().is_some()
            || self.as_async_resource().is_some()
    }
}

/// Runs before everything else; setting a result short-circuits the request.
pub trait AuthorizationFilter: Send + Sync {
    /// Called once per request.
    fn on_authorization(&self, ctx: &mut AuthorizationFilterContext) -> Result<()>;
}

/// Asynchronous variant of [`AuthorizationFilter`].
#[async_trait]
pub trait AsyncAuthorizationFilter: Send + Sync {
    /// Called once per request.
    async fn on_authorization(&self, ctx: &mut AuthorizationFilterContext) -> Result<()>;
}

/// Wraps page execution with a pair of hooks.
pub trait ResourceFilter: Send + Sync {
    /// Runs before the rest of the pipeline. Setting a result skips nested
    /// filters and the page.
    fn on_resource_executing(&self, ctx: &mut ResourceExecutingContext) -> Result<()>;

    /// Runs after the rest of the pipeline, including after a short-circuit
    /// by this filter (then `canceled` is true).
    fn on_resource_executed(&self, ctx: &mut ResourceExecutedContext) -> Result<()>;
}

/// Asynchronous resource filter.
///
/// The filter must either set a result on `ctx` and return, or leave the
/// result empty and call [`ResourceNext::run`]. Doing both is reported as
/// [`PageError::InvalidShortCircuit`](crate::PageError::InvalidShortCircuit);
/// doing neither as
/// [`PageError::MissingContinuation`](crate::PageError::MissingContinuation).
#[async_trait]
pub trait AsyncResourceFilter: Send + Sync {
    /// Wraps the rest of the pipeline.
    async fn on_resource_execution(
        &self,
        ctx: &mut ResourceExecutingContext,
        next: ResourceNext<'_>,
    ) -> Result<()>;
}

/// The ordered, immutable filters selected for one request.
#[derive(Clone)]
pub struct FilterSet {
    filters: Arc<[Arc<dyn Filter>]>,
}

impl FilterSet {
    /// Creates a set from filters in execution order.
    pub fn new(filters: Vec<Arc<dyn Filter>>) -> Self {
        Self {
            filters: filters.into(),
        }
    }

    /// Number of filters.
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Returns true if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Returns the filter at `index`.
    pub fn get(&self, index: usize) -> Option<&Arc<dyn Filter>> {
        self.filters.get(index)
    }

    /// Iterates over filters in execution order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Filter>> {
        self.filters.iter()
    }
}

impl Default for FilterSet {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl Index<usize> for FilterSet {
    type Output = Arc<dyn Filter>;

    fn index(&self, index: usize) -> &Self::Output {
        &self.filters[index]
    }
}

impl fmt::Debug for FilterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.filters.iter().map(|filter| filter.name()))
            .finish()
    }
}
