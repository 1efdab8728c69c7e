// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

use std::fmt;

use super::FilterSet;
use crate::context::PageContext;
use crate::error::PageError;
use crate::results::ActionResult;

/// Context handed to authorization filters.
pub struct AuthorizationFilterContext {
    page: PageContext,
    filters: FilterSet,
    result: Option<Box<dyn ActionResult>>,
}

impl AuthorizationFilterContext {
    /// Creates a context with no result.
    pub fn new(page: PageContext, filters: FilterSet) -> Self {
        Self {
            page,
            filters,
            result: None,
        }
    }

    /// The request being authorized.
    pub fn page(&self) -> &PageContext {
        &self.page
    }

    /// All filters of the request.
    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    /// Sets the result, short-circuiting the request.
    pub fn set_result(&mut self, result: impl ActionResult + 'static) {
        self.result = Some(Box::new(result));
    }

    /// The short-circuit result, if set.
    pub fn result(&self) -> Option<&dyn ActionResult> {
        self.result.as_deref()
    }

    /// Removes the short-circuit result.
    pub fn take_result(&mut self) -> Option<Box<dyn ActionResult>> {
        self.result.take()
    }
}

impl fmt::Debug for AuthorizationFilterContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationFilterContext")
            .field("page", &self.page)
            .field("has_result", &self.result.is_some())
            .finish()
    }
}

/// Context handed to resource filters before the rest of the pipeline runs.
///
/// Every nesting level of resource filters gets its own executing context.
pub struct ResourceExecutingContext {
    page: PageContext,
    filters: FilterSet,
    result: Option<Box<dyn ActionResult>>,
}

impl ResourceExecutingContext {
    /// Creates a context with no result.
    pub fn new(page: PageContext, filters: FilterSet) -> Self {
        Self {
            page,
            filters,
            result: None,
        }
    }

    /// The request being executed.
    pub fn page(&self) -> &PageContext {
        &self.page
    }

    /// All filters of the request.
    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    /// Sets the result, short-circuiting nested filters and the page.
    pub fn set_result(&mut self, result: impl ActionResult + 'static) {
        self.result = Some(Box::new(result));
    }

    /// The short-circuit result, if set.
    pub fn result(&self) -> Option<&dyn ActionResult> {
        self.result.as_deref()
    }

    /// Returns true if a short-circuit result is set.
    pub fn has_result(&self) -> bool {
        self.result.is_some()
    }

    /// Removes the short-circuit result.
    pub fn take_result(&mut self) -> Option<Box<dyn ActionResult>> {
        self.result.take()
    }
}

impl fmt::Debug for ResourceExecutingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceExecutingContext")
            .field("page", &self.page)
            .field("has_result", &self.result.is_some())
            .finish()
    }
}

/// Context handed to resource filters after the rest of the pipeline ran.
pub struct ResourceExecutedContext {
    page: PageContext,
    filters: FilterSet,
    /// True if a filter short-circuited the pipeline.
    pub canceled: bool,
    /// The short-circuit result, if the pipeline was short-circuited.
    pub result: Option<Box<dyn ActionResult>>,
    /// Error raised by nested filters or the page.
    pub exception: Option<PageError>,
    /// Set by a filter to stop `exception` from reaching the caller.
    pub exception_handled: bool,
}

impl ResourceExecutedContext {
    /// Context for a pipeline that ran to completion.
    pub fn new(page: PageContext, filters: FilterSet) -> Self {
        Self {
            page,
            filters,
            canceled: false,
            result: None,
            exception: None,
            exception_handled: false,
        }
    }

    /// Context for a pipeline short-circuited with `result`.
    pub fn short_circuited(
        page: PageContext,
        filters: FilterSet,
        result: Option<Box<dyn ActionResult>>,
    ) -> Self {
        Self {
            canceled: true,
            result,
            ..Self::new(page, filters)
        }
    }

    /// Context for a pipeline that failed with `exception`.
    pub fn failed(page: PageContext, filters: FilterSet, exception: PageError) -> Self {
        Self {
            exception: Some(exception),
            ..Self::new(page, filters)
        }
    }

    /// The request that was executed.
    pub fn page(&self) -> &PageContext {
        &self.page
    }

    /// All filters of the request.
    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    /// Returns the error to surface to the caller, if any.
    pub fn unhandled_exception(&self) -> Option<&PageError> {
        if self.exception_handled {
            None
        } else {
            self.exception.as_ref()
        }
    }
}

impl fmt::Debug for ResourceExecutedContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceExecutedContext")
            .field("page", &self.page)
            .field("canceled", &self.canceled)
            .field("has_result", &self.result.is_some())
            .field("exception", &self.exception)
            .field("exception_handled", &self.exception_handled)
            .finish()
    }
}
