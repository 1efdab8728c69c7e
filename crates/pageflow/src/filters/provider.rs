// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Filter aggregation.
//!
//! A [`FilterAggregator`] turns a page's [`FilterDescriptor`]s into the
//! [`FilterSet`] the invoker runs. Descriptors are sorted by `(order, scope)`
//! and wrapped into [`FilterItem`]s. Every registered [`FilterProvider`] then
//! gets an executing pass (ascending provider order) followed by an executed
//! pass (descending), so a provider can see and adjust what lower-priority
//! providers contributed. Items left with a filter instance form the set, with
//! duplicate instances removed.

use std::fmt;
use std::sync::Arc;

use super::{Filter, FilterSet};
use crate::descriptor::{CompiledPageActionDescriptor, FilterDescriptor};

/// One candidate filter during aggregation.
#[derive(Clone)]
pub struct FilterItem {
    /// The descriptor the item was created from.
    pub descriptor: FilterDescriptor,
    /// The instance to run; `None` drops the item.
    pub filter: Option<Arc<dyn Filter>>,
}

impl FilterItem {
    /// Creates an item with no instance assigned yet.
    pub fn new(descriptor: FilterDescriptor) -> Self {
        Self {
            descriptor,
            filter: None,
        }
    }
}

impl fmt::Debug for FilterItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterItem")
            .field("descriptor", &self.descriptor)
            .field("filter", &self.filter.as_ref().map(|filter| filter.name()))
            .finish()
    }
}

/// State shared by providers during aggregation.
#[derive(Debug)]
pub struct FilterProviderContext {
    /// The page the filters are collected for.
    pub action: Arc<CompiledPageActionDescriptor>,
    /// Candidate filters in execution order.
    pub results: Vec<FilterItem>,
}

/// Contributes filter instances for a page.
pub trait FilterProvider: Send + Sync {
    /// Providers run in ascending order on the executing pass.
    fn order(&self) -> i32;

    /// First pass, ascending order.
    fn on_providers_executing(&self, context: &mut FilterProviderContext);

    /// Second pass, descending order.
    fn on_providers_executed(&self, context: &mut FilterProviderContext);
}

/// Uses each descriptor's filter as the instance.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFilterProvider;

impl FilterProvider for DefaultFilterProvider {
    fn order(&self) -> i32 {
        -1000
    }

    fn on_providers_executing(&self, context: &mut FilterProviderContext) {
        for item in context.results.iter_mut().filter(|item| item.filter.is_none()) {
            item.filter = Some(Arc::clone(&item.descriptor.filter));
        }
    }

    fn on_providers_executed(&self, _context: &mut FilterProviderContext) {}
}

/// Runs the registered providers for a page.
#[derive(Clone)]
pub struct FilterAggregator {
    providers: Vec<Arc<dyn FilterProvider>>,
}

impl FilterAggregator {
    /// Creates an aggregator; providers are kept sorted by order, ties in
    /// registration order.
    pub fn new(mut providers: Vec<Arc<dyn FilterProvider>>) -> Self {
        providers.sort_by_key(|provider| provider.order());
        Self { providers }
    }

    /// Number of registered providers.
    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Builds the filter set for `action`.
    pub fn filters_for(&self, action: &Arc<CompiledPageActionDescriptor>) -> FilterSet {
        let mut descriptors = action.filter_descriptors.clone();
        descriptors.sort_by_key(|d| (d.order, d.scope));

        let mut context = FilterProviderContext {
            action: Arc::clone(action),
            results: descriptors.into_iter().map(FilterItem::new).collect(),
        };

        for provider in &self.providers {
            provider.on_providers_executing(&mut context);
        }
        for provider in self.providers.iter().rev() {
            provider.on_providers_executed(&mut context);
        }

        let mut filters: Vec<Arc<dyn Filter>> = Vec::with_capacity(context.results.len());
        for filter in context.results.into_iter().filter_map(|item| item.filter) {
            if !filters.iter().any(|existing| same_instance(existing, &filter)) {
                filters.push(filter);
            }
        }

        tracing::trace!(
            "Aggregated {} filter(s) for {}",
            filters.len(),
            action.display_name
        );

        FilterSet::new(filters)
    }
}

fn same_instance(a: &Arc<dyn Filter>, b: &Arc<dyn Filter>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

impl Default for FilterAggregator {
    fn default() -> Self {
        Self::new(vec![Arc::new(DefaultFilterProvider)])
    }
}
