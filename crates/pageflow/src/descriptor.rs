// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Static metadata describing routable pages.
//!
//! A [`PageActionDescriptor`] is created once per page file at discovery time
//! and shared read-only by every request for that page. Once the page source
//! compiles, the descriptor is wrapped in a [`CompiledPageActionDescriptor`]
//! that also carries the resolved [`PageType`].

use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use crate::error::{PageError, Result};
use crate::filters::Filter;
use crate::page::PageType;

/// Where a filter was registered. Lower scopes run first when orders tie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FilterScope {
    /// Registered before everything else.
    First = 0,
    /// Registered for every page.
    Global = 10,
    /// Registered on a page type.
    Page = 20,
    /// Registered after everything else.
    Last = 100,
}

/// A filter together with its ordering metadata.
#[derive(Clone)]
pub struct FilterDescriptor {
    /// The filter instance.
    pub filter: Arc<dyn Filter>,
    /// Explicit order, taken from [`Filter::order`].
    pub order: i32,
    /// Registration scope.
    pub scope: FilterScope,
}

impl FilterDescriptor {
    /// Creates a descriptor, rejecting filters that implement no stage.
    pub fn new(filter: Arc<dyn Filter>, scope: FilterScope) -> Result<Self> {
        if !filter.has_capability() {
            return Err(PageError::Configuration(format!(
                "Filter '{}' implements neither an authorization nor a resource stage",
                filter.name()
            )));
        }

        Ok(Self {
            order: filter.order(),
            filter,
            scope,
        })
    }
}

impl fmt::Debug for FilterDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterDescriptor")
            .field("filter", &self.filter.name())
            .field("order", &self.order)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Declared type of a bindable handler parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterType {
    /// Free text.
    String,
    /// Signed integer.
    Integer,
    /// Floating point number.
    Float,
    /// `true`/`false` (also `on`, `1`, `0`).
    Boolean,
    /// A structured value assembled from `name.member` keys.
    Object,
}

/// Name and type of one bound parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterDescriptor {
    /// Name used as the binding prefix.
    pub name: String,
    /// Declared type used for coercion.
    pub parameter_type: ParameterType,
}

impl ParameterDescriptor {
    /// Creates a parameter descriptor.
    pub fn new(name: impl Into<String>, parameter_type: ParameterType) -> Self {
        Self {
            name: name.into(),
            parameter_type,
        }
    }
}

/// Identifies one routable page.
#[derive(Debug, Clone)]
pub struct PageActionDescriptor {
    /// Route template without leading slash (`""` for the root).
    pub route_template: String,
    /// Path of the page source, e.g. `Pages/Customers/Edit.page`.
    pub relative_path: String,
    /// Path of the page inside the pages root, e.g. `/Customers/Edit.page`.
    pub view_engine_path: String,
    /// Human-readable name, e.g. `Page: /Customers/Edit.page`.
    pub display_name: String,
    /// Route values every request for this page carries (`page`).
    pub route_values: HashMap<String, String>,
    /// Filters declared for this page, in registration order.
    pub filter_descriptors: Vec<FilterDescriptor>,
    /// Parameters bound for the page, one entry per handler parameter.
    pub parameters: Vec<ParameterDescriptor>,
}

impl PageActionDescriptor {
    /// Builds the descriptor for a file below the pages root.
    ///
    /// `view_engine_path` is the path relative to the pages root with a
    /// leading slash (`/Customers/Index.page`).
    pub fn from_view_engine_path(
        pages_root: &str,
        view_engine_path: &str,
        filter_descriptors: Vec<FilterDescriptor>,
    ) -> Self {
        let view_engine_path = if view_engine_path.starts_with('/') {
            view_engine_path.to_string()
        } else {
            format!("/{}", view_engine_path)
        };

        let mut route_values = HashMap::new();
        route_values.insert("page".to_string(), strip_extension(&view_engine_path).to_string());

        Self {
            route_template: route_template(&view_engine_path),
            relative_path: format!("{}{}", pages_root.trim_end_matches('/'), view_engine_path),
            display_name: format!("Page: {}", view_engine_path),
            view_engine_path,
            route_values,
            filter_descriptors,
            parameters: Vec::new(),
        }
    }

    /// Returns the URL pattern for this page (`/Customers`, `/` for the root).
    pub fn url_pattern(&self) -> String {
        format!("/{}", self.route_template)
    }
}

/// A page descriptor enriched with its compiled [`PageType`].
///
/// Dereferences to the underlying [`PageActionDescriptor`].
#[derive(Clone)]
pub struct CompiledPageActionDescriptor {
    descriptor: PageActionDescriptor,
    /// The executable page type produced by compilation.
    pub page_type: Arc<PageType>,
}

impl CompiledPageActionDescriptor {
    /// Copies `descriptor` and attaches the compiled page type.
    ///
    /// Filters and handler parameters declared by the page type are appended
    /// to the copied descriptor.
    pub fn new(descriptor: &PageActionDescriptor, page_type: Arc<PageType>) -> Result<Self> {
        let mut descriptor = descriptor.clone();

        for filter in page_type.filters() {
            descriptor
                .filter_descriptors
                .push(FilterDescriptor::new(filter.clone(), FilterScope::Page)?);
        }
        descriptor.parameters.extend(page_type.parameters());

        Ok(Self {
            descriptor,
            page_type,
        })
    }

    /// Returns the descriptor this compiled descriptor was created from.
    pub fn descriptor(&self) -> &PageActionDescriptor {
        &self.descriptor
    }
}

impl Deref for CompiledPageActionDescriptor {
    type Target = PageActionDescriptor;

    fn deref(&self) -> &Self::Target {
        &self.descriptor
    }
}

impl fmt::Debug for CompiledPageActionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledPageActionDescriptor")
            .field("descriptor", &self.descriptor)
            .field("page_type", &self.page_type.name())
            .finish()
    }
}

/// Derives a route template from a page path.
///
/// The extension is stripped and a trailing `Index` segment (any case) maps
/// to the empty segment of its directory:
///
/// ```rust
/// use pageflow::descriptor::route_template;
///
/// assert_eq!(route_template("/Customers/Index.page"), "Customers");
/// assert_eq!(route_template("/Customers/Edit.page"), "Customers/Edit");
/// assert_eq!(route_template("/Index.page"), "");
/// ```
pub fn route_template(view_engine_path: &str) -> String {
    let path = strip_extension(view_engine_path.trim_start_matches('/'));

    let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments
        .last()
        .map(|leaf| leaf.eq_ignore_ascii_case("index"))
        .unwrap_or(false)
    {
        segments.pop();
    }

    segments.join("/")
}

/// Strips the extension from the last segment of `path`.
pub fn strip_extension(path: &str) -> &str {
    let leaf_start = path.rfind('/').map(|i| i + 1).unwrap_or(0);
    match path[leaf_start..].rfind('.') {
        Some(dot) if dot > 0 => &path[..leaf_start + dot],
        _ => path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_template_index_leaf() {
        assert_eq!(route_template("/Customers/Index.page"), "Customers");
        assert_eq!(route_template("/Customers/index.page"), "Customers");
        assert_eq!(route_template("/Index.page"), "");
    }

    #[test]
    fn test_route_template_regular_page() {
        assert_eq!(route_template("/Customers/Edit.page"), "Customers/Edit");
        assert_eq!(route_template("/About.page"), "About");
    }

    #[test]
    fn test_index_only_special_as_leaf() {
        assert_eq!(route_template("/Index/Details.page"), "Index/Details");
        assert_eq!(route_template("/Indexer.page"), "Indexer");
    }

    #[test]
    fn test_strip_extension_ignores_dotted_directories() {
        assert_eq!(strip_extension("/v1.2/Page"), "/v1.2/Page");
        assert_eq!(strip_extension("/v1.2/Page.page"), "/v1.2/Page");
    }

    #[test]
    fn test_descriptor_from_view_engine_path() {
        let d =
            PageActionDescriptor::from_view_engine_path("Pages", "/Customers/Edit.page", vec![]);
        assert_eq!(d.route_template, "Customers/Edit");
        assert_eq!(d.relative_path, "Pages/Customers/Edit.page");
        assert_eq!(d.display_name, "Page: /Customers/Edit.page");
        assert_eq!(d.route_values.get("page").map(String::as_str), Some("/Customers/Edit"));
        assert_eq!(d.url_pattern(), "/Customers/Edit");
    }

    #[test]
    fn test_root_url_pattern() {
        let d = PageActionDescriptor::from_view_engine_path("Pages", "Index.page", vec![]);
        assert_eq!(d.view_engine_path, "/Index.page");
        assert_eq!(d.url_pattern(), "/");
    }
}
