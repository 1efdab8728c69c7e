// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! URL routing for discovered pages.
//!
//! Each page's route template becomes a matchit pattern. Segments written in
//! brackets in the page path bind URL parameters:
//! - `[id]` → `{id}`, one segment
//! - `[...rest]` → `{*rest}`, the remainder of the path
//!
//! Matching ignores ASCII case; parameter values keep the case of the URL.

use std::collections::HashMap;
use std::sync::Arc;

use crate::descriptor::PageActionDescriptor;
use crate::error::{PageError, Result};

/// Segment type in a route template.
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentType {
    /// Static segment (e.g., "customers")
    Static(String),

    /// Dynamic parameter (e.g., "[id]" -> "{id}")
    Dynamic(String),

    /// Catch-all parameter (e.g., "[...rest]" -> "{*rest}")
    CatchAll(String),
}

impl SegmentType {
    /// Parses a route template segment.
    pub fn parse(segment: &str) -> Self {
        if segment.starts_with("[...") && segment.ends_with(']') {
            SegmentType::CatchAll(segment[4..segment.len() - 1].to_string())
        } else if segment.starts_with('[') && segment.ends_with(']') {
            SegmentType::Dynamic(segment[1..segment.len() - 1].to_string())
        } else {
            SegmentType::Static(segment.to_ascii_lowercase())
        }
    }

    /// Converts to a matchit pattern segment.
    pub fn to_pattern(&self) -> String {
        match self {
            SegmentType::Static(s) => s.clone(),
            SegmentType::Dynamic(name) => format!("{{{}}}", name),
            SegmentType::CatchAll(name) => format!("{{*{}}}", name),
        }
    }

    /// Returns true for parameter segments.
    pub fn is_dynamic(&self) -> bool {
        !matches!(self, SegmentType::Static(_))
    }
}

/// Converts a route template (`Customers/[id]`) to a matchit pattern
/// (`/customers/{id}`).
pub fn template_to_pattern(route_template: &str) -> String {
    let segments: Vec<String> = route_template
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| SegmentType::parse(s).to_pattern())
        .collect();

    format!("/{}", segments.join("/"))
}

/// A routable page.
#[derive(Debug, Clone)]
pub struct Route {
    /// The matchit pattern, e.g. `/customers/{id}`.
    pub pattern: String,
    /// The page behind the route.
    pub descriptor: Arc<PageActionDescriptor>,
}

/// Result of matching a URL.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    /// The matched page.
    pub descriptor: Arc<PageActionDescriptor>,
    /// URL parameters bound by the pattern.
    pub params: HashMap<String, String>,
}

/// Maps URL paths to page descriptors.
pub struct RouteTable {
    matcher: matchit::Router<usize>,
    routes: Vec<Route>,
}

impl RouteTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self {
            matcher: matchit::Router::new(),
            routes: Vec::new(),
        }
    }

    /// Builds a table from discovered descriptors.
    ///
    /// Two pages whose templates resolve to the same pattern are a
    /// configuration error.
    pub fn from_descriptors<I>(descriptors: I) -> Result<Self>
    where
        I: IntoIterator<Item = Arc<PageActionDescriptor>>,
    {
        let mut routes: Vec<Route> = descriptors
            .into_iter()
            .map(|descriptor| Route {
                pattern: template_to_pattern(&descriptor.route_template),
                descriptor,
            })
            .collect();

        // Static before dynamic
        routes.sort_by(|a, b| {
            let a_is_dynamic = a.pattern.contains('{');
            let b_is_dynamic = b.pattern.contains('{');
            match (a_is_dynamic, b_is_dynamic) {
                (false, true) => std::cmp::Ordering::Less,
                (true, false) => std::cmp::Ordering::Greater,
                _ => a.pattern.cmp(&b.pattern),
            }
        });

        let mut table = Self::new();
        for (index, route) in routes.iter().enumerate() {
            if let Err(e) = table.matcher.insert(route.pattern.clone(), index) {
                return Err(PageError::Configuration(format!(
                    "Could not register route {} for {}: {}",
                    route.pattern, route.descriptor.relative_path, e
                )));
            }
            tracing::trace!(
                "Registered route {} -> {}",
                route.pattern,
                route.descriptor.display_name
            );
        }

        table.routes = routes;
        Ok(table)
    }

    /// Matches a URL path to a page.
    pub fn match_url(&self, path: &str) -> Option<RouteMatch> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let normalized_path = if path.is_empty() || path == "/" {
            "/"
        } else {
            path.trim_end_matches('/')
        };
        let lowered = normalized_path.to_ascii_lowercase();

        let matched = self.matcher.at(&lowered).ok()?;
        let route = &self.routes[*matched.value];
        let params = matched
            .params
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    original_case(normalized_path, &lowered, value).to_string(),
                )
            })
            .collect();

        Some(RouteMatch {
            descriptor: Arc::clone(&route.descriptor),
            params,
        })
    }

    /// All routes, static routes first.
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Number of routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns true if no page is routable.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.routes.iter().map(|route| &route.pattern))
            .finish()
    }
}

/// Maps a slice of `lowered` back onto `original`.
///
/// ASCII lowercasing keeps byte offsets, so the same range is valid in both.
fn original_case<'a>(original: &'a str, lowered: &str, slice: &'a str) -> &'a str {
    let start = (slice.as_ptr() as usize).wrapping_sub(lowered.as_ptr() as usize);
    start
        .checked_add(slice.len())
        .and_then(|end| original.get(start..end))
        .unwrap_or(slice)
}
