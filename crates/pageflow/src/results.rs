// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Action results.
//!
//! An [`ActionResult`] is the outcome of a page run or of a short-circuiting
//! filter. Executing it writes the observable response into the request's
//! [`PageContext`].

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::context::PageContext;
use crate::error::Result;

/// Produces the response for a request.
#[async_trait]
pub trait ActionResult: Send + Sync {
    /// Writes the response.
    async fn execute_result(&self, ctx: &PageContext) -> Result<()>;

    /// Name used in diagnostics.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Executes `result`, emitting before/after events around it.
pub async fn execute(ctx: &PageContext, result: &dyn ActionResult) -> Result<()> {
    tracing::debug!("Before result {} for {}", result.name(), ctx.action_descriptor().display_name);
    let outcome = result.execute_result(ctx).await;
    tracing::debug!(
        "After result {} for {} (ok: {})",
        result.name(),
        ctx.action_descriptor().display_name,
        outcome.is_ok()
    );
    outcome
}

/// Writes literal content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentResult {
    /// Body text.
    pub content: String,
    /// Content type header value.
    pub content_type: String,
    /// Status code.
    pub status: u16,
}

impl ContentResult {
    /// Plain text with status 200.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            content_type: "text/plain; charset=utf-8".to_string(),
            status: 200,
        }
    }

    /// HTML with status 200.
    pub fn html(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            content_type: "text/html; charset=utf-8".to_string(),
            status: 200,
        }
    }

    /// Overrides the status code.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }
}

#[async_trait]
impl ActionResult for ContentResult {
    async fn execute_result(&self, ctx: &PageContext) -> Result<()> {
        ctx.with_response(|response| {
            response.status = self.status;
            response.set_header("Content-Type", self.content_type.clone());
            response.write(&self.content);
        });
        Ok(())
    }
}

/// Redirects the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectResult {
    /// Target URL.
    pub url: String,
    /// Use 301 instead of 302.
    pub permanent: bool,
}

impl RedirectResult {
    /// Temporary (302) redirect.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            permanent: false,
        }
    }

    /// Permanent (301) redirect.
    pub fn permanent(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            permanent: true,
        }
    }
}

#[async_trait]
impl ActionResult for RedirectResult {
    async fn execute_result(&self, ctx: &PageContext) -> Result<()> {
        ctx.with_response(|response| {
            response.status = if self.permanent { 301 } else { 302 };
            response.set_header("Location", self.url.clone());
        });
        Ok(())
    }
}

/// Sets a status code with an empty body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusCodeResult {
    /// Status code.
    pub status: u16,
}

impl StatusCodeResult {
    /// Creates the result.
    pub fn new(status: u16) -> Self {
        Self { status }
    }
}

#[async_trait]
impl ActionResult for StatusCodeResult {
    async fn execute_result(&self, ctx: &PageContext) -> Result<()> {
        ctx.with_response(|response| response.status = self.status);
        Ok(())
    }
}

/// Serializes a JSON value.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonResult {
    /// The value to write.
    pub value: JsonValue,
    /// Status code.
    pub status: u16,
}

impl JsonResult {
    /// JSON with status 200.
    pub fn new(value: JsonValue) -> Self {
        Self { value, status: 200 }
    }

    /// Serializes `value`.
    pub fn from_serialize<T: serde::Serialize>(value: &T) -> Result<Self> {
        let value = serde_json::to_value(value).map_err(crate::PageError::handler)?;
        Ok(Self::new(value))
    }

    /// Overrides the status code.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }
}

#[async_trait]
impl ActionResult for JsonResult {
    async fn execute_result(&self, ctx: &PageContext) -> Result<()> {
        ctx.with_response(|response| {
            response.status = self.status;
            response.set_header("Content-Type", "application/json");
            response.write(&self.value.to_string());
        });
        Ok(())
    }
}

/// Writes the rendered page.
///
/// Produced by a page's default rendering when no handler runs or the handler
/// returns no result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageViewResult {
    /// Rendered page output.
    pub content: String,
}

impl PageViewResult {
    /// Wraps rendered output.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

#[async_trait]
impl ActionResult for PageViewResult {
    async fn execute_result(&self, ctx: &PageContext) -> Result<()> {
        ctx.with_response(|response| {
            if response.header("Content-Type").is_none() {
                response.set_header("Content-Type", "text/html; charset=utf-8");
            }
            response.write(&self.content);
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{CompiledPageActionDescriptor, PageActionDescriptor};
    use crate::page::PageType;
    use crate::request::PageRequest;
    use std::sync::Arc;

    fn context() -> PageContext {
        let descriptor =
            PageActionDescriptor::from_view_engine_path("Pages", "/Index.page", vec![]);
        let page_type = Arc::new(PageType::template_only("Index", ""));
        let compiled = CompiledPageActionDescriptor::new(&descriptor, page_type).unwrap();
        PageContext::builder(PageRequest::new("/", "GET"), Arc::new(compiled)).build()
    }

    #[tokio::test]
    async fn test_content_result() {
        let ctx = context();
        execute(&ctx, &ContentResult::text("hello").with_status(201)).await.unwrap();

        let response = ctx.response();
        assert_eq!(response.status, 201);
        assert_eq!(response.body, "hello");
        assert_eq!(response.header("content-type"), Some("text/plain; charset=utf-8"));
    }

    #[tokio::test]
    async fn test_redirect_result() {
        let ctx = context();
        execute(&ctx, &RedirectResult::permanent("/new")).await.unwrap();

        let response = ctx.response();
        assert_eq!(response.status, 301);
        assert_eq!(response.header("Location"), Some("/new"));
    }

    #[tokio::test]
    async fn test_json_result() {
        #[derive(serde::Serialize)]
        struct Customer {
            id: u32,
        }

        let ctx = context();
        let result = JsonResult::from_serialize(&Customer { id: 4 }).unwrap();
        execute(&ctx, &result).await.unwrap();
        assert_eq!(ctx.response().body, r#"{"id":4}"#);
    }

    #[tokio::test]
    async fn test_page_view_keeps_explicit_content_type() {
        let ctx = context();
        ctx.with_response(|r| r.set_header("Content-Type", "text/plain"));
        execute(&ctx, &PageViewResult::new("<p>x</p>")).await.unwrap();

        let response = ctx.response();
        assert_eq!(response.header("content-type"), Some("text/plain"));
        assert_eq!(response.body, "<p>x</p>");
    }
}
