// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! HTTP response abstraction for the page pipeline.
//!
//! Every request owns one [`PageResponse`]. Action results write into it while
//! the invoker runs, and the engine hands the finished value back to the
//! adapter, which converts it to its platform-specific response type.

use std::collections::HashMap;

/// A platform-agnostic HTTP response.
///
/// # Example
///
/// ```rust
/// use pageflow::PageResponse;
///
/// let html = PageResponse::html(200, "<h1>Hello</h1>");
/// assert!(html.is_success());
///
/// let redirect = PageResponse::redirect("/login");
/// assert_eq!(redirect.header("Location"), Some("/login"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageResponse {
    /// HTTP status code
    pub status: u16,

    /// HTTP headers
    pub headers: HashMap<String, String>,

    /// Response body
    pub body: String,
}

impl PageResponse {
    /// Creates an empty `200 OK` response.
    pub fn new() -> Self {
        Self {
            status: 200,
            headers: HashMap::new(),
            body: String::new(),
        }
    }

    /// Creates an HTML response.
    pub fn html(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
        .with_header("Content-Type", "text/html; charset=utf-8")
    }

    /// Creates a JSON response.
    pub fn json(status: u16, body: &serde_json::Value) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.to_string(),
        }
        .with_header("Content-Type", "application/json")
    }

    /// Creates a redirect response (HTTP 302 by default).
    pub fn redirect(location: impl Into<String>) -> Self {
        Self::redirect_with_status(302, location)
    }

    /// Creates a redirect response with a specific status code.
    pub fn redirect_with_status(status: u16, location: impl Into<String>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: String::new(),
        }
        .with_header("Location", location)
    }

    /// Creates a plain-text error response.
    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: message.into(),
        }
        .with_header("Content-Type", "text/plain; charset=utf-8")
    }

    /// Creates a 404 Not Found response.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::error(404, message)
    }

    /// Creates a 500 Internal Server Error response.
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::error(500, message)
    }

    /// Adds a header to the response.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_header(key, value);
        self
    }

    /// Sets a header, replacing any existing value with the same
    /// case-insensitive name.
    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        self.headers.retain(|k, _| !k.eq_ignore_ascii_case(&key));
        self.headers.insert(key, value.into());
    }

    /// Looks up a header case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Appends text to the body.
    pub fn write(&mut self, text: &str) {
        self.body.push_str(text);
    }

    /// Returns true if this is a success response (2xx).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns true if this is an error response (4xx or 5xx).
    pub fn is_error(&self) -> bool {
        self.status >= 400
    }

    /// Returns true if this is a redirect response (3xx).
    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }
}

impl Default for PageResponse {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_response() {
        let resp = PageResponse::html(200, "<h1>Hello</h1>");
        assert_eq!(resp.status, 200);
        assert!(resp.is_success());
        assert_eq!(resp.body, "<h1>Hello</h1>");
        assert_eq!(resp.header("content-type"), Some("text/html; charset=utf-8"));
    }

    #[test]
    fn test_json_response() {
        let resp = PageResponse::json(201, &serde_json::json!({"success": true}));
        assert_eq!(resp.status, 201);
        assert_eq!(resp.body, r#"{"success":true}"#);
    }

    #[test]
    fn test_redirect() {
        let resp = PageResponse::redirect("/login");
        assert_eq!(resp.status, 302);
        assert!(resp.is_redirect());
        assert_eq!(resp.header("Location"), Some("/login"));
    }

    #[test]
    fn test_error() {
        let resp = PageResponse::not_found("Page not found");
        assert_eq!(resp.status, 404);
        assert!(resp.is_error());
    }

    #[test]
    fn test_set_header_replaces_case_insensitively() {
        let mut resp = PageResponse::html(200, "x");
        resp.set_header("CONTENT-TYPE", "text/plain");
        assert_eq!(resp.headers.len(), 1);
        assert_eq!(resp.header("Content-Type"), Some("text/plain"));
    }
}
