// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! HTTP request abstraction for the page pipeline.
//!
//! Adapters (the axum server in `pageflow-cli`, tests, embedders) convert
//! their native request type into a [`PageRequest`] before dispatching it.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::PageError;

/// HTTP verbs a page handler can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Method {
    /// `GET`
    Get,
    /// `HEAD`
    Head,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `PATCH`
    Patch,
    /// `DELETE`
    Delete,
    /// `OPTIONS`
    Options,
}

impl Method {
    /// Returns the canonical upper-case name of the verb.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
        }
    }

    /// Infers the verb from a handler name such as `OnGet` or `OnPostAsync`.
    pub fn from_handler_name(name: &str) -> Option<Self> {
        let rest = name.strip_prefix("On")?;
        // Longest names first so "OnPatch" is not taken for "OnP...".
        [
            ("Options", Method::Options),
            ("Delete", Method::Delete),
            ("Patch", Method::Patch),
            ("Head", Method::Head),
            ("Post", Method::Post),
            ("Get", Method::Get),
            ("Put", Method::Put),
        ]
        .into_iter()
        .find(|(prefix, _)| rest.starts_with(prefix))
        .map(|(_, method)| method)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = PageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "HEAD" => Ok(Method::Head),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            "OPTIONS" => Ok(Method::Options),
            other => Err(PageError::Configuration(format!(
                "Unsupported HTTP method: {}",
                other
            ))),
        }
    }
}

/// A platform-agnostic HTTP request.
///
/// # Example
///
/// ```rust
/// use std::collections::HashMap;
/// use pageflow::PageRequest;
///
/// let request = PageRequest::new("/Customers", "GET")
///     .with_query(HashMap::from([("page".to_string(), "1".to_string())]));
/// ```
#[derive(Debug, Clone)]
pub struct PageRequest {
    /// The request path (e.g., "/Customers/Edit")
    pub path: String,

    /// The HTTP method (e.g., "GET", "POST")
    pub method: String,

    /// HTTP headers
    pub headers: HashMap<String, String>,

    /// Request body (for POST/PUT/PATCH)
    pub body: Option<Vec<u8>>,

    /// Query parameters (parsed from URL)
    pub query: HashMap<String, String>,

    /// Cookies
    pub cookies: HashMap<String, String>,
}

impl PageRequest {
    /// Creates a new request with the given path and method.
    pub fn new(path: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: method.into(),
            headers: HashMap::new(),
            body: None,
            query: HashMap::new(),
            cookies: HashMap::new(),
        }
    }

    /// Adds headers to the request.
    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    /// Adds a single header to the request.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Adds a body to the request.
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    /// Adds query parameters to the request.
    pub fn with_query(mut self, query: HashMap<String, String>) -> Self {
        self.query = query;
        self
    }

    /// Adds cookies to the request.
    pub fn with_cookies(mut self, cookies: HashMap<String, String>) -> Self {
        self.cookies = cookies;
        self
    }

    /// Returns the parsed verb, or `None` for methods pages cannot handle.
    pub fn verb(&self) -> Option<Method> {
        self.method.parse().ok()
    }

    /// Looks up a header case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns the body as a string, if present and valid UTF-8.
    pub fn body_str(&self) -> Option<&str> {
        self.body.as_ref().and_then(|b| std::str::from_utf8(b).ok())
    }

    /// Returns the Content-Type header, if present.
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Checks if this is a form submission (form content type on a body-carrying verb).
    pub fn is_form_submission(&self) -> bool {
        !matches!(self.verb(), Some(Method::Get) | Some(Method::Head) | None)
            && self
                .content_type()
                .map(|ct| {
                    ct.starts_with("application/x-www-form-urlencoded")
                        || ct.starts_with("multipart/form-data")
                })
                .unwrap_or(false)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new("/", "GET")
    }
}
