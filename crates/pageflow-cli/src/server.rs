// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! HTTP adapter.
//!
//! This is a thin adapter that converts HTTP requests to `PageRequest`,
//! calls `engine.handle_with_cancellation()`, and converts `PageResponse`
//! back to HTTP. If the client goes away before the page finished, the
//! request's cancellation fires so resource filters still see their executed
//! hooks.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{Html, IntoResponse, Response},
    Router,
};
use pageflow::{Cancellation, PageError, PageRequest, PageResponse, PagesEngine};
use tower_http::services::ServeDir;

const MAX_BODY_SIZE: usize = 1024 * 1024;

/// Shared application state.
pub struct AppState {
    /// The pages engine serving every non-static request.
    pub engine: PagesEngine,
}

/// Builds the router: static files under `/static`, everything else goes to
/// the pages engine.
pub fn create_app(engine: PagesEngine, static_dir: Option<&Path>) -> Router {
    let state = Arc::new(AppState { engine });

    let mut app = Router::new();
    if let Some(dir) = static_dir {
        app = app.nest_service("/static", ServeDir::new(dir));
    }
    app.fallback(fallback_handler).with_state(state)
}

/// Binds `addr` and serves `app` until the process is stopped.
pub async fn serve(addr: &str, app: Router) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Fires the cancellation when dropped, e.g. when the client disconnects.
struct CancelOnDrop(Cancellation);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

async fn fallback_handler(State(state): State<Arc<AppState>>, request: Request<Body>) -> Response {
    let request = match to_page_request(request).await {
        Ok(request) => request,
        Err(response) => return response,
    };

    let cancellation = Cancellation::new();
    let _guard = CancelOnDrop(cancellation.clone());

    // Detached; a dropped connection cancels it through the guard.
    let task = tokio::spawn({
        let state = Arc::clone(&state);
        async move { state.engine.handle_with_cancellation(request, cancellation).await }
    });

    match task.await {
        Ok(Ok(response)) => page_response_to_axum(response),
        Ok(Err(err)) => error_response(&err),
        Err(join_error) => {
            tracing::error!("Page task failed: {}", join_error);
            error_page(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
        }
    }
}

/// Converts an axum request to a `PageRequest`.
async fn to_page_request(request: Request<Body>) -> Result<PageRequest, Response> {
    let (parts, body) = request.into_parts();

    let body_bytes = if parts.method != Method::GET && parts.method != Method::HEAD {
        match axum::body::to_bytes(body, MAX_BODY_SIZE).await {
            Ok(bytes) if bytes.is_empty() => None,
            Ok(bytes) => Some(bytes.to_vec()),
            Err(_) => return Err((StatusCode::PAYLOAD_TOO_LARGE, "Body too large").into_response()),
        }
    } else {
        None
    };

    let query: HashMap<String, String> = parts
        .uri
        .query()
        .map(|q| form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default();

    let mut page_request = PageRequest::new(parts.uri.path(), parts.method.as_str())
        .with_query(query)
        .with_cookies(parse_cookies(&parts.headers))
        .with_headers(header_map(&parts.headers));
    if let Some(body) = body_bytes {
        page_request = page_request.with_body(body);
    }
    Ok(page_request)
}

fn header_map(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
        .collect()
}

/// Parses every `Cookie` header into name/value pairs.
fn parse_cookies(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            if name.is_empty() {
                None
            } else {
                Some((name.to_string(), value.trim_matches('"').to_string()))
            }
        })
        .collect()
}

/// Converts a `PageResponse` to an axum response.
fn page_response_to_axum(response: PageResponse) -> Response {
    let status_code = StatusCode::from_u16(response.status).unwrap_or(StatusCode::OK);
    let mut builder = Response::builder().status(status_code);

    for (key, value) in &response.headers {
        builder = builder.header(key.as_str(), value.as_str());
    }

    builder.body(Body::from(response.body)).unwrap_or_else(|_| {
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to build response").into_response()
    })
}

/// Maps an unhandled pipeline error to an error page.
fn error_response(err: &PageError) -> Response {
    match err {
        PageError::Canceled => {
            tracing::debug!("Request canceled");
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
        PageError::Compilation(failure) => {
            tracing::warn!("{}", failure);
            error_page(StatusCode::INTERNAL_SERVER_ERROR, &failure.to_string())
        }
        other => {
            tracing::error!("Unhandled error: {}", other);
            error_page(StatusCode::INTERNAL_SERVER_ERROR, &format!("Error: {}", other))
        }
    }
}

fn error_page(status: StatusCode, message: &str) -> Response {
    let page = Html(format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Error - Pageflow</title>
    <style>
        body {{ font-family: system-ui, sans-serif; padding: 2rem; }}
        pre {{ background: #f4f4f4; padding: 1rem; overflow-x: auto; border-radius: 4px; }}
    </style>
</head>
<body>
    <h1>Error</h1>
    <pre>{}</pre>
</body>
</html>"#,
        html_escape(message)
    ));
    (status, page).into_response()
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
