// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Integration tests for the HTTP adapter.
//!
//! These tests drive real HTTP requests through the axum router into the
//! pages engine.

use std::fs;
use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use tempfile::tempdir;

use pageflow::results::RedirectResult;
use pageflow::{
    ActionResult, HandlerMethod, MemoryPageProvider, Page, PageDefinition, PagesEngine,
    ParameterType,
};
use pageflow_cli::config::FiltersConfig;
use pageflow_cli::filters::global_filters;
use pageflow_cli::server::create_app;

#[derive(Default)]
struct EditModel;

impl Page for EditModel {}

fn edit_definition() -> PageDefinition<EditModel> {
    PageDefinition::builder("EditModel", |_| Ok(EditModel))
        .handler(
            HandlerMethod::sync_result("OnPost", |_: &mut EditModel, _, args| {
                let name: String = args.get("name")?;
                let result: Box<dyn ActionResult> =
                    Box::new(RedirectResult::new(format!("/Customers?saved={}", name)));
                Ok(Some(result))
            })
            .parameter("name", ParameterType::String),
        )
        .build()
        .unwrap()
}

fn engine(filters: &FiltersConfig) -> PagesEngine {
    let files = Arc::new(MemoryPageProvider::new());
    files.add_file("Pages/Index.page", "@page\n<h1>Home</h1>");
    files.add_file("Pages/Customers/Index.page", "@page\n<ul></ul>");
    files.add_file(
        "Pages/Customers/Edit.page",
        "@page\n@model EditModel\n<form method=\"post\"></form>",
    );
    files.add_file("Pages/Broken.page", "@page\n@bogus\n");

    let mut builder = PagesEngine::builder().file_provider(files).page(edit_definition());
    for filter in global_filters(filters) {
        builder = builder.global_filter(filter);
    }
    builder.build().unwrap()
}

fn server(filters: &FiltersConfig) -> TestServer {
    TestServer::new(create_app(engine(filters), None)).unwrap()
}

#[tokio::test]
async fn test_get_page() {
    let server = server(&FiltersConfig::default());

    let response = server.get("/").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.text(), "<h1>Home</h1>");

    let response = server.get("/customers").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.text(), "<ul></ul>");
}

#[tokio::test]
async fn test_unknown_path_is_404() {
    let server = server(&FiltersConfig::default());

    let response = server.get("/nowhere").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_form_post_binds_and_redirects() {
    let server = server(&FiltersConfig::default());

    let response = server
        .post("/Customers/Edit")
        .form(&[("name", "Ada")])
        .await;
    assert_eq!(response.status_code(), StatusCode::FOUND);
    assert_eq!(response.header("location"), "/Customers?saved=Ada");
}

#[tokio::test]
async fn test_compilation_errors_rendered() {
    let server = server(&FiltersConfig::default());

    let response = server.get("/Broken").await;
    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = response.text();
    assert!(body.contains("Unknown directive"));
    assert!(body.contains("Pages/Broken.page(2,1)"));
}

#[tokio::test]
async fn test_required_header_filter() {
    let server = server(&FiltersConfig {
        request_logging: true,
        required_header: Some("x-api-key".to_string()),
    });

    let response = server.get("/").await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

    let response = server
        .get("/")
        .add_header(HeaderName::from_static("x-api-key"), HeaderValue::from_static("secret"))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.text(), "<h1>Home</h1>");
}

#[tokio::test]
async fn test_static_files_served() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("site.css"), "body { margin: 0; }").unwrap();

    let app = create_app(engine(&FiltersConfig::default()), Some(dir.path()));
    let server = TestServer::new(app).unwrap();

    let response = server.get("/static/site.css").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.text(), "body { margin: 0; }");
}
