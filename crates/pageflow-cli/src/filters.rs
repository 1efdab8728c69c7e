// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Built-in global filters enabled from the `[filters]` table.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use pageflow::results::ContentResult;
use pageflow::{
    AsyncResourceFilter, AuthorizationFilter, AuthorizationFilterContext, Filter,
    ResourceExecutingContext, ResourceNext,
};

use crate::config::FiltersConfig;

/// Logs each request once the pipeline has finished.
#[derive(Debug, Default)]
pub struct RequestLogging;

impl Filter for RequestLogging {
    fn name(&self) -> &str {
        "RequestLogging"
    }

    // Outermost, so the logged duration covers every other filter.
    fn order(&self) -> i32 {
        i32::MIN
    }

    fn as_async_resource(&self) -> Option<&dyn AsyncResourceFilter> {
        Some(self)
    }
}

#[async_trait]
impl AsyncResourceFilter for RequestLogging {
    async fn on_resource_execution(
        &self,
        ctx: &mut ResourceExecutingContext,
        next: ResourceNext<'_>,
    ) -> pageflow::Result<()> {
        let started = Instant::now();
        let method = ctx.page().request().method.clone();
        let path = ctx.page().request().path.clone();

        let executed = next.run(ctx).await?;
        let status = executed.page().with_response(|response| response.status);
        match executed.unhandled_exception() {
            Some(err) => tracing::warn!(
                "{} {} failed after {:?}: {}",
                method,
                path,
                started.elapsed(),
                err
            ),
            None => tracing::info!("{} {} -> {} in {:?}", method, path, status, started.elapsed()),
        }
        Ok(())
    }
}

/// Rejects requests that lack a header.
#[derive(Debug, Clone)]
pub struct RequiredHeader {
    header: String,
}

impl RequiredHeader {
    /// Requires `header` on every request.
    pub fn new(header: impl Into<String>) -> Self {
        Self { header: header.into() }
    }

    /// The required header name.
    pub fn header(&self) -> &str {
        &self.header
    }
}

impl Filter for RequiredHeader {
    fn name(&self) -> &str {
        "RequiredHeader"
    }

    fn as_authorization(&self) -> Option<&dyn AuthorizationFilter> {
        Some(self)
    }
}

impl AuthorizationFilter for RequiredHeader {
    fn on_authorization(&self, ctx: &mut AuthorizationFilterContext) -> pageflow::Result<()> {
        let present = ctx
            .page()
            .request()
            .header(&self.header)
            .is_some_and(|value| !value.trim().is_empty());

        if !present {
            tracing::debug!(
                "Rejecting {}: missing header {}",
                ctx.page().request().path,
                self.header
            );
            let message = format!("Missing required header '{}'", self.header);
            ctx.set_result(ContentResult::text(message).with_status(401));
        }
        Ok(())
    }
}

/// Builds the filters enabled by `config`.
pub fn global_filters(config: &FiltersConfig) -> Vec<Arc<dyn Filter>> {
    let mut filters: Vec<Arc<dyn Filter>> = Vec::new();
    if config.request_logging {
        filters.push(Arc::new(RequestLogging));
    }
    if let Some(header) = config.required_header.as_deref().filter(|h| !h.is_empty()) {
        filters.push(Arc::new(RequiredHeader::new(header)));
    }
    filters
}

#[cfg(test)]
mod tests {
    use super::*;
    use pageflow::{MemoryPageProvider, PageRequest, PagesEngine};

    fn engine(config: &FiltersConfig) -> PagesEngine {
        let files = Arc::new(MemoryPageProvider::new());
        files.add_file("Pages/Index.page", "@page\n<h1>Home</h1>");

        let mut builder = PagesEngine::builder().file_provider(files);
        for filter in global_filters(config) {
            builder = builder.global_filter(filter);
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_global_filters_from_config() {
        assert!(global_filters(&FiltersConfig::default()).is_empty());

        let filters = global_filters(&FiltersConfig {
            request_logging: true,
            required_header: Some("x-api-key".to_string()),
        });
        let names: Vec<&str> = filters.iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["RequestLogging", "RequiredHeader"]);
    }

    #[tokio::test]
    async fn test_required_header_rejects_and_admits() {
        let engine = engine(&FiltersConfig {
            request_logging: true,
            required_header: Some("x-api-key".to_string()),
        });

        let rejected = engine.handle(PageRequest::new("/", "GET")).await.unwrap();
        assert_eq!(rejected.status, 401);
        assert_eq!(rejected.body, "Missing required header 'x-api-key'");

        let admitted = engine
            .handle(PageRequest::new("/", "GET").with_header("X-Api-Key", "secret"))
            .await
            .unwrap();
        assert_eq!(admitted.status, 200);
        assert_eq!(admitted.body, "<h1>Home</h1>");
    }
}
