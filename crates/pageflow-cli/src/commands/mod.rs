// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! CLI command implementations.
//!
//! - `serve`: Serve the pages of a project over HTTP
//! - `routes`: Print the route table
//! - `check`: Compile every page and report diagnostics

use std::path::Path;
use std::sync::Arc;

use pageflow::{FileSystemPageProvider, PagesEngine};

use crate::config::Config;
use crate::filters::global_filters;

/// Page compilation check command.
pub mod check;
/// Route listing command.
pub mod routes;
/// HTTP server command.
pub mod serve;

/// Builds the pages engine for the project rooted at `root`.
pub fn build_engine(config: &Config, root: &Path) -> anyhow::Result<PagesEngine> {
    let mut builder = PagesEngine::builder()
        .file_provider(Arc::new(FileSystemPageProvider::new(root)))
        .options(config.pages.clone());

    for filter in global_filters(&config.filters) {
        builder = builder.global_filter(filter);
    }

    Ok(builder.build()?)
}
