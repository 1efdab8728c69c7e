// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

// Warn on missing documentation for public items
#![warn(missing_docs)]

//! Pageflow CLI library.
//!
//! This crate provides the command-line interface for pageflow projects.
//!
//! # Usage
//!
//! This crate is primarily used through the `pageflow` binary:
//!
//! ```bash
//! pageflow serve    # Serve the pages over HTTP
//! pageflow routes   # Print the route table
//! pageflow check    # Compile every page and report errors
//! ```
//!
//! # Configuration
//!
//! Projects are configured via `pageflow.toml` at the project root.

/// CLI commands (serve, routes, check).
pub mod commands;
/// Project configuration from `pageflow.toml`.
pub mod config;
/// Built-in global filters.
pub mod filters;
/// HTTP adapter around the pages engine.
pub mod server;
