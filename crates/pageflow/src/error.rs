// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Error types for the pageflow pipeline.
//!
//! This module defines [`PageError`], the error enum returned by every
//! pipeline operation, and the structured compilation diagnostics
//! ([`CompilationError`], [`CompilationFailure`], [`DiagnosticMessage`]).
//!
//! # Error Categories
//!
//! - **Compilation errors**: page source could not be turned into a page type
//! - **Configuration errors**: invalid setup detected before any request runs
//! - **Filter misuse**: an asynchronous resource filter broke its contract
//! - **Handler errors**: anything raised by user code while a request runs
//!
//! Errors raised by filters or handlers travel through the invoker unchanged,
//! so callers can match on the variant they produced (and downcast the payload
//! of [`PageError::Handler`]).

use std::fmt;
use thiserror::Error;

/// Boxed error type carried by [`PageError::Handler`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Source context for enhanced error messages.
///
/// Captures a snippet of source code around an error location,
/// enabling rich error messages with line numbers and visual indicators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceContext {
    /// All lines from the source file.
    pub lines: Vec<String>,
    /// The line number where the error occurred (1-indexed).
    pub error_line: usize,
    /// The column number where the error occurred (1-indexed).
    pub error_column: usize,
    /// First line number of the snippet (1-indexed).
    pub snippet_start: usize,
    /// Last line number of the snippet (1-indexed).
    pub snippet_end: usize,
}

impl SourceContext {
    /// Creates a source context from source code and error location.
    ///
    /// Captures 2 lines before and after the error line for context.
    pub fn from_source(source: &str, line: usize, column: usize) -> Self {
        let lines: Vec<String> = source.lines().map(|l| l.to_string()).collect();
        let snippet_start = line.saturating_sub(2).max(1);
        let snippet_end = (line + 2).min(lines.len());

        Self {
            lines,
            error_line: line,
            error_column: column,
            snippet_start,
            snippet_end,
        }
    }

    /// Formats the source snippet with line numbers and error indicator.
    ///
    /// Returns a string like:
    /// ```text
    ///    1 | @page
    ///    2 | @bogus
    ///      | ^
    ///    3 | <h1>Customers</h1>
    /// ```
    pub fn format_snippet(&self) -> String {
        let mut result = String::new();

        for line_num in self.snippet_start..=self.snippet_end {
            if line_num == 0 || line_num > self.lines.len() {
                continue;
            }

            let line = &self.lines[line_num - 1];
            result.push_str(&format!("{:4} | {}\n", line_num, line));

            if line_num == self.error_line {
                result.push_str(&format!(
                    "     | {}^\n",
                    " ".repeat(self.error_column.saturating_sub(1))
                ));
            }
        }

        result
    }
}

impl fmt::Display for SourceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_snippet())
    }
}

/// A single line/column tagged diagnostic produced while compiling a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticMessage {
    /// The bare diagnostic text.
    pub message: String,
    /// The diagnostic formatted as `path(line,col): error: message`.
    pub formatted_message: String,
    /// The file the diagnostic belongs to.
    pub file_path: String,
    /// Start line (1-based).
    pub start_line: usize,
    /// Start column (1-based).
    pub start_column: usize,
    /// End line (1-based).
    pub end_line: usize,
    /// End column (1-based).
    pub end_column: usize,
}

impl DiagnosticMessage {
    /// Creates a diagnostic spanning `length` characters on one line.
    pub fn new(
        file_path: impl Into<String>,
        message: impl Into<String>,
        line: usize,
        column: usize,
        length: usize,
    ) -> Self {
        let file_path = file_path.into();
        let message = message.into();
        let formatted_message = format!("{}({},{}): error: {}", file_path, line, column, message);

        Self {
            message,
            formatted_message,
            file_path,
            start_line: line,
            start_column: column,
            end_line: line,
            end_column: column + length,
        }
    }
}

impl fmt::Display for DiagnosticMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.formatted_message)
    }
}

/// All diagnostics reported against one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilationFailure {
    /// Path of the file the diagnostics refer to.
    pub source_file_path: String,
    /// Content of that file, when it could be read.
    pub source_file_content: Option<String>,
    /// Generated content, if compilation got that far.
    pub compiled_content: Option<String>,
    /// The individual diagnostics.
    pub messages: Vec<DiagnosticMessage>,
}

impl CompilationFailure {
    /// Returns a source snippet around the first diagnostic, if the source is known.
    pub fn source_context(&self) -> Option<SourceContext> {
        let source = self.source_file_content.as_deref()?;
        let first = self.messages.first()?;
        Some(SourceContext::from_source(source, first.start_line, first.start_column))
    }
}

/// Aggregate compilation failure for one page.
///
/// Diagnostics are grouped by the file they were reported against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilationError {
    /// One entry per source file with errors.
    pub failures: Vec<CompilationFailure>,
}

impl CompilationError {
    /// Groups diagnostics by file path, preserving first-seen file order.
    pub fn from_diagnostics(
        diagnostics: Vec<DiagnosticMessage>,
        source_for: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let mut failures: Vec<CompilationFailure> = Vec::new();

        for diagnostic in diagnostics {
            match failures
                .iter_mut()
                .find(|f| f.source_file_path == diagnostic.file_path)
            {
                Some(failure) => failure.messages.push(diagnostic),
                None => failures.push(CompilationFailure {
                    source_file_path: diagnostic.file_path.clone(),
                    source_file_content: source_for(&diagnostic.file_path),
                    compiled_content: None,
                    messages: vec![diagnostic],
                }),
            }
        }

        Self { failures }
    }

    /// Iterates over every diagnostic of every file.
    pub fn messages(&self) -> impl Iterator<Item = &DiagnosticMessage> {
        self.failures.iter().flat_map(|f| f.messages.iter())
    }
}

impl fmt::Display for CompilationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "One or more compilation failures occurred:")?;
        for failure in &self.failures {
            for message in &failure.messages {
                writeln!(f, "{}", message)?;
            }
            if let Some(snippet) = failure.source_context() {
                write!(f, "{}", snippet)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for CompilationError {}

/// The main error type for pageflow operations.
#[derive(Error, Debug)]
pub enum PageError {
    /// Page source failed to compile.
    #[error("{0}")]
    Compilation(#[from] CompilationError),

    /// Invalid setup, detected before requests are served.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An asynchronous resource filter set a result and also invoked `next`.
    #[error(
        "Asynchronous resource filter '{filter}' set a result on the executing context \
         and also invoked the continuation; a filter must do one or the other"
    )]
    InvalidShortCircuit {
        /// Name of the offending filter.
        filter: String,
    },

    /// An asynchronous resource filter neither set a result nor invoked `next`.
    #[error(
        "Asynchronous resource filter '{filter}' returned without setting a result \
         or invoking the continuation"
    )]
    MissingContinuation {
        /// Name of the offending filter.
        filter: String,
    },

    /// The request was canceled while the pipeline was running.
    #[error("Request was canceled")]
    Canceled,

    /// A page asked for a service that was never registered.
    #[error("No service registered for type {0}")]
    ServiceNotRegistered(&'static str),

    /// No page matched the requested path.
    #[error("No page matches route: {0}")]
    RouteNotFound(String),

    /// A page file could not be found by the file provider.
    #[error("Page file not found: {0}")]
    FileNotFound(String),

    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error raised by user code (handlers, filters, results).
    #[error("{0}")]
    Handler(BoxError),
}

impl PageError {
    /// Wraps an arbitrary error raised by user code.
    pub fn handler<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Handler(Box::new(error))
    }

    /// Creates a handler error from a message.
    pub fn message(message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self::Handler(message.into())
    }

    /// Downcasts the payload of a [`PageError::Handler`] to its concrete type.
    pub fn downcast_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        match self {
            Self::Handler(inner) => inner.downcast_ref::<E>(),
            _ => None,
        }
    }

    /// Returns true if this error represents request cancellation.
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }
}

/// Convenience type alias for Results with [`PageError`].
pub type Result<T> = std::result::Result<T, PageError>;
