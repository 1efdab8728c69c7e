// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Page compilation.
//!
//! Page sources are small text files. A header of `@` directives declares the
//! page and, optionally, the code-behind model that handles its verbs. The
//! rest of the file is the page template:
//!
//! ```text
//! @page
//! @model CustomersModel
//! <h1>{{ title }}</h1>
//! ```
//!
//! Code-behind types are registered up front with a [`RegistryPageCompiler`],
//! so "compiling" a source resolves its model against the registry and
//! produces a [`PageType`]. The [`CompiledPageCache`] keeps compiled pages
//! keyed by path and content hash and guarantees that concurrent requests for
//! the same uncompiled page share a single compilation.

use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use lru::LruCache;
use sha2::{Digest, Sha256};
use tokio::sync::OnceCell;

use crate::descriptor::{strip_extension, CompiledPageActionDescriptor, PageActionDescriptor};
use crate::error::{CompilationError, DiagnosticMessage, PageError, Result};
use crate::page::{Page, PageBehavior, PageDefinition, PageType};

/// Turns page source into an executable [`PageType`].
pub trait PageCompiler: Send + Sync {
    /// Compiles `source`, read from `relative_path`.
    fn compile(
        &self,
        source: &str,
        relative_path: &str,
    ) -> std::result::Result<Arc<PageType>, CompilationError>;
}

/// Compiler that resolves `@model` directives against registered page
/// definitions.
#[derive(Default, Clone)]
pub struct RegistryPageCompiler {
    models: HashMap<String, Arc<dyn PageBehavior>>,
}

impl RegistryPageCompiler {
    /// Creates a compiler with no registered models.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a code-behind model under its definition name.
    pub fn register<P: Page>(&mut self, definition: PageDefinition<P>) -> &mut Self {
        self.register_behavior(Arc::new(definition))
    }

    /// Registers an already erased model.
    pub fn register_behavior(&mut self, behavior: Arc<dyn PageBehavior>) -> &mut Self {
        self.models.insert(behavior.name().to_string(), behavior);
        self
    }

    /// Names of the registered models, sorted.
    pub fn models(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.models.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for RegistryPageCompiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryPageCompiler")
            .field("models", &self.models())
            .finish()
    }
}

struct Directives<'a> {
    // Type name with its line and column.
    model: Option<(&'a str, usize, usize)>,
    template: &'a str,
    diagnostics: Vec<DiagnosticMessage>,
}

fn parse_directives<'a>(source: &'a str, path: &str) -> Directives<'a> {
    let mut directives = Directives {
        model: None,
        template: "",
        diagnostics: Vec::new(),
    };
    let mut seen_page = false;
    let mut offset = 0;

    for (index, raw_line) in source.split_inclusive('\n').enumerate() {
        let line_number = index + 1;
        let line = raw_line.trim_end_matches(['\r', '\n']);
        let trimmed = line.trim_start();
        let column = line.len() - trimmed.len() + 1;

        if trimmed.is_empty() {
            offset += raw_line.len();
            continue;
        }
        if !trimmed.starts_with('@') {
            break;
        }

        let mut parts = trimmed[1..].split_whitespace();
        let name = parts.next().unwrap_or_default();
        let argument = parts.next();
        let extra = parts.next();

        let mut error = |message: String, length: usize| {
            directives
                .diagnostics
                .push(DiagnosticMessage::new(path, message, line_number, column, length));
        };

        match name {
            "page" if seen_page => {
                error("The @page directive may only appear once.".to_string(), trimmed.len())
            }
            "page" if argument.is_some() => {
                error("The @page directive does not take arguments.".to_string(), trimmed.len())
            }
            "page" => seen_page = true,
            _ if !seen_page => error(
                "The @page directive must precede all other directives.".to_string(),
                trimmed.len(),
            ),
            "model" => match (argument, extra) {
                (None, _) => {
                    error("The @model directive requires a type name.".to_string(), trimmed.len())
                }
                (Some(_), Some(_)) => error(
                    "The @model directive takes exactly one type name.".to_string(),
                    trimmed.len(),
                ),
                (Some(_), None) if directives.model.is_some() => {
                    error("The @model directive may only appear once.".to_string(), trimmed.len())
                }
                (Some(type_name), None) => {
                    let body = &trimmed[1..];
                    let name_end = 1 + (body.len() - body.trim_start().len()) + name.len();
                    let rest = &trimmed[name_end..];
                    let spacing = rest.len() - rest.trim_start().len();
                    let type_column = column + name_end + spacing;
                    directives.model = Some((type_name, line_number, type_column));
                }
            },
            other => error(format!("Unknown directive '@{}'.", other), trimmed.len()),
        }

        offset += raw_line.len();
    }

    if !seen_page && directives.diagnostics.is_empty() {
        directives.diagnostics.push(DiagnosticMessage::new(
            path,
            "Page source must start with an @page directive.",
            1,
            1,
            0,
        ));
    }

    directives.template = &source[offset..];
    directives
}

impl PageCompiler for RegistryPageCompiler {
    fn compile(
        &self,
        source: &str,
        relative_path: &str,
    ) -> std::result::Result<Arc<PageType>, CompilationError> {
        let mut directives = parse_directives(source, relative_path);

        let behavior = match directives.model {
            Some((type_name, line, column)) => match self.models.get(type_name) {
                Some(behavior) => Some((type_name, Arc::clone(behavior))),
                None => {
                    directives.diagnostics.push(DiagnosticMessage::new(
                        relative_path,
                        format!("The model type '{}' is not registered.", type_name),
                        line,
                        column,
                        type_name.len(),
                    ));
                    None
                }
            },
            None => None,
        };

        if !directives.diagnostics.is_empty() {
            return Err(CompilationError::from_diagnostics(directives.diagnostics, |path| {
                (path == relative_path).then(|| source.to_string())
            }));
        }

        let page_type = match behavior {
            Some((type_name, behavior)) => {
                PageType::from_behavior(behavior, directives.template).with_model(type_name)
            }
            None => PageType::template_only(
                strip_extension(relative_path.trim_start_matches('/')),
                directives.template,
            ),
        };
        Ok(Arc::new(page_type))
    }
}

type CompileOutcome = std::result::Result<Arc<CompiledPageActionDescriptor>, CompilationError>;

struct CacheEntry {
    hash: String,
    cell: Arc<OnceCell<CompileOutcome>>,
}

/// Compiled pages keyed by relative path.
///
/// An entry is reused while the page source hashes the same. Failed
/// compilations are cached too, so a broken page is not recompiled until its
/// source changes.
pub struct CompiledPageCache {
    compiler: Arc<dyn PageCompiler>,
    entries: Mutex<LruCache<String, CacheEntry>>,
    compilations: AtomicUsize,
}

impl CompiledPageCache {
    /// Creates a cache holding at most `capacity` pages.
    pub fn new(compiler: Arc<dyn PageCompiler>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            compiler,
            entries: Mutex::new(LruCache::new(capacity)),
            compilations: AtomicUsize::new(0),
        }
    }

    /// Returns the compiled descriptor for `descriptor`, compiling `source`
    /// if it is not cached yet.
    pub async fn get_or_compile(
        &self,
        descriptor: &PageActionDescriptor,
        source: &str,
    ) -> Result<Arc<CompiledPageActionDescriptor>> {
        let hash = content_hash(source);
        let cell = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            match entries.get(&descriptor.relative_path) {
                Some(entry) if entry.hash == hash => {
                    tracing::trace!("Compiled page cache hit for {}", descriptor.relative_path);
                    Arc::clone(&entry.cell)
                }
                _ => {
                    let cell = Arc::new(OnceCell::new());
                    entries.put(
                        descriptor.relative_path.clone(),
                        CacheEntry {
                            hash,
                            cell: Arc::clone(&cell),
                        },
                    );
                    cell
                }
            }
        };

        let outcome = cell
            .get_or_init(|| async { self.compile(descriptor, source) })
            .await;

        outcome.clone().map_err(PageError::Compilation)
    }

    fn compile(&self, descriptor: &PageActionDescriptor, source: &str) -> CompileOutcome {
        self.compilations.fetch_add(1, Ordering::SeqCst);
        let started = Instant::now();
        tracing::debug!("Compiling {}", descriptor.relative_path);

        let outcome = self
            .compiler
            .compile(source, &descriptor.relative_path)
            .and_then(|page_type| {
                CompiledPageActionDescriptor::new(descriptor, page_type).map_err(|err| {
                    CompilationError::from_diagnostics(
                        vec![DiagnosticMessage::new(
                            descriptor.relative_path.as_str(),
                            err.to_string(),
                            1,
                            1,
                            0,
                        )],
                        |_| Some(source.to_string()),
                    )
                })
            })
            .map(Arc::new);

        match &outcome {
            Ok(_) => tracing::debug!(
                "Compiled {} in {:?}",
                descriptor.relative_path,
                started.elapsed()
            ),
            Err(err) => tracing::warn!(
                "Compilation of {} failed with {} diagnostic(s)",
                descriptor.relative_path,
                err.messages().count()
            ),
        }
        outcome
    }

    /// Drops the cached entry for `relative_path`.
    pub fn invalidate(&self, relative_path: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop(relative_path);
    }

    /// Number of cached pages.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of compilations run so far.
    pub fn compilation_count(&self) -> usize {
        self.compilations.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for CompiledPageCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledPageCache")
            .field("len", &self.len())
            .field("compilations", &self.compilation_count())
            .finish()
    }
}

fn content_hash(source: &str) -> String {
    format!("{:x}", Sha256::digest(source.as_bytes()))
}
