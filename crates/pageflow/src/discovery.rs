// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Page discovery.
//!
//! A [`PageFileProvider`] abstracts where page sources live. Paths are
//! relative to the provider's content root and always use `/` separators,
//! e.g. `Pages/Customers/Edit.page`.
//!
//! The [`PageActionDescriptorProvider`] walks the pages directory once and
//! produces a [`PageActionDescriptor`] per page source.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

#[cfg(feature = "filesystem")]
use std::path::{Path, PathBuf};

use crate::descriptor::{FilterDescriptor, PageActionDescriptor};
use crate::error::{PageError, Result};
use crate::options::PagesOptions;

/// Source of page files.
pub trait PageFileProvider: Send + Sync {
    /// Lists every file below `dir`, recursively, sorted.
    fn list_files(&self, dir: &str) -> Result<Vec<String>>;

    /// Reads a file.
    fn read_file(&self, path: &str) -> Result<String>;
}

/// Reads pages from a directory on disk.
#[cfg(feature = "filesystem")]
#[derive(Debug, Clone)]
pub struct FileSystemPageProvider {
    root: PathBuf,
}

#[cfg(feature = "filesystem")]
impl FileSystemPageProvider {
    /// Creates a provider rooted at `root`.
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// The content root.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(feature = "filesystem")]
impl PageFileProvider for FileSystemPageProvider {
    fn list_files(&self, dir: &str) -> Result<Vec<String>> {
        let base = self.root.join(dir.trim_matches('/'));
        if !base.is_dir() {
            return Ok(Vec::new());
        }

        let pattern = format!(
            "{}/**/*",
            glob::Pattern::escape(&base.to_string_lossy())
        );
        let entries = glob::glob(&pattern).map_err(|e| {
            PageError::Configuration(format!("Invalid pages directory {}: {}", dir, e))
        })?;

        let mut files: Vec<String> = entries
            .flatten()
            .filter(|path| path.is_file())
            .filter_map(|path| {
                path.strip_prefix(&self.root).ok().map(|relative| {
                    relative
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy())
                        .collect::<Vec<_>>()
                        .join("/")
                })
            })
            .collect();
        files.sort();
        Ok(files)
    }

    fn read_file(&self, path: &str) -> Result<String> {
        let full_path = self.root.join(path.trim_start_matches('/'));
        std::fs::read_to_string(&full_path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => PageError::FileNotFound(path.to_string()),
            _ => PageError::Io(e),
        })
    }
}

/// Keeps page files in memory. Files can be added or changed at any time.
#[derive(Debug, Default)]
pub struct MemoryPageProvider {
    files: RwLock<HashMap<String, String>>,
}

impl MemoryPageProvider {
    /// Creates an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a file.
    pub fn add_file(&self, path: &str, content: &str) {
        self.files
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.trim_start_matches('/').to_string(), content.to_string());
    }

    /// Removes a file.
    pub fn remove_file(&self, path: &str) -> bool {
        self.files
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(path.trim_start_matches('/'))
            .is_some()
    }
}

impl PageFileProvider for MemoryPageProvider {
    fn list_files(&self, dir: &str) -> Result<Vec<String>> {
        let prefix = format!("{}/", dir.trim_matches('/'));
        let files = self.files.read().unwrap_or_else(PoisonError::into_inner);

        let mut listed: Vec<String> = files
            .keys()
            .filter(|path| path.starts_with(&prefix))
            .cloned()
            .collect();
        listed.sort();
        Ok(listed)
    }

    fn read_file(&self, path: &str) -> Result<String> {
        self.files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path.trim_start_matches('/'))
            .cloned()
            .ok_or_else(|| PageError::FileNotFound(path.to_string()))
    }
}

/// Produces descriptors for every page below the pages directory.
pub struct PageActionDescriptorProvider {
    files: Arc<dyn PageFileProvider>,
    options: PagesOptions,
    global_filters: Vec<FilterDescriptor>,
}

impl PageActionDescriptorProvider {
    /// Creates a provider. `global_filters` are attached to every page.
    pub fn new(
        files: Arc<dyn PageFileProvider>,
        options: PagesOptions,
        global_filters: Vec<FilterDescriptor>,
    ) -> Self {
        Self {
            files,
            options,
            global_filters,
        }
    }

    /// Walks the pages directory.
    pub fn discover(&self) -> Result<Vec<PageActionDescriptor>> {
        let root = self.options.pages_root();
        let suffix = format!(".{}", self.options.extension());

        let descriptors: Vec<PageActionDescriptor> = self
            .files
            .list_files(root)?
            .into_iter()
            .filter(|path| path.ends_with(&suffix))
            .filter_map(|path| {
                let view_engine_path = path.strip_prefix(root)?.to_string();
                Some(PageActionDescriptor::from_view_engine_path(
                    root,
                    &view_engine_path,
                    self.global_filters.clone(),
                ))
            })
            .collect();

        tracing::debug!("Discovered {} page(s) under {}", descriptors.len(), root);
        Ok(descriptors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory() -> Arc<MemoryPageProvider> {
        let files = Arc::new(MemoryPageProvider::new());
        files.add_file("Pages/Index.page", "@page\nHome");
        files.add_file("Pages/Customers/Index.page", "@page\nList");
        files.add_file("Pages/Customers/Edit.page", "@page\nEdit");
        files.add_file("Pages/Customers/notes.txt", "ignored");
        files.add_file("Other/Stray.page", "@page\n");
        files
    }

    #[test]
    fn test_memory_provider() {
        let files = memory();
        assert_eq!(files.list_files("Pages").unwrap().len(), 4);
        assert_eq!(files.read_file("/Pages/Index.page").unwrap(), "@page\nHome");
        assert!(matches!(files.read_file("Pages/Nope.page"), Err(PageError::FileNotFound(_))));

        assert!(files.remove_file("Pages/Index.page"));
        assert_eq!(files.list_files("Pages").unwrap().len(), 3);
    }

    #[test]
    fn test_discover_descriptors() {
        let provider = PageActionDescriptorProvider::new(memory(), PagesOptions::default(), vec![]);
        let descriptors = provider.discover().unwrap();

        let summary: Vec<(&str, &str, &str)> = descriptors
            .iter()
            .map(|d| (d.relative_path.as_str(), d.route_template.as_str(), d.display_name.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("Pages/Customers/Edit.page", "Customers/Edit", "Page: /Customers/Edit.page"),
                ("Pages/Customers/Index.page", "Customers", "Page: /Customers/Index.page"),
                ("Pages/Index.page", "", "Page: /Index.page"),
            ]
        );
        assert_eq!(
            descriptors[0].route_values.get("page").map(String::as_str),
            Some("/Customers/Edit")
        );
    }

    #[cfg(feature = "filesystem")]
    #[test]
    fn test_filesystem_provider() {
        use std::fs;
        use tempfile::TempDir;

        let temp_dir = TempDir::new().unwrap();
        let customers = temp_dir.path().join("Pages").join("Customers");
        fs::create_dir_all(&customers).unwrap();
        fs::write(customers.join("Edit.page"), "@page\nEdit").unwrap();
        fs::write(temp_dir.path().join("Pages").join("Index.page"), "@page\nHome").unwrap();

        let files = FileSystemPageProvider::new(temp_dir.path());
        assert_eq!(
            files.list_files("Pages").unwrap(),
            vec!["Pages/Customers/Edit.page", "Pages/Index.page"]
        );
        assert_eq!(files.read_file("Pages/Index.page").unwrap(), "@page\nHome");
        assert!(matches!(files.read_file("Pages/Missing.page"), Err(PageError::FileNotFound(_))));
        assert!(files.list_files("Missing").unwrap().is_empty());
    }
}
