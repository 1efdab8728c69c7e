// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Engine options.

use serde::Deserialize;

use crate::error::{PageError, Result};

/// Options controlling page discovery and compilation.
///
/// Deserializable from a `[pages]` table:
///
/// ```toml
/// pages_dir = "Pages"
/// extension = "page"
/// compilation_cache_capacity = 256
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PagesOptions {
    /// Directory holding page sources, relative to the content root.
    #[serde(default = "default_pages_dir")]
    pub pages_dir: String,

    /// File extension of page sources, without the dot.
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Maximum number of compiled pages kept in memory.
    #[serde(default = "default_cache_capacity")]
    pub compilation_cache_capacity: usize,
}

fn default_pages_dir() -> String {
    "Pages".to_string()
}

fn default_extension() -> String {
    "page".to_string()
}

fn default_cache_capacity() -> usize {
    256
}

impl Default for PagesOptions {
    fn default() -> Self {
        Self {
            pages_dir: default_pages_dir(),
            extension: default_extension(),
            compilation_cache_capacity: default_cache_capacity(),
        }
    }
}

impl PagesOptions {
    /// Pages directory without surrounding slashes.
    pub fn pages_root(&self) -> &str {
        self.pages_dir.trim_matches('/')
    }

    /// Extension without a leading dot.
    pub fn extension(&self) -> &str {
        self.extension.trim_start_matches('.')
    }

    /// Checks the options before an engine is built.
    pub fn validate(&self) -> Result<()> {
        if self.pages_root().is_empty() {
            return Err(PageError::Configuration("pages_dir must not be empty".to_string()));
        }
        if self.extension().is_empty() {
            return Err(PageError::Configuration("extension must not be empty".to_string()));
        }
        if self.compilation_cache_capacity == 0 {
            return Err(PageError::Configuration(
                "compilation_cache_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let options: PagesOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, PagesOptions::default());
        assert_eq!(options.pages_root(), "Pages");
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_normalization_and_validation() {
        let options: PagesOptions =
            serde_json::from_str(r#"{"pages_dir": "/site/Pages/", "extension": ".html"}"#).unwrap();
        assert_eq!(options.pages_root(), "site/Pages");
        assert_eq!(options.extension(), "html");

        let options = PagesOptions {
            compilation_cache_capacity: 0,
            ..PagesOptions::default()
        };
        assert!(matches!(options.validate(), Err(PageError::Configuration(_))));
    }
}
