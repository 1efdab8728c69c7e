// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Pageflow project configuration.
//!
//! Configuration is loaded from `pageflow.toml` at the project root.
//!
//! # Example Configuration
//!
//! ```toml
//! [project]
//! name = "crm"
//! version = "1.0.0"
//!
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//! static_dir = "wwwroot"
//!
//! [pages]
//! pages_dir = "Pages"
//! extension = "page"
//! compilation_cache_capacity = 256
//!
//! [filters]
//! request_logging = true
//! required_header = "x-api-key"
//! ```

use std::fs;
use std::path::Path;

use pageflow::PagesOptions;
use serde::Deserialize;

/// Name of the configuration file.
pub const CONFIG_FILE: &str = "pageflow.toml";

/// Main configuration structure loaded from `pageflow.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Project metadata (name, version).
    pub project: ProjectConfig,
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Page discovery and compilation settings.
    #[serde(default)]
    pub pages: PagesOptions,
    /// Built-in filters applied to every page.
    #[serde(default)]
    pub filters: FiltersConfig,
}

/// Project metadata configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    /// Project name.
    pub name: String,
    /// Project version (default: "0.1.0").
    #[serde(default = "default_version")]
    pub version: String,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server host (default: "127.0.0.1").
    #[serde(default = "default_host")]
    pub host: String,
    /// Server port (default: 3000).
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory served under `/static` (default: "static").
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
}

/// Built-in global filters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FiltersConfig {
    /// Logs every request with its status and duration.
    #[serde(default)]
    pub request_logging: bool,
    /// Rejects requests without this header with 401.
    #[serde(default)]
    pub required_header: Option<String>,
}

fn default_version() -> String {
    "0.1.0".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_static_dir() -> String {
    "static".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: default_static_dir(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project: ProjectConfig {
                name: "unnamed".to_string(),
                version: default_version(),
            },
            server: ServerConfig::default(),
            pages: PagesOptions::default(),
            filters: FiltersConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from `pageflow.toml` in the current directory.
    ///
    /// If no configuration file exists, returns default configuration.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(Path::new("."))
    }

    /// Loads configuration from `pageflow.toml` in `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be parsed
    /// or describes invalid page options.
    pub fn load_from(dir: &Path) -> anyhow::Result<Self> {
        let config_path = dir.join(CONFIG_FILE);

        if !config_path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(&config_path)?;
        let config: Config = toml::from_str(&content)?;
        config.pages.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(dir.path()).unwrap();

        assert_eq!(config.project.name, "unnamed");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.pages, PagesOptions::default());
        assert!(!config.filters.request_logging);
    }

    #[test]
    fn test_partial_file() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            r#"
[project]
name = "crm"

[server]
port = 8080

[pages]
pages_dir = "Site/Pages"

[filters]
required_header = "x-api-key"
"#,
        )
        .unwrap();

        let config = Config::load_from(dir.path()).unwrap();
        assert_eq!(config.project.name, "crm");
        assert_eq!(config.project.version, "0.1.0");
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.pages.pages_dir, "Site/Pages");
        assert_eq!(config.pages.extension, "page");
        assert_eq!(config.filters.required_header.as_deref(), Some("x-api-key"));
    }

    #[test]
    fn test_invalid_page_options_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            "[project]\nname = \"crm\"\n\n[pages]\ncompilation_cache_capacity = 0\n",
        )
        .unwrap();

        assert!(Config::load_from(dir.path()).is_err());
    }
}
