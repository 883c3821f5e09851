//! Site configuration management for `site.toml`.
//!
//! # Sections
//!
//! | Section     | Purpose                                          |
//! |-------------|--------------------------------------------------|
//! | `[site]`    | Site metadata (title, author, url)               |
//! | `[build]`   | Source/destination roots, exclusions, pagination |
//! | `[extra]`   | User-defined custom fields                       |
//!
//! # Example
//!
//! ```toml
//! [site]
//! title = "My Blog"
//! url = "https://example.com"
//!
//! [build]
//! source = "."
//! destination = "_site"
//! exclude = ["drafts"]
//! markdown = "commonmark"
//! paginate = 10
//! ```
//!
//! All paths are normalized to absolute form at load time so that the
//! classifier and the rebuild engine can compare them against watcher
//! paths without touching the filesystem.

use crate::cli::Cli;
use anyhow::Result;
use serde::Deserialize;
use std::{
    collections::HashMap,
    env, fs,
    path::{Component, Path, PathBuf},
};
use thiserror::Error;

/// Default config file name; a changed path with this file name forces a
/// full batch build instead of an incremental one.
pub const DEFAULT_CONFIG_FILE: &str = "site.toml";

// ============================================================================
// Errors
// ============================================================================

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error when reading `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Config file parsing error")]
    Toml(#[from] toml::de::Error),

    #[error("Config validation error: {0}")]
    Validation(String),
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure representing `site.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    /// Absolute path to the config file (set after loading)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Basic site information
    #[serde(default)]
    pub site: BaseConfig,

    /// Build settings
    #[serde(default)]
    pub build: BuildConfig,

    /// User-defined extra fields
    #[serde(default)]
    pub extra: HashMap<String, toml::Value>,
}

/// Site metadata exposed to templates through the render payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BaseConfig {
    pub title: Option<String>,
    pub author: Option<String>,
    pub url: Option<String>,
}

/// Build settings: roots, filtering and pagination.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Source tree root, relative to the config file's directory
    pub source: PathBuf,

    /// Destination root; never scanned as source content
    pub destination: PathBuf,

    /// Names excluded from classification even if otherwise eligible
    pub exclude: Vec<String>,

    /// Names whitelisted past the hidden/backup exclusion rule
    pub include: Vec<String>,

    /// Publish posts dated in the future
    pub future: bool,

    /// Markdown backend: "commonmark" or "none"
    pub markdown: String,

    /// Posts per pagination slice; 0 disables pagination
    pub paginate: usize,

    /// File name that triggers pagination during the page walk
    pub paginate_file: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::from("."),
            destination: PathBuf::from("_site"),
            exclude: Vec::new(),
            include: vec![".htaccess".to_string()],
            future: false,
            markdown: "commonmark".to_string(),
            paginate: 0,
            paginate_file: "index.html".to_string(),
        }
    }
}

impl SiteConfig {
    /// Parse configuration from a TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: SiteConfig = toml::from_str(content).map_err(ConfigError::Toml)?;
        Ok(config)
    }

    /// Load configuration from a file path.
    ///
    /// Source and destination roots are resolved relative to the config
    /// file's directory and normalized to absolute paths.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        let mut config = Self::from_str(&content)?;
        config.anchor_at(path);
        Ok(config)
    }

    /// Anchor all relative paths at the config file's directory.
    pub fn anchor_at(&mut self, config_path: &Path) {
        self.config_path = absolutize(config_path);
        let root = self
            .config_path
            .parent()
            .map_or_else(|| PathBuf::from("/"), Path::to_path_buf);
        self.build.source = absolutize(&root.join(&self.build.source));
        self.build.destination = absolutize(&root.join(&self.build.destination));
    }

    /// Absolute source root
    pub fn source(&self) -> &Path {
        &self.build.source
    }

    /// Absolute destination root
    pub fn destination(&self) -> &Path {
        &self.build.destination
    }

    /// Fold CLI overrides into the loaded configuration.
    pub fn update_with_cli(&mut self, cli: &Cli) {
        if let Some(source) = &cli.source {
            self.build.source = absolutize(source);
        }
        if let Some(destination) = &cli.destination {
            self.build.destination = absolutize(destination);
        }
        if let Some(future) = cli.future {
            self.build.future = future;
        }
    }

    /// Validate configuration consistency.
    pub fn validate(&self) -> Result<()> {
        if self.build.source == self.build.destination {
            return Err(ConfigError::Validation(format!(
                "source and destination must differ: {}",
                self.build.source.display()
            ))
            .into());
        }
        Ok(())
    }
}

// ============================================================================
// Path normalization
// ============================================================================

/// Normalize a path to absolute form without touching the filesystem.
///
/// Purely lexical: joins relative paths onto the working directory and
/// collapses `.`/`..` components. Symlinks are deliberately not resolved,
/// the classifier must still be able to see them.
pub fn absolutize(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir()
            .map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
    };

    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

// ============================================================================
// Tests
// ============================================================================
