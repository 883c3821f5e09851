//! Page and static-file entities.
//!
//! Any file outside the reserved directories whose content begins with the
//! front-matter delimiter is a Page; everything else is a StaticFile that
//! gets copied byte-for-byte.

use super::front_matter::{Document, FrontMatter};
use anyhow::Result;
use std::path::{Path, PathBuf};

/// Extensions transformed to HTML on output.
const MARKUP_EXTS: &[&str] = &["md", "markdown", "mkd", "textile"];

/// Check whether a path's extension is in the markup family.
pub fn is_markup_ext(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(is_markup_ext_name)
}

/// Check a bare extension against the markup family.
pub fn is_markup_ext_name(ext: &str) -> bool {
    MARKUP_EXTS.contains(&ext.to_ascii_lowercase().as_str())
}

/// A rendered page, identified by its source path.
#[derive(Debug, Clone)]
pub struct Page {
    /// Absolute source path (unique key)
    pub source: PathBuf,
    /// Path relative to the source root, mirrored into the destination
    pub rel_path: PathBuf,
    /// Front-matter data (may declare a `layout`)
    pub front: FrontMatter,
    /// Raw body
    pub body: String,
    /// Rendered output, present only after render
    pub output: Option<String>,
}

impl Page {
    /// Construct a page from its source file.
    pub fn from_path(path: &Path, source_root: &Path) -> Result<Self> {
        let doc = Document::read(path)?;
        let rel_path = path
            .strip_prefix(source_root)
            .unwrap_or(path)
            .to_path_buf();
        Ok(Self {
            source: path.to_path_buf(),
            rel_path,
            front: doc.front,
            body: doc.body,
            output: None,
        })
    }

    /// Reread front matter and body from disk, updating in place.
    pub fn reread(&mut self) -> Result<()> {
        let doc = Document::read(&self.source)?;
        self.front = doc.front;
        self.body = doc.body;
        self.output = None;
        Ok(())
    }

    /// Declared layout name.
    pub fn layout(&self) -> Option<&str> {
        self.front.layout()
    }

    /// Publish flag; absent means published.
    pub fn published(&self) -> bool {
        self.front.published()
    }

    /// Destination path relative to the destination root: the mirrored
    /// source path, markup extensions mapped to `.html`.
    pub fn destination_rel(&self) -> PathBuf {
        if is_markup_ext(&self.rel_path) {
            self.rel_path.with_extension("html")
        } else {
            self.rel_path.clone()
        }
    }

    /// Site-absolute URL of the rendered page.
    pub fn url(&self) -> String {
        format!("/{}", self.destination_rel().display())
    }
}

/// A file copied verbatim, tracked only so repeated changes do not insert
/// duplicates into the model.
#[derive(Debug, Clone)]
pub struct StaticFile {
    /// Absolute source path (unique key)
    pub source: PathBuf,
    /// Path relative to the source root, mirrored into the destination
    pub rel_path: PathBuf,
}

impl StaticFile {
    pub fn new(path: &Path, source_root: &Path) -> Self {
        let rel_path = path
            .strip_prefix(source_root)
            .unwrap_or(path)
            .to_path_buf();
        Self {
            source: path.to_path_buf(),
            rel_path,
        }
    }

    /// Destination path relative to the destination root.
    pub fn destination_rel(&self) -> &Path {
        &self.rel_path
    }
}

// ============================================================================
// Tests
// ============================================================================
