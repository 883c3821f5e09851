//! Layout entity: a reusable render template.
//!
//! Layouts live under `_layouts`, are keyed by their file name minus the
//! extension, and may themselves declare a parent `layout` in front
//! matter, forming a chain.

use super::front_matter::{Document, FrontMatter};
use anyhow::Result;
use std::path::{Path, PathBuf};

/// A named template. Identity is the logical name; re-classifying a path
/// under `_layouts` updates the existing entity when the name matches.
#[derive(Debug, Clone)]
pub struct Layout {
    /// Logical name: file name minus the final extension
    pub name: String,
    /// Absolute source path
    pub source: PathBuf,
    /// Front-matter data (may declare a parent `layout`)
    pub front: FrontMatter,
    /// Raw template body
    pub body: String,
}

impl Layout {
    /// Derive the logical name from a file name.
    pub fn derive_name(path: &Path) -> String {
        path.file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string()
    }

    /// Construct a layout from its source file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let doc = Document::read(path)?;
        Ok(Self {
            name: Self::derive_name(path),
            source: path.to_path_buf(),
            front: doc.front,
            body: doc.body,
        })
    }

    /// Reread front matter and body from disk, keeping the logical name.
    pub fn reread(&mut self) -> Result<()> {
        let doc = Document::read(&self.source)?;
        self.front = doc.front;
        self.body = doc.body;
        Ok(())
    }

    /// Parent layout name, if this layout chains to another.
    pub fn parent(&self) -> Option<&str> {
        self.front.layout()
    }
}
