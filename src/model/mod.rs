//! In-memory content model.
//!
//! The [`Site`] aggregate owns every content entity plus the derived
//! category and tag indices. It stores and indexes, nothing more; the
//! build and rebuild engines drive all mutation.
//!
//! Entity identity is the canonical source path (for layouts, the logical
//! name). Re-resolving a known path mutates the existing entity in place;
//! the collections never hold two entities for one source file.

pub mod front_matter;
pub mod layout;
pub mod page;
pub mod post;

pub use layout::Layout;
pub use page::{Page, StaticFile};
pub use post::Post;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// The site's mutable in-memory state, maintained across partial rebuilds.
#[derive(Debug, Default)]
pub struct Site {
    /// Posts, kept sorted by date descending (newest first)
    pub posts: Vec<Post>,
    /// Rendered pages
    pub pages: Vec<Page>,
    /// Layouts keyed by logical name
    pub layouts: BTreeMap<String, Layout>,
    /// Verbatim-copied files
    pub static_files: Vec<StaticFile>,
    /// Category name to ordered post source paths
    pub categories: BTreeMap<String, Vec<PathBuf>>,
    /// Tag name to ordered post source paths
    pub tags: BTreeMap<String, Vec<PathBuf>>,
}

impl Site {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all entities and indices; the cold build starts here.
    pub fn reset(&mut self) {
        self.posts.clear();
        self.pages.clear();
        self.layouts.clear();
        self.static_files.clear();
        self.categories.clear();
        self.tags.clear();
    }

    /// Index of the post with the given source path.
    pub fn post_index(&self, source: &Path) -> Option<usize> {
        self.posts.iter().position(|p| p.source == source)
    }

    /// Index of the page with the given source path.
    pub fn page_index(&self, source: &Path) -> Option<usize> {
        self.pages.iter().position(|p| p.source == source)
    }

    /// Name of the layout loaded from the given source path.
    pub fn layout_name_by_source(&self, source: &Path) -> Option<String> {
        self.layouts
            .values()
            .find(|l| l.source == source)
            .map(|l| l.name.clone())
    }

    /// Whether a static file with the given source path is tracked.
    pub fn has_static_file(&self, source: &Path) -> bool {
        self.static_files.iter().any(|f| f.source == source)
    }

    /// Insert a post, updating the category and tag indices.
    ///
    /// Upsert semantics: an existing post with the same source path is
    /// replaced in place, never duplicated.
    pub fn insert_post(&mut self, post: Post) {
        for category in &post.categories {
            push_unique(self.categories.entry(category.clone()).or_default(), &post.source);
        }
        for tag in &post.tags {
            push_unique(self.tags.entry(tag.clone()).or_default(), &post.source);
        }
        match self.post_index(&post.source) {
            Some(i) => self.posts[i] = post,
            None => self.posts.push(post),
        }
    }

    /// Re-sort the post collection, newest first.
    ///
    /// Recomputed wholesale after every insertion batch; the ordering is
    /// the one surfaced to templates.
    pub fn sort_posts(&mut self) {
        self.posts
            .sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.slug.cmp(&b.slug)));
    }
}

/// Append a source path to an ordered set, skipping duplicates.
fn push_unique(set: &mut Vec<PathBuf>, path: &Path) {
    if !set.iter().any(|p| p == path) {
        set.push(path.to_path_buf());
    }
}

// ============================================================================
// Tests
// ============================================================================
