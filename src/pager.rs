//! Pagination slices for the post index.
//!
//! A file matching the configured pagination trigger is rendered once per
//! slice of the sorted post collection. Slice 1 keeps the file's own
//! destination name; slice *n* > 1 is written into a sibling directory
//! literally named `page<n>`.

use crate::model::Post;
use serde_json::{Value, json};

/// State for one pagination slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pager {
    pub page: usize,
    pub per_page: usize,
    pub total_posts: usize,
    pub total_pages: usize,
    pub previous_page: Option<usize>,
    pub next_page: Option<usize>,
}

impl Pager {
    /// Number of slices needed for `total_posts` posts.
    pub fn total_pages(total_posts: usize, per_page: usize) -> usize {
        if per_page == 0 {
            return 1;
        }
        total_posts.div_ceil(per_page).max(1)
    }

    /// Pager for slice `page` (1-based).
    pub fn new(page: usize, per_page: usize, total_posts: usize) -> Self {
        let total_pages = Self::total_pages(total_posts, per_page);
        Self {
            page,
            per_page,
            total_posts,
            total_pages,
            previous_page: (page > 1).then(|| page - 1),
            next_page: (page < total_pages).then(|| page + 1),
        }
    }

    /// The posts belonging to this slice, in site order.
    pub fn slice<'a>(&self, posts: &'a [Post]) -> &'a [Post] {
        if self.per_page == 0 {
            return posts;
        }
        let start = (self.page - 1) * self.per_page;
        let end = (start + self.per_page).min(posts.len());
        if start >= posts.len() {
            &[]
        } else {
            &posts[start..end]
        }
    }

    /// The `paginator` payload object for this slice.
    pub fn to_json(&self, posts: &[Post]) -> Value {
        let slice: Vec<Value> = self.slice(posts).iter().map(Post::to_json).collect();
        json!({
            "page": self.page,
            "per_page": self.per_page,
            "posts": slice,
            "total_posts": self.total_posts,
            "total_pages": self.total_pages,
            "previous_page": self.previous_page,
            "next_page": self.next_page,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
