//! Layout dependency tracking.
//!
//! Posts and pages depend transitively on the layout they declare:
//! changing `_layouts/post.html` must re-render every entity whose layout
//! chain passes through `post`. The reverse closure is re-derived on each
//! call; nothing is cached, so the answer always reflects the current
//! layout mapping.

use crate::model::{Layout, Site};
use rustc_hash::FxHashSet;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// An entity scheduled for re-render, keyed by its source path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    Post(PathBuf),
    Page(PathBuf),
    Static(PathBuf),
}

impl Target {
    /// The source path identifying the underlying entity.
    pub fn source(&self) -> &PathBuf {
        match self {
            Self::Post(p) | Self::Page(p) | Self::Static(p) => p,
        }
    }
}

/// Whether an entity declaring `declared` renders (transitively) through
/// the layout named `target`.
///
/// The visited set breaks cyclic layout chains: a name already checked on
/// the current call chain terminates the walk as non-matching. A direct
/// match wins before the cycle check can trigger, so an entity declaring
/// the target itself always matches even inside a cycle. A declared name
/// missing from the mapping terminates the chain as non-matching.
pub fn uses_layout(
    layouts: &BTreeMap<String, Layout>,
    target: &str,
    declared: Option<&str>,
    visited: &mut FxHashSet<String>,
) -> bool {
    let Some(name) = declared else {
        return false;
    };
    if visited.contains(name) {
        return false;
    }
    if name == target {
        return true;
    }
    visited.insert(name.to_string());
    match layouts.get(name) {
        Some(layout) => uses_layout(layouts, target, layout.parent(), visited),
        None => false,
    }
}

/// Every post and page whose layout chain reaches the given layout name.
///
/// Entities with no declared layout never match.
pub fn affected_by_layout(site: &Site, name: &str) -> Vec<Target> {
    let mut affected = Vec::new();

    for post in &site.posts {
        let mut visited = FxHashSet::default();
        if uses_layout(&site.layouts, name, post.layout(), &mut visited) {
            affected.push(Target::Post(post.source.clone()));
        }
    }
    for page in &site.pages {
        let mut visited = FxHashSet::default();
        if uses_layout(&site.layouts, name, page.layout(), &mut visited) {
            affected.push(Target::Page(page.source.clone()));
        }
    }

    affected
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Page, Post};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn layout_named(root: &Path, name: &str, parent: Option<&str>) -> Layout {
        let path = root.join(format!("{name}.html"));
        let content = match parent {
            Some(p) => format!("---\nlayout: {p}\n---\n{{{{ content }}}}"),
            None => "{{ content }}".to_string(),
        };
        fs::write(&path, content).unwrap();
        Layout::from_path(&path).unwrap()
    }

    fn layouts_from(entries: Vec<Layout>) -> BTreeMap<String, Layout> {
        entries.into_iter().map(|l| (l.name.clone(), l)).collect()
    }

    #[test]
    fn test_direct_match() {
        let tmp = TempDir::new().unwrap();
        let layouts = layouts_from(vec![layout_named(tmp.path(), "post", None)]);
        let mut visited = FxHashSet::default();
        assert!(uses_layout(&layouts, "post", Some("post"), &mut visited));
    }

    #[test]
    fn test_no_declared_layout_never_matches() {
        let tmp = TempDir::new().unwrap();
        let layouts = layouts_from(vec![layout_named(tmp.path(), "post", None)]);
        let mut visited = FxHashSet::default();
        assert!(!uses_layout(&layouts, "post", None, &mut visited));
    }

    #[test]
    fn test_transitive_chain() {
        let tmp = TempDir::new().unwrap();
        let layouts = layouts_from(vec![
            layout_named(tmp.path(), "default", None),
            layout_named(tmp.path(), "post", Some("default")),
        ]);
        let mut visited = FxHashSet::default();
        assert!(uses_layout(&layouts, "default", Some("post"), &mut visited));
    }

    #[test]
    fn test_missing_layout_terminates() {
        let tmp = TempDir::new().unwrap();
        let layouts = layouts_from(vec![layout_named(tmp.path(), "post", Some("ghost"))]);
        let mut visited = FxHashSet::default();
        assert!(!uses_layout(&layouts, "default", Some("post"), &mut visited));
    }

    #[test]
    fn test_cycle_terminates_and_direct_match_wins() {
        let tmp = TempDir::new().unwrap();
        // a declares parent b, b declares parent a
        let layouts = layouts_from(vec![
            layout_named(tmp.path(), "a", Some("b")),
            layout_named(tmp.path(), "b", Some("a")),
        ]);

        // Direct match on a cyclic chain still evaluates true
        let mut visited = FxHashSet::default();
        assert!(uses_layout(&layouts, "a", Some("a"), &mut visited));

        // Non-matching target terminates instead of recursing forever
        let mut visited = FxHashSet::default();
        assert!(!uses_layout(&layouts, "zzz", Some("a"), &mut visited));
    }

    #[test]
    fn test_affected_by_layout_scans_posts_and_pages() {
        let tmp = TempDir::new().unwrap();
        let mut site = Site::new();
        for layout in [
            layout_named(tmp.path(), "default", None),
            layout_named(tmp.path(), "post", Some("default")),
            layout_named(tmp.path(), "page", None),
        ] {
            site.layouts.insert(layout.name.clone(), layout);
        }

        fs::create_dir_all(tmp.path().join("_posts")).unwrap();
        for (name, layout) in [
            ("2020-01-01-a.md", "post"),
            ("2020-01-02-b.md", "post"),
            ("2020-01-03-c.md", "page"),
        ] {
            let path = tmp.path().join("_posts").join(name);
            fs::write(&path, format!("---\nlayout: {layout}\n---\nx")).unwrap();
            site.insert_post(Post::from_path(&path, tmp.path()).unwrap());
        }

        let page_path = tmp.path().join("about.md");
        fs::write(&page_path, "---\nlayout: default\n---\nx").unwrap();
        site.pages.push(Page::from_path(&page_path, tmp.path()).unwrap());

        // Changing `default` affects the two posts chaining through `post`
        // plus the page declaring it directly; the `page`-layout post stays out.
        let affected = affected_by_layout(&site, "default");
        assert_eq!(affected.len(), 3);

        let affected = affected_by_layout(&site, "post");
        assert_eq!(affected.len(), 2);
    }
}
