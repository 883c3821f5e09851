//! Path classification for the build and rebuild pipeline.
//!
//! Maps an arbitrary filesystem path to a semantic content kind, deciding
//! whether it may enter the site at all. The verdict drives the rebuild
//! strategy:
//!
//! | Kind     | Found under     | Rebuild effect                     |
//! |----------|-----------------|------------------------------------|
//! | Post     | `_posts/`       | Re-render that post                |
//! | Layout   | `_layouts/`     | Re-render everything using it      |
//! | Include  | `_includes/`    | None (no include tracking)         |
//! | File     | anywhere else   | Re-render page / re-copy static    |
//!
//! Classification walks the containing directory upward toward the source
//! root, so a file is judged by every directory between it and the root.
//! Results are produced fresh on every call; exclusion rules and directory
//! structure may change between invocations, so nothing is cached.

use crate::config::{SiteConfig, absolutize};
use std::path::{Path, PathBuf};

/// Reserved directory basenames and the kinds they confer.
const RESERVED_DIRS: &[(&str, PathKind)] = &[
    ("_layouts", PathKind::Layout),
    ("_includes", PathKind::Include),
    ("_posts", PathKind::Post),
];

/// Names starting with one of these are hidden/backup files.
const FILTER_PREFIXES: &[char] = &['.', '_', '#'];

/// Names ending with one of these are editor backup files.
const FILTER_SUFFIXES: &[char] = &['~'];

/// Always allowed despite its leading dot.
const HTACCESS: &str = ".htaccess";

/// Semantic content kind of a classified path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    /// File under a `_posts` directory
    Post,
    /// File under a `_layouts` directory
    Layout,
    /// File under an `_includes` directory
    Include,
    /// Plain file: rendered page or static asset
    File,
}

/// Why a path was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invalid {
    /// The file or one of its parent directories is a symbolic link
    Symlink,
    /// The path lives under the destination root
    InDestination,
    /// A path segment is hidden, a backup file, or explicitly excluded
    Excluded,
    /// The walk reached the filesystem root without finding the source root
    Orphan,
}

impl Invalid {
    /// Short explanation for diagnostics.
    pub const fn reason(self) -> &'static str {
        match self {
            Self::Symlink => "symlink",
            Self::InDestination => "inside destination",
            Self::Excluded => "excluded name",
            Self::Orphan => "outside source root",
        }
    }
}

/// Classification result. Transient: never stored in the content model.
#[derive(Debug, Clone)]
pub struct ContentPath {
    /// Absolute, normalized path
    pub path: PathBuf,
    /// Semantic kind; meaningful only when `invalid` is `None`
    pub kind: PathKind,
    /// Rejection cause, if any
    pub invalid: Option<Invalid>,
}

impl ContentPath {
    pub const fn is_valid(&self) -> bool {
        self.invalid.is_none()
    }

    /// File name component of the classified path.
    pub fn name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }
}

/// Pure classifier over the site roots and exclusion configuration.
///
/// Holds no reference to the content model; the same input always yields
/// the same verdict for an unchanged filesystem.
pub struct Classifier {
    source: PathBuf,
    destination: PathBuf,
    exclude: Vec<String>,
    include: Vec<String>,
}

impl Classifier {
    pub fn new(config: &SiteConfig) -> Self {
        Self {
            source: config.source().to_path_buf(),
            destination: config.destination().to_path_buf(),
            exclude: config.build.exclude.clone(),
            include: config.build.include.clone(),
        }
    }

    /// Classify an absolute or working-directory-relative path.
    pub fn classify(&self, path: &Path) -> ContentPath {
        let path = absolutize(path);
        let invalid_at = |invalid| ContentPath {
            path: path.clone(),
            kind: PathKind::File,
            invalid: Some(invalid),
        };

        // Leaf checks: the file itself must not be a symlink and its own
        // name must pass the exclusion policy.
        if path.is_symlink() {
            return invalid_at(Invalid::Symlink);
        }
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if !self.allowed(name) {
            return invalid_at(Invalid::Excluded);
        }

        let mut kind = PathKind::File;
        let mut dir = path.parent();

        // Walk the containing directories outward toward the source root.
        // The nearest enclosing reserved directory determines the kind.
        while let Some(current) = dir {
            if current == self.destination {
                return invalid_at(Invalid::InDestination);
            }
            if current == self.source {
                return ContentPath {
                    path,
                    kind,
                    invalid: None,
                };
            }
            let Some(basename) = current.file_name().and_then(|n| n.to_str()) else {
                // Filesystem root reached without meeting the source root.
                return invalid_at(Invalid::Orphan);
            };
            if current.is_symlink() {
                return invalid_at(Invalid::Symlink);
            }
            if let Some((_, reserved)) = RESERVED_DIRS.iter().find(|(n, _)| *n == basename) {
                if matches!(kind, PathKind::File) {
                    kind = *reserved;
                }
            } else if !self.allowed(basename) {
                return invalid_at(Invalid::Excluded);
            }
            dir = current.parent();
        }

        invalid_at(Invalid::Orphan)
    }

    /// Exclusion policy for a single path segment.
    ///
    /// Whitelisting short-circuits the hidden/backup rule; the explicit
    /// exclude list rejects regardless of it.
    pub fn allowed(&self, name: &str) -> bool {
        if self.whitelisted(name) {
            return true;
        }
        self.allowed_name(name) && !self.exclude.iter().any(|e| e == name)
    }

    fn whitelisted(&self, name: &str) -> bool {
        name == HTACCESS || self.include.iter().any(|i| i == name)
    }

    /// Hidden/backup-file rule on a bare name.
    fn allowed_name(&self, name: &str) -> bool {
        let starts_filtered = name
            .chars()
            .next()
            .is_some_and(|c| FILTER_PREFIXES.contains(&c));
        let ends_filtered = name
            .chars()
            .next_back()
            .is_some_and(|c| FILTER_SUFFIXES.contains(&c));
        !(starts_filtered || ends_filtered)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn classifier_at(root: &Path) -> Classifier {
        Classifier {
            source: root.join("src"),
            destination: root.join("dest"),
            exclude: vec!["drafts".to_string()],
            include: vec!["_keepme".to_string()],
        }
    }

    fn fixture() -> (TempDir, Classifier) {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().to_path_buf();
        fs::create_dir_all(root.join("src/_posts")).unwrap();
        fs::create_dir_all(root.join("src/_layouts")).unwrap();
        fs::create_dir_all(root.join("dest")).unwrap();
        let classifier = classifier_at(&root);
        (tmp, classifier)
    }

    #[test]
    fn test_plain_file_under_source() {
        let (tmp, classifier) = fixture();
        let cp = classifier.classify(&tmp.path().join("src/about.md"));
        assert!(cp.is_valid());
        assert_eq!(cp.kind, PathKind::File);
    }

    #[test]
    fn test_post_kind() {
        let (tmp, classifier) = fixture();
        let cp = classifier.classify(&tmp.path().join("src/_posts/2020-01-01-hi.md"));
        assert!(cp.is_valid());
        assert_eq!(cp.kind, PathKind::Post);
    }

    #[test]
    fn test_layout_kind() {
        let (tmp, classifier) = fixture();
        let cp = classifier.classify(&tmp.path().join("src/_layouts/post.html"));
        assert!(cp.is_valid());
        assert_eq!(cp.kind, PathKind::Layout);
    }

    #[test]
    fn test_nearest_reserved_dir_wins() {
        let (tmp, classifier) = fixture();
        // _posts nested inside _layouts: the innermost reserved dir decides
        let cp = classifier.classify(&tmp.path().join("src/_layouts/_posts/2020-01-01-x.md"));
        assert!(cp.is_valid());
        assert_eq!(cp.kind, PathKind::Post);
    }

    #[test]
    fn test_nested_posts_dir() {
        let (tmp, classifier) = fixture();
        let cp = classifier.classify(&tmp.path().join("src/blog/_posts/2020-01-01-x.md"));
        assert!(cp.is_valid());
        assert_eq!(cp.kind, PathKind::Post);
    }

    #[test]
    fn test_destination_is_invalid() {
        let (tmp, classifier) = fixture();
        let cp = classifier.classify(&tmp.path().join("dest/2020/01/01/hi/index.html"));
        assert_eq!(cp.invalid, Some(Invalid::InDestination));
    }

    #[test]
    fn test_orphan_outside_source() {
        let (_tmp, classifier) = fixture();
        let cp = classifier.classify(Path::new("/elsewhere/file.md"));
        assert_eq!(cp.invalid, Some(Invalid::Orphan));
    }

    #[test]
    fn test_hidden_and_backup_names_rejected() {
        let (tmp, classifier) = fixture();
        for name in [".hidden.md", "#lock.md", "save.md~"] {
            let cp = classifier.classify(&tmp.path().join("src").join(name));
            assert_eq!(cp.invalid, Some(Invalid::Excluded), "{name}");
        }
    }

    #[test]
    fn test_htaccess_whitelisted() {
        let (tmp, classifier) = fixture();
        let cp = classifier.classify(&tmp.path().join("src/.htaccess"));
        assert!(cp.is_valid());
    }

    #[test]
    fn test_include_list_whitelists_underscore_name() {
        let (tmp, classifier) = fixture();
        let cp = classifier.classify(&tmp.path().join("src/_keepme"));
        assert!(cp.is_valid());
    }

    #[test]
    fn test_configured_exclude_rejects() {
        let (tmp, classifier) = fixture();
        let cp = classifier.classify(&tmp.path().join("src/drafts/wip.md"));
        assert_eq!(cp.invalid, Some(Invalid::Excluded));
    }

    #[test]
    fn test_excluded_parent_dir_rejects_leaf() {
        let (tmp, classifier) = fixture();
        let cp = classifier.classify(&tmp.path().join("src/.git/config"));
        assert_eq!(cp.invalid, Some(Invalid::Excluded));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_file_rejected() {
        let (tmp, classifier) = fixture();
        let target = tmp.path().join("src/real.md");
        fs::write(&target, "hello").unwrap();
        let link = tmp.path().join("src/link.md");
        std::os::unix::fs::symlink(&target, &link).unwrap();
        let cp = classifier.classify(&link);
        assert_eq!(cp.invalid, Some(Invalid::Symlink));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_dir_rejected() {
        let (tmp, classifier) = fixture();
        let real = tmp.path().join("src/real");
        fs::create_dir_all(&real).unwrap();
        let link = tmp.path().join("src/linkdir");
        std::os::unix::fs::symlink(&real, &link).unwrap();
        let cp = classifier.classify(&link.join("inner.md"));
        assert_eq!(cp.invalid, Some(Invalid::Symlink));
    }

    #[test]
    fn test_classification_is_deterministic() {
        let (tmp, classifier) = fixture();
        let path = tmp.path().join("src/blog/_posts/2020-01-01-x.md");
        let first = classifier.classify(&path);
        let second = classifier.classify(&path);
        assert_eq!(first.kind, second.kind);
        assert_eq!(first.invalid, second.invalid);
        assert_eq!(first.path, second.path);
    }
}
