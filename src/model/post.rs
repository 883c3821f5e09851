//! Post entity: dated content under a `_posts` directory.
//!
//! Post file names must follow the `YYYY-MM-DD-slug.ext` convention; the
//! date embedded in the name is the publish date unless front matter
//! overrides it. Directory components between the source root and the
//! `_posts` directory become categories.

use super::front_matter::{Document, FrontMatter};
use anyhow::{Result, bail};
use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use std::{
    path::{Component, Path, PathBuf},
    sync::LazyLock,
};

/// Post filename convention: date prefix, slug, extension.
static MATCHER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4})-(\d{2})-(\d{2})-(.+)\.([^.]+)$").unwrap()
});

/// A dated post. Identity is the source path; re-resolving the same path
/// must update this entity in place, never append a duplicate.
#[derive(Debug, Clone)]
pub struct Post {
    /// Absolute source path (unique key)
    pub source: PathBuf,
    /// Slug from the file name, date prefix stripped
    pub slug: String,
    /// Source file extension
    pub ext: String,
    /// Publish date: front matter override or the file name prefix
    pub date: NaiveDateTime,
    /// Categories: directories above `_posts` plus front matter
    pub categories: Vec<String>,
    /// Tags from front matter
    pub tags: Vec<String>,
    /// Front-matter data (may declare a `layout`)
    pub front: FrontMatter,
    /// Raw body
    pub body: String,
    /// Rendered output, present only after render
    pub output: Option<String>,
    /// Publish flag from front matter
    pub published: bool,
    /// Date parsed from the file name; fallback when front matter has none
    name_date: NaiveDateTime,
    /// Categories derived from the directory structure, stable across rereads
    dir_categories: Vec<String>,
}

impl Post {
    /// Check a bare file name against the post naming convention.
    pub fn valid_name(name: &str) -> bool {
        MATCHER.is_match(name)
    }

    /// Construct a post from its source file.
    ///
    /// Fails when the file name does not carry a parsable date prefix or
    /// the file cannot be read.
    pub fn from_path(path: &Path, source_root: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        let Some(caps) = MATCHER.captures(name) else {
            bail!("not a valid post name: {name:?}");
        };

        let date = date_from_captures(&caps)
            .ok_or_else(|| anyhow::anyhow!("invalid date in post name: {name:?}"))?;
        let slug = caps[4].to_string();
        let ext = caps[5].to_string();

        let doc = Document::read(path)?;
        let dir_categories = dir_categories(path, source_root);
        let mut post = Self {
            source: path.to_path_buf(),
            slug,
            ext,
            date,
            categories: Vec::new(),
            tags: Vec::new(),
            front: FrontMatter::default(),
            body: String::new(),
            output: None,
            published: true,
            name_date: date,
            dir_categories,
        };
        post.apply(doc);
        Ok(post)
    }

    /// Reread front matter and body from disk, updating in place.
    ///
    /// The source path, slug and directory categories are stable; date,
    /// tags and the publish flag follow the fresh front matter.
    pub fn reread(&mut self) -> Result<()> {
        let doc = Document::read(&self.source)?;
        self.apply(doc);
        Ok(())
    }

    fn apply(&mut self, doc: Document) {
        self.date = doc.front.date().unwrap_or(self.name_date);
        self.published = doc.front.published();
        self.tags = doc.front.list("tags");

        let mut categories = self.dir_categories.clone();
        for extra in doc
            .front
            .list("categories")
            .into_iter()
            .chain(doc.front.list("category"))
        {
            if !categories.contains(&extra) {
                categories.push(extra);
            }
        }
        self.categories = categories;

        self.front = doc.front;
        self.body = doc.body;
        self.output = None;
    }

    /// Declared layout name.
    pub fn layout(&self) -> Option<&str> {
        self.front.layout()
    }

    /// Publish policy: the publish flag must be set and future-dated posts
    /// need the `future` option.
    pub fn publishable(&self, future: bool, now: NaiveDateTime) -> bool {
        self.published && (future || self.date <= now)
    }

    /// Destination path relative to the destination root:
    /// `<categories…>/<YYYY>/<MM>/<DD>/<slug>/index.html`.
    pub fn destination_rel(&self) -> PathBuf {
        let mut path = PathBuf::new();
        for category in &self.categories {
            path.push(category);
        }
        path.push(self.date.format("%Y").to_string());
        path.push(self.date.format("%m").to_string());
        path.push(self.date.format("%d").to_string());
        path.push(&self.slug);
        path.push("index.html");
        path
    }

    /// Site-absolute URL of the rendered post.
    pub fn url(&self) -> String {
        let rel = self.destination_rel();
        let dir = rel.parent().unwrap_or(&rel);
        format!("/{}/", dir.display())
    }

    /// Payload metadata surfaced to templates.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "url": self.url(),
            "date": self.date.format("%Y-%m-%d %H:%M:%S").to_string(),
            "slug": self.slug,
            "title": self.front.get_str("title"),
            "categories": self.categories,
            "tags": self.tags,
            "data": self.front.to_json(),
        })
    }
}

/// Parse the date prefix captured from a post file name.
fn date_from_captures(caps: &regex::Captures) -> Option<NaiveDateTime> {
    let year = caps[1].parse().ok()?;
    let month = caps[2].parse().ok()?;
    let day = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(0, 0, 0)
}

/// Categories from the directory components above the `_posts` directory,
/// relative to the source root.
fn dir_categories(path: &Path, source_root: &Path) -> Vec<String> {
    let rel = path.strip_prefix(source_root).unwrap_or(path);
    let mut seen = Vec::new();
    for component in rel.components() {
        let Component::Normal(name) = component else {
            continue;
        };
        let Some(name) = name.to_str() else { continue };
        if name == "_posts" {
            return seen;
        }
        seen.push(name.to_string());
    }
    Vec::new()
}

// ============================================================================
// Tests
// ============================================================================
