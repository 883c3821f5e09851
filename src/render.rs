//! Rendering pipeline and output writer.
//!
//! # Pipeline
//!
//! ```text
//! raw body ──► markdown transform ──► layout chain ──► destination file
//!              (strategy object)      (cycle-guarded)
//! ```
//!
//! The markdown backend and the template backend are strategy objects
//! chosen once at construction from configuration; behavior is never
//! redefined at runtime. The template seam is deliberately small: the
//! default backend substitutes the rendered content into the layout's
//! `{{ content }}` slot, and anything richer plugs in behind the
//! [`TemplateBackend`] trait.

use crate::config::SiteConfig;
use crate::log;
use crate::model::{Layout, Page, Post, StaticFile, page::{is_markup_ext, is_markup_ext_name}};
use anyhow::{Context, Result};
use chrono::Local;
use pulldown_cmark::{Parser, html};
use rustc_hash::FxHashSet;
use serde_json::Value;
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

/// Slot replaced with the rendered content when wrapping in a layout.
const CONTENT_SLOT: &str = "{{ content }}";

// ============================================================================
// Strategies
// ============================================================================

/// Text-to-HTML transform applied to markup-family bodies.
pub trait MarkdownEngine {
    fn transform(&self, text: &str) -> String;
}

/// CommonMark rendering via pulldown-cmark.
pub struct CommonMark;

impl MarkdownEngine for CommonMark {
    fn transform(&self, text: &str) -> String {
        let parser = Parser::new(text);
        let mut out = String::with_capacity(text.len() * 2);
        html::push_html(&mut out, parser);
        out
    }
}

/// Passthrough: the body is already HTML or should stay raw.
pub struct Raw;

impl MarkdownEngine for Raw {
    fn transform(&self, text: &str) -> String {
        text.to_string()
    }
}

/// Template execution seam. The concrete engine is an external
/// collaborator; the built-in backend only fills the content slot.
pub trait TemplateBackend {
    fn render(&self, template: &str, content: &str, payload: &Value) -> String;
}

/// Default backend: substitute `{{ content }}`.
pub struct SlotTemplate;

impl TemplateBackend for SlotTemplate {
    fn render(&self, template: &str, content: &str, _payload: &Value) -> String {
        template.replace(CONTENT_SLOT, content)
    }
}

// ============================================================================
// Renderer
// ============================================================================

/// Renders entities against the layout mapping and a payload snapshot.
pub struct Renderer {
    markdown: Box<dyn MarkdownEngine>,
    backend: Box<dyn TemplateBackend>,
}

impl Renderer {
    /// Select strategies from configuration.
    ///
    /// An unknown markdown backend name is a configuration-time diagnostic,
    /// not a crash: the documents are left untransformed.
    pub fn from_config(config: &SiteConfig) -> Self {
        let markdown: Box<dyn MarkdownEngine> = match config.build.markdown.as_str() {
            "commonmark" | "markdown" => Box::new(CommonMark),
            "none" | "" => Box::new(Raw),
            other => {
                log!("warn"; "unknown markdown backend {other:?}, leaving bodies raw (expected \"commonmark\" or \"none\")");
                Box::new(Raw)
            }
        };
        Self {
            markdown,
            backend: Box::new(SlotTemplate),
        }
    }

    /// Transform a body and wrap it in its layout chain.
    fn render_body(
        &self,
        body: &str,
        markup: bool,
        declared: Option<&str>,
        layouts: &BTreeMap<String, Layout>,
        payload: &Value,
    ) -> String {
        let mut content = if markup {
            self.markdown.transform(body)
        } else {
            body.to_string()
        };

        let mut visited = FxHashSet::default();
        let mut next = declared.map(str::to_string);
        while let Some(name) = next {
            if !visited.insert(name.clone()) {
                // Cyclic layout chain; stop wrapping
                break;
            }
            let Some(layout) = layouts.get(&name) else {
                break;
            };
            content = self.backend.render(&layout.body, &content, payload);
            next = layout.parent().map(str::to_string);
        }
        content
    }

    /// Render a post, storing the output on the entity.
    pub fn render_post(
        &self,
        post: &mut Post,
        layouts: &BTreeMap<String, Layout>,
        payload: &Value,
    ) {
        let markup = is_markup_ext_name(&post.ext);
        let declared = post.layout().map(str::to_string);
        let out = self.render_body(&post.body, markup, declared.as_deref(), layouts, payload);
        post.output = Some(out);
    }

    /// Render a page, storing the output on the entity.
    pub fn render_page(
        &self,
        page: &mut Page,
        layouts: &BTreeMap<String, Layout>,
        payload: &Value,
    ) {
        let markup = is_markup_ext(&page.rel_path);
        let declared = page.layout().map(str::to_string);
        let out = self.render_body(&page.body, markup, declared.as_deref(), layouts, payload);
        page.output = Some(out);
    }
}

// ============================================================================
// Output writer
// ============================================================================

/// Write a rendered post under the destination root.
///
/// The publish predicate is re-checked here, not only at construction:
/// front matter is reread on every change, so the flag may have flipped
/// since classification. An unpublishable post yields `Ok(None)` rather
/// than an error.
pub fn write_post(post: &Post, dest_root: &Path, future: bool) -> Result<Option<PathBuf>> {
    if !post.publishable(future, Local::now().naive_local()) {
        return Ok(None);
    }
    let Some(output) = &post.output else {
        return Ok(None);
    };
    let rel = post.destination_rel();
    write_file(&dest_root.join(&rel), output)?;
    Ok(Some(rel))
}

/// Write a rendered page under the destination root.
pub fn write_page(page: &Page, dest_root: &Path) -> Result<Option<PathBuf>> {
    if !page.published() {
        return Ok(None);
    }
    let Some(output) = &page.output else {
        return Ok(None);
    };
    let rel = page.destination_rel();
    write_file(&dest_root.join(&rel), output)?;
    Ok(Some(rel))
}

/// Copy a static file byte-for-byte to its mirrored destination.
pub fn copy_static(file: &StaticFile, dest_root: &Path) -> Result<PathBuf> {
    let rel = file.destination_rel().to_path_buf();
    let dest = dest_root.join(&rel);
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::copy(&file.source, &dest).with_context(|| {
        format!("failed to copy {} to {}", file.source.display(), dest.display())
    })?;
    Ok(rel)
}

/// Write content, creating any missing destination directories.
fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Layout;
    use std::fs;
    use tempfile::TempDir;

    fn renderer() -> Renderer {
        Renderer {
            markdown: Box::new(CommonMark),
            backend: Box::new(SlotTemplate),
        }
    }

    fn layout(tmp: &TempDir, name: &str, content: &str) -> Layout {
        let path = tmp.path().join(format!("{name}.html"));
        fs::write(&path, content).unwrap();
        Layout::from_path(&path).unwrap()
    }

    #[test]
    fn test_markdown_transform() {
        let html = CommonMark.transform("# Title");
        assert!(html.contains("<h1>Title</h1>"));
    }

    #[test]
    fn test_raw_passthrough() {
        assert_eq!(Raw.transform("# Title"), "# Title");
    }

    #[test]
    fn test_layout_chain_wraps_content() {
        let tmp = TempDir::new().unwrap();
        let mut layouts = BTreeMap::new();
        let outer = layout(&tmp, "default", "<html>{{ content }}</html>");
        layouts.insert(outer.name.clone(), outer);
        let inner = layout(&tmp, "post", "---\nlayout: default\n---\n<article>{{ content }}</article>");
        layouts.insert(inner.name.clone(), inner);

        let out = renderer().render_body("hello", false, Some("post"), &layouts, &Value::Null);
        assert_eq!(out, "<html><article>hello</article></html>");
    }

    #[test]
    fn test_cyclic_layout_chain_terminates() {
        let tmp = TempDir::new().unwrap();
        let mut layouts = BTreeMap::new();
        let a = layout(&tmp, "a", "---\nlayout: b\n---\nA[{{ content }}]");
        layouts.insert(a.name.clone(), a);
        let b = layout(&tmp, "b", "---\nlayout: a\n---\nB[{{ content }}]");
        layouts.insert(b.name.clone(), b);

        // a -> b -> a: each layout applied once, then the cycle breaks
        let out = renderer().render_body("x", false, Some("a"), &layouts, &Value::Null);
        assert_eq!(out, "B[A[x]]");
    }

    #[test]
    fn test_missing_layout_leaves_content_unwrapped() {
        let layouts = BTreeMap::new();
        let out = renderer().render_body("x", false, Some("ghost"), &layouts, &Value::Null);
        assert_eq!(out, "x");
    }

    #[test]
    fn test_write_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("_posts")).unwrap();
        let src = tmp.path().join("_posts/2020-01-01-hi.md");
        fs::write(&src, "body").unwrap();

        let mut post = Post::from_path(&src, tmp.path()).unwrap();
        post.output = Some("rendered".to_string());

        let dest = tmp.path().join("out");
        let first = write_post(&post, &dest, false).unwrap().unwrap();
        let bytes_first = fs::read(dest.join(&first)).unwrap();
        let second = write_post(&post, &dest, false).unwrap().unwrap();
        let bytes_second = fs::read(dest.join(&second)).unwrap();

        assert_eq!(first, second);
        assert_eq!(bytes_first, bytes_second);
    }

    #[test]
    fn test_unpublishable_post_not_written() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("_posts")).unwrap();
        let src = tmp.path().join("_posts/2030-01-01-future.md");
        fs::write(&src, "body").unwrap();

        let mut post = Post::from_path(&src, tmp.path()).unwrap();
        post.output = Some("rendered".to_string());

        let dest = tmp.path().join("out");
        assert!(write_post(&post, &dest, false).unwrap().is_none());
        // future enabled: written
        assert!(write_post(&post, &dest, true).unwrap().is_some());
    }

    #[test]
    fn test_copy_static_creates_dirs() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("img")).unwrap();
        let src = tmp.path().join("img/logo.png");
        fs::write(&src, [1u8, 2, 3]).unwrap();

        let file = StaticFile::new(&src, tmp.path());
        let dest = tmp.path().join("out");
        let rel = copy_static(&file, &dest).unwrap();
        assert_eq!(rel, PathBuf::from("img/logo.png"));
        assert_eq!(fs::read(dest.join(rel)).unwrap(), vec![1, 2, 3]);
    }
}
