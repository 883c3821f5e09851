//! Incremental rebuild engine.
//!
//! Takes a batch of changed source paths from the watcher, resolves each
//! to the content entities it affects, re-renders exactly those and
//! returns the destination-relative paths actually rewritten.
//!
//! # Resolution Table
//!
//! | changed path            | resolves to                                  |
//! |-------------------------|----------------------------------------------|
//! | config file (by name)   | full batch build, everything else ignored    |
//! | under destination root  | dropped before classification                |
//! | invalid (classifier)    | warning, skipped                             |
//! | post                    | that post, reread or newly constructed       |
//! | layout                  | every post/page rendering through it         |
//! | include                 | nothing (no include tracking)                |
//! | plain file              | the matching page or static file             |
//!
//! Per-call consistency: the site payload is computed once after all
//! model mutations, so every entity in a batch renders against the same
//! snapshot. A rejected post aborts the call, but mutations already
//! applied for earlier paths in the batch stay applied.

use crate::build::build_site;
use crate::classify::{Classifier, PathKind};
use crate::config::{SiteConfig, absolutize};
use crate::deps::{Target, affected_by_layout};
use crate::log;
use crate::model::{Layout, Page, Post, Site, StaticFile, front_matter::has_front_matter};
use crate::payload::site_payload;
use crate::render::{Renderer, copy_static, write_page, write_post};
use anyhow::Result;
use rustc_hash::FxHashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RebuildError {
    /// A changed file sits under `_posts` but its name does not carry a
    /// parseable date prefix.
    #[error("invalid post name: {0}")]
    InvalidPostName(String),

    /// A newly constructed post fails the publish policy.
    #[error("post not publishable: {0}")]
    NotPublishable(PathBuf),
}

/// Process one debounced change-set.
///
/// Returns the ordered, deduplicated destination-relative paths that
/// were rewritten. An empty result means nothing observable changed.
pub fn rebuild(
    site: &mut Site,
    config: &mut SiteConfig,
    changed: &[PathBuf],
) -> Result<Vec<PathBuf>> {
    // A touched config file invalidates exclusion rules, roots and the
    // renderer choice all at once, so nothing short of a cold build
    // against a freshly loaded configuration is safe to reuse.
    let config_name = config.config_path.file_name();
    if changed
        .iter()
        .any(|p| config_name.is_some() && p.file_name() == config_name)
    {
        log!("watch"; "configuration changed, rebuilding everything");
        reload_config(config);
        return build_site(site, config);
    }

    let classifier = Classifier::new(config);
    let renderer = Renderer::from_config(config);

    let mut targets: Vec<Target> = Vec::new();
    let mut seen: FxHashSet<PathBuf> = FxHashSet::default();
    let mut push = |targets: &mut Vec<Target>, target: Target| {
        if seen.insert(target.source().clone()) {
            targets.push(target);
        }
    };

    for raw in changed {
        let path = absolutize(raw);

        // Our own writes must never feed back into a rebuild.
        if path.starts_with(config.destination()) {
            continue;
        }

        let cp = classifier.classify(&path);
        if let Some(invalid) = &cp.invalid {
            log!("warn"; "skipping {}: {}", path.display(), invalid.reason());
            continue;
        }

        match cp.kind {
            PathKind::Post => {
                resolve_post(site, config, &path, cp.name())?;
                push(&mut targets, Target::Post(path));
            }
            PathKind::Layout => {
                let name = resolve_layout(site, &path)?;
                for target in affected_by_layout(site, &name) {
                    push(&mut targets, target);
                }
            }
            PathKind::Include => {
                log!("watch"; "include changed, no tracked dependents: {}", path.display());
            }
            PathKind::File => {
                if let Some(target) = resolve_file(site, config, &path)? {
                    push(&mut targets, target);
                }
            }
        }
    }

    if targets.is_empty() {
        return Ok(Vec::new());
    }

    site.sort_posts();

    // One snapshot for the whole batch
    let payload = site_payload(site, config);
    let mut written = Vec::new();

    for target in &targets {
        match target {
            Target::Post(source) => {
                let Some(i) = site.post_index(source) else {
                    continue;
                };
                let Site { posts, layouts, .. } = site;
                renderer.render_post(&mut posts[i], layouts, &payload);
                if let Some(rel) =
                    write_post(&posts[i], config.destination(), config.build.future)?
                {
                    written.push(rel);
                }
            }
            Target::Page(source) => {
                let Some(i) = site.page_index(source) else {
                    continue;
                };
                let Site { pages, layouts, .. } = site;
                renderer.render_page(&mut pages[i], layouts, &payload);
                if let Some(rel) = write_page(&pages[i], config.destination())? {
                    written.push(rel);
                }
            }
            Target::Static(source) => {
                if let Some(file) = site.static_files.iter().find(|f| &f.source == source) {
                    written.push(copy_static(file, config.destination())?);
                }
            }
        }
    }

    // Ordered dedup of outputs: distinct sources can share a destination
    let mut emitted: FxHashSet<PathBuf> = FxHashSet::default();
    written.retain(|p| emitted.insert(p.clone()));

    log!("watch"; "rebuilt {} files", written.len());
    Ok(written)
}

/// Re-read the configuration from disk before a config-triggered full
/// build. A file that fails to load or validate keeps the previous
/// configuration in force rather than aborting the watch session.
fn reload_config(config: &mut SiteConfig) {
    let fresh = SiteConfig::from_path(&config.config_path).and_then(|fresh| {
        fresh.validate()?;
        Ok(fresh)
    });
    match fresh {
        Ok(fresh) => *config = fresh,
        Err(e) => {
            log!("warn"; "keeping previous configuration: {e:#}");
        }
    }
}

/// Reuse an existing post by source path or construct a fresh one. A
/// rejection here is fatal for the whole call.
fn resolve_post(site: &mut Site, config: &SiteConfig, path: &Path, name: &str) -> Result<()> {
    if let Some(i) = site.post_index(path) {
        site.posts[i].reread()?;
        return Ok(());
    }
    if !Post::valid_name(name) {
        return Err(RebuildError::InvalidPostName(name.to_string()).into());
    }
    let now = chrono::Local::now().naive_local();
    let post = Post::from_path(path, config.source())?;
    if !post.publishable(config.build.future, now) {
        return Err(RebuildError::NotPublishable(path.to_path_buf()).into());
    }
    site.insert_post(post);
    Ok(())
}

/// Reuse an existing layout by source path or insert a fresh one under
/// its derived name. Returns the logical name for fan-out.
fn resolve_layout(site: &mut Site, path: &Path) -> Result<String> {
    if let Some(name) = site.layout_name_by_source(path) {
        if let Some(layout) = site.layouts.get_mut(&name) {
            layout.reread()?;
        }
        return Ok(name);
    }
    let layout = Layout::from_path(path)?;
    let name = layout.name.clone();
    site.layouts.insert(name.clone(), layout);
    Ok(name)
}

/// Resolve a plain file to a tracked page or static file, sniffing the
/// front-matter delimiter only for paths not seen before.
fn resolve_file(site: &mut Site, config: &SiteConfig, path: &Path) -> Result<Option<Target>> {
    if let Some(i) = site.page_index(path) {
        site.pages[i].reread()?;
        return Ok(Some(Target::Page(path.to_path_buf())));
    }
    if site.has_static_file(path) {
        return Ok(Some(Target::Static(path.to_path_buf())));
    }
    if has_front_matter(path) {
        let page = Page::from_path(path, config.source())?;
        site.pages.push(page);
        Ok(Some(Target::Page(path.to_path_buf())))
    } else {
        let file = StaticFile::new(path, config.source());
        site.static_files.push(file);
        Ok(Some(Target::Static(path.to_path_buf())))
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

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn fixture() -> (TempDir, SiteConfig, Site) {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().canonicalize().unwrap();
        write(&root, "_layouts/default.html", "<html>{{ content }}</html>");
        write(
            &root,
            "_layouts/post.html",
            "---\nlayout: default\n---\n<article>{{ content }}</article>",
        );
        write(&root, "_layouts/page.html", "<main>{{ content }}</main>");
        for day in 1..=3 {
            write(
                &root,
                &format!("_posts/2020-01-0{day}-p{day}.md"),
                "---\nlayout: post\n---\nbody\n",
            );
        }
        write(&root, "a.md", "---\nlayout: page\n---\nA\n");
        write(&root, "b.md", "---\nlayout: page\n---\nB\n");
        let mut config = SiteConfig::default();
        config.anchor_at(&root.join("site.toml"));
        let mut site = Site::new();
        build_site(&mut site, &config).unwrap();
        (tmp, config, site)
    }

    #[test]
    fn test_changed_post_rewrites_exactly_that_post() {
        let (tmp, mut config, mut site) = fixture();
        let root = tmp.path().canonicalize().unwrap();
        let path = root.join("_posts/2020-01-02-p2.md");
        write(&root, "_posts/2020-01-02-p2.md", "---\nlayout: post\n---\nedited\n");

        let written = rebuild(&mut site, &mut config, &[path]).unwrap();
        assert_eq!(written, vec![PathBuf::from("2020/01/02/p2/index.html")]);
        assert_eq!(site.posts.len(), 3);

        let out = fs::read_to_string(config.destination().join("2020/01/02/p2/index.html")).unwrap();
        assert!(out.contains("edited"));
    }

    #[test]
    fn test_new_post_inserted_and_sorted() {
        let (tmp, mut config, mut site) = fixture();
        let root = tmp.path().canonicalize().unwrap();
        let path = root.join("_posts/2021-06-01-new.md");
        write(&root, "_posts/2021-06-01-new.md", "---\nlayout: post\n---\nnew\n");

        let written = rebuild(&mut site, &mut config, &[path]).unwrap();
        assert_eq!(written, vec![PathBuf::from("2021/06/01/new/index.html")]);
        assert_eq!(site.posts.len(), 4);
        // Newest first
        assert_eq!(site.posts[0].slug, "new");
    }

    #[test]
    fn test_repeat_change_never_duplicates_post() {
        let (tmp, mut config, mut site) = fixture();
        let root = tmp.path().canonicalize().unwrap();
        let path = root.join("_posts/2020-01-01-p1.md");

        rebuild(&mut site, &mut config, &[path.clone()]).unwrap();
        rebuild(&mut site, &mut config, &[path]).unwrap();
        assert_eq!(site.posts.len(), 3);
    }

    #[test]
    fn test_changed_layout_fans_out_to_users_only() {
        let (tmp, mut config, mut site) = fixture();
        let root = tmp.path().canonicalize().unwrap();
        let path = root.join("_layouts/post.html");
        write(
            &root,
            "_layouts/post.html",
            "---\nlayout: default\n---\n<section>{{ content }}</section>",
        );

        let written = rebuild(&mut site, &mut config, &[path]).unwrap();
        assert_eq!(written.len(), 3);
        assert!(written.iter().all(|p| p.ends_with("index.html")));
        assert!(!written.contains(&PathBuf::from("a.html")));
        assert!(!written.contains(&PathBuf::from("b.html")));

        let out = fs::read_to_string(config.destination().join("2020/01/01/p1/index.html")).unwrap();
        assert!(out.contains("<section>"));
    }

    #[test]
    fn test_destination_paths_produce_empty_result() {
        let (_tmp, mut config, mut site) = fixture();
        let inside = config.destination().join("2020/01/01/p1/index.html");
        let written = rebuild(&mut site, &mut config, &[inside]).unwrap();
        assert!(written.is_empty());
    }

    #[test]
    fn test_config_change_forces_full_build() {
        let (tmp, mut config, mut site) = fixture();
        let root = tmp.path().canonicalize().unwrap();
        write(&root, "c.md", "---\nlayout: page\n---\nC\n");

        let written = rebuild(&mut site, &mut config, &[root.join("site.toml")]).unwrap();
        // Full build picks up the file no incremental path mentioned
        assert!(written.contains(&PathBuf::from("c.html")));
        assert_eq!(site.posts.len(), 3);
    }

    #[test]
    fn test_config_change_reloads_from_disk() {
        let (tmp, mut config, mut site) = fixture();
        let root = tmp.path().canonicalize().unwrap();

        // Baseline build ran with the commonmark backend
        let out = fs::read_to_string(config.destination().join("a.html")).unwrap();
        assert!(out.contains("<p>"));

        // Switch the on-disk backend; the forced full build must honor it
        write(&root, "site.toml", "[build]\nmarkdown = \"none\"\n");
        rebuild(&mut site, &mut config, &[root.join("site.toml")]).unwrap();

        assert_eq!(config.build.markdown, "none");
        let out = fs::read_to_string(config.destination().join("a.html")).unwrap();
        assert!(!out.contains("<p>"));
        assert!(out.contains("<main>"));
    }

    #[test]
    fn test_broken_config_on_disk_keeps_previous() {
        let (tmp, mut config, mut site) = fixture();
        let root = tmp.path().canonicalize().unwrap();

        // Same roots would fail validation; the stale config stays in force
        write(&root, "site.toml", "[build]\ndestination = \".\"\n");
        let written = rebuild(&mut site, &mut config, &[root.join("site.toml")]).unwrap();

        assert_eq!(config.build.markdown, "commonmark");
        assert_ne!(config.source(), config.destination());
        assert!(!written.is_empty());
    }

    #[test]
    fn test_invalid_post_name_is_fatal_for_the_call() {
        let (tmp, mut config, mut site) = fixture();
        let root = tmp.path().canonicalize().unwrap();
        write(&root, "_posts/renamed-away.md", "body");

        let err = rebuild(&mut site, &mut config, &[root.join("_posts/renamed-away.md")])
            .unwrap_err();
        assert!(err.downcast_ref::<RebuildError>().is_some());
        assert_eq!(site.posts.len(), 3);
    }

    #[test]
    fn test_prior_mutations_survive_a_fatal_path() {
        let (tmp, mut config, mut site) = fixture();
        let root = tmp.path().canonicalize().unwrap();
        write(&root, "_posts/2021-01-01-kept.md", "---\n---\nkept\n");
        write(&root, "_posts/broken.md", "body");

        let result = rebuild(
            &mut site,
            &mut config,
            &[
                root.join("_posts/2021-01-01-kept.md"),
                root.join("_posts/broken.md"),
            ],
        );
        assert!(result.is_err());
        // The accepted post from earlier in the batch stays in the model
        assert_eq!(site.posts.len(), 4);
    }

    #[test]
    fn test_new_static_file_tracked_once() {
        let (tmp, mut config, mut site) = fixture();
        let root = tmp.path().canonicalize().unwrap();
        write(&root, "logo.svg", "<svg/>");
        let statics = site.static_files.len();

        rebuild(&mut site, &mut config, &[root.join("logo.svg")]).unwrap();
        rebuild(&mut site, &mut config, &[root.join("logo.svg")]).unwrap();
        assert_eq!(site.static_files.len(), statics + 1);
        assert!(config.destination().join("logo.svg").is_file());
    }

    #[test]
    fn test_invalid_path_skipped_silently() {
        let (tmp, mut config, mut site) = fixture();
        let root = tmp.path().canonicalize().unwrap();
        write(&root, ".hidden.md", "---\n---\nx\n");

        let written = rebuild(&mut site, &mut config, &[root.join(".hidden.md")]).unwrap();
        assert!(written.is_empty());
    }

    #[test]
    fn test_duplicate_changes_render_once() {
        let (tmp, mut config, mut site) = fixture();
        let root = tmp.path().canonicalize().unwrap();
        let path = root.join("_posts/2020-01-01-p1.md");

        let written = rebuild(&mut site, &mut config, &[path.clone(), path]).unwrap();
        assert_eq!(written.len(), 1);
    }
}
