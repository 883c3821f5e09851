//! Cold batch build.
//!
//! Rebuilds the whole content model from the source tree and writes every
//! output. This is the baseline state the incremental engine maintains
//! afterwards.
//!
//! # Build Flow
//!
//! ```text
//! build_site()
//!     ├── read_layouts()   _layouts/* → Site.layouts
//!     ├── read_posts()     every nested _posts dir → Site.posts + indices
//!     ├── render posts     one payload snapshot, newest first
//!     └── walk_pages()     remaining tree, depth-first:
//!             front matter → rendered Page
//!             pagination trigger → one rendered page per slice
//!             anything else → byte-for-byte copy
//! ```

use crate::classify::Classifier;
use crate::config::SiteConfig;
use crate::log;
use crate::model::{Page, Post, Site, StaticFile, front_matter::has_front_matter};
use crate::pager::Pager;
use crate::payload::site_payload;
use crate::render::{Renderer, copy_static, write_page, write_post};
use anyhow::{Context, Result};
use serde_json::Value;
use std::{
    fs,
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

/// Build the entire site from scratch.
///
/// Resets the content model, repopulates it from the source tree and
/// writes every output. Returns the destination-relative paths written.
pub fn build_site(site: &mut Site, config: &SiteConfig) -> Result<Vec<PathBuf>> {
    let classifier = Classifier::new(config);
    let renderer = Renderer::from_config(config);
    let mut written = Vec::new();

    site.reset();
    read_layouts(site, config, &classifier)?;
    read_posts(site, config, &classifier)?;
    site.sort_posts();

    log!("build"; "{} layouts, {} posts", site.layouts.len(), site.posts.len());

    // One payload snapshot for the whole batch
    let payload = site_payload(site, config);

    // Render and write posts
    let Site {
        posts, layouts, ..
    } = site;
    for post in posts.iter_mut() {
        renderer.render_post(post, layouts, &payload);
        if let Some(rel) = write_post(post, config.destination(), config.build.future)? {
            written.push(rel);
        }
    }

    // Walk the remaining tree for pages and static files
    walk_pages(
        site,
        config,
        &classifier,
        &renderer,
        &payload,
        Path::new(""),
        &mut written,
    )?;

    log!("build"; "wrote {} files", written.len());
    Ok(written)
}

/// Load every layout from `<source>/_layouts`. A missing directory means
/// zero layouts, not an error. On a derived-name collision the
/// last-classified file wins.
fn read_layouts(site: &mut Site, config: &SiteConfig, classifier: &Classifier) -> Result<()> {
    let base = config.source().join("_layouts");
    if !base.is_dir() {
        return Ok(());
    }

    let mut entries: Vec<PathBuf> = fs::read_dir(&base)
        .with_context(|| format!("failed to read {}", base.display()))?
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    entries.sort();

    for path in entries {
        let cp = classifier.classify(&path);
        if !cp.is_valid() {
            continue;
        }
        let layout = crate::model::Layout::from_path(&path)?;
        site.layouts.insert(layout.name.clone(), layout);
    }
    Ok(())
}

/// Discover every directory literally named `_posts` under the source
/// tree and load its eligible files. Rejections (bad file name, not
/// publishable) are warnings at batch granularity, never fatal.
fn read_posts(site: &mut Site, config: &SiteConfig, classifier: &Classifier) -> Result<()> {
    let now = chrono::Local::now().naive_local();
    let post_dirs: Vec<PathBuf> = WalkDir::new(config.source())
        .into_iter()
        .filter_entry(|e| e.path() != config.destination())
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_dir() && e.file_name() == "_posts")
        .map(walkdir::DirEntry::into_path)
        .collect();

    for dir in post_dirs {
        for entry in WalkDir::new(&dir).into_iter().filter_map(Result::ok) {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let cp = classifier.classify(path);
            if !cp.is_valid() {
                continue;
            }
            if !Post::valid_name(cp.name()) {
                log!("warn"; "not a valid post name, skipping {}", path.display());
                continue;
            }
            let post = Post::from_path(path, config.source())?;
            if !post.publishable(config.build.future, now) {
                log!("warn"; "post not publishable, skipping {}", path.display());
                continue;
            }
            site.insert_post(post);
        }
    }
    Ok(())
}

/// Depth-first walk of the source tree outside the reserved directories.
///
/// Reserved directories (`_layouts`, `_includes`, `_posts`) and anything
/// failing the exclusion policy never pass `Classifier::allowed`, so only
/// the destination root needs an explicit skip.
#[allow(clippy::too_many_arguments)]
fn walk_pages(
    site: &mut Site,
    config: &SiteConfig,
    classifier: &Classifier,
    renderer: &Renderer,
    payload: &Value,
    rel_dir: &Path,
    written: &mut Vec<PathBuf>,
) -> Result<()> {
    let base = config.source().join(rel_dir);
    let mut entries: Vec<(PathBuf, String)> = fs::read_dir(&base)
        .with_context(|| format!("failed to read {}", base.display()))?
        .filter_map(Result::ok)
        .filter_map(|e| {
            let name = e.file_name().to_str()?.to_string();
            Some((e.path(), name))
        })
        .collect();
    entries.sort();

    for (path, name) in entries {
        if !classifier.allowed(&name) || path.is_symlink() {
            continue;
        }
        if path.is_dir() {
            if path == config.destination() {
                continue;
            }
            walk_pages(site, config, classifier, renderer, payload, &rel_dir.join(&name), written)?;
        } else if config.build.paginate > 0 && name == config.build.paginate_file {
            paginate_posts(site, config, renderer, payload, rel_dir, &path, written)?;
        } else if has_front_matter(&path) {
            let mut page = Page::from_path(&path, config.source())?;
            renderer.render_page(&mut page, &site.layouts, payload);
            if let Some(rel) = write_page(&page, config.destination())? {
                written.push(rel);
            }
            site.pages.push(page);
        } else {
            let file = StaticFile::new(&path, config.source());
            written.push(copy_static(&file, config.destination())?);
            site.static_files.push(file);
        }
    }
    Ok(())
}

/// Render one page per pagination slice.
///
/// Slice 1 goes to the trigger file's own destination; slice n > 1 into a
/// sibling directory named `page<n>`.
#[allow(clippy::too_many_arguments)]
fn paginate_posts(
    site: &mut Site,
    config: &SiteConfig,
    renderer: &Renderer,
    payload: &Value,
    rel_dir: &Path,
    path: &Path,
    written: &mut Vec<PathBuf>,
) -> Result<()> {
    let per_page = config.build.paginate;
    let total_pages = Pager::total_pages(site.posts.len(), per_page);

    for num in 1..=total_pages {
        let pager = Pager::new(num, per_page, site.posts.len());
        let mut page = Page::from_path(path, config.source())?;

        let mut slice_payload = payload.clone();
        if let Value::Object(map) = &mut slice_payload {
            map.insert("paginator".to_string(), pager.to_json(&site.posts));
        }
        renderer.render_page(&mut page, &site.layouts, &slice_payload);

        if num > 1 {
            let name = page
                .rel_path
                .file_name()
                .map(PathBuf::from)
                .unwrap_or_default();
            page.rel_path = rel_dir.join(format!("page{num}")).join(name);
        }
        if let Some(rel) = write_page(&page, config.destination())? {
            written.push(rel);
        }
        if num == 1 {
            site.pages.push(page);
        }
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
