//! File system watcher driving the incremental engine.
//!
//! Monitors the source tree and the config file, batches rapid events
//! with a debounce window and feeds each settled batch to
//! [`rebuild`](crate::rebuild::rebuild).
//!
//! # Event Loop
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │  ┌──────────┐    ┌──────────┐    ┌──────────────────────┐  │
//! │  │ notify   │───▶│ Debouncer│───▶│      rebuild()       │  │
//! │  │ events   │    │ (300ms)  │    │  changed outputs ────┼──┼─▶ stdout
//! │  └──────────┘    └──────────┘    └──────────────────────┘  │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! Changed output paths are printed one per line on stdout so other
//! file-reactive processes can pipe from us; an empty batch result
//! prints nothing. Rebuild errors are logged and the loop keeps going.

use crate::config::SiteConfig;
use crate::log;
use crate::model::Site;
use crate::rebuild::rebuild;
use anyhow::{Context, Result};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use rustc_hash::FxHashSet;
use std::{
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

// =============================================================================
// Constants
// =============================================================================

const DEBOUNCE_MS: u64 = 300;

// =============================================================================
// Debounce State
// =============================================================================

/// Batches rapid file events until they settle.
struct Debouncer {
    pending: FxHashSet<PathBuf>,
    last_event: Option<Instant>,
}

impl Debouncer {
    fn new() -> Self {
        Self {
            pending: FxHashSet::default(),
            last_event: None,
        }
    }

    fn add(&mut self, event: Event) {
        self.pending.extend(event.paths);
        self.last_event = Some(Instant::now());
    }

    fn ready(&self) -> bool {
        !self.pending.is_empty()
            && self
                .last_event
                .is_some_and(|t| t.elapsed() >= Duration::from_millis(DEBOUNCE_MS))
    }

    fn take(&mut self) -> Vec<PathBuf> {
        self.last_event = None;
        let mut batch: Vec<PathBuf> = self.pending.drain().collect();
        batch.sort();
        batch
    }

    fn timeout(&self) -> Duration {
        if self.pending.is_empty() {
            Duration::from_secs(60)
        } else {
            Duration::from_millis(DEBOUNCE_MS)
        }
    }
}

// =============================================================================
// Event Handler
// =============================================================================

/// Run one batch through the engine, reporting outputs on stdout. A
/// config-file change makes the engine reload configuration from disk,
/// so later batches see the updated rules.
fn handle_changes(site: &mut Site, config: &mut SiteConfig, paths: &[PathBuf]) {
    if paths.is_empty() {
        return;
    }
    match rebuild(site, config, paths) {
        Ok(written) => notify_written(&written),
        Err(e) => {
            log!("error"; "rebuild failed: {e:#}");
        }
    }
}

/// Print changed destination-relative paths, one per line. Nothing is
/// printed for an empty result so downstream pipes stay quiet.
fn notify_written(written: &[PathBuf]) {
    for path in written {
        println!("{}", path.display());
    }
}

// =============================================================================
// Watcher Setup
// =============================================================================

fn setup_watchers(watcher: &mut impl Watcher, config: &SiteConfig) -> Result<()> {
    watcher
        .watch(config.source(), RecursiveMode::Recursive)
        .with_context(|| format!("failed to watch {}", config.source().display()))?;

    // The config file may live outside the source tree
    if config.config_path.is_file() && !config.config_path.starts_with(config.source()) {
        watcher
            .watch(&config.config_path, RecursiveMode::NonRecursive)
            .with_context(|| format!("failed to watch {}", config.config_path.display()))?;
    }

    let rel = |p: &Path| {
        p.strip_prefix(config.source())
            .unwrap_or(p)
            .display()
            .to_string()
    };
    log!("watch"; "watching {} -> {}", config.source().display(), rel(config.destination()));
    Ok(())
}

const fn is_relevant(event: &Event) -> bool {
    matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_))
}

// =============================================================================
// Public API
// =============================================================================

/// Cold-build once, then block on the event loop until the watcher
/// channel disconnects.
pub fn watch_site_blocking(site: &mut Site, config: &mut SiteConfig) -> Result<()> {
    let written = crate::build::build_site(site, config)?;
    notify_written(&written);

    let (tx, rx) = std::sync::mpsc::channel();
    let mut watcher =
        notify::recommended_watcher(tx).context("failed to create file watcher")?;
    setup_watchers(&mut watcher, config)?;

    let mut debouncer = Debouncer::new();

    loop {
        match rx.recv_timeout(debouncer.timeout()) {
            Ok(Ok(event)) if is_relevant(&event) => debouncer.add(event),
            Ok(Err(e)) => log!("watch"; "error: {e}"),
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) if debouncer.ready() => {
                handle_changes(site, config, &debouncer.take());
            }
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
            // Irrelevant events, timeouts with nothing pending
            _ => {}
        }
    }

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
