//! Content watcher for the preview server.
//!
//! Changed or created markdown files are re-parsed and upserted into the
//! shared store. Deletions are not propagated; a removed file keeps serving
//! its last version until the server restarts. The same holds for a post
//! switched to `draft: true`, which is reported as skipped.
//!
//! ```text
//! notify events ──▶ Debouncer (300ms) ──▶ apply_changes() ──▶ ContentStore::add
//! ```

use crate::{
    config::SiteConfig,
    ingest::{ErrorMode, Ingestor, is_markdown},
    log,
    logger::WatchStatus,
    store::ContentStore,
};
use anyhow::{Context, Result};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use rustc_hash::FxHashSet;
use std::{
    path::{Path, PathBuf},
    sync::mpsc::{self, RecvTimeoutError},
    time::{Duration, Instant},
};

// =============================================================================
// Constants
// =============================================================================

const DEBOUNCE_MS: u64 = 300;
/// Events right after an update are dropped; hash write-back would otherwise
/// re-trigger the same file.
const UPDATE_COOLDOWN_MS: u64 = 800;

// =============================================================================
// Path Utilities
// =============================================================================

/// Check if path is a temp/backup file (editor artifacts).
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}

/// `/blog/content/rust/intro.md` → `rust/intro.md`
fn rel_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root).unwrap_or(path).display().to_string()
}

// =============================================================================
// Debounce State
// =============================================================================

/// Batches rapid file events.
struct Debouncer {
    pending: FxHashSet<PathBuf>,
    last_event: Option<Instant>,
    last_update: Option<Instant>,
}

impl Debouncer {
    fn new() -> Self {
        Self {
            pending: FxHashSet::default(),
            last_event: None,
            last_update: None,
        }
    }

    fn in_cooldown(&self) -> bool {
        self.last_update
            .is_some_and(|t| t.elapsed() < Duration::from_millis(UPDATE_COOLDOWN_MS))
    }

    fn add(&mut self, event: Event) {
        for path in event.paths {
            if !is_temp_file(&path) && is_markdown(&path) {
                self.pending.insert(path);
            }
        }
        self.last_event = Some(Instant::now());
    }

    fn ready(&self) -> bool {
        !self.pending.is_empty()
            && self
                .last_event
                .is_some_and(|t| t.elapsed() >= Duration::from_millis(DEBOUNCE_MS))
    }

    /// Pending paths in sorted order.
    fn take(&mut self) -> Vec<PathBuf> {
        self.last_event = None;
        let mut paths: Vec<_> = self.pending.drain().collect();
        paths.sort();
        paths
    }

    fn mark_update(&mut self) {
        self.last_update = Some(Instant::now());
    }

    fn timeout(&self) -> Duration {
        if self.pending.is_empty() {
            Duration::from_secs(60)
        } else {
            Duration::from_millis(DEBOUNCE_MS)
        }
    }
}

const fn is_relevant(event: &Event) -> bool {
    matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_))
}

// =============================================================================
// Change Handling
// =============================================================================

/// Re-parse `paths` and upsert the results. Returns the number of posts
/// that changed in the store.
fn apply_changes(
    paths: &[PathBuf],
    ingestor: &Ingestor,
    store: &ContentStore,
    content_dir: &Path,
    status: &mut WatchStatus,
) -> usize {
    let mut updated = 0;

    for path in paths {
        let rel = rel_path(path, content_dir);
        // removed files stay in the store
        if !path.is_file() {
            continue;
        }

        let post = match ingestor.load_file(path) {
            Ok(Some(post)) => post,
            // strict mode only yields `None` for drafts
            Ok(None) => {
                status.warning(&format!(
                    "skipped draft: {rel} (a published version stays listed until restart)"
                ));
                continue;
            }
            Err(err) => {
                status.error(&format!("failed: {rel}"), &format!("{err:#}"));
                continue;
            }
        };

        let slug = post.slug.clone();
        if store.get(&slug).is_ok_and(|old| *old == post) {
            status.unchanged(&rel);
            continue;
        }

        match store.add(post) {
            Ok(()) => {
                updated += 1;
                status.success(&format!("updated: {slug}"));
            }
            Err(err) => status.error(&format!("failed: {rel}"), &err.to_string()),
        }
    }

    updated
}

// =============================================================================
// Public API
// =============================================================================

/// Watch the content directory and keep `store` current. Blocks until the
/// event channel closes.
pub fn watch_content(config: &SiteConfig, store: &ContentStore) -> Result<()> {
    let content_dir = &config.build.content;

    let (tx, rx) = mpsc::channel();
    let mut watcher = notify::recommended_watcher(tx).context("Failed to create file watcher")?;
    watcher
        .watch(content_dir, RecursiveMode::Recursive)
        .with_context(|| format!("Failed to watch {}", content_dir.display()))?;
    log!("watch"; "{}", rel_path(content_dir, config.get_root()));

    // errors surface through the status line instead of aborting the loop
    let ingestor = Ingestor::new(config, ErrorMode::Strict);
    let mut debouncer = Debouncer::new();
    let mut status = WatchStatus::new();

    loop {
        match rx.recv_timeout(debouncer.timeout()) {
            Ok(Ok(event)) if is_relevant(&event) && !debouncer.in_cooldown() => {
                debouncer.add(event);
            }
            Ok(Err(e)) => log!("watch"; "error: {e}"),
            Err(RecvTimeoutError::Timeout) if debouncer.ready() => {
                let paths = debouncer.take();
                debouncer.mark_update();
                apply_changes(&paths, &ingestor, store, content_dir, &mut status);
            }
            Err(RecvTimeoutError::Disconnected) => break,
            _ => {}
        }
    }

    Ok(())
}
