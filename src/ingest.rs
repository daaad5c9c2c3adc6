//! Content ingestion: content directory → parsed posts → store.
//!
//! Files are parsed in parallel and then processed strictly in path order,
//! so hash write-back and store insertion never depend on thread timing.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use rayon::prelude::*;
use walkdir::WalkDir;

use crate::{
    config::SiteConfig,
    error::{ContentError, ContentResult},
    log,
    post::{CmarkRenderer, DocumentParser, Post},
    store::ContentStore,
};

/// What to do with a document that fails to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorMode {
    /// Abort on the first failure (one-shot build).
    Strict,
    /// Log and skip (preview server, watcher).
    Lenient,
}

/// Parser wired with the default renderer and the configured wallet.
pub fn parser_for(config: &SiteConfig) -> DocumentParser {
    DocumentParser::new(
        Arc::new(CmarkRenderer::default()),
        config.base.wallet_address.clone(),
    )
}

/// Whether a path looks like a content document.
pub fn is_markdown(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "md")
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

/// All markdown files under `dir`, sorted. Hidden files and directories
/// are skipped.
pub fn collect_markdown(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in WalkDir::new(dir).into_iter().filter_entry(|e| !is_hidden(e)) {
        let entry = entry.with_context(|| format!("failed to walk {}", dir.display()))?;
        if entry.file_type().is_file() && is_markdown(entry.path()) {
            paths.push(entry.into_path());
        }
    }
    paths.sort();
    Ok(paths)
}

/// Slug used when neither front matter nor title yields one: the path
/// relative to the content directory, without `.md`.
pub fn fallback_slug(content_dir: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(content_dir).unwrap_or(path);
    relative
        .with_extension("")
        .to_string_lossy()
        .replace('\\', "/")
}

/// Loads posts from the content directory under one error policy.
pub struct Ingestor<'a> {
    config: &'a SiteConfig,
    parser: DocumentParser,
    mode: ErrorMode,
    include_drafts: bool,
    refresh_hash: bool,
}

impl<'a> Ingestor<'a> {
    pub fn new(config: &'a SiteConfig, mode: ErrorMode) -> Self {
        Self {
            config,
            parser: parser_for(config),
            mode,
            include_drafts: config.build.drafts,
            refresh_hash: config.build.refresh_hash,
        }
    }

    pub fn include_drafts(mut self, include: bool) -> Self {
        self.include_drafts = include;
        self
    }

    pub fn refresh_hash(mut self, refresh: bool) -> Self {
        self.refresh_hash = refresh;
        self
    }

    /// Load a single file. `Ok(None)` means the file was skipped (draft,
    /// or a failure in lenient mode).
    pub fn load_file(&self, path: &Path) -> Result<Option<Post>> {
        self.finish(path, self.parser.parse_file(path))
    }

    /// Load every markdown file under the content directory, in path order.
    pub fn load_all(&self) -> Result<Vec<Post>> {
        let content_dir = &self.config.build.content;
        let paths = collect_markdown(content_dir)?;

        let parsed: Vec<_> = paths
            .par_iter()
            .map(|path| self.parser.parse_file(path))
            .collect();

        let mut posts = Vec::with_capacity(paths.len());
        for (path, result) in paths.iter().zip(parsed) {
            if let Some(post) = self.finish(path, result)? {
                posts.push(post);
            }
        }
        Ok(posts)
    }

    fn finish(&self, path: &Path, parsed: ContentResult<Post>) -> Result<Option<Post>> {
        let mut post = match parsed {
            Ok(post) => post,
            Err(err) => {
                self.fail(path, "skipping", err)?;
                return Ok(None);
            }
        };

        if post.draft && !self.include_drafts {
            return Ok(None);
        }
        if post.slug.is_empty() {
            post.slug = fallback_slug(&self.config.build.content, path);
        }
        if self.refresh_hash
            && let Err(err) = post.refresh_content_hash()
        {
            self.fail(path, "hash not recorded for", err)?;
        }
        Ok(Some(post))
    }

    fn fail(&self, path: &Path, action: &str, err: ContentError) -> Result<()> {
        match self.mode {
            ErrorMode::Strict => {
                Err(err).with_context(|| format!("failed to load {}", path.display()))
            }
            ErrorMode::Lenient => {
                log!("ingest"; "{action} {}: {err}", path.display());
                Ok(())
            }
        }
    }
}

/// Sort order for a fresh build: series, position in series, slug.
pub fn sort_for_insert(posts: &mut [Post]) {
    posts.sort_by(|a, b| {
        (a.series.as_str(), a.series_order, a.slug.as_str()).cmp(&(
            b.series.as_str(),
            b.series_order,
            b.slug.as_str(),
        ))
    });
}

/// Load the content directory into a fresh store.
pub fn load_store(config: &SiteConfig, mode: ErrorMode) -> Result<ContentStore> {
    let mut posts = Ingestor::new(config, mode).load_all()?;
    sort_for_insert(&mut posts);

    let store = ContentStore::new();
    for post in posts {
        let source = post.source.clone().unwrap_or_default();
        if let Err(err) = store.add(post) {
            match mode {
                ErrorMode::Strict => {
                    return Err(err)
                        .with_context(|| format!("failed to index {}", source.display()));
                }
                ErrorMode::Lenient => log!("ingest"; "skipping {}: {err}", source.display()),
            }
        }
    }
    Ok(store)
}
