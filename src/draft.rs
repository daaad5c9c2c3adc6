//! `stars draft` commands.
//!
//! Drafts never enter the store of a normal build; these commands read the
//! content directory directly and flip the `draft` flag in place.

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::{
    config::SiteConfig,
    error::ContentError,
    ingest::{ErrorMode, Ingestor},
    log,
    post::{
        Post,
        frontmatter::{rewrite_front_matter, set_draft},
    },
    utils::date::ymd,
};

/// Every draft under the content directory, newest first.
pub fn find_drafts(config: &SiteConfig) -> Result<Vec<Post>> {
    let mut drafts: Vec<_> = Ingestor::new(config, ErrorMode::Lenient)
        .include_drafts(true)
        .refresh_hash(false)
        .load_all()?
        .into_iter()
        .filter(|post| post.draft)
        .collect();
    drafts.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.slug.cmp(&b.slug)));
    Ok(drafts)
}

pub fn list_drafts(config: &SiteConfig) -> Result<()> {
    let drafts = find_drafts(config)?;
    if drafts.is_empty() {
        log!("draft"; "no drafts");
        return Ok(());
    }

    for post in &drafts {
        log!("draft"; "{}  {}  ({})", ymd(&post.date), post.slug, post.title);
    }
    log!("draft"; "{} drafts", drafts.len());
    Ok(())
}

/// Clear the draft flag of the post with `slug`. Returns the rewritten file.
pub fn publish_draft(config: &SiteConfig, slug: &str) -> Result<PathBuf> {
    let post = find_drafts(config)?
        .into_iter()
        .find(|post| post.slug == slug)
        .ok_or_else(|| ContentError::NotFound(slug.to_owned()))?;
    let source = post
        .source
        .context("draft has no source file")?;

    rewrite_front_matter(&source, |mapping| set_draft(mapping, false))
        .with_context(|| format!("failed to publish {}", source.display()))?;

    log!("draft"; "published {slug}");
    Ok(source)
}
